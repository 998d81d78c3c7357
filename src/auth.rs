// src/auth.rs

//! Shared-secret request authentication.

use std::fmt;

use sha2::{Digest, Sha256};

use crate::error::{AppError, Result};
use crate::models::PLACEHOLDER_SECRET;

/// The expected `key` parameter.
///
/// Comparison hashes both sides and folds the digests, so timing does not
/// depend on where the first mismatching byte is.
#[derive(Clone)]
pub struct SharedSecret {
    digest: [u8; 32],
}

impl SharedSecret {
    /// Build a secret, rejecting empty values and the historical placeholder.
    pub fn new(secret: &str) -> Result<Self> {
        if secret.is_empty() {
            return Err(AppError::config("SECRET_KEY must not be empty"));
        }
        if secret == PLACEHOLDER_SECRET {
            return Err(AppError::config(
                "SECRET_KEY is still the placeholder value; set a real secret",
            ));
        }
        Ok(Self {
            digest: digest(secret),
        })
    }

    /// Read `SECRET_KEY`; missing is a startup error, never a default.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let secret = lookup("SECRET_KEY")
            .ok_or_else(|| AppError::config("SECRET_KEY must be set"))?;
        Self::new(&secret)
    }

    /// Exact, case-sensitive match of a presented key.
    pub fn verify(&self, presented: Option<&str>) -> Result<()> {
        let Some(presented) = presented else {
            return Err(AppError::Unauthorized);
        };
        let candidate = digest(presented);
        let diff = self
            .digest
            .iter()
            .zip(candidate.iter())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b));
        if diff == 0 {
            Ok(())
        } else {
            Err(AppError::Unauthorized)
        }
    }
}

impl fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SharedSecret(<redacted>)")
    }
}

fn digest(value: &str) -> [u8; 32] {
    Sha256::digest(value.as_bytes()).into()
}
