// src/utils/http.rs

//! HTTP client utilities.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::ProbeConfig;

/// Redirect hops followed before giving up.
const MAX_REDIRECTS: usize = 10;

/// Create a configured asynchronous HTTP client.
pub fn create_async_client(config: &ProbeConfig) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .user_agent(&config.user_agent)
        .timeout(Duration::from_secs(config.timeout_secs))
        .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
        .build()?;
    Ok(client)
}

/// Status and body of a fetched page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedPage {
    pub status: u16,
    pub body: String,
    size: usize,
}

impl FetchedPage {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        let body = body.into();
        Self {
            status,
            size: body.len(),
            body,
        }
    }

    /// Page from the raw wire body. The size is taken before lossy decoding,
    /// so invalid UTF-8 does not shift it.
    pub fn from_raw(status: u16, raw: &[u8]) -> Self {
        Self {
            status,
            body: String::from_utf8_lossy(raw).into_owned(),
            size: raw.len(),
        }
    }

    /// Response size in bytes, as received.
    pub fn bytes(&self) -> usize {
        self.size
    }
}

/// GET access used by the probes.
///
/// Any non-2xx status is a normal `Ok` page; only transport failures
/// (DNS, TLS, timeout, body read) are errors.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn get(&self, url: &str) -> Result<FetchedPage>;
}

#[async_trait]
impl PageFetcher for reqwest::Client {
    async fn get(&self, url: &str) -> Result<FetchedPage> {
        let response = reqwest::Client::get(self, url).send().await?;
        let status = response.status().as_u16();
        let raw = response.bytes().await?;
        Ok(FetchedPage::from_raw(status, &raw))
    }
}

#[cfg(test)]
pub mod testing {
    //! In-memory fetcher for probe and handler tests.

    use std::collections::HashMap;
    use std::sync::Mutex;

    use super::*;
    use crate::error::AppError;

    #[derive(Default)]
    pub struct StaticFetcher {
        routes: HashMap<String, FetchedPage>,
        requested: Mutex<Vec<String>>,
    }

    impl StaticFetcher {
        pub fn new() -> Self {
            Self::default()
        }

        /// Serve `page` for any URL starting with `prefix`.
        pub fn route(mut self, prefix: &str, page: FetchedPage) -> Self {
            self.routes.insert(prefix.to_string(), page);
            self
        }

        pub fn requested(&self) -> Vec<String> {
            self.requested.lock().unwrap().clone()
        }

        pub fn was_requested(&self, prefix: &str) -> bool {
            self.requested().iter().any(|url| url.starts_with(prefix))
        }
    }

    #[async_trait]
    impl PageFetcher for StaticFetcher {
        async fn get(&self, url: &str) -> Result<FetchedPage> {
            self.requested.lock().unwrap().push(url.to_string());
            self.routes
                .iter()
                .filter(|(prefix, _)| url.starts_with(prefix.as_str()))
                .max_by_key(|(prefix, _)| prefix.len())
                .map(|(_, page)| page.clone())
                .ok_or_else(|| {
                    AppError::Io(std::io::Error::new(
                        std::io::ErrorKind::ConnectionRefused,
                        format!("no route for {url}"),
                    ))
                })
        }
    }
}
