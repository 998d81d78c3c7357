//! API-style username lookup, tried after the page-based probes.
//!
//! Expects `{ "valid": bool, "reason": "available" | "taken" | … }`. The
//! endpoint is unofficial, so its answers carry medium confidence and never
//! trigger an alert on their own.

use std::time::Instant;

use async_trait::async_trait;
use serde::Deserialize;

use super::{Probe, ProbeOutcome, ProbeReport};
use crate::error::Result;
use crate::models::{
    Confidence, HANDLE_PLACEHOLDER, InconclusiveReason, ProbeSource, ProbeTrace, Verdict,
};
use crate::utils::http::PageFetcher;

#[derive(Debug, Deserialize)]
struct LookupResponse {
    #[serde(default)]
    valid: Option<bool>,
    #[serde(default)]
    reason: Option<String>,
}

pub struct AlternateProbe {
    url: String,
}

impl AlternateProbe {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    fn classify(lookup: &LookupResponse) -> ProbeOutcome {
        let medium = |verdict| ProbeOutcome::conclusive(verdict, Confidence::Medium);
        match (lookup.valid, lookup.reason.as_deref()) {
            (Some(true), Some("available")) => medium(Verdict::Available),
            (_, Some("taken")) => medium(Verdict::Taken),
            _ => ProbeOutcome::Inconclusive(InconclusiveReason::NoSignal),
        }
    }
}

#[async_trait]
impl Probe for AlternateProbe {
    fn source(&self) -> ProbeSource {
        ProbeSource::Alternate
    }

    async fn probe(&self, fetcher: &dyn PageFetcher, handle: &str) -> Result<ProbeReport> {
        let url = url::Url::parse(&self.url.replace(HANDLE_PLACEHOLDER, handle))?;
        let started = Instant::now();
        let mut trace = ProbeTrace::new(ProbeSource::Alternate, url.as_str());

        let page = match fetcher.get(url.as_str()).await {
            Ok(page) => page,
            Err(e) => {
                log::warn!("Alternate probe for @{} failed: {}", handle, e);
                return Ok(ProbeReport::unreachable(trace, e, started));
            }
        };
        trace.status = Some(page.status);
        trace.bytes = Some(page.bytes());

        if !(200..300).contains(&page.status) {
            return Ok(ProbeReport::unreachable(
                trace,
                format!("lookup returned HTTP {}", page.status),
                started,
            ));
        }

        let outcome = match serde_json::from_str::<LookupResponse>(&page.body) {
            Ok(lookup) => {
                trace.matched = lookup.reason.clone();
                Self::classify(&lookup)
            }
            Err(e) => {
                trace.error = Some(e.to_string());
                ProbeOutcome::Inconclusive(InconclusiveReason::NoSignal)
            }
        };

        Ok(ProbeReport::finish(trace, outcome, started))
    }
}
