//! Profile fetch through a public CORS relay.
//!
//! The relay wraps the upstream page as JSON:
//! `{ "contents": "<html…>", "status": { "http_code": 200 } }`.

use std::time::Instant;

use async_trait::async_trait;
use serde::Deserialize;

use super::{Probe, ProbeOutcome, ProbeReport};
use crate::error::Result;
use crate::models::{
    Confidence, HANDLE_PLACEHOLDER, InconclusiveReason, ProbeConfig, ProbeSource, ProbeTrace,
    Verdict,
};
use crate::services::signals::PageText;
use crate::utils::http::PageFetcher;

#[derive(Debug, Default, Deserialize)]
struct RelayResponse {
    #[serde(default)]
    contents: Option<String>,
    #[serde(default)]
    status: Option<RelayStatus>,
}

#[derive(Debug, Default, Deserialize)]
struct RelayStatus {
    #[serde(default)]
    http_code: Option<u16>,
}

/// Probe that asks a CORS relay to fetch the profile page.
pub struct ProxyProbe {
    relay_url: String,
    profile_url: String,
}

/// Decision for relayed page contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayClassification {
    pub outcome: ProbeOutcome,
    pub handle_found: bool,
    pub matched: Option<String>,
}

impl ProxyProbe {
    pub fn new(relay_url: impl Into<String>, profile_url: impl Into<String>) -> Self {
        Self {
            relay_url: relay_url.into(),
            profile_url: profile_url.into(),
        }
    }

    pub fn from_config(config: &ProbeConfig) -> Self {
        Self::new(&config.proxy_url, &config.profile_url)
    }

    /// Classify relayed contents.
    ///
    /// Suspension text outranks everything. Then, in order: "doesn't
    /// exist" text, handle plus a follower marker, an upstream 404.
    pub fn classify(contents: &str, http_code: Option<u16>, handle: &str) -> RelayClassification {
        let text = PageText::new(contents);
        let marker = text.profile_marker();
        let handle_found = marker.is_some() && text.mentions(handle);
        let high = |verdict| ProbeOutcome::conclusive(verdict, Confidence::High);

        let (outcome, matched) = if let Some(phrase) = text.suspension() {
            (high(Verdict::Suspended), text.snippet(phrase))
        } else if let Some(phrase) = text.not_found() {
            (high(Verdict::Available), text.snippet(phrase))
        } else if let (true, Some(marker)) = (handle_found, marker) {
            (high(Verdict::Taken), text.snippet(marker))
        } else if http_code == Some(404) {
            (high(Verdict::Available), None)
        } else {
            (ProbeOutcome::Inconclusive(InconclusiveReason::NoSignal), None)
        };

        RelayClassification {
            outcome,
            handle_found,
            matched,
        }
    }

    fn relay_url_for(&self, handle: &str) -> Result<url::Url> {
        let target = self.profile_url.replace(HANDLE_PLACEHOLDER, handle);
        Ok(url::Url::parse_with_params(
            &self.relay_url,
            &[("url", target.as_str())],
        )?)
    }
}

#[async_trait]
impl Probe for ProxyProbe {
    fn source(&self) -> ProbeSource {
        ProbeSource::Proxy
    }

    async fn probe(&self, fetcher: &dyn PageFetcher, handle: &str) -> Result<ProbeReport> {
        let url = self.relay_url_for(handle)?;
        let started = Instant::now();
        let mut trace = ProbeTrace::new(ProbeSource::Proxy, url.as_str());

        let page = match fetcher.get(url.as_str()).await {
            Ok(page) => page,
            Err(e) => {
                log::warn!("Proxy probe for @{} failed: {}", handle, e);
                return Ok(ProbeReport::unreachable(trace, e, started));
            }
        };

        if !(200..300).contains(&page.status) {
            log::warn!("Proxy relay returned HTTP {} for @{}", page.status, handle);
            return Ok(ProbeReport::unreachable(
                trace,
                format!("relay returned HTTP {}", page.status),
                started,
            ));
        }

        let relay: RelayResponse = match serde_json::from_str(&page.body) {
            Ok(relay) => relay,
            Err(e) => {
                log::warn!("Proxy relay sent malformed JSON for @{}: {}", handle, e);
                return Ok(ProbeReport::unreachable(trace, e, started));
            }
        };

        let http_code = relay.status.and_then(|s| s.http_code);
        let contents = relay.contents.unwrap_or_default();
        let decision = Self::classify(&contents, http_code, handle);
        log::debug!(
            "Proxy probe @{}: upstream={:?} bytes={} -> {:?}",
            handle,
            http_code,
            contents.len(),
            decision.outcome
        );

        trace.status = http_code;
        trace.bytes = Some(contents.len());
        trace.handle_found = Some(decision.handle_found);
        trace.matched = decision.matched;

        Ok(ProbeReport::finish(trace, decision.outcome, started))
    }
}
