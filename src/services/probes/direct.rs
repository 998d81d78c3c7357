//! Direct fetch of the canonical profile page.

use std::time::Instant;

use async_trait::async_trait;

use super::{Probe, ProbeOutcome, ProbeReport};
use crate::error::Result;
use crate::models::{
    BlockedPageBand, Confidence, HANDLE_PLACEHOLDER, InconclusiveReason, ProbeConfig, ProbeSource,
    ProbeTrace, Verdict,
};
use crate::services::signals::{self, PageText};
use crate::utils::http::{FetchedPage, PageFetcher};
use crate::utils::{sha256_hex, truncate_chars};

/// Longest page title kept in the trace.
const MAX_TITLE_CHARS: usize = 120;

/// Probe that GETs the profile page with a browser User-Agent.
pub struct DirectProbe {
    profile_url: String,
    band: BlockedPageBand,
}

/// Decision for one fetched page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectClassification {
    pub outcome: ProbeOutcome,
    pub handle_found: bool,
    pub matched: Option<String>,
}

impl DirectProbe {
    pub fn new(profile_url: impl Into<String>, band: BlockedPageBand) -> Self {
        Self {
            profile_url: profile_url.into(),
            band,
        }
    }

    pub fn from_config(config: &ProbeConfig) -> Self {
        Self::new(&config.profile_url, config.blocked_page)
    }

    /// Classify a direct response.
    ///
    /// A 403, or a non-404 body inside the blocked-page band without the
    /// handle, is the generic anti-bot page and its text is ignored. Otherwise
    /// in order: suspension text, 404, 200 with the handle embedded, explicit
    /// "doesn't exist" text on a 2xx page. Anything else has no signal.
    pub fn classify(page: &FetchedPage, handle: &str, band: BlockedPageBand) -> DirectClassification {
        let text = PageText::new(&page.body);
        let handle_found = signals::handle_embedded(&page.body, handle);
        let high = |verdict| ProbeOutcome::conclusive(verdict, Confidence::High);

        let blocked = page.status == 403
            || (page.status != 404 && band.contains(page.bytes()) && !handle_found);

        let (outcome, matched) = if blocked {
            (ProbeOutcome::Inconclusive(InconclusiveReason::Blocked), None)
        } else if let Some(phrase) = text.suspension() {
            (high(Verdict::Suspended), text.snippet(phrase))
        } else if page.status == 404 {
            (high(Verdict::Available), None)
        } else if page.status == 200 && handle_found {
            (high(Verdict::Taken), None)
        } else if let Some(phrase) = text
            .not_found()
            .filter(|_| (200..300).contains(&page.status))
        {
            (high(Verdict::Available), text.snippet(phrase))
        } else {
            (ProbeOutcome::Inconclusive(InconclusiveReason::NoSignal), None)
        };

        DirectClassification {
            outcome,
            handle_found,
            matched,
        }
    }
}

#[async_trait]
impl Probe for DirectProbe {
    fn source(&self) -> ProbeSource {
        ProbeSource::Direct
    }

    async fn probe(&self, fetcher: &dyn PageFetcher, handle: &str) -> Result<ProbeReport> {
        let url = url::Url::parse(&self.profile_url.replace(HANDLE_PLACEHOLDER, handle))?;
        let started = Instant::now();
        let mut trace = ProbeTrace::new(ProbeSource::Direct, url.as_str());

        let page = match fetcher.get(url.as_str()).await {
            Ok(page) => page,
            Err(e) => {
                log::warn!("Direct probe for @{} failed: {}", handle, e);
                return Ok(ProbeReport::unreachable(trace, e, started));
            }
        };

        let decision = Self::classify(&page, handle, self.band);
        log::debug!(
            "Direct probe @{}: status={} bytes={} handle_found={} -> {:?}",
            handle,
            page.status,
            page.bytes(),
            decision.handle_found,
            decision.outcome
        );

        trace.status = Some(page.status);
        trace.bytes = Some(page.bytes());
        trace.handle_found = Some(decision.handle_found);
        trace.matched = decision.matched;
        trace.page_title = signals::page_title(&page.body)
            .map(|t| truncate_chars(&t, MAX_TITLE_CHARS).to_string());
        trace.body_sha256 = Some(sha256_hex(&page.body));

        Ok(ProbeReport::finish(trace, decision.outcome, started))
    }
}
