//! Availability classifier.
//!
//! Runs the configured probes in order and stops at the first conclusive
//! one. When every probe is inconclusive the result is the conservative
//! "not available, low confidence" default: nothing is reported available
//! without a positive signal.

use std::sync::Arc;

use crate::error::Result;
use crate::models::{CheckResult, ProbeConfig, ProbeSource};
use crate::services::probes::{AlternateProbe, DirectProbe, Probe, ProbeOutcome, ProxyProbe};
use crate::utils::http::PageFetcher;

/// Ordered fallback chain of probes.
pub struct Classifier {
    fetcher: Arc<dyn PageFetcher>,
    probes: Vec<Box<dyn Probe>>,
}

impl Classifier {
    /// Create a classifier with an explicit probe order.
    pub fn new(fetcher: Arc<dyn PageFetcher>, probes: Vec<Box<dyn Probe>>) -> Self {
        Self { fetcher, probes }
    }

    /// Direct, then proxy (if enabled), then alternate (if configured).
    pub fn from_config(config: &ProbeConfig, fetcher: Arc<dyn PageFetcher>) -> Self {
        let mut probes: Vec<Box<dyn Probe>> = vec![Box::new(DirectProbe::from_config(config))];
        if config.proxy_enabled {
            probes.push(Box::new(ProxyProbe::from_config(config)));
        }
        if let Some(url) = &config.alternate_url {
            probes.push(Box::new(AlternateProbe::new(url)));
        }
        Self::new(fetcher, probes)
    }

    pub fn sources(&self) -> Vec<ProbeSource> {
        self.probes.iter().map(|p| p.source()).collect()
    }

    /// Classify a handle.
    ///
    /// Errors only when a probe cannot be run at all; upstream blocking and
    /// network failures are folded into the result.
    pub async fn check(&self, handle: &str) -> Result<CheckResult> {
        let mut traces = Vec::with_capacity(self.probes.len());

        for probe in &self.probes {
            let report = probe.probe(self.fetcher.as_ref(), handle).await?;
            traces.push(report.trace);

            match report.outcome {
                ProbeOutcome::Conclusive {
                    verdict,
                    confidence,
                } => {
                    log::info!(
                        "@{}: {:?} ({:?} confidence) via {:?} probe",
                        handle,
                        verdict,
                        confidence,
                        probe.source()
                    );
                    return Ok(CheckResult::new(verdict, confidence, traces));
                }
                ProbeOutcome::Inconclusive(reason) => {
                    log::info!(
                        "@{}: {:?} probe inconclusive ({:?})",
                        handle,
                        probe.source(),
                        reason
                    );
                }
            }
        }

        log::warn!(
            "@{}: all {} probes inconclusive, reporting not available",
            handle,
            traces.len()
        );
        Ok(CheckResult::unverified(traces))
    }
}
