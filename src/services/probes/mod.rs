//! Probe strategies for the availability fallback chain.
//!
//! Each probe tries one channel (direct page, CORS relay, alternate
//! endpoint) and reports either a conclusive verdict or why it could not
//! decide. Transport failures become [`InconclusiveReason::Unreachable`];
//! only errors that make the probe itself impossible to run (an invalid
//! URL template) are returned as `Err`.

mod alternate;
mod direct;
mod proxy;

use std::time::Instant;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{
    Confidence, InconclusiveReason, ProbeSource, ProbeTrace, TraceOutcome, Verdict,
};
use crate::utils::http::PageFetcher;

pub use alternate::AlternateProbe;
pub use direct::DirectProbe;
pub use proxy::ProxyProbe;

/// What a single probe concluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    Conclusive {
        verdict: Verdict,
        confidence: Confidence,
    },
    Inconclusive(InconclusiveReason),
}

impl ProbeOutcome {
    pub fn conclusive(verdict: Verdict, confidence: Confidence) -> Self {
        Self::Conclusive {
            verdict,
            confidence,
        }
    }

    pub fn is_conclusive(&self) -> bool {
        matches!(self, Self::Conclusive { .. })
    }
}

/// Outcome plus the diagnostic record of how it was reached.
#[derive(Debug, Clone)]
pub struct ProbeReport {
    pub outcome: ProbeOutcome,
    pub trace: ProbeTrace,
}

impl ProbeReport {
    /// Stamp the outcome and elapsed time onto the trace.
    fn finish(mut trace: ProbeTrace, outcome: ProbeOutcome, started: Instant) -> Self {
        trace.elapsed_ms = started.elapsed().as_millis() as u64;
        match outcome {
            ProbeOutcome::Conclusive { verdict, .. } => {
                trace.outcome = TraceOutcome::Conclusive;
                trace.verdict = Some(verdict);
            }
            ProbeOutcome::Inconclusive(reason) => {
                trace.outcome = TraceOutcome::Inconclusive;
                trace.reason = Some(reason);
            }
        }
        Self { outcome, trace }
    }

    /// Inconclusive report for a transport failure.
    fn unreachable(mut trace: ProbeTrace, error: impl ToString, started: Instant) -> Self {
        trace.error = Some(error.to_string());
        Self::finish(
            trace,
            ProbeOutcome::Inconclusive(InconclusiveReason::Unreachable),
            started,
        )
    }
}

/// One channel of evidence about a handle.
#[async_trait]
pub trait Probe: Send + Sync {
    fn source(&self) -> ProbeSource;

    async fn probe(&self, fetcher: &dyn PageFetcher, handle: &str) -> Result<ProbeReport>;
}
