//! Verdicts, confidence levels and the per-invocation check result.

use serde::{Deserialize, Serialize};

/// What the probes concluded about a handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Available,
    Taken,
    /// Suspended handles are held by the platform and never reported available.
    Suspended,
    Unknown,
}

impl Verdict {
    pub fn is_available(self) -> bool {
        matches!(self, Verdict::Available)
    }

    /// Human-readable summary used as the response message.
    pub fn message(self) -> &'static str {
        match self {
            Verdict::Available => "Username is available!",
            Verdict::Taken => "Username is taken",
            Verdict::Suspended => "Username is suspended (not available)",
            Verdict::Unknown => {
                "Unable to verify availability: upstream blocked or unreachable. Treating as not available"
            }
        }
    }
}

/// Strength of a verdict, derived from which probe produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

/// The channel a probe used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeSource {
    Direct,
    Proxy,
    Alternate,
}

/// Whether a probe reached a verdict.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TraceOutcome {
    Conclusive,
    #[default]
    Inconclusive,
}

/// Why a probe could not decide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InconclusiveReason {
    /// The canonical site served its anti-bot page or a 403
    Blocked,
    /// Network failure, timeout or a malformed relay response
    Unreachable,
    /// A response arrived but carried no recognised signal
    NoSignal,
}

/// Diagnostic record of one probe attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeTrace {
    pub source: ProbeSource,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bytes: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub handle_found: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body_sha256: Option<String>,
    pub outcome: TraceOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verdict: Option<Verdict>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<InconclusiveReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub elapsed_ms: u64,
}

impl ProbeTrace {
    pub fn new(source: ProbeSource, url: impl Into<String>) -> Self {
        Self {
            source,
            url: url.into(),
            status: None,
            bytes: None,
            handle_found: None,
            matched: None,
            page_title: None,
            body_sha256: None,
            outcome: TraceOutcome::Inconclusive,
            verdict: None,
            reason: None,
            error: None,
            elapsed_ms: 0,
        }
    }
}

/// Diagnostic bag attached to the response when `debug=true`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebugInfo {
    pub verdict: Verdict,
    pub probes: Vec<ProbeTrace>,
}

/// Outcome of one availability check.
#[derive(Debug, Clone)]
pub struct CheckResult {
    pub verdict: Verdict,
    pub confidence: Confidence,
    pub message: String,
    pub probes: Vec<ProbeTrace>,
}

impl CheckResult {
    pub fn new(verdict: Verdict, confidence: Confidence, probes: Vec<ProbeTrace>) -> Self {
        Self {
            verdict,
            confidence,
            message: verdict.message().to_string(),
            probes,
        }
    }

    /// Conservative default when no probe produced a positive signal.
    pub fn unverified(probes: Vec<ProbeTrace>) -> Self {
        Self::new(Verdict::Unknown, Confidence::Low, probes)
    }

    /// Unknown collapses to `false`.
    pub fn available(&self) -> bool {
        self.verdict.is_available()
    }

    /// Only a high-confidence "available" may page a human.
    pub fn is_alertable(&self) -> bool {
        self.available() && self.confidence == Confidence::High
    }

    pub fn debug_info(&self) -> DebugInfo {
        DebugInfo {
            verdict: self.verdict,
            probes: self.probes.clone(),
        }
    }
}
