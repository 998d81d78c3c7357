// src/models/mod.rs

//! Domain models for the handle checker.

mod check;
mod config;

// Re-export all public types
pub use check::{
    CheckResult, Confidence, DebugInfo, InconclusiveReason, ProbeSource, ProbeTrace, TraceOutcome,
    Verdict,
};
pub use config::{
    BlockedPageBand, Config, HANDLE_PLACEHOLDER, NotifyConfig, PLACEHOLDER_SECRET, ProbeConfig,
    TargetConfig,
};
