//! Pipeline entry points.
//!
//! - `run_check`: classify a handle and send the alert when warranted

pub mod check;

pub use check::{AlertStatus, CheckRun, run_check};
