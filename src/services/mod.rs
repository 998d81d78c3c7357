//! Service layer for the handle checker.
//!
//! This module contains the business logic for:
//! - Availability classification (`Classifier`)
//! - Individual evidence channels (`probes`)
//! - Page heuristics (`signals`)
//! - Alert delivery (`SmsNotifier`)

mod classifier;
pub mod notifier;
pub mod probes;
pub mod signals;

pub use classifier::Classifier;
pub use notifier::{Notifier, NotifyOutcome, SmsCredentials, SmsNotifier, SmsProvider};
