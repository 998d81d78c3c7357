// src/pipeline/check.rs

//! Check-then-alert pipeline shared by the CLI and the Lambda handler.

use crate::error::Result;
use crate::models::CheckResult;
use crate::services::{Classifier, Notifier, NotifyOutcome};

/// What happened on the alert side of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlertStatus {
    /// Caller did not ask for an alert
    NotRequested,
    /// Verdict was not a high-confidence "available"
    NotWarranted,
    Sent { provider: &'static str },
    /// No SMS provider configured
    Skipped,
    Failed(String),
}

/// Result of one pipeline run.
#[derive(Debug, Clone)]
pub struct CheckRun {
    pub result: CheckResult,
    pub alert: AlertStatus,
}

/// Classify `handle` and, if asked and warranted, send `alert_message`.
///
/// Alert failures are logged and reported in [`AlertStatus::Failed`]; they
/// never change the classification or turn the run into an error.
pub async fn run_check(
    classifier: &Classifier,
    notifier: &dyn Notifier,
    handle: &str,
    alert_message: &str,
    send_alert: bool,
) -> Result<CheckRun> {
    let result = classifier.check(handle).await?;

    let alert = if !send_alert {
        AlertStatus::NotRequested
    } else if !result.is_alertable() {
        log::debug!(
            "Alert not sent for @{}: {:?} with {:?} confidence",
            handle,
            result.verdict,
            result.confidence
        );
        AlertStatus::NotWarranted
    } else {
        match notifier.notify(alert_message).await {
            Ok(NotifyOutcome::Sent { provider }) => AlertStatus::Sent { provider },
            Ok(NotifyOutcome::Skipped) => AlertStatus::Skipped,
            Err(e) => {
                log::error!("Failed to send alert for @{}: {}", handle, e);
                AlertStatus::Failed(e.to_string())
            }
        }
    };

    Ok(CheckRun { result, alert })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::models::{Confidence, ProbeConfig};
    use crate::services::notifier::testing::RecordingNotifier;
    use crate::utils::http::FetchedPage;
    use crate::utils::http::testing::StaticFetcher;

    fn classifier(status: u16, body: &str) -> Classifier {
        let fetcher = StaticFetcher::new().route("https://x.com/ferris", FetchedPage::new(status, body));
        Classifier::from_config(&ProbeConfig::default(), Arc::new(fetcher))
    }

    #[tokio::test]
    async fn alert_sent_for_high_confidence_available() {
        let notifier = RecordingNotifier::new();
        let run = run_check(&classifier(404, ""), &notifier, "ferris", "free!", true)
            .await
            .unwrap();

        assert_eq!(run.alert, AlertStatus::Sent { provider: "Recording" });
        assert_eq!(notifier.messages(), vec!["free!".to_string()]);
    }

    #[tokio::test]
    async fn alert_not_sent_without_opt_in() {
        let notifier = RecordingNotifier::new();
        let run = run_check(&classifier(404, ""), &notifier, "ferris", "free!", false)
            .await
            .unwrap();

        assert_eq!(run.alert, AlertStatus::NotRequested);
        assert!(notifier.messages().is_empty());
    }

    #[tokio::test]
    async fn alert_not_sent_for_low_confidence() {
        let notifier = RecordingNotifier::new();
        let run = run_check(&classifier(403, ""), &notifier, "ferris", "free!", true)
            .await
            .unwrap();

        assert_eq!(run.result.confidence, Confidence::Low);
        assert_eq!(run.alert, AlertStatus::NotWarranted);
        assert!(notifier.messages().is_empty());
    }

    #[tokio::test]
    async fn failed_alert_keeps_result() {
        let notifier = RecordingNotifier::failing();
        let run = run_check(&classifier(404, ""), &notifier, "ferris", "free!", true)
            .await
            .unwrap();

        assert!(run.result.available());
        assert_eq!(run.result.confidence, Confidence::High);
        assert!(matches!(run.alert, AlertStatus::Failed(_)));
    }
}
