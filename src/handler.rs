// src/handler.rs

//! Request handling independent of the hosting runtime.
//!
//! [`App::respond`] authenticates the caller, runs the check pipeline and
//! formats the JSON body. Only authentication failure (401) and a failure
//! escaping the classifier (500) move the status away from 200.

use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use serde::Serialize;

use crate::auth::SharedSecret;
use crate::error::Result;
use crate::models::{CheckResult, Confidence, Config, DebugInfo};
use crate::pipeline::run_check;
use crate::services::{Classifier, Notifier, SmsCredentials, SmsNotifier};
use crate::utils::http::create_async_client;

/// Headers attached to every response.
pub const RESPONSE_HEADERS: [(&str, &str); 3] = [
    ("Access-Control-Allow-Origin", "*"),
    ("Access-Control-Allow-Methods", "GET, POST"),
    ("Content-Type", "application/json"),
];

/// Parameters of one check call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckRequest {
    pub key: Option<String>,
    pub send_alert: bool,
    pub debug: bool,
}

impl CheckRequest {
    /// Build from name/value pairs; the first occurrence of a name wins.
    ///
    /// Flags are on only for the exact string `"true"`.
    pub fn from_params<I, K, V>(params: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut key = None;
        let mut send_alert = None;
        let mut debug = None;

        for (name, value) in params {
            let value = value.as_ref();
            match name.as_ref() {
                "key" => {
                    key.get_or_insert_with(|| value.to_string());
                }
                "sendAlert" => {
                    send_alert.get_or_insert(value == "true");
                }
                "debug" => {
                    debug.get_or_insert(value == "true");
                }
                _ => {}
            }
        }

        Self {
            key,
            send_alert: send_alert.unwrap_or(false),
            debug: debug.unwrap_or(false),
        }
    }
}

/// Success body.
#[derive(Debug, Clone, Serialize)]
pub struct CheckResponse {
    pub username: String,
    pub available: bool,
    pub confidence: Confidence,
    pub timestamp: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug: Option<DebugInfo>,
}

impl CheckResponse {
    pub fn new(handle: &str, result: &CheckResult, include_debug: bool) -> Self {
        Self {
            username: handle.to_string(),
            available: result.available(),
            confidence: result.confidence,
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            message: result.message.clone(),
            debug: include_debug.then(|| result.debug_info()),
        }
    }
}

/// Error body.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ApiBody {
    Check(CheckResponse),
    Error(ErrorBody),
}

/// Status code plus JSON body.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: u16,
    pub body: ApiBody,
}

impl ApiResponse {
    pub fn ok(body: CheckResponse) -> Self {
        Self {
            status: 200,
            body: ApiBody::Check(body),
        }
    }

    pub fn error(status: u16, error: impl Into<String>, details: Option<String>) -> Self {
        Self {
            status,
            body: ApiBody::Error(ErrorBody {
                error: error.into(),
                details,
            }),
        }
    }

    pub fn unauthorized() -> Self {
        Self::error(401, "Unauthorized", None)
    }

    pub fn body_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.body)?)
    }
}

/// Long-lived request context: the watched handle, secret, probes and notifier.
pub struct App {
    handle: String,
    secret: SharedSecret,
    classifier: Classifier,
    notifier: Arc<dyn Notifier>,
    alert_message: String,
}

impl App {
    pub fn new(
        handle: impl Into<String>,
        secret: SharedSecret,
        classifier: Classifier,
        notifier: Arc<dyn Notifier>,
        alert_message: impl Into<String>,
    ) -> Self {
        Self {
            handle: handle.into(),
            secret,
            classifier,
            notifier,
            alert_message: alert_message.into(),
        }
    }

    /// Wire up the HTTP client, probes and SMS provider from configuration.
    pub fn from_config(
        config: &Config,
        secret: SharedSecret,
        credentials: &SmsCredentials,
    ) -> Result<Self> {
        config.validate()?;
        let client = create_async_client(&config.probe)?;
        let classifier = Classifier::from_config(&config.probe, Arc::new(client.clone()));
        let notifier = SmsNotifier::from_config(client, &config.notify, credentials);

        match notifier.provider() {
            Some(provider) => log::info!("Alerts go through {}", provider.name()),
            None => log::info!("No SMS provider configured; alerts disabled"),
        }

        let handle = config.target.handle.clone();
        Ok(Self::new(
            &handle,
            secret,
            classifier,
            Arc::new(notifier),
            config.notify.message_for(&handle),
        ))
    }

    /// Build from the process environment. Fails if `SECRET_KEY` is unset.
    pub fn from_env() -> Result<Self> {
        let config = Config::from_env();
        let secret = SharedSecret::from_env()?;
        Self::from_config(&config, secret, &SmsCredentials::from_env())
    }

    pub fn handle(&self) -> &str {
        &self.handle
    }

    /// Handle one check request.
    pub async fn respond(&self, request: &CheckRequest) -> ApiResponse {
        if self.secret.verify(request.key.as_deref()).is_err() {
            log::warn!("Rejected request with invalid key");
            return ApiResponse::unauthorized();
        }

        let run = run_check(
            &self.classifier,
            self.notifier.as_ref(),
            &self.handle,
            &self.alert_message,
            request.send_alert,
        )
        .await;

        match run {
            Ok(run) => {
                log::info!(
                    "@{}: available={} confidence={:?} alert={:?}",
                    self.handle,
                    run.result.available(),
                    run.result.confidence,
                    run.alert
                );
                ApiResponse::ok(CheckResponse::new(&self.handle, &run.result, request.debug))
            }
            Err(e) => {
                log::error!("Check for @{} failed: {}", self.handle, e);
                ApiResponse::error(500, "Failed to check username", Some(e.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::Value;

    use super::*;
    use crate::models::ProbeConfig;
    use crate::services::notifier::testing::RecordingNotifier;
    use crate::utils::http::FetchedPage;
    use crate::utils::http::testing::StaticFetcher;

    const PROFILE: &str = "https://x.com/ferris";
    const RELAY: &str = "https://api.allorigins.win/get";

    fn app(fetcher: StaticFetcher, notifier: Arc<RecordingNotifier>) -> App {
        app_with(fetcher, notifier, &ProbeConfig::default())
    }

    fn app_with(fetcher: StaticFetcher, notifier: Arc<RecordingNotifier>, probe: &ProbeConfig) -> App {
        App::new(
            "ferris",
            SharedSecret::new("s3cret").unwrap(),
            Classifier::from_config(probe, Arc::new(fetcher)),
            notifier,
            "ferris is free",
        )
    }

    fn request(params: &[(&str, &str)]) -> CheckRequest {
        CheckRequest::from_params(params.iter().copied())
    }

    fn json(response: &ApiResponse) -> Value {
        serde_json::from_str(&response.body_json().unwrap()).unwrap()
    }

    fn relay(contents: &str) -> FetchedPage {
        let body = serde_json::json!({ "contents": contents, "status": { "http_code": 200 } });
        FetchedPage::new(200, body.to_string())
    }

    #[test]
    fn params_first_occurrence_wins() {
        let req = request(&[
            ("key", "a"),
            ("sendAlert", "true"),
            ("key", "b"),
            ("sendAlert", "false"),
            ("debug", "TRUE"),
        ]);
        assert_eq!(req.key.as_deref(), Some("a"));
        assert!(req.send_alert);
        assert!(!req.debug);
    }

    #[tokio::test]
    async fn wrong_key_is_unauthorized_without_probing() {
        let fetcher = StaticFetcher::new().route(PROFILE, FetchedPage::new(404, ""));
        let notifier = Arc::new(RecordingNotifier::new());
        let app = app(fetcher, notifier.clone());

        let response = app.respond(&request(&[("key", "wrong"), ("sendAlert", "true")])).await;

        assert_eq!(response.status, 401);
        assert_eq!(json(&response), serde_json::json!({ "error": "Unauthorized" }));
        assert!(notifier.messages().is_empty());
    }

    #[tokio::test]
    async fn not_found_profile_is_available_high() {
        let fetcher = StaticFetcher::new().route(PROFILE, FetchedPage::new(404, ""));
        let app = app(fetcher, Arc::new(RecordingNotifier::new()));

        let response = app.respond(&request(&[("key", "s3cret")])).await;
        let body = json(&response);

        assert_eq!(response.status, 200);
        assert_eq!(body["username"], "ferris");
        assert_eq!(body["available"], true);
        assert_eq!(body["confidence"], "high");
        assert_eq!(body["message"], "Username is available!");
        assert!(body["timestamp"].as_str().unwrap().ends_with('Z'));
        assert!(body.get("debug").is_none());
    }

    #[tokio::test]
    async fn forbidden_then_proxy_not_found_is_available_high() {
        let fetcher = StaticFetcher::new()
            .route(PROFILE, FetchedPage::new(403, ""))
            .route(RELAY, relay("Hmm...this account doesn't exist. Try searching for another."));
        let app = app(fetcher, Arc::new(RecordingNotifier::new()));

        let body = json(&app.respond(&request(&[("key", "s3cret")])).await);

        assert_eq!(body["available"], true);
        assert_eq!(body["confidence"], "high");
    }

    #[tokio::test]
    async fn forbidden_then_proxy_network_error_is_low() {
        let fetcher = StaticFetcher::new().route(PROFILE, FetchedPage::new(403, ""));
        let app = app(fetcher, Arc::new(RecordingNotifier::new()));

        let response = app.respond(&request(&[("key", "s3cret")])).await;
        let body = json(&response);

        assert_eq!(response.status, 200);
        assert_eq!(body["available"], false);
        assert_eq!(body["confidence"], "low");
        assert!(body["message"].as_str().unwrap().contains("Unable to verify"));
    }

    #[tokio::test]
    async fn suspended_body_is_not_available() {
        let fetcher = StaticFetcher::new().route(
            PROFILE,
            FetchedPage::new(200, r#"{"screen_name":"ferris"} This account has been suspended"#),
        );
        let app = app(fetcher, Arc::new(RecordingNotifier::new()));

        let body = json(&app.respond(&request(&[("key", "s3cret"), ("debug", "true")])).await);

        assert_eq!(body["available"], false);
        assert_eq!(body["debug"]["verdict"], "suspended");
    }

    #[tokio::test]
    async fn debug_bag_only_on_request() {
        let fetcher = StaticFetcher::new().route(PROFILE, FetchedPage::new(404, ""));
        let app = app(fetcher, Arc::new(RecordingNotifier::new()));

        let plain = json(&app.respond(&request(&[("key", "s3cret"), ("debug", "yes")])).await);
        assert!(plain.get("debug").is_none());

        let debug = json(&app.respond(&request(&[("key", "s3cret"), ("debug", "true")])).await);
        assert_eq!(debug["debug"]["probes"][0]["source"], "direct");
        assert_eq!(debug["debug"]["probes"][0]["status"], 404);
    }

    #[tokio::test]
    async fn alert_only_for_opt_in_high_available() {
        let notifier = Arc::new(RecordingNotifier::new());
        let fetcher = StaticFetcher::new().route(PROFILE, FetchedPage::new(404, ""));
        let app = app(fetcher, notifier.clone());

        app.respond(&request(&[("key", "s3cret")])).await;
        assert!(notifier.messages().is_empty());

        app.respond(&request(&[("key", "s3cret"), ("sendAlert", "true")])).await;
        assert_eq!(notifier.messages(), vec!["ferris is free".to_string()]);
    }

    #[tokio::test]
    async fn no_alert_for_medium_confidence() {
        let notifier = Arc::new(RecordingNotifier::new());
        let mut probe = ProbeConfig::default();
        probe.proxy_enabled = false;
        probe.alternate_url = Some("https://lookup.example/?u={handle}".into());
        let fetcher = StaticFetcher::new()
            .route(PROFILE, FetchedPage::new(403, ""))
            .route(
                "https://lookup.example/",
                FetchedPage::new(200, r#"{"valid":true,"reason":"available"}"#),
            );
        let app = app_with(fetcher, notifier.clone(), &probe);

        let body = json(&app.respond(&request(&[("key", "s3cret"), ("sendAlert", "true")])).await);

        assert_eq!(body["available"], true);
        assert_eq!(body["confidence"], "medium");
        assert!(notifier.messages().is_empty());
    }

    #[tokio::test]
    async fn failing_notifier_does_not_change_response() {
        let notifier = Arc::new(RecordingNotifier::failing());
        let fetcher = StaticFetcher::new().route(PROFILE, FetchedPage::new(404, ""));
        let app = app(fetcher, notifier.clone());

        let response = app.respond(&request(&[("key", "s3cret"), ("sendAlert", "true")])).await;
        let body = json(&response);

        assert_eq!(notifier.messages().len(), 1);
        assert_eq!(response.status, 200);
        assert_eq!(body["available"], true);
        assert_eq!(body["confidence"], "high");
    }

    #[tokio::test]
    async fn classifier_failure_is_500() {
        let mut probe = ProbeConfig::default();
        probe.profile_url = "::{handle}".into();
        let app = app_with(StaticFetcher::new(), Arc::new(RecordingNotifier::new()), &probe);

        let response = app.respond(&request(&[("key", "s3cret")])).await;
        let body = json(&response);

        assert_eq!(response.status, 500);
        assert_eq!(body["error"], "Failed to check username");
        assert!(body["details"].as_str().unwrap().contains("URL parse error"));
    }

    #[test]
    fn app_from_config_validates() {
        let mut config = Config::default();
        config.target.handle = "bad handle".into();
        let secret = SharedSecret::new("s3cret").unwrap();
        assert!(App::from_config(&config, secret, &SmsCredentials::default()).is_err());
    }
}
