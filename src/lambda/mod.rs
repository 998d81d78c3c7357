// src/lambda/mod.rs

//! AWS Lambda adapter for the check endpoint.
//!
//! Accepts Lambda Function URL / API Gateway HTTP events and maps them onto
//! [`App::respond`]:
//! 1. Dispatches on the HTTP method (GET/POST check, OPTIONS preflight)
//! 2. Collects `key`, `sendAlert` and `debug` from the query string, then
//!    from a JSON or form-encoded body
//! 3. Serializes the response with CORS headers

use std::collections::HashMap;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use lambda_runtime::{Error as LambdaError, LambdaEvent};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, instrument, warn};

use crate::handler::{ApiResponse, App, CheckRequest, RESPONSE_HEADERS};

/// Incoming HTTP event (payload format 2.0, with the 1.0 `httpMethod` accepted).
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpEvent {
    #[serde(default)]
    pub request_context: Option<RequestContext>,

    #[serde(default)]
    pub http_method: Option<String>,

    #[serde(default)]
    pub query_string_parameters: Option<HashMap<String, String>>,

    #[serde(default)]
    pub headers: Option<HashMap<String, String>>,

    #[serde(default)]
    pub body: Option<String>,

    #[serde(default)]
    pub is_base64_encoded: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct RequestContext {
    #[serde(default)]
    pub http: Option<HttpContext>,
}

#[derive(Debug, Deserialize)]
pub struct HttpContext {
    pub method: String,
}

impl HttpEvent {
    /// Uppercase request method; GET when the event carries none.
    pub fn method(&self) -> String {
        self.request_context
            .as_ref()
            .and_then(|ctx| ctx.http.as_ref())
            .map(|http| http.method.as_str())
            .or(self.http_method.as_deref())
            .unwrap_or("GET")
            .to_ascii_uppercase()
    }

    fn header(&self, name: &str) -> Option<&str> {
        self.headers.as_ref()?.iter().find_map(|(k, v)| {
            k.eq_ignore_ascii_case(name).then_some(v.as_str())
        })
    }

    fn decoded_body(&self) -> Option<String> {
        let body = self.body.as_ref().filter(|b| !b.trim().is_empty())?;
        if !self.is_base64_encoded {
            return Some(body.clone());
        }
        match STANDARD.decode(body) {
            Ok(bytes) => Some(String::from_utf8_lossy(&bytes).into_owned()),
            Err(e) => {
                warn!("Ignoring body: invalid base64 ({})", e);
                None
            }
        }
    }

    /// Parameters carried in the body, JSON object or form-encoded.
    pub fn body_params(&self) -> Vec<(String, String)> {
        let Some(body) = self.decoded_body() else {
            return Vec::new();
        };

        let is_json = self
            .header("content-type")
            .is_some_and(|ct| ct.contains("json"))
            || body.trim_start().starts_with('{');

        if !is_json {
            return url::form_urlencoded::parse(body.as_bytes())
                .into_owned()
                .collect();
        }

        match serde_json::from_str::<serde_json::Map<String, Value>>(&body) {
            Ok(map) => map
                .into_iter()
                .filter_map(|(name, value)| {
                    let value = match value {
                        Value::String(s) => s,
                        Value::Bool(b) => b.to_string(),
                        Value::Number(n) => n.to_string(),
                        _ => return None,
                    };
                    Some((name, value))
                })
                .collect(),
            Err(e) => {
                warn!("Ignoring body: invalid JSON ({})", e);
                Vec::new()
            }
        }
    }

    /// Query parameters first, so they take precedence over body values.
    pub fn check_request(&self) -> CheckRequest {
        let query = self
            .query_string_parameters
            .iter()
            .flatten()
            .map(|(k, v)| (k.clone(), v.clone()));
        CheckRequest::from_params(query.chain(self.body_params()))
    }
}

/// Outgoing HTTP response in Function URL format.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpResponse {
    pub status_code: u16,
    pub headers: HashMap<String, String>,
    pub body: String,
    pub is_base64_encoded: bool,
}

impl HttpResponse {
    fn new(status_code: u16, body: String) -> Self {
        Self {
            status_code,
            headers: RESPONSE_HEADERS
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            body,
            is_base64_encoded: false,
        }
    }

    fn from_api(response: &ApiResponse) -> Result<Self, LambdaError> {
        Ok(Self::new(response.status, response.body_json()?))
    }
}

/// Route one event to the check endpoint.
pub async fn route(app: &App, event: &HttpEvent) -> Result<HttpResponse, LambdaError> {
    match event.method().as_str() {
        "GET" | "POST" => {
            let request = event.check_request();
            info!(
                "Check request: send_alert={}, debug={}",
                request.send_alert, request.debug
            );
            HttpResponse::from_api(&app.respond(&request).await)
        }
        "OPTIONS" => Ok(HttpResponse::new(204, String::new())),
        other => {
            warn!("Rejected method {}", other);
            HttpResponse::from_api(&ApiResponse::error(405, "Method Not Allowed", None))
        }
    }
}

/// Main Lambda handler function.
#[instrument(skip(app, event), fields(handle = %app.handle()))]
pub async fn handler(
    app: &App,
    event: LambdaEvent<HttpEvent>,
) -> Result<HttpResponse, LambdaError> {
    let (request, _context) = event.into_parts();
    route(app, &request).await
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::auth::SharedSecret;
    use crate::models::ProbeConfig;
    use crate::services::Classifier;
    use crate::services::notifier::testing::RecordingNotifier;
    use crate::utils::http::FetchedPage;
    use crate::utils::http::testing::StaticFetcher;

    fn event(json: Value) -> HttpEvent {
        serde_json::from_value(json).unwrap()
    }

    fn app() -> App {
        let fetcher =
            StaticFetcher::new().route("https://x.com/ferris", FetchedPage::new(404, ""));
        App::new(
            "ferris",
            SharedSecret::new("s3cret").unwrap(),
            Classifier::from_config(&ProbeConfig::default(), Arc::new(fetcher)),
            Arc::new(RecordingNotifier::new()),
            "free",
        )
    }

    #[test]
    fn test_http_event_defaults() {
        let ev = event(serde_json::json!({}));
        assert_eq!(ev.method(), "GET");
        assert_eq!(ev.check_request(), CheckRequest::default());
    }

    #[test]
    fn test_method_from_v2_and_v1_payloads() {
        let v2 = event(serde_json::json!({ "requestContext": { "http": { "method": "post" } } }));
        assert_eq!(v2.method(), "POST");
        let v1 = event(serde_json::json!({ "httpMethod": "OPTIONS" }));
        assert_eq!(v1.method(), "OPTIONS");
    }

    #[test]
    fn test_query_params() {
        let ev = event(serde_json::json!({
            "queryStringParameters": { "key": "s3cret", "sendAlert": "true", "debug": "false" }
        }));
        let req = ev.check_request();
        assert_eq!(req.key.as_deref(), Some("s3cret"));
        assert!(req.send_alert);
        assert!(!req.debug);
    }

    #[test]
    fn test_json_body_params() {
        let ev = event(serde_json::json!({
            "headers": { "Content-Type": "application/json" },
            "body": r#"{"key":"s3cret","sendAlert":true,"debug":"true"}"#
        }));
        let req = ev.check_request();
        assert_eq!(req.key.as_deref(), Some("s3cret"));
        assert!(req.send_alert);
        assert!(req.debug);
    }

    #[test]
    fn test_base64_form_body_params() {
        let ev = event(serde_json::json!({
            "headers": { "content-type": "application/x-www-form-urlencoded" },
            "body": STANDARD.encode("key=s3cret&debug=true"),
            "isBase64Encoded": true
        }));
        let req = ev.check_request();
        assert_eq!(req.key.as_deref(), Some("s3cret"));
        assert!(req.debug);
    }

    #[test]
    fn test_query_takes_precedence_over_body() {
        let ev = event(serde_json::json!({
            "queryStringParameters": { "key": "from-query" },
            "body": "key=from-body&sendAlert=true"
        }));
        let req = ev.check_request();
        assert_eq!(req.key.as_deref(), Some("from-query"));
        assert!(req.send_alert);
    }

    #[test]
    fn test_malformed_json_body_is_ignored() {
        let ev = event(serde_json::json!({ "body": "{not json" }));
        assert!(ev.body_params().is_empty());
    }

    #[tokio::test]
    async fn test_route_check_sets_cors_headers() {
        let ev = event(serde_json::json!({ "queryStringParameters": { "key": "s3cret" } }));
        let response = route(&app(), &ev).await.unwrap();

        assert_eq!(response.status_code, 200);
        assert_eq!(response.headers["Access-Control-Allow-Origin"], "*");
        assert_eq!(response.headers["Access-Control-Allow-Methods"], "GET, POST");
        let body: Value = serde_json::from_str(&response.body).unwrap();
        assert_eq!(body["available"], true);
    }

    #[tokio::test]
    async fn test_route_unauthorized() {
        let ev = event(serde_json::json!({ "queryStringParameters": { "key": "nope" } }));
        let response = route(&app(), &ev).await.unwrap();

        assert_eq!(response.status_code, 401);
        assert_eq!(response.body, r#"{"error":"Unauthorized"}"#);
    }

    #[tokio::test]
    async fn test_route_preflight_and_unsupported_method() {
        let preflight = event(serde_json::json!({ "httpMethod": "OPTIONS" }));
        let response = route(&app(), &preflight).await.unwrap();
        assert_eq!(response.status_code, 204);
        assert!(response.body.is_empty());

        let delete = event(serde_json::json!({ "httpMethod": "DELETE" }));
        let response = route(&app(), &delete).await.unwrap();
        assert_eq!(response.status_code, 405);
    }
}
