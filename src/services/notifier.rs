//! SMS alert delivery.
//!
//! Exactly one provider is used per alert, picked by configuration
//! precedence: the telephony API when fully configured, otherwise the SMS
//! gateway when a destination number exists, otherwise nothing.

use std::fmt;

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::{AppError, Result};
use crate::models::NotifyConfig;

/// Free-tier key accepted by the SMS gateway.
const TEXTBELT_FREE_KEY: &str = "textbelt";

/// What happened to an alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyOutcome {
    Sent { provider: &'static str },
    /// No provider configured
    Skipped,
}

/// Delivers an alert message.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, message: &str) -> Result<NotifyOutcome>;
}

/// Provider secrets, read from the environment only.
#[derive(Clone, Default)]
pub struct SmsCredentials {
    pub twilio_account_sid: Option<String>,
    pub twilio_auth_token: Option<String>,
    pub textbelt_key: Option<String>,
}

impl SmsCredentials {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        Self {
            twilio_account_sid: get("TWILIO_ACCOUNT_SID"),
            twilio_auth_token: get("TWILIO_AUTH_TOKEN"),
            textbelt_key: get("TEXTBELT_KEY"),
        }
    }
}

impl fmt::Debug for SmsCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |v: &Option<String>| v.as_ref().map(|_| "<redacted>");
        f.debug_struct("SmsCredentials")
            .field("twilio_account_sid", &redact(&self.twilio_account_sid))
            .field("twilio_auth_token", &redact(&self.twilio_auth_token))
            .field("textbelt_key", &redact(&self.textbelt_key))
            .finish()
    }
}

/// A configured SMS provider.
#[derive(Clone, PartialEq, Eq)]
pub enum SmsProvider {
    Twilio {
        endpoint: String,
        account_sid: String,
        auth_token: String,
        from: String,
        to: String,
    },
    TextBelt {
        endpoint: String,
        phone: String,
        key: String,
    },
}

impl SmsProvider {
    /// Pick the provider by configuration precedence.
    pub fn select(config: &NotifyConfig, credentials: &SmsCredentials) -> Option<Self> {
        let to = config.to_phone.as_ref()?;

        if let (Some(sid), Some(token), Some(from)) = (
            &credentials.twilio_account_sid,
            &credentials.twilio_auth_token,
            &config.from_phone,
        ) {
            return Some(Self::Twilio {
                endpoint: format!(
                    "{}/2010-04-01/Accounts/{}/Messages.json",
                    config.twilio_api_base.trim_end_matches('/'),
                    sid
                ),
                account_sid: sid.clone(),
                auth_token: token.clone(),
                from: from.clone(),
                to: to.clone(),
            });
        }

        if credentials.twilio_account_sid.is_some() {
            log::warn!("Twilio partially configured; falling back to TextBelt");
        }

        Some(Self::TextBelt {
            endpoint: config.textbelt_url.clone(),
            phone: to.clone(),
            key: credentials
                .textbelt_key
                .clone()
                .unwrap_or_else(|| TEXTBELT_FREE_KEY.to_string()),
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Twilio { .. } => "Twilio",
            Self::TextBelt { .. } => "TextBelt",
        }
    }
}

impl fmt::Debug for SmsProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Twilio { endpoint, to, .. } => f
                .debug_struct("Twilio")
                .field("endpoint", endpoint)
                .field("to", to)
                .finish_non_exhaustive(),
            Self::TextBelt { endpoint, phone, .. } => f
                .debug_struct("TextBelt")
                .field("endpoint", endpoint)
                .field("phone", phone)
                .finish_non_exhaustive(),
        }
    }
}

impl SmsProvider {
    /// Outgoing send request for `message`.
    fn request(&self, client: &reqwest::Client, message: &str) -> Result<reqwest::Request> {
        let request = match self {
            Self::Twilio {
                endpoint,
                account_sid,
                auth_token,
                from,
                to,
            } => client
                .post(endpoint)
                .basic_auth(account_sid, Some(auth_token))
                .form(&[("To", to.as_str()), ("From", from.as_str()), ("Body", message)]),
            Self::TextBelt {
                endpoint,
                phone,
                key,
            } => client.post(endpoint).json(&serde_json::json!({
                "phone": phone,
                "message": message,
                "key": key,
            })),
        };
        Ok(request.build()?)
    }

    /// Interpret the provider's reply.
    fn check_response(&self, status: reqwest::StatusCode, body: &str) -> Result<()> {
        match self {
            Self::Twilio { .. } => twilio_result(status, body),
            Self::TextBelt { .. } => match serde_json::from_str::<TextBeltResponse>(body) {
                Ok(reply) => textbelt_result(reply),
                Err(_) => Err(AppError::notify(
                    "TextBelt",
                    format!("HTTP {}: unexpected response", status.as_u16()),
                )),
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct TwilioError {
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TextBeltResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    error: Option<String>,
}

/// Twilio accepts with any 2xx; otherwise its JSON error message is surfaced.
fn twilio_result(status: reqwest::StatusCode, body: &str) -> Result<()> {
    if status.is_success() {
        return Ok(());
    }

    let detail = serde_json::from_str::<TwilioError>(body)
        .ok()
        .and_then(|e| e.message)
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed").to_string());
    Err(AppError::notify("Twilio", format!("HTTP {}: {}", status.as_u16(), detail)))
}

/// TextBelt reports failure in the body, not the status.
fn textbelt_result(reply: TextBeltResponse) -> Result<()> {
    if reply.success {
        Ok(())
    } else {
        Err(AppError::notify(
            "TextBelt",
            reply.error.unwrap_or_else(|| "unknown error".to_string()),
        ))
    }
}

/// Notifier backed by an HTTP SMS provider.
pub struct SmsNotifier {
    client: reqwest::Client,
    provider: Option<SmsProvider>,
}

impl SmsNotifier {
    pub fn new(client: reqwest::Client, provider: Option<SmsProvider>) -> Self {
        Self { client, provider }
    }

    pub fn from_config(
        client: reqwest::Client,
        config: &NotifyConfig,
        credentials: &SmsCredentials,
    ) -> Self {
        Self::new(client, SmsProvider::select(config, credentials))
    }

    pub fn provider(&self) -> Option<&SmsProvider> {
        self.provider.as_ref()
    }
}

#[async_trait]
impl Notifier for SmsNotifier {
    async fn notify(&self, message: &str) -> Result<NotifyOutcome> {
        let Some(provider) = &self.provider else {
            log::info!("SMS not configured, skipping notification");
            return Ok(NotifyOutcome::Skipped);
        };

        let request = provider.request(&self.client, message)?;
        let response = self.client.execute(request).await?;
        let status = response.status();
        let body = response.text().await?;
        provider.check_response(status, &body)?;

        log::info!("Alert sent via {}", provider.name());
        Ok(NotifyOutcome::Sent {
            provider: provider.name(),
        })
    }
}

#[cfg(test)]
pub mod testing {
    //! Recording notifier for handler tests.

    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    pub struct RecordingNotifier {
        messages: Mutex<Vec<String>>,
        fail: bool,
    }

    impl RecordingNotifier {
        pub fn new() -> Self {
            Self::default()
        }

        /// A notifier whose provider always rejects the alert.
        pub fn failing() -> Self {
            Self {
                fail: true,
                ..Self::default()
            }
        }

        pub fn messages(&self) -> Vec<String> {
            self.messages.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn notify(&self, message: &str) -> Result<NotifyOutcome> {
            self.messages.lock().unwrap().push(message.to_string());
            if self.fail {
                Err(AppError::notify("Recording", "provider rejected alert"))
            } else {
                Ok(NotifyOutcome::Sent {
                    provider: "Recording",
                })
            }
        }
    }
}
