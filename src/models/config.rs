//! Application configuration structures.

use std::fs;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Placeholder that older deployments shipped as the shared secret.
pub const PLACEHOLDER_SECRET: &str = "your-secret-key-here";

static HANDLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_]{1,15}$").expect("static handle regex"));

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// The handle being watched
    #[serde(default)]
    pub target: TargetConfig,

    /// Probe endpoints and heuristics
    #[serde(default)]
    pub probe: ProbeConfig,

    /// Alert delivery settings
    #[serde(default)]
    pub notify: NotifyConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Load from `CONFIG_PATH` (if set) and apply process environment overrides.
    pub fn from_env() -> Self {
        let mut config = match std::env::var("CONFIG_PATH") {
            Ok(path) => Self::load_or_default(path),
            Err(_) => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        config
    }

    /// Override fields from environment-style lookups.
    ///
    /// Unparseable numeric values are ignored with a warning.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(handle) = lookup("TARGET_HANDLE") {
            self.target.handle = handle.trim().trim_start_matches('@').to_string();
        }
        if let Some(secs) = lookup("PROBE_TIMEOUT_SECS") {
            parse_into(&secs, "PROBE_TIMEOUT_SECS", &mut self.probe.timeout_secs);
        }
        if let Some(min) = lookup("BLOCKED_PAGE_MIN_BYTES") {
            parse_into(
                &min,
                "BLOCKED_PAGE_MIN_BYTES",
                &mut self.probe.blocked_page.min_bytes,
            );
        }
        if let Some(max) = lookup("BLOCKED_PAGE_MAX_BYTES") {
            parse_into(
                &max,
                "BLOCKED_PAGE_MAX_BYTES",
                &mut self.probe.blocked_page.max_bytes,
            );
        }
        if let Some(url) = lookup("PROXY_URL") {
            self.probe.proxy_url = url;
        }
        if let Some(url) = lookup("ALTERNATE_URL") {
            self.probe.alternate_url = Some(url);
        }
        if let Some(phone) = lookup("YOUR_PHONE_NUMBER") {
            self.notify.to_phone = Some(phone);
        }
        if let Some(phone) = lookup("TWILIO_PHONE_FROM") {
            self.notify.from_phone = Some(phone);
        }
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if !HANDLE_RE.is_match(&self.target.handle) {
            return Err(AppError::validation(format!(
                "target.handle '{}' is not a valid handle",
                self.target.handle
            )));
        }
        if self.probe.user_agent.trim().is_empty() {
            return Err(AppError::validation("probe.user_agent is empty"));
        }
        if self.probe.timeout_secs == 0 {
            return Err(AppError::validation("probe.timeout_secs must be > 0"));
        }
        if self.probe.blocked_page.min_bytes > self.probe.blocked_page.max_bytes {
            return Err(AppError::validation(
                "probe.blocked_page.min_bytes must not exceed max_bytes",
            ));
        }
        if !self.probe.profile_url.contains(HANDLE_PLACEHOLDER) {
            return Err(AppError::validation(
                "probe.profile_url must contain {handle}",
            ));
        }
        if let Some(alternate) = &self.probe.alternate_url {
            if !alternate.contains(HANDLE_PLACEHOLDER) {
                return Err(AppError::validation(
                    "probe.alternate_url must contain {handle}",
                ));
            }
        }
        Ok(())
    }
}

/// Placeholder substituted with the handle in URL and message templates.
pub const HANDLE_PLACEHOLDER: &str = "{handle}";

fn parse_into<T: std::str::FromStr>(raw: &str, key: &str, slot: &mut T) {
    match raw.trim().parse() {
        Ok(value) => *slot = value,
        Err(_) => log::warn!("Ignoring {}: '{}' is not a valid number", key, raw),
    }
}

/// The watched handle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetConfig {
    #[serde(default = "defaults::handle")]
    pub handle: String,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            handle: defaults::handle(),
        }
    }
}

/// HTTP and heuristic settings for the probes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeConfig {
    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Canonical profile URL template
    #[serde(default = "defaults::profile_url")]
    pub profile_url: String,

    /// Whether the CORS-relay fallback runs
    #[serde(default = "defaults::proxy_enabled")]
    pub proxy_enabled: bool,

    /// CORS-relay endpoint; the target goes in its `url` query parameter
    #[serde(default = "defaults::proxy_url")]
    pub proxy_url: String,

    /// Optional API-style username lookup, tried last
    #[serde(default)]
    pub alternate_url: Option<String>,

    /// Size signature of the generic anti-bot page
    #[serde(default)]
    pub blocked_page: BlockedPageBand,
}

impl ProbeConfig {
    /// Render the profile URL for a handle.
    pub fn profile_url_for(&self, handle: &str) -> String {
        self.profile_url.replace(HANDLE_PLACEHOLDER, handle)
    }
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            profile_url: defaults::profile_url(),
            proxy_enabled: defaults::proxy_enabled(),
            proxy_url: defaults::proxy_url(),
            alternate_url: None,
            blocked_page: BlockedPageBand::default(),
        }
    }
}

/// Inclusive byte-length band of the canonical site's generic blocked page.
///
/// Empirically observed around 248 KB; recalibrate when the upstream
/// template changes (the debug trace reports `bytes` and `body_sha256`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockedPageBand {
    #[serde(default = "defaults::blocked_min")]
    pub min_bytes: usize,
    #[serde(default = "defaults::blocked_max")]
    pub max_bytes: usize,
}

impl BlockedPageBand {
    pub fn contains(&self, bytes: usize) -> bool {
        (self.min_bytes..=self.max_bytes).contains(&bytes)
    }
}

impl Default for BlockedPageBand {
    fn default() -> Self {
        Self {
            min_bytes: defaults::blocked_min(),
            max_bytes: defaults::blocked_max(),
        }
    }
}

/// Alert delivery settings. Credentials live in [`SmsCredentials`].
///
/// [`SmsCredentials`]: crate::services::SmsCredentials
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyConfig {
    /// Destination phone number
    #[serde(default)]
    pub to_phone: Option<String>,

    /// Sending number for the telephony provider
    #[serde(default)]
    pub from_phone: Option<String>,

    /// Alert text; `{handle}` is substituted
    #[serde(default = "defaults::message_template")]
    pub message_template: String,

    #[serde(default = "defaults::twilio_api_base")]
    pub twilio_api_base: String,

    #[serde(default = "defaults::textbelt_url")]
    pub textbelt_url: String,
}

impl NotifyConfig {
    /// Render the alert message for a handle.
    pub fn message_for(&self, handle: &str) -> String {
        self.message_template.replace(HANDLE_PLACEHOLDER, handle)
    }
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            to_phone: None,
            from_phone: None,
            message_template: defaults::message_template(),
            twilio_api_base: defaults::twilio_api_base(),
            textbelt_url: defaults::textbelt_url(),
        }
    }
}

mod defaults {
    // Target defaults
    pub fn handle() -> String {
        "zubin".into()
    }

    // Probe defaults
    pub fn user_agent() -> String {
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36".into()
    }
    pub fn timeout() -> u64 {
        10
    }
    pub fn profile_url() -> String {
        "https://x.com/{handle}".into()
    }
    pub fn proxy_enabled() -> bool {
        true
    }
    pub fn proxy_url() -> String {
        "https://api.allorigins.win/get".into()
    }
    pub fn blocked_min() -> usize {
        248_000
    }
    pub fn blocked_max() -> usize {
        250_000
    }

    // Notify defaults
    pub fn message_template() -> String {
        "🚨 @{handle} is NOW AVAILABLE on X! Claim it at x.com/{handle}".into()
    }
    pub fn twilio_api_base() -> String {
        "https://api.twilio.com".into()
    }
    pub fn textbelt_url() -> String {
        "https://textbelt.com/text".into()
    }
}
