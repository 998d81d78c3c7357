//! AWS Lambda entry point for the handle checker.
//!
//! Deploy with `cargo lambda build --release --features lambda` behind a
//! Function URL, and trigger it on a schedule or from a client.
//!
//! ## Environment Variables
//!
//! - `SECRET_KEY`: shared secret callers pass as `key` (required)
//! - `TARGET_HANDLE`: handle to watch
//! - `CONFIG_PATH`: optional TOML configuration file
//! - `PROBE_TIMEOUT_SECS`: HTTP request timeout
//! - `BLOCKED_PAGE_MIN_BYTES` / `BLOCKED_PAGE_MAX_BYTES`: blocked-page size band
//! - `TWILIO_ACCOUNT_SID`, `TWILIO_AUTH_TOKEN`, `TWILIO_PHONE_FROM`: telephony provider
//! - `YOUR_PHONE_NUMBER`, `TEXTBELT_KEY`: alert destination and gateway key
//! - `RUST_LOG`: Log level (e.g., `info`, `debug`)

use std::sync::Arc;

use lambda_runtime::{Error as LambdaError, service_fn};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use handle_checker::handler::App;
use handle_checker::lambda;

/// Main entry point for the AWS Lambda function.
#[tokio::main]
async fn main() -> Result<(), LambdaError> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    let app = match App::from_env() {
        Ok(app) => Arc::new(app),
        Err(e) => {
            error!("Startup configuration invalid: {}", e);
            return Err(e.into());
        }
    };

    info!("Handle checker Lambda starting for @{}", app.handle());

    lambda_runtime::run(service_fn(move |event| {
        let app = Arc::clone(&app);
        async move { lambda::handler(&app, event).await }
    }))
    .await
}
