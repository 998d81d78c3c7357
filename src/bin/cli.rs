//! Handle checker CLI
//!
//! Local execution entry point. For AWS Lambda, use `handle-checker-lambda`.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use handle_checker::{
    auth::SharedSecret,
    error::Result,
    handler::CheckResponse,
    models::Config,
    pipeline::{self, AlertStatus},
    services::{Classifier, SmsCredentials, SmsNotifier, SmsProvider},
    utils::http,
};

/// Handle checker - watches a social-media handle for availability
#[derive(Parser, Debug)]
#[command(
    name = "handle-checker",
    version,
    about = "Checks whether a social-media handle is available"
)]
struct Cli {
    /// Path to a TOML config file (default: $CONFIG_PATH, then built-in defaults)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one availability check and print the JSON result
    Check {
        /// Handle to check (overrides configuration)
        #[arg(long)]
        handle: Option<String>,

        /// Send the SMS alert if the handle is available
        #[arg(long)]
        send_alert: bool,

        /// Include the per-probe diagnostic trace
        #[arg(long)]
        debug: bool,
    },

    /// Validate configuration and credentials
    Validate,
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

fn load_config(path: Option<&PathBuf>) -> Result<Config> {
    match path {
        Some(path) => {
            let mut config = Config::load(path)?;
            config.apply_env(|key| std::env::var(key).ok());
            log::info!("Loaded configuration from {}", path.display());
            Ok(config)
        }
        None => Ok(Config::from_env()),
    }
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut config = load_config(cli.config.as_ref())?;
    let credentials = SmsCredentials::from_env();

    match cli.command {
        Command::Check {
            handle,
            send_alert,
            debug,
        } => {
            if let Some(handle) = handle {
                config.target.handle = handle.trim_start_matches('@').to_string();
            }
            config.validate()?;

            let handle = config.target.handle.clone();
            let client = http::create_async_client(&config.probe)?;
            let classifier = Classifier::from_config(&config.probe, Arc::new(client.clone()));
            let notifier = SmsNotifier::from_config(client, &config.notify, &credentials);

            log::info!("Checking @{}...", handle);
            let run = pipeline::run_check(
                &classifier,
                &notifier,
                &handle,
                &config.notify.message_for(&handle),
                send_alert,
            )
            .await?;

            match &run.alert {
                AlertStatus::Sent { provider } => log::info!("Alert sent via {}", provider),
                AlertStatus::Failed(e) => log::error!("Alert failed: {}", e),
                AlertStatus::Skipped => log::warn!("Alert requested but no SMS provider configured"),
                AlertStatus::NotWarranted => log::info!("No alert: verdict not a confident 'available'"),
                AlertStatus::NotRequested => {}
            }

            let response = CheckResponse::new(&handle, &run.result, debug);
            println!("{}", serde_json::to_string_pretty(&response)?);
        }

        Command::Validate => {
            log::info!("Validating configuration...");

            if let Err(e) = config.validate() {
                log::error!("Config validation failed: {}", e);
                return Err(e);
            }
            log::info!("✓ Config OK (watching @{})", config.target.handle);

            match SharedSecret::from_env() {
                Ok(_) => log::info!("✓ SECRET_KEY set"),
                Err(e) => log::warn!("SECRET_KEY: {} (the Lambda handler will refuse to start)", e),
            }

            match SmsProvider::select(&config.notify, &credentials) {
                Some(provider) => log::info!("✓ Alerts via {}", provider.name()),
                None => log::warn!("No SMS provider configured; alerts disabled"),
            }

            log::info!("All validations passed!");
        }
    }

    Ok(())
}
