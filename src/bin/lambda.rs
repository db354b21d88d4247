//! AWS Lambda entry point for the relay.
//!
//! Runs one polling cycle per invocation, typically from a scheduled rule.
//!
//! ## Environment Variables
//!
//! - `S3_BUCKET`: bucket holding config and service tables
//! - `S3_PREFIX`: key prefix (default: `relay`)
//! - `CONFIG_S3_PREFIX`: config prefix (default: `{S3_PREFIX}/config`)
//! - `TELEGRAM_BOT_TOKEN`, `TELEGRAM_CHAT_ID`: override the config secrets
//! - `RUST_LOG`: log level (e.g., `info`, `debug`)

use lambda_runtime::{Error as LambdaError, LambdaEvent, service_fn};
use serde_json::Value;
use tracing::{error, info, instrument};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use relay::config::LambdaConfigLoader;
use relay::error::Result;
use relay::notify::TelegramMessenger;
use relay::pipeline::{self, CycleReport};
use relay::services::SourceRegistry;
use relay::storage::S3Store;
use relay::utils::http;

#[tokio::main]
async fn main() -> std::result::Result<(), LambdaError> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("Relay Lambda starting...");
    lambda_runtime::run(service_fn(handler)).await
}

/// Main Lambda handler function.
#[instrument(skip(event))]
async fn handler(event: LambdaEvent<Value>) -> std::result::Result<Value, LambdaError> {
    info!("Handling event: {:?}", event.payload);

    match run_lambda_cycle().await {
        Ok(report) => {
            info!(
                sent = report.sent(),
                edited = report.edited(),
                failed = report.failed(),
                "Lambda execution successful"
            );
            Ok(serde_json::json!({ "status": "success", "report": report }))
        }
        Err(e) => {
            error!("Lambda execution failed: {}", e);
            Ok(serde_json::json!({ "status": "error", "message": e.to_string() }))
        }
    }
}

/// Load config and collaborators from the environment, then run one cycle.
async fn run_lambda_cycle() -> Result<CycleReport> {
    let store = S3Store::from_env().await?;

    let loader = LambdaConfigLoader::new(store.clone(), &LambdaConfigLoader::prefix_from_env());
    let config = loader.load_config().await?;
    config.validate()?;

    let client = http::create_async_client(&config.relay)?;
    let registry = SourceRegistry::with_builtin(client);
    let messenger = TelegramMessenger::new(&config.telegram)?;

    Ok(pipeline::run_cycle(&config, &registry, &store, &messenger).await)
}
