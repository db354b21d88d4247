//! Relay CLI
//!
//! Local execution entry point. For AWS Lambda, use `relay-lambda`.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use relay::{
    config,
    error::{AppError, Result},
    models::Config,
    notify::TelegramMessenger,
    pipeline,
    services::SourceRegistry,
    storage::{LocalStore, RecordStore},
    utils::http,
};

/// Announcement relay
#[derive(Parser, Debug)]
#[command(
    name = "relay",
    version,
    about = "Relay announcements from polled sources to Telegram"
)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "data/config.toml")]
    config: PathBuf,

    /// Override the table directory from the configuration
    #[arg(short, long)]
    storage_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one polling cycle over all enabled sources
    Run,

    /// Record a source's current items as seen without sending them
    Skip {
        /// Source name as configured
        source: String,
    },

    /// Validate the configuration file
    Validate,

    /// List configured sources
    Sources,

    /// Show the stored table of a source
    Inspect {
        /// Source name as configured
        source: String,
    },
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

fn open_store(cli: &Cli, config: &Config) -> LocalStore {
    let dir = cli
        .storage_dir
        .clone()
        .unwrap_or_else(|| config.storage.dir.clone());
    LocalStore::new(dir)
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = config::load_config(&cli.config);
    log::info!("Loaded configuration from {}", cli.config.display());

    match &cli.command {
        Command::Run => {
            config.validate()?;

            let client = http::create_async_client(&config.relay)?;
            let registry = SourceRegistry::with_builtin(client);
            let store = open_store(&cli, &config);
            let messenger = TelegramMessenger::new(&config.telegram)?;

            let report = pipeline::run_cycle(&config, &registry, &store, &messenger).await;
            log::info!("{}", serde_json::to_string_pretty(&report)?);

            let aborted = report.failed_sources();
            if !aborted.is_empty() {
                log::warn!("Sources aborted this cycle: {}", aborted.join(", "));
            }
        }

        Command::Skip { source } => {
            let source_config = config
                .source(source)
                .ok_or_else(|| AppError::UnknownSource(source.clone()))?;

            let client = http::create_async_client(&config.relay)?;
            let registry = SourceRegistry::with_builtin(client);
            let store = open_store(&cli, &config);

            let added = pipeline::skip_source(source_config, &registry, &store).await?;
            log::info!("Skip completed for {} ({} new entries)", source, added);
        }

        Command::Validate => {
            log::info!("Validating configuration...");

            if let Err(e) = config.validate() {
                log::error!("Config validation failed: {}", e);
                return Err(e);
            }

            let registry = SourceRegistry::with_builtin(reqwest::Client::new());
            for source in &config.sources {
                if registry.get(&source.name).is_none() {
                    log::error!("No collaborator registered for source '{}'", source.name);
                    return Err(AppError::UnknownSource(source.name.clone()));
                }
            }
            log::info!("✓ Config OK ({} sources)", config.sources.len());
        }

        Command::Sources => {
            let registry = SourceRegistry::with_builtin(reqwest::Client::new());
            for source in &config.sources {
                let mode = match source.correlated_editing() {
                    Some(separator) => format!("edit by prefix '{separator}'"),
                    None => "dedup".to_string(),
                };
                let registered = if registry.get(&source.name).is_some() {
                    "✓"
                } else {
                    "✗ unregistered"
                };
                log::info!(
                    "{:<8} {:<8} {:<20} {} {}",
                    source.name,
                    if source.enabled { "enabled" } else { "disabled" },
                    mode,
                    source.display_name,
                    registered
                );
            }
        }

        Command::Inspect { source } => {
            let store = open_store(&cli, &config);
            match store.read(source).await? {
                None => log::info!("No table stored for {}", source),
                Some(table) => {
                    log::info!("{} entries for {}", table.len(), source);
                    for (id, entry) in table.iter() {
                        match entry.handle() {
                            Some(handle) => log::info!("  {} seen {} message {}", id, entry.seen_at(), handle),
                            None => log::info!("  {} seen {}", id, entry.seen_at()),
                        }
                    }
                }
            }
        }
    }

    Ok(())
}
