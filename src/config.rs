// src/config.rs

//! Configuration loading utilities.
//!
//! Locally the configuration is a TOML file; on Lambda it is an S3 object
//! next to the service tables. Telegram credentials may be supplied through
//! the environment in both cases.

use std::path::Path;

use crate::error::Result;
use crate::models::Config;

#[cfg(feature = "s3")]
pub use s3_loader::LambdaConfigLoader;

/// Load configuration from a TOML file, applying environment overrides.
///
/// Falls back to defaults if the file is missing or unreadable.
pub fn load_config(path: &Path) -> Config {
    Config::load_or_default(path).with_env_overrides()
}

/// Load configuration and require it to be valid.
pub fn load_validated(path: &Path) -> Result<Config> {
    let config = load_config(path);
    config.validate()?;
    Ok(config)
}

#[cfg(feature = "s3")]
mod s3_loader {
    use crate::error::{AppError, Result};
    use crate::models::Config;
    use crate::storage::S3Store;

    /// Config loader for the Lambda environment.
    pub struct LambdaConfigLoader {
        store: S3Store,
        prefix: String,
    }

    impl LambdaConfigLoader {
        pub fn new(store: S3Store, config_prefix: &str) -> Self {
            Self {
                store,
                prefix: config_prefix.trim_matches('/').to_string(),
            }
        }

        /// Prefix from `CONFIG_S3_PREFIX`, else `{S3_PREFIX}/config`.
        pub fn prefix_from_env() -> String {
            std::env::var("CONFIG_S3_PREFIX").unwrap_or_else(|_| {
                std::env::var("S3_PREFIX")
                    .ok()
                    .map(|prefix| prefix.trim_matches('/').to_string())
                    .filter(|prefix| !prefix.is_empty())
                    .map_or_else(|| "config".to_string(), |prefix| format!("{prefix}/config"))
            })
        }

        pub async fn load_config(&self) -> Result<Config> {
            let key = format!("{}/config.toml", self.prefix);
            log::info!("Loading config file from S3: {}", key);

            let bytes = self
                .store
                .read_bytes_optional(&key)
                .await?
                .ok_or_else(|| AppError::config(format!("Config file not found in S3: {key}")))?;
            let text = String::from_utf8(bytes).map_err(|e| {
                AppError::config(format!("Config file {key} is not valid UTF-8: {e}"))
            })?;

            Ok(Config::from_toml(&text)?.with_env_overrides())
        }
    }
}
