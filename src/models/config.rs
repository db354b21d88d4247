//! Application configuration structures.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Bot API credentials and target chat
    #[serde(default)]
    pub telegram: TelegramConfig,

    /// HTTP, pacing, and message settings
    #[serde(default)]
    pub relay: RelayConfig,

    /// Local persistence settings
    #[serde(default)]
    pub storage: StorageConfig,

    /// Polled sources, processed in this order
    #[serde(default = "defaults::sources")]
    pub sources: Vec<SourceConfig>,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
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

    /// Replace secrets with `TELEGRAM_BOT_TOKEN` / `TELEGRAM_CHAT_ID` when set.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(token) = std::env::var("TELEGRAM_BOT_TOKEN") {
            if !token.trim().is_empty() {
                self.telegram.bot_token = token;
            }
        }
        if let Ok(chat_id) = std::env::var("TELEGRAM_CHAT_ID") {
            if !chat_id.trim().is_empty() {
                self.telegram.chat_id = chat_id;
            }
        }
        self
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.telegram.bot_token.trim().is_empty() {
            return Err(AppError::validation("telegram.bot_token is empty"));
        }
        if self.telegram.chat_id.trim().is_empty() {
            return Err(AppError::validation("telegram.chat_id is empty"));
        }
        if self.telegram.timeout_secs == 0 {
            return Err(AppError::validation("telegram.timeout_secs must be > 0"));
        }
        if self.relay.user_agent.trim().is_empty() {
            return Err(AppError::validation("relay.user_agent is empty"));
        }
        if self.relay.timeout_secs == 0 {
            return Err(AppError::validation("relay.timeout_secs must be > 0"));
        }
        if self.relay.max_content_chars == 0 {
            return Err(AppError::validation("relay.max_content_chars must be > 0"));
        }

        let mut names = HashSet::new();
        for source in &self.sources {
            source.validate()?;
            if !names.insert(source.name.as_str()) {
                return Err(AppError::validation(format!(
                    "duplicate source name '{}'",
                    source.name
                )));
            }
        }
        Ok(())
    }

    /// Sources with `enabled = true`, in configured order.
    pub fn enabled_sources(&self) -> impl Iterator<Item = &SourceConfig> {
        self.sources.iter().filter(|s| s.enabled)
    }

    /// Look up a source by name.
    pub fn source(&self, name: &str) -> Option<&SourceConfig> {
        self.sources.iter().find(|s| s.name == name)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            telegram: TelegramConfig::default(),
            relay: RelayConfig::default(),
            storage: StorageConfig::default(),
            sources: defaults::sources(),
        }
    }
}

/// Telegram Bot API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    #[serde(default)]
    pub bot_token: String,

    /// Target chat (numeric id or `@channel`)
    #[serde(default)]
    pub chat_id: String,

    #[serde(default = "defaults::api_base")]
    pub api_base: String,

    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            chat_id: String::new(),
            api_base: defaults::api_base(),
            timeout_secs: defaults::timeout(),
        }
    }
}

/// HTTP client, pacing, and formatting settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    /// User-Agent header for source requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Source request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Minimum interval between dispatches in milliseconds
    #[serde(default = "defaults::dispatch_delay")]
    pub dispatch_delay_ms: u64,

    /// Minimum interval between detail fetches in milliseconds
    #[serde(default = "defaults::detail_delay")]
    pub detail_delay_ms: u64,

    /// Maximum characters kept from detail content
    #[serde(default = "defaults::max_content_chars")]
    pub max_content_chars: usize,
}

impl RelayConfig {
    pub fn dispatch_interval(&self) -> Duration {
        Duration::from_millis(self.dispatch_delay_ms)
    }

    pub fn detail_interval(&self) -> Duration {
        Duration::from_millis(self.detail_delay_ms)
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            dispatch_delay_ms: defaults::dispatch_delay(),
            detail_delay_ms: defaults::detail_delay(),
            max_content_chars: defaults::max_content_chars(),
        }
    }
}

/// Local persistence settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "defaults::storage_dir")]
    pub dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            dir: defaults::storage_dir(),
        }
    }
}

/// Order in which a source returns records for the same event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScrapeOrder {
    #[default]
    OldestFirst,
    NewestFirst,
}

/// One polled source.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SourceConfig {
    /// Registry key and store row name
    pub name: String,

    #[serde(default)]
    pub display_name: String,

    /// Site link shown in messages
    #[serde(default)]
    pub url: String,

    #[serde(default = "defaults::enabled")]
    pub enabled: bool,

    /// Forum topic the messages go to
    #[serde(default)]
    pub message_thread_id: Option<i64>,

    /// Separator between event prefix and status tag in record identifiers
    #[serde(default, alias = "prune_separator")]
    pub event_prefix_separator: Option<char>,

    /// Edit the earlier message when an event changes status
    #[serde(default, alias = "supports_message_edit")]
    pub enable_message_edit: bool,

    #[serde(default)]
    pub scrape_order: ScrapeOrder,
}

impl SourceConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            display_name: String::new(),
            url: String::new(),
            enabled: true,
            message_thread_id: None,
            event_prefix_separator: None,
            enable_message_edit: false,
            scrape_order: ScrapeOrder::OldestFirst,
        }
    }

    /// Separator to correlate on, only when the source also opts into editing.
    pub fn correlated_editing(&self) -> Option<char> {
        if self.enable_message_edit {
            self.event_prefix_separator
        } else {
            None
        }
    }

    /// Display name, or the given fallback when unset.
    pub fn display_name_or<'a>(&'a self, fallback: &'a str) -> &'a str {
        if self.display_name.is_empty() {
            fallback
        } else {
            &self.display_name
        }
    }

    fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(AppError::validation("source name is empty"));
        }
        if self
            .name
            .chars()
            .any(|c| !(c.is_ascii_alphanumeric() || c == '_' || c == '-'))
        {
            return Err(AppError::validation(format!(
                "source name '{}' must be ASCII alphanumeric, '_' or '-'",
                self.name
            )));
        }
        if self.enable_message_edit && self.event_prefix_separator.is_none() {
            return Err(AppError::validation(format!(
                "source '{}' enables message edit without an event_prefix_separator",
                self.name
            )));
        }
        if matches!(self.event_prefix_separator, Some(c) if c.is_whitespace()) {
            return Err(AppError::validation(format!(
                "source '{}' has a whitespace separator",
                self.name
            )));
        }
        Ok(())
    }
}

/// Default values for configuration.
mod defaults {
    use std::path::PathBuf;

    use super::{ScrapeOrder, SourceConfig};

    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; relay/0.1)".to_string()
    }

    pub fn api_base() -> String {
        "https://api.telegram.org".to_string()
    }

    pub fn timeout() -> u64 {
        30
    }

    pub fn dispatch_delay() -> u64 {
        1000
    }

    pub fn detail_delay() -> u64 {
        500
    }

    pub fn max_content_chars() -> usize {
        500
    }

    pub fn storage_dir() -> PathBuf {
        PathBuf::from("data/store")
    }

    pub fn enabled() -> bool {
        true
    }

    fn source(name: &str, display_name: &str, url: &str, enabled: bool) -> SourceConfig {
        SourceConfig {
            display_name: display_name.to_string(),
            url: url.to_string(),
            enabled,
            ..SourceConfig::new(name)
        }
    }

    fn dispatch_source(name: &str, display_name: &str, url: &str) -> SourceConfig {
        SourceConfig {
            event_prefix_separator: Some('_'),
            enable_message_edit: true,
            ..source(name, display_name, url, false)
        }
    }

    pub fn sources() -> Vec<SourceConfig> {
        vec![
            source("jyb", "巧巧郎", "https://www.kkren.com.tw/", true),
            source("hinet", "HiNet", "https://search.hinet.net/", false),
            source("costco", "Costco", "https://www.costco.com.tw/", false),
            SourceConfig {
                event_prefix_separator: Some('_'),
                enable_message_edit: true,
                ..source("smc", "台灣海纜動態", "https://smc.peering.tw/", false)
            },
            dispatch_source("tncfd", "台南消防出勤", "https://119dts.tncfd.gov.tw/DTS/caselist/html"),
            SourceConfig {
                scrape_order: ScrapeOrder::NewestFirst,
                ..dispatch_source("tccfd", "台中消防出勤", "https://www.fire.taichung.gov.tw/")
            },
            dispatch_source("tpcfd", "台北消防出勤", "https://service119.tfd.gov.tw/"),
        ]
    }
}
