//! Source collaborators.
//!
//! Every source fetches its current records and renders them as messages.
//! Detail fetching is an optional capability probed at runtime through
//! [`Source::details`]; message editing is opted into by configuration.
//!
//! - `jyb`: JSON notice feed
//! - `hinet`: JSONP notice list with per-item detail pages
//! - `costco`: CMS page JSON with per-item image galleries
//! - `smc`: submarine cable incidents with resolution follow-ups
//! - `tncfd`, `tccfd`, `tpcfd`: fire-dispatch case lists (multi-state)

mod costco;
mod dispatch;
mod hinet;
mod jyb;
mod smc;
mod tccfd;
mod tncfd;
mod tpcfd;

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{Detail, Record, SourceConfig};
use crate::utils::text::escape_html;

pub use costco::CostcoSource;
pub use hinet::HinetSource;
pub use jyb::JybSource;
pub use smc::SmcSource;
pub use tccfd::TccfdSource;
pub use tncfd::TncfdSource;
pub use tpcfd::TpcfdSource;

/// A polled announcement source.
#[async_trait]
pub trait Source: Send + Sync {
    /// Registry key; matches `SourceConfig::name`.
    fn name(&self) -> &str;

    /// Current records in page order.
    async fn fetch(&self) -> Result<Vec<Record>>;

    /// Detail-fetch capability, if the source has one.
    fn details(&self) -> Option<&dyn DetailSource> {
        None
    }

    /// Render a record as an HTML message.
    fn build_message(&self, record: &Record, config: &SourceConfig) -> String {
        default_message(record, config)
    }
}

/// Secondary per-record fetch (body text, images, publish date).
#[async_trait]
pub trait DetailSource: Send + Sync {
    async fn fetch_detail(&self, key: &str) -> Result<Detail>;
}

/// Generic announcement layout shared by most sources.
pub fn default_message(record: &Record, config: &SourceConfig) -> String {
    let display_name = escape_html(config.display_name_or(&config.name.to_uppercase()));
    let service = if config.url.is_empty() {
        display_name
    } else {
        format!("<a href=\"{}\">{}</a>", escape_html(&config.url), display_name)
    };

    let mut message = format!("<b>📢 {} | {}</b>\n\n", service, escape_html(&record.title));
    message.push_str(&escape_html(&record.content));
    message.push('\n');

    if let Some(date) = record.create_date.as_deref().filter(|d| !d.is_empty()) {
        message.push_str(&format!("\n📅 發布日期: {}", escape_html(date)));
    }
    if let Some(url) = record.url.as_deref().filter(|u| !u.is_empty()) {
        message.push_str(&format!("\n🔗 <a href=\"{}\">查看詳情</a>", escape_html(url)));
    }
    message
}

/// Named sources available to the relay.
#[derive(Default)]
pub struct SourceRegistry {
    sources: BTreeMap<String, Box<dyn Source>>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in source sharing one HTTP client.
    pub fn with_builtin(client: reqwest::Client) -> Self {
        let mut registry = Self::new();
        registry.register(JybSource::new(client.clone()));
        registry.register(HinetSource::new(client.clone()));
        registry.register(CostcoSource::new(client.clone()));
        registry.register(SmcSource::new(client.clone()));
        registry.register(TncfdSource::new(client.clone()));
        registry.register(TccfdSource::new(client.clone()));
        registry.register(TpcfdSource::new(client));
        registry
    }

    /// Add or replace a source under its own name.
    pub fn register(&mut self, source: impl Source + 'static) {
        self.sources.insert(source.name().to_string(), Box::new(source));
    }

    pub fn get(&self, name: &str) -> Option<&dyn Source> {
        self.sources.get(name).map(|s| s.as_ref())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.sources.keys().map(String::as_str)
    }
}
