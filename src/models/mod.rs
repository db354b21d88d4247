// src/models/mod.rs

//! Domain models for the relay.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod config;
mod entry;
mod record;

// Re-export all public types
pub use config::{Config, RelayConfig, ScrapeOrder, SourceConfig, StorageConfig, TelegramConfig};
pub use entry::{DeliveredEntry, MessageHandle, SeenAt, ServiceTable, StoreEntry, parse_timestamp};
pub use record::{Detail, Record};
