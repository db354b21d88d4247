//! Send-versus-edit decisions for scraped records.
//!
//! Plain sources deduplicate on the full identifier. Sources that opt into
//! correlated editing link every status of an event through its prefix: the
//! first status is sent, later ones edit that message, and the table keeps a
//! single row per event keyed by the newest status.

use crate::error::Result;
use crate::models::{MessageHandle, SeenAt, ServiceTable, SourceConfig, StoreEntry};
use crate::pipeline::correlate::{event_prefix, matches_prefix};
use crate::storage::{self, RecordStore};

/// What to do with one scraped record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Never delivered; send a new message.
    Unseen,
    /// This exact identifier was already delivered.
    KnownExact,
    /// An earlier status of the event was delivered; edit that message.
    EditByPrefix(MessageHandle),
    /// Earlier statuses are recorded without a handle; send a new message.
    KnownByPrefixNoHandle,
}

/// Classify `id` against a table snapshot.
///
/// `correlate` is the separator of a source with correlated editing, `None`
/// for plain deduplication. An exact match always wins so an unchanged status
/// is not edited again on every cycle.
pub fn classify(table: &ServiceTable, id: &str, correlate: Option<char>) -> Decision {
    if table.contains(id) {
        return Decision::KnownExact;
    }
    let Some(separator) = correlate else {
        return Decision::Unseen;
    };

    let prefix = event_prefix(id, separator);
    let mut matched = false;
    for (key, entry) in table.iter() {
        if !matches_prefix(key, prefix, separator) {
            continue;
        }
        if let Some(handle) = entry.handle() {
            return Decision::EditByPrefix(handle);
        }
        matched = true;
    }

    if matched {
        Decision::KnownByPrefixNoHandle
    } else {
        Decision::Unseen
    }
}

/// Record a successful send.
///
/// For correlated sources, handle-less rows of the same event are pruned.
pub fn apply_send(
    table: &mut ServiceTable,
    id: &str,
    seen_at: SeenAt,
    handle: MessageHandle,
    correlate: Option<char>,
) {
    if let Some(separator) = correlate {
        let prefix = event_prefix(id, separator);
        table.retain(|key, entry| !(matches_prefix(key, prefix, separator) && entry.handle().is_none()));
    }
    table.insert(id, StoreEntry::structured(seen_at, Some(handle)));
}

/// Record a successful edit: every row of the event collapses into one row
/// keyed by `id` that carries the edited message's handle.
pub fn apply_edit(
    table: &mut ServiceTable,
    id: &str,
    seen_at: SeenAt,
    handle: MessageHandle,
    separator: char,
) {
    let prefix = event_prefix(id, separator);
    table.retain(|key, _| !matches_prefix(key, prefix, separator));
    table.insert(id, StoreEntry::structured(seen_at, Some(handle)));
}

/// Reconciles one source's records against its persisted table.
///
/// Holds the table read at the start of the source's turn and refreshes it
/// from every write, so each record sees the outcome of the previous ones.
pub struct Reconciler<'a> {
    store: &'a dyn RecordStore,
    source: String,
    correlate: Option<char>,
    table: ServiceTable,
}

impl<'a> Reconciler<'a> {
    /// Load the current table for `config`'s source.
    pub async fn load(store: &'a dyn RecordStore, config: &SourceConfig) -> Result<Self> {
        let table = store.read(&config.name).await?.unwrap_or_default();
        Ok(Self {
            store,
            source: config.name.clone(),
            correlate: config.correlated_editing(),
            table,
        })
    }

    pub fn classify(&self, id: &str) -> Decision {
        classify(&self.table, id, self.correlate)
    }

    /// Persist a delivered new message.
    pub async fn record_send(&mut self, id: &str, seen_at: SeenAt, handle: MessageHandle) -> Result<()> {
        let correlate = self.correlate;
        self.table = storage::update(self.store, &self.source, |table| {
            apply_send(table, id, seen_at, handle, correlate);
        })
        .await?;
        Ok(())
    }

    /// Persist an edited message under the record's current identifier.
    ///
    /// Only called for correlated sources; a plain source never edits.
    pub async fn record_edit(&mut self, id: &str, seen_at: SeenAt, handle: MessageHandle) -> Result<()> {
        let Some(separator) = self.correlate else {
            return self.record_send(id, seen_at, handle).await;
        };
        self.table = storage::update(self.store, &self.source, |table| {
            apply_edit(table, id, seen_at, handle, separator);
        })
        .await?;
        Ok(())
    }
}
