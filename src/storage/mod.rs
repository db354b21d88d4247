//! Persistence of per-source service tables.
//!
//! Backends are row stores keyed by source name holding one serialized blob
//! per row; they only know how to load and save whole blobs. The table-level
//! contract (read, write with eviction, membership, prefix lookup) is written
//! once on top of that as provided methods.
//!
//! ## Row Layout
//!
//! ```text
//! tables/
//! ├── jyb.json      # {"123": "2026-02-01T08:00:00Z", ...}
//! └── tncfd.json    # {"A_已到達": {"seenAt": "...", "messageHandle": 42}, ...}
//! ```
//!
//! Read-modify-write is not transactional. One polling cycle runs at a time,
//! so a source has a single writer; concurrent runs would need per-source
//! locking or versioned writes around [`update`].

pub mod local;
pub mod memory;
#[cfg(feature = "s3")]
pub mod s3;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{MessageHandle, ServiceTable};
use crate::pipeline::correlate::matches_prefix;
use crate::pipeline::evict::{MAX_TABLE_ENTRIES, evict};

// Re-export for convenience
pub use local::LocalStore;
pub use memory::MemoryStore;
#[cfg(feature = "s3")]
pub use s3::S3Store;

/// Per-source record store.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Raw blob for a source, `None` if the row was never written.
    async fn load_row(&self, source: &str) -> Result<Option<String>>;

    /// Replace the blob for a source.
    async fn save_row(&self, source: &str, blob: &str) -> Result<()>;

    /// Entries retained per source after a write.
    fn capacity(&self) -> usize {
        MAX_TABLE_ENTRIES
    }

    /// Read a source's table.
    ///
    /// `None` only when the source has never been written. A blob that fails
    /// to parse degrades to an empty table; the previous contents will be
    /// overwritten by the next write.
    async fn read(&self, source: &str) -> Result<Option<ServiceTable>> {
        let Some(blob) = self.load_row(source).await? else {
            return Ok(None);
        };
        if blob.trim().is_empty() {
            return Ok(Some(ServiceTable::new()));
        }
        match serde_json::from_str(&blob) {
            Ok(table) => Ok(Some(table)),
            Err(e) => {
                log::warn!("Discarding unreadable table for {}: {}", source, e);
                Ok(Some(ServiceTable::new()))
            }
        }
    }

    /// Evict down to capacity, then replace the persisted table.
    async fn write(&self, source: &str, mut table: ServiceTable) -> Result<ServiceTable> {
        let evicted = evict(&mut table, self.capacity());
        if evicted > 0 {
            log::debug!("Evicted {} entries from {}", evicted, source);
        }
        let blob = serde_json::to_string(&table)?;
        self.save_row(source, &blob).await?;
        Ok(table)
    }

    /// Whether `id` was recorded for `source`.
    async fn contains(&self, source: &str, id: &str) -> Result<bool> {
        Ok(self
            .read(source)
            .await?
            .is_some_and(|table| table.contains(id)))
    }

    /// Handle of a delivered message for the event named by `prefix`.
    ///
    /// Considers entries equal to `prefix` or starting with
    /// `prefix + separator`; legacy rows carry no handle and are passed over.
    async fn find_handle_by_prefix(
        &self,
        source: &str,
        prefix: &str,
        separator: char,
    ) -> Result<Option<MessageHandle>> {
        let Some(table) = self.read(source).await? else {
            return Ok(None);
        };
        Ok(table
            .iter()
            .filter(|(id, _)| matches_prefix(id, prefix, separator))
            .find_map(|(_, entry)| entry.handle()))
    }
}

/// Read a source's table, mutate it in memory, and write it back in full.
pub async fn update<S, F>(store: &S, source: &str, mutate: F) -> Result<ServiceTable>
where
    S: RecordStore + ?Sized,
    F: FnOnce(&mut ServiceTable) + Send,
{
    let mut table = store.read(source).await?.unwrap_or_default();
    mutate(&mut table);
    store.write(source, table).await
}
