//! In-process record store for tests and dry runs.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use crate::error::Result;
use crate::storage::RecordStore;

/// Rows held in a shared map; clones see the same rows.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    rows: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn rows(&self) -> MutexGuard<'_, HashMap<String, String>> {
        // A poisoned map still holds whole blobs; keep using it.
        self.rows.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Raw blob for inspection.
    pub fn raw(&self, source: &str) -> Option<String> {
        self.rows().get(source).cloned()
    }

    /// Number of rows written so far.
    pub fn row_count(&self) -> usize {
        self.rows().len()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn load_row(&self, source: &str) -> Result<Option<String>> {
        Ok(self.rows().get(source).cloned())
    }

    async fn save_row(&self, source: &str, blob: &str) -> Result<()> {
        self.rows().insert(source.to_string(), blob.to_string());
        Ok(())
    }
}
