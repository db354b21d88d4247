//! Local filesystem record store.
//!
//! One JSON file per source, replaced atomically on every write.
//!
//! ## Storage Layout
//!
//! ```text
//! {root}/
//! └── tables/
//!     ├── jyb.json
//!     └── tncfd.json
//! ```

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::storage::RecordStore;

/// Local filesystem storage backend.
#[derive(Debug, Clone)]
pub struct LocalStore {
    root_dir: PathBuf,
}

impl LocalStore {
    /// Create a new LocalStore rooted at the given directory.
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root_dir
    }

    /// Path of a source's row.
    fn path(&self, source: &str) -> PathBuf {
        self.root_dir.join("tables").join(format!("{source}.json"))
    }

    /// Ensure parent directory exists.
    async fn ensure_dir(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    /// Write bytes atomically (write to temp, then rename).
    async fn write_bytes(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        self.ensure_dir(path).await?;

        let tmp = path.with_extension("json.tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&tmp, path).await?;
        Ok(())
    }
}

#[async_trait]
impl RecordStore for LocalStore {
    async fn load_row(&self, source: &str) -> Result<Option<String>> {
        let path = self.path(source);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(String::from_utf8_lossy(&bytes).into_owned())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    async fn save_row(&self, source: &str, blob: &str) -> Result<()> {
        let path = self.path(source);
        self.write_bytes(&path, blob.as_bytes()).await?;
        log::debug!("Saved table for {} to {}", source, path.display());
        Ok(())
    }
}
