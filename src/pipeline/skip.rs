//! Mark a source's current records as seen without sending anything.
//!
//! Used when enabling a source for the first time so its backlog is not
//! flooded into the channel.

use crate::error::{AppError, Result};
use crate::models::{SeenAt, SourceConfig, StoreEntry};
use crate::services::SourceRegistry;
use crate::storage::{self, RecordStore};

/// Fetch `config`'s source and record every identifier as seen now.
///
/// Returns the number of identifiers recorded. Existing rows keep their
/// handles; only unknown identifiers are added.
pub async fn skip_source(
    config: &SourceConfig,
    registry: &SourceRegistry,
    store: &dyn RecordStore,
) -> Result<usize> {
    let source = registry
        .get(&config.name)
        .ok_or_else(|| AppError::UnknownSource(config.name.clone()))?;

    let records = source.fetch().await?;
    let seen_at = SeenAt::now();

    let mut added = 0;
    storage::update(store, &config.name, |table| {
        for record in &records {
            if !table.contains(&record.id) {
                table.insert(record.id.as_str(), StoreEntry::structured(seen_at.clone(), None));
                added += 1;
            }
        }
    })
    .await?;

    log::info!(
        "Skipped {} records for {} ({} newly recorded)",
        records.len(),
        config.name,
        added
    );
    Ok(added)
}
