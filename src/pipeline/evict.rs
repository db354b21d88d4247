//! Bounded retention for service tables.
//!
//! After every write a table keeps only its most recent entries by `seenAt`.
//! Entries whose timestamp cannot be parsed sort as the oldest, so malformed
//! rows are the first to go.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};

use crate::models::{ServiceTable, StoreEntry};

/// Maximum entries kept per source.
pub const MAX_TABLE_ENTRIES: usize = 100;

/// Newest first; unparsable last. Ties keep their incoming order.
fn newest_first(a: &Option<DateTime<Utc>>, b: &Option<DateTime<Utc>>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => b.cmp(a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Trim `table` to at most `capacity` entries, keeping the most recent.
///
/// Returns the number of evicted entries. Ties are broken by identifier order,
/// which is the table's iteration order, so the result is deterministic.
pub fn evict(table: &mut ServiceTable, capacity: usize) -> usize {
    if table.len() <= capacity {
        return 0;
    }

    let mut ranked: Vec<(String, StoreEntry, Option<DateTime<Utc>>)> =
        std::mem::take(table)
            .into_entries()
            .into_iter()
            .map(|(id, entry)| {
                let time = entry.effective_time();
                (id, entry, time)
            })
            .collect();

    // Stable sort keeps identifier order among equal timestamps.
    ranked.sort_by(|a, b| newest_first(&a.2, &b.2));

    let evicted = ranked.len() - capacity;
    *table = ranked
        .into_iter()
        .take(capacity)
        .map(|(id, entry, _)| (id, entry))
        .collect();
    evicted
}
