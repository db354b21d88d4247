//! Event correlation for multi-state records.
//!
//! A dispatch case moving through statuses is scraped as `A`, `A_arrived`,
//! `A_returned`, ... The part before the first separator is the event prefix;
//! records sharing it belong to one logical event.

use std::collections::HashMap;

use crate::models::{Record, ScrapeOrder};

/// Substring before the first `separator`, or the whole identifier.
pub fn event_prefix(id: &str, separator: char) -> &str {
    id.split_once(separator).map_or(id, |(prefix, _)| prefix)
}

/// Whether `id` belongs to the event named by `prefix`.
///
/// True for exact equality or when `id` starts with `prefix + separator`.
/// A shared prefix that is not separator-bounded (`abcx` vs `abc`) never
/// matches.
pub fn matches_prefix(id: &str, prefix: &str, separator: char) -> bool {
    match id.strip_prefix(prefix) {
        Some("") => true,
        Some(rest) => rest.starts_with(separator),
        None => false,
    }
}

/// Put records in oldest-to-newest order according to the source's contract.
pub fn chronological(mut records: Vec<Record>, order: ScrapeOrder) -> Vec<Record> {
    if order == ScrapeOrder::NewestFirst {
        records.reverse();
    }
    records
}

/// Collapse records of the same event to the last one scraped.
///
/// Expects oldest-to-newest input. The surviving record keeps the position of
/// the event's first appearance, so different events stay in scrape order.
pub fn collapse_last_wins(records: Vec<Record>, separator: char) -> Vec<Record> {
    let mut slots: HashMap<String, usize> = HashMap::new();
    let mut collapsed: Vec<Record> = Vec::with_capacity(records.len());

    for record in records {
        let prefix = event_prefix(&record.id, separator).to_string();
        match slots.get(&prefix) {
            Some(&slot) => collapsed[slot] = record,
            None => {
                slots.insert(prefix, collapsed.len());
                collapsed.push(record);
            }
        }
    }
    collapsed
}
