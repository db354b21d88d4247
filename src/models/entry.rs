//! Persisted per-source state: which identifiers were delivered, and where.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Epoch values above this are treated as milliseconds.
const EPOCH_MILLIS_THRESHOLD: i64 = 100_000_000_000;

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y/%m/%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%Y.%m.%d"];

/// Timestamp as it was persisted: free-form text or a bare epoch number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SeenAt {
    Epoch(i64),
    Text(String),
}

impl SeenAt {
    /// Current time as an RFC 3339 string.
    pub fn now() -> Self {
        Self::Text(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    /// Interpret the stored value as an instant. `None` when unparsable.
    pub fn parse(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Epoch(value) => from_epoch(*value),
            Self::Text(text) => parse_timestamp(text),
        }
    }
}

impl From<&str> for SeenAt {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for SeenAt {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl fmt::Display for SeenAt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Epoch(value) => write!(f, "{value}"),
            Self::Text(text) => f.write_str(text),
        }
    }
}

/// Parse the timestamp shapes sources and older tables produce.
///
/// Naive values are read as UTC; only relative order matters to callers.
pub fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(text) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(text, format) {
            return date.and_hms_opt(0, 0, 0).map(|n| Utc.from_utc_datetime(&n));
        }
    }
    text.parse::<i64>().ok().and_then(from_epoch)
}

fn from_epoch(value: i64) -> Option<DateTime<Utc>> {
    if value.abs() >= EPOCH_MILLIS_THRESHOLD {
        DateTime::from_timestamp_millis(value)
    } else {
        DateTime::from_timestamp(value, 0)
    }
}

/// Opaque handle to a delivered chat message, enough to target a later edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageHandle(pub i64);

impl fmt::Display for MessageHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Structured entry body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveredEntry {
    #[serde(rename = "seenAt", alias = "date")]
    pub seen_at: SeenAt,

    #[serde(
        rename = "messageHandle",
        alias = "messageId",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub message_handle: Option<MessageHandle>,
}

/// One persisted row per (source, identifier).
///
/// Older tables stored a bare timestamp; both shapes are read and written back
/// unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StoreEntry {
    Structured(DeliveredEntry),
    Legacy(SeenAt),
}

impl StoreEntry {
    /// Build a structured entry.
    pub fn structured(seen_at: impl Into<SeenAt>, handle: Option<MessageHandle>) -> Self {
        Self::Structured(DeliveredEntry {
            seen_at: seen_at.into(),
            message_handle: handle,
        })
    }

    pub fn seen_at(&self) -> &SeenAt {
        match self {
            Self::Structured(entry) => &entry.seen_at,
            Self::Legacy(seen_at) => seen_at,
        }
    }

    /// Handle of the delivered message; always `None` for legacy rows.
    pub fn handle(&self) -> Option<MessageHandle> {
        match self {
            Self::Structured(entry) => entry.message_handle,
            Self::Legacy(_) => None,
        }
    }

    /// Instant used for eviction ordering.
    pub fn effective_time(&self) -> Option<DateTime<Utc>> {
        self.seen_at().parse()
    }
}

/// The persisted mapping for one source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServiceTable {
    entries: BTreeMap<String, StoreEntry>,
}

impl ServiceTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<&StoreEntry> {
        self.entries.get(id)
    }

    pub fn insert(&mut self, id: impl Into<String>, entry: StoreEntry) -> Option<StoreEntry> {
        self.entries.insert(id.into(), entry)
    }

    pub fn retain(&mut self, f: impl FnMut(&String, &mut StoreEntry) -> bool) {
        self.entries.retain(f);
    }

    /// Entries in identifier order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &StoreEntry)> {
        self.entries.iter()
    }

    pub fn into_entries(self) -> BTreeMap<String, StoreEntry> {
        self.entries
    }
}

impl FromIterator<(String, StoreEntry)> for ServiceTable {
    fn from_iter<I: IntoIterator<Item = (String, StoreEntry)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}
