//! Normalized records produced by source collaborators.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::utils::text::truncate_graphemes;

/// A normalized item fetched from a source.
///
/// For multi-state sources the identifier is conventionally
/// `<eventPrefix><separator><statusTag>` and `status` carries the tag.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Record {
    /// Source-unique identifier
    pub id: String,

    /// Headline shown in the message header
    pub title: String,

    /// Free-form body text
    #[serde(default)]
    pub content: String,

    /// Single poster image URL
    #[serde(default)]
    pub poster: Option<String>,

    /// Additional images, usually filled in by a detail fetch
    #[serde(default)]
    pub images: Vec<String>,

    /// Publish or acceptance time as reported by the source
    #[serde(default)]
    pub create_date: Option<String>,

    /// Origin URL of the item
    #[serde(default)]
    pub url: Option<String>,

    /// Key passed to the source's detail fetch, if it has one
    #[serde(default)]
    pub detail_key: Option<String>,

    /// Status tag for multi-state events
    #[serde(default)]
    pub status: Option<String>,

    /// Source-specific fields used by custom message builders
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
}

impl Record {
    /// Create a record with an identifier and a title.
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self
    }

    pub fn with_create_date(mut self, date: impl Into<String>) -> Self {
        self.create_date = Some(date.into());
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_poster(mut self, poster: impl Into<String>) -> Self {
        self.poster = Some(poster.into());
        self
    }

    pub fn with_detail_key(mut self, key: impl Into<String>) -> Self {
        self.detail_key = Some(key.into());
        self
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    pub fn with_field(mut self, key: &str, value: impl Into<String>) -> Self {
        self.fields.insert(key.to_string(), value.into());
        self
    }

    /// Source-specific field, or an empty string when absent.
    pub fn field(&self, key: &str) -> &str {
        self.fields.get(key).map(String::as_str).unwrap_or("")
    }

    /// All image URLs in dispatch order: explicit images first, then the poster.
    pub fn media(&self) -> Vec<&str> {
        let mut media: Vec<&str> = self.images.iter().map(String::as_str).collect();
        if let Some(poster) = self.poster.as_deref().filter(|p| !p.is_empty()) {
            if !media.contains(&poster) {
                media.push(poster);
            }
        }
        media
    }

    /// Merge a detail fetch into this record.
    ///
    /// Content is only replaced when the detail carries non-empty text.
    pub fn apply_detail(&mut self, detail: Detail, max_content_chars: usize) {
        if let Some(content) = detail.content.filter(|c| !c.trim().is_empty()) {
            self.content = truncate_graphemes(&content, max_content_chars);
        }
        if !detail.images.is_empty() {
            self.images = detail.images;
        }
        if let Some(date) = detail.publish_date.filter(|d| !d.is_empty()) {
            self.create_date = Some(date);
        }
    }
}

/// Secondary data fetched for a single record.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Detail {
    pub content: Option<String>,
    #[serde(default)]
    pub images: Vec<String>,
    pub publish_date: Option<String>,
}
