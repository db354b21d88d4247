//! Taichung fire department dispatch list (responsive HTML list).
//!
//! The page has no case number, so the case is identified by hashing its
//! acceptance time, type, and location.

use async_trait::async_trait;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::error::{AppError, Result};
use crate::models::{Record, SourceConfig};
use crate::services::Source;
use crate::services::dispatch::{
    ACCEPTED_AT, CASE_TYPE, LOCATION, MAP_URL, UNIT, case_record_id, render,
};
use crate::utils::hash_id;
use crate::utils::http::fetch_text;
use crate::utils::text::normalize_whitespace;

const LIST_URL: &str =
    "https://www.fire.taichung.gov.tw/caselist/index.asp?Parser=99,8,226,,,,,,,,1";

const MAP_SEARCH_URL: &str = "https://www.google.com/maps/search/";

const STATUS_EMOJI: [(&str, &str); 5] = [
    ("出勤", "🚨"),
    ("到達", "📍"),
    ("離開", "🚑"),
    ("送醫", "🚑"),
    ("返隊", "🏠"),
];

fn parse_selector(selector: &str) -> Result<Selector> {
    Selector::parse(selector).map_err(|e| AppError::selector(selector, e))
}

/// Text of the cell labelled `label`, up to its first child element.
///
/// The location cell carries a map button after the address.
fn labelled_text(item: ElementRef<'_>, label: &str) -> Result<String> {
    let selector = parse_selector(&format!(r#"[data-th="{label}"]"#))?;
    Ok(item
        .select(&selector)
        .next()
        .map(|cell| {
            let own: String = cell
                .children()
                .map_while(|child| child.value().as_text().map(|t| String::from(&**t)))
                .collect();
            normalize_whitespace(&own)
        })
        .unwrap_or_default())
}

fn map_url(location: &str) -> Result<String> {
    let query = format!("台中市{location}");
    let url = Url::parse_with_params(MAP_SEARCH_URL, &[("api", "1"), ("query", query.as_str())])?;
    Ok(url.to_string())
}

pub struct TccfdSource {
    client: Client,
}

impl TccfdSource {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn parse(html: &str) -> Result<Vec<Record>> {
        let document = Html::parse_document(html);
        let item_selector = parse_selector("ul.list.rwd-table > li")?;

        let mut records = Vec::new();
        for item in document.select(&item_selector) {
            if item.value().classes().any(|c| c == "list_head")
                || item.inner_html().contains("list_head")
            {
                continue;
            }

            let accepted_at = labelled_text(item, "受理時間：")?;
            let case_type = labelled_text(item, "案類：")?;
            let subtype = labelled_text(item, "案別")?;
            let location = labelled_text(item, "發生地點：")?;
            let unit = labelled_text(item, "派遣分隊：")?;
            let status = labelled_text(item, "執行狀況：")?;
            if accepted_at.is_empty() || case_type.is_empty() || status.is_empty() {
                continue;
            }

            let case = hash_id(&[accepted_at.as_str(), case_type.as_str(), location.as_str()]);
            let full_type = if subtype.is_empty() {
                case_type.clone()
            } else {
                format!("{case_type}/{subtype}")
            };

            let mut record = Record::new(case_record_id(&case, &status), format!("{location} - {full_type}"))
                .with_content(format!("{unit} - {status}"))
                .with_create_date(accepted_at.as_str())
                .with_url(LIST_URL)
                .with_status(status.as_str())
                .with_field(ACCEPTED_AT, accepted_at.as_str())
                .with_field(CASE_TYPE, full_type)
                .with_field(UNIT, unit.as_str());
            if !location.is_empty() {
                record = record
                    .with_field(MAP_URL, map_url(&location)?)
                    .with_field(LOCATION, location);
            }
            records.push(record);
        }
        Ok(records)
    }
}

#[async_trait]
impl Source for TccfdSource {
    fn name(&self) -> &str {
        "tccfd"
    }

    async fn fetch(&self) -> Result<Vec<Record>> {
        let html = fetch_text(&self.client, LIST_URL).await?;
        Self::parse(&html)
    }

    fn build_message(&self, record: &Record, config: &SourceConfig) -> String {
        render(record, config, &STATUS_EMOJI)
    }
}
