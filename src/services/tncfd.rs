//! Tainan fire department dispatch list (HTML table).

use async_trait::async_trait;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};

use crate::error::{AppError, Result};
use crate::models::{Record, SourceConfig};
use crate::services::Source;
use crate::services::dispatch::{
    ACCEPTED_AT, CASE_ID, CASE_TYPE, LOCATION, UNIT, case_record_id, render,
};
use crate::utils::http::fetch_text;
use crate::utils::text::normalize_whitespace;

const LIST_URL: &str = "https://119dts.tncfd.gov.tw/DTS/caselist/html";

const STATUS_EMOJI: [(&str, &str); 8] = [
    ("已派遣", "🚨"),
    ("已出動", "💨"),
    ("已到達", "📍"),
    ("火已滅", "🧯"),
    ("已到院", "🏥"),
    ("返隊中", "🔙"),
    ("已返隊", "🏠"),
    ("送醫中", "🚑"),
];

fn parse_selector(selector: &str) -> Result<Selector> {
    Selector::parse(selector).map_err(|e| AppError::selector(selector, e))
}

fn cell_text(cell: ElementRef<'_>) -> String {
    normalize_whitespace(&cell.text().collect::<String>())
}

pub struct TncfdSource {
    client: Client,
}

impl TncfdSource {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Columns: serial, case number, accepted at, type, location, unit, status.
    fn parse(html: &str) -> Result<Vec<Record>> {
        let document = Html::parse_document(html);
        let row_selector = parse_selector("tr")?;
        let cell_selector = parse_selector("td")?;

        let mut records = Vec::new();
        for row in document.select(&row_selector).skip(1) {
            let cells: Vec<String> = row.select(&cell_selector).map(cell_text).collect();
            let [_, case_id, accepted_at, case_type, location, unit, status, ..] = cells.as_slice()
            else {
                continue;
            };
            if case_id.is_empty() || status.is_empty() {
                continue;
            }

            records.push(
                Record::new(case_record_id(case_id, status), format!("{location} - {case_type}"))
                    .with_content(format!("{unit} - {status}"))
                    .with_create_date(accepted_at.as_str())
                    .with_url(LIST_URL)
                    .with_status(status.as_str())
                    .with_field(CASE_ID, case_id.as_str())
                    .with_field(ACCEPTED_AT, accepted_at.as_str())
                    .with_field(CASE_TYPE, case_type.as_str())
                    .with_field(LOCATION, location.as_str())
                    .with_field(UNIT, unit.as_str()),
            );
        }
        Ok(records)
    }
}

#[async_trait]
impl Source for TncfdSource {
    fn name(&self) -> &str {
        "tncfd"
    }

    async fn fetch(&self) -> Result<Vec<Record>> {
        let html = fetch_text(&self.client, LIST_URL).await?;
        Self::parse(&html)
    }

    fn build_message(&self, record: &Record, config: &SourceConfig) -> String {
        render(record, config, &STATUS_EMOJI)
    }
}
