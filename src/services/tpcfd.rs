//! Taipei fire department dispatch list (JSON over form POST).

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::Deserialize;

use crate::error::Result;
use crate::models::{Record, SourceConfig, parse_timestamp};
use crate::services::Source;
use crate::services::dispatch::{ACCEPTED_AT, CASE_TYPE, LOCATION, case_record_id, render};
use crate::utils::hash_id;

const LIST_URL: &str = "https://service119.tfd.gov.tw/service119/citizenCase/caseList";
const PUBLIC_URL: &str = "https://service119.tfd.gov.tw/service119/citizenCase.php";

const STATUS_EMOJI: [(&str, &str); 5] = [
    ("已派遣", "🚨"),
    ("已出勤", "🚨"),
    ("到達", "📍"),
    ("離開", "🚑"),
    ("返隊", "🏠"),
];

#[derive(Debug, Deserialize)]
struct CaseList {
    #[serde(default)]
    rows: Vec<CaseRow>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CaseRow {
    #[serde(default)]
    in_time: Option<String>,
    #[serde(default)]
    cs_kind_name: Option<String>,
    #[serde(default)]
    case_status: Option<String>,
    #[serde(default)]
    cs_place_fuzzy: Option<String>,
}

pub struct TpcfdSource {
    client: Client,
}

impl TpcfdSource {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Records ordered by acceptance time, oldest first.
    fn parse(body: &str) -> Result<Vec<Record>> {
        let list: CaseList = serde_json::from_str(body)?;

        let mut records: Vec<Record> = list
            .rows
            .into_iter()
            .filter_map(|row| {
                let in_time = row.in_time.filter(|s| !s.trim().is_empty())?;
                let case_type = row.cs_kind_name.filter(|s| !s.trim().is_empty())?;
                let status = row.case_status.filter(|s| !s.trim().is_empty())?;
                let location = row.cs_place_fuzzy.unwrap_or_default();

                let case = hash_id(&[in_time.as_str(), case_type.as_str()]);
                Some(
                    Record::new(case_record_id(&case, &status), format!("{location} - {case_type}"))
                        .with_content(status.as_str())
                        .with_create_date(in_time.as_str())
                        .with_url(PUBLIC_URL)
                        .with_status(status)
                        .with_field(ACCEPTED_AT, in_time)
                        .with_field(CASE_TYPE, case_type)
                        .with_field(LOCATION, location),
                )
            })
            .collect();

        records.sort_by_key(|r| r.create_date.as_deref().and_then(parse_timestamp));
        Ok(records)
    }
}

#[async_trait]
impl Source for TpcfdSource {
    fn name(&self) -> &str {
        "tpcfd"
    }

    async fn fetch(&self) -> Result<Vec<Record>> {
        // Cache buster expected by the endpoint.
        let nonce = Utc::now().timestamp_nanos_opt().unwrap_or_default().to_string();
        let body = self
            .client
            .post(LIST_URL)
            .form(&[("t", nonce.as_str())])
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        Self::parse(&body)
    }

    fn build_message(&self, record: &Record, config: &SourceConfig) -> String {
        render(record, config, &STATUS_EMOJI)
    }
}
