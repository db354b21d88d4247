//! Taiwan submarine cable incidents.
//!
//! Each recent incident yields one record, plus a `{id}_resolved` follow-up
//! once it has been repaired. The base id hashes only the incident's title and
//! date, so it stays put while the status changes and the follow-up edits the
//! original announcement.

use async_trait::async_trait;
use chrono::{DateTime, Duration, FixedOffset, Utc};
use reqwest::Client;
use serde::Deserialize;

use crate::error::Result;
use crate::models::{Record, SourceConfig, parse_timestamp};
use crate::services::Source;
use crate::utils::hash_id;
use crate::utils::http::fetch_text;
use crate::utils::text::escape_html;

const API_URL: &str = "https://smc.peering.tw/data/incidents.json";
const SITE_URL: &str = "https://smc.peering.tw/";

/// Incidents older than this are ignored.
const RECENT_DAYS: i64 = 7;

const RESOLVED: &str = "resolved";

/// Dates are shown in Taiwan time.
const DISPLAY_OFFSET_SECS: i32 = 8 * 3600;

#[derive(Debug, Deserialize)]
struct Incident {
    #[serde(default)]
    title: String,
    #[serde(default)]
    date: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    segment: Option<String>,
    #[serde(default)]
    cableid: Option<String>,
    #[serde(default)]
    resolved_at: Option<String>,
}

fn display_time(raw: &str) -> String {
    FixedOffset::east_opt(DISPLAY_OFFSET_SECS)
        .zip(parse_timestamp(raw))
        .map(|(offset, t)| t.with_timezone(&offset).format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| raw.to_string())
}

pub struct SmcSource {
    client: Client,
}

impl SmcSource {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Recent incidents, oldest first, each followed by its resolution.
    fn parse(body: &str, now: DateTime<Utc>) -> Result<Vec<Record>> {
        let incidents: Vec<Incident> = serde_json::from_str(body)?;
        let cutoff = now - Duration::days(RECENT_DAYS);
        let is_recent = |raw: &str| parse_timestamp(raw).is_some_and(|t| t >= cutoff);

        let mut timed: Vec<(Option<DateTime<Utc>>, Record)> = Vec::new();
        for incident in incidents {
            if !is_recent(incident.date.as_str()) {
                continue;
            }

            let status = incident.status.unwrap_or_default();
            let id = hash_id(&[incident.title.as_str(), incident.date.as_str()]);
            let mut record = Record::new(id.clone(), incident.title.as_str())
                .with_content(incident.description.as_str())
                .with_create_date(incident.date.as_str())
                .with_url(SITE_URL)
                .with_field("incident_status", status);
            if let Some(segment) = incident.segment {
                record = record.with_field("segment", segment);
            }
            if let Some(cable) = incident.cableid {
                record = record.with_field("cable", cable);
            }
            timed.push((parse_timestamp(&incident.date), record.clone()));

            if let Some(resolved_at) = incident.resolved_at.filter(|r| is_recent(r.as_str())) {
                let resolved = Record {
                    id: format!("{id}_{RESOLVED}"),
                    create_date: Some(resolved_at.clone()),
                    status: Some(RESOLVED.to_string()),
                    ..record
                };
                timed.push((parse_timestamp(&resolved_at), resolved));
            }
        }

        // Stable: an incident stays ahead of a resolution stamped at the same time.
        timed.sort_by_key(|(time, _)| *time);
        Ok(timed.into_iter().map(|(_, record)| record).collect())
    }
}

#[async_trait]
impl Source for SmcSource {
    fn name(&self) -> &str {
        "smc"
    }

    async fn fetch(&self) -> Result<Vec<Record>> {
        let body = fetch_text(&self.client, API_URL).await?;
        Self::parse(&body, Utc::now())
    }

    fn build_message(&self, record: &Record, config: &SourceConfig) -> String {
        let site_url = if config.url.is_empty() { SITE_URL } else { config.url.as_str() };
        let service = format!(
            "<a href=\"{}\">{}</a>",
            escape_html(site_url),
            escape_html(config.display_name_or("台灣海纜動態"))
        );
        let resolved = record.status.as_deref() == Some(RESOLVED);
        let (icon, headline) = if resolved {
            ("✅", "障礙已排除")
        } else {
            ("💥", "新障礙通報")
        };

        let mut message = format!("<b>{icon} {service} | {headline}</b>\n\n");
        message.push_str(&format!("<b>{}</b>\n", escape_html(&record.title)));
        if !record.content.is_empty() {
            message.push_str(&format!("\n{}\n", escape_html(&record.content)));
        }
        if let Some(date) = record.create_date.as_deref() {
            let label = if resolved { "排除時間" } else { "發生時間" };
            message.push_str(&format!("\n📅 {}: {}", label, escape_html(&display_time(date))));
        }
        message.push_str(&format!("\n🔗 <a href=\"{}\">查看詳情</a>", escape_html(site_url)));
        message
    }
}
