//! HiNet service notices (JSONP list + JSONP detail page).

use std::sync::OnceLock;

use async_trait::async_trait;
use chrono::Utc;
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;

use crate::error::{AppError, Result};
use crate::models::{Detail, Record};
use crate::services::{DetailSource, Source};
use crate::utils::hash_id;
use crate::utils::http::fetch_text;
use crate::utils::text::{decode_numeric_entities, strip_html, truncate_graphemes};

const LIST_URL: &str = "https://search.hinet.net/getNotify";
const DETAIL_URL: &str = "https://search.hinet.net/getNotifyPage";

const MAX_DETAIL_CHARS: usize = 500;

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default, rename = "countryInfo")]
    country_info: Option<CountryInfo>,
}

#[derive(Debug, Deserialize)]
struct CountryInfo {
    #[serde(default)]
    content: String,
}

fn jsonp_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)jsonpCallback\((.+)\);?\s*$").expect("valid jsonp regex")
    })
}

fn row_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"<tr><td>([^<]+)</td><td><a href=([^>]+)>([^<]+)</a></td><td>([^<]*)</td></tr>")
            .expect("valid row regex")
    })
}

fn id_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"id=([^&]+)").expect("valid id regex"))
}

fn description_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"<li>說明：<span>([^<]+)</span></li>").expect("valid description regex")
    })
}

/// Unwrap a `jsonpCallback(...)` response into its HTML content.
fn unwrap_jsonp(body: &str) -> Result<Option<String>> {
    let caps = jsonp_regex()
        .captures(body)
        .ok_or_else(|| AppError::fetch("hinet", "response is not JSONP"))?;
    let envelope: Envelope = serde_json::from_str(&caps[1])?;
    Ok(envelope.country_info.map(|info| info.content))
}

pub struct HinetSource {
    client: Client,
}

impl HinetSource {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn parse_list(body: &str) -> Result<Vec<Record>> {
        let Some(html) = unwrap_jsonp(body)? else {
            return Ok(Vec::new());
        };

        Ok(row_regex()
            .captures_iter(&html)
            .map(|caps| {
                let publish_date = caps[1].trim().to_string();
                let detail_url = caps[2].trim().trim_matches(|c: char| c == '"' || c == '\'').to_string();
                let title = decode_numeric_entities(caps[3].trim());
                let end_date = caps[4].trim();

                let id = id_regex()
                    .captures(&detail_url)
                    .map(|c| c[1].to_string())
                    .unwrap_or_else(|| hash_id(&[title.as_str(), "+", publish_date.as_str()]));
                let content = if end_date.is_empty() {
                    String::new()
                } else {
                    format!("公告期間：{publish_date} ~ {end_date}")
                };

                Record::new(id.clone(), title)
                    .with_content(content)
                    .with_create_date(publish_date)
                    .with_url(detail_url)
                    .with_detail_key(id)
            })
            .collect())
    }

    fn parse_detail(body: &str) -> Result<Detail> {
        let Some(html) = unwrap_jsonp(body)? else {
            return Ok(Detail::default());
        };

        let text = match description_regex().captures(&html) {
            Some(caps) => strip_html(&decode_numeric_entities(&caps[1])),
            None => strip_html(&decode_numeric_entities(&html)),
        };
        Ok(Detail {
            content: Some(truncate_graphemes(&text, MAX_DETAIL_CHARS)),
            ..Detail::default()
        })
    }
}

#[async_trait]
impl Source for HinetSource {
    fn name(&self) -> &str {
        "hinet"
    }

    async fn fetch(&self) -> Result<Vec<Record>> {
        let url = format!(
            "{LIST_URL}?callback=jsonpCallback&type=0&sort=0&mobile=0&_={}",
            Utc::now().timestamp_millis()
        );
        let body = fetch_text(&self.client, &url).await?;
        Self::parse_list(&body)
    }

    fn details(&self) -> Option<&dyn DetailSource> {
        Some(self)
    }
}

#[async_trait]
impl DetailSource for HinetSource {
    async fn fetch_detail(&self, key: &str) -> Result<Detail> {
        let url = format!("{DETAIL_URL}?id={key}&callback=jsonpCallback");
        let body = fetch_text(&self.client, &url).await?;
        Self::parse_detail(&body)
    }
}
