//! JYB notice feed (JSON API).

use std::sync::OnceLock;

use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;

use crate::error::{AppError, Result};
use crate::models::Record;
use crate::services::Source;
use crate::utils::http::fetch_text;
use crate::utils::text::{strip_html, truncate_graphemes};

const API_URL: &str =
    "https://api.jyb.com.tw/post/v1frontend/post/index?type=notice&label=&page=1&pageSize=10";

const MAX_CONTENT_CHARS: usize = 500;

#[derive(Debug, Deserialize)]
struct PostList {
    #[serde(default)]
    list: Vec<Post>,
}

#[derive(Debug, Deserialize)]
struct Post {
    poid: serde_json::Value,
    #[serde(default)]
    title: String,
    #[serde(default)]
    content: String,
    #[serde(default, rename = "publishedAt")]
    published_at: Option<String>,
}

fn img_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"<img[^>]+src="([^"]+)""#).expect("valid img regex"))
}

pub struct JybSource {
    client: Client,
}

impl JybSource {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn parse(body: &str) -> Result<Vec<Record>> {
        let posts: PostList = serde_json::from_str(body)?;

        Ok(posts
            .list
            .into_iter()
            .map(|post| {
                let id = match &post.poid {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                let poster = img_regex()
                    .captures(&post.content)
                    .map(|caps| caps[1].to_string());
                let content = truncate_graphemes(&strip_html(&post.content), MAX_CONTENT_CHARS);

                let mut record = Record::new(id, post.title).with_content(content);
                record.poster = poster;
                record.create_date = post.published_at;
                record
            })
            .collect())
    }
}

#[async_trait]
impl Source for JybSource {
    fn name(&self) -> &str {
        "jyb"
    }

    async fn fetch(&self) -> Result<Vec<Record>> {
        let body = fetch_text(&self.client, API_URL).await?;
        Self::parse(&body).map_err(|e| AppError::fetch(self.name(), e))
    }
}
