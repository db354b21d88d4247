//! Costco Taiwan news page (CMS JSON wrapping HTML tables).

use std::sync::OnceLock;

use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;

use crate::error::Result;
use crate::models::{Detail, Record};
use crate::services::{DetailSource, Source};
use crate::utils::hash_id;
use crate::utils::http::fetch_text;
use crate::utils::text::{strip_html, truncate_graphemes};

const BASE_URL: &str = "https://www.costco.com.tw";
const NEWS_PAGE: &str = "Newspage";

const TITLE_CHARS: usize = 50;

/// Site chrome that shows up in content slots next to the real artwork.
const IGNORED_IMAGES: [&str; 7] = [
    "social_icon",
    "appicon",
    "footericon",
    "GOLDSTAR",
    "BUSINESS",
    "Executive",
    "icon_membership",
];

fn page_url(page: &str) -> String {
    format!(
        "{BASE_URL}/rest/v3/taiwan/cms/pages?pageType=ContentPage&pageLabelOrId={page}&lang=zh_TW&curr=TWD"
    )
}

fn absolute(href: &str) -> String {
    if href.starts_with("http") {
        href.to_string()
    } else {
        format!("{BASE_URL}{href}")
    }
}

#[derive(Debug, Default, Deserialize)]
struct CmsPage {
    #[serde(default)]
    page_composer: Vec<PageItem>,
    #[serde(default, rename = "contentSlots")]
    content_slots: Option<ContentSlots>,
}

#[derive(Debug, Default, Deserialize)]
struct PageItem {
    #[serde(default)]
    row: Option<Row>,
}

#[derive(Debug, Default, Deserialize)]
struct Row {
    #[serde(default)]
    row_composer: Vec<Composer>,
}

#[derive(Debug, Default, Deserialize)]
struct Composer {
    #[serde(default)]
    html_render_component_block: Option<HtmlBlock>,
    #[serde(default)]
    ad_builder_block: Option<AdBlock>,
}

#[derive(Debug, Default, Deserialize)]
struct HtmlBlock {
    #[serde(default)]
    html_render_component_ref: Vec<HtmlRef>,
}

#[derive(Debug, Default, Deserialize)]
struct HtmlRef {
    #[serde(default)]
    html: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct AdBlock {
    #[serde(default)]
    ad_builder_ref: Vec<AdRef>,
}

#[derive(Debug, Default, Deserialize)]
struct AdRef {
    #[serde(default)]
    image: Option<AdImage>,
}

#[derive(Debug, Default, Deserialize)]
struct AdImage {
    #[serde(default)]
    url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ContentSlots {
    #[serde(default, rename = "contentSlot")]
    content_slot: Vec<ContentSlot>,
}

#[derive(Debug, Default, Deserialize)]
struct ContentSlot {
    #[serde(default)]
    components: Option<Components>,
}

#[derive(Debug, Default, Deserialize)]
struct Components {
    #[serde(default)]
    component: Vec<Component>,
}

#[derive(Debug, Default, Deserialize)]
struct Component {
    #[serde(default)]
    content: Option<String>,
}

impl CmsPage {
    fn composers(&self) -> impl Iterator<Item = &Composer> {
        self.page_composer
            .iter()
            .filter_map(|item| item.row.as_ref())
            .flat_map(|row| row.row_composer.iter())
    }

    /// HTML of every render block, concatenated.
    fn html(&self) -> String {
        self.composers()
            .filter_map(|c| c.html_render_component_block.as_ref())
            .filter_map(|block| block.html_render_component_ref.first())
            .filter_map(|r| r.html.as_deref())
            .collect()
    }

    fn gallery(&self) -> Vec<String> {
        self.composers()
            .filter_map(|c| c.ad_builder_block.as_ref())
            .flat_map(|block| block.ad_builder_ref.iter())
            .filter_map(|r| r.image.as_ref().and_then(|i| i.url.clone()))
            .filter(|url| !url.is_empty())
            .collect()
    }

    fn slot_images(&self) -> Vec<String> {
        let mut images: Vec<String> = Vec::new();
        let contents = self
            .content_slots
            .iter()
            .flat_map(|slots| slots.content_slot.iter())
            .filter_map(|slot| slot.components.as_ref())
            .flat_map(|c| c.component.iter())
            .filter_map(|c| c.content.as_deref());

        for content in contents {
            for caps in media_regex().captures_iter(content) {
                let src = &caps[1];
                if IGNORED_IMAGES.iter().any(|ignored| src.contains(ignored)) {
                    continue;
                }
                let url = absolute(src);
                if !images.contains(&url) {
                    images.push(url);
                }
            }
        }
        images
    }
}

fn date_cell_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"<td[^>]*class="Date"[^>]*>(\d{4}/\d{2}/\d{2})</td>"#).expect("valid date regex")
    })
}

fn link_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"<a[^>]*href="([^"]+)"[^>]*>([^<]+)</a>"#).expect("valid link regex")
    })
}

fn notice_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?s)<p[^>]*class="footerH3"[^>]*>(.*?)</p>"#).expect("valid notice regex")
    })
}

/// Split the news table into `(date, markup up to the next date cell)`.
fn dated_rows(html: &str) -> Vec<(&str, &str)> {
    let cells: Vec<_> = date_cell_regex().captures_iter(html).collect();
    cells
        .iter()
        .enumerate()
        .filter_map(|(i, caps)| {
            let cell = caps.get(0)?;
            let date = caps.get(1)?.as_str();
            let end = cells
                .get(i + 1)
                .and_then(|next| next.get(0))
                .map_or(html.len(), |m| m.start());
            Some((date, &html[cell.end()..end]))
        })
        .collect()
}

fn media_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"src="([^"]*mediapermalink/[^"]+)""#).expect("valid media regex"))
}

pub struct CostcoSource {
    client: Client,
}

impl CostcoSource {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Linked announcements first, then plain-text notices.
    fn parse_list(body: &str) -> Result<Vec<Record>> {
        let page: CmsPage = serde_json::from_str(body)?;
        let html = page.html();
        let rows = dated_rows(&html);

        let mut records: Vec<Record> = rows
            .iter()
            .filter_map(|(date, row)| {
                let caps = link_regex().captures(row)?;
                let href = &caps[1];
                let page_id = href
                    .strip_prefix("/content/")
                    .unwrap_or(href)
                    .trim_start_matches('/')
                    .to_string();
                Some(
                    Record::new(page_id.clone(), strip_html(&caps[2]))
                        .with_create_date(*date)
                        .with_url(absolute(href))
                        .with_detail_key(page_id),
                )
            })
            .collect();

        for (date, row) in &rows {
            let Some(caps) = notice_regex().captures(row) else {
                continue;
            };
            let raw = &caps[1];
            if raw.contains("<a") {
                continue;
            }
            let content = strip_html(raw);
            if content.is_empty() {
                continue;
            }

            let id = hash_id(&[content.as_str(), *date]);
            if records.iter().any(|r| r.id == id) {
                continue;
            }

            let mut title = truncate_graphemes(&content, TITLE_CHARS);
            if title.len() < content.len() {
                title.push_str("...");
            }
            records.push(Record::new(id, title).with_content(content).with_create_date(*date));
        }
        Ok(records)
    }

    fn parse_detail(body: &str) -> Result<Detail> {
        let page: CmsPage = serde_json::from_str(body)?;
        let mut images = page.gallery();
        if images.is_empty() {
            images = page.slot_images();
        }
        Ok(Detail {
            images,
            ..Detail::default()
        })
    }
}

#[async_trait]
impl Source for CostcoSource {
    fn name(&self) -> &str {
        "costco"
    }

    async fn fetch(&self) -> Result<Vec<Record>> {
        let body = fetch_text(&self.client, &page_url(NEWS_PAGE)).await?;
        Self::parse_list(&body)
    }

    fn details(&self) -> Option<&dyn DetailSource> {
        Some(self)
    }
}

#[async_trait]
impl DetailSource for CostcoSource {
    async fn fetch_detail(&self, key: &str) -> Result<Detail> {
        let body = fetch_text(&self.client, &page_url(key)).await?;
        Self::parse_detail(&body)
    }
}
