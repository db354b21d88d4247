//! Shared layout for fire-dispatch case lists.
//!
//! Dispatch sites list each open case once with its current status. Records
//! are keyed `{case}_{status}` so a status change correlates with the
//! message already sent for the case.

use crate::models::{Record, SourceConfig};
use crate::utils::text::escape_html;

pub(super) const CASE_ID: &str = "case_id";
pub(super) const CASE_TYPE: &str = "case_type";
pub(super) const LOCATION: &str = "location";
pub(super) const UNIT: &str = "unit";
pub(super) const ACCEPTED_AT: &str = "accepted_at";
pub(super) const MAP_URL: &str = "map_url";

const MEDICAL_KEYWORDS: [&str; 3] = ["救護", "急病", "路倒"];

/// Record identifier for a case in a given status.
pub(super) fn case_record_id(case: &str, status: &str) -> String {
    format!("{case}_{status}")
}

/// 🏥 for medical calls, 🚒 for everything else.
pub(super) fn case_emoji(case_type: &str) -> &'static str {
    if MEDICAL_KEYWORDS.iter().any(|k| case_type.contains(k)) {
        "🏥"
    } else {
        "🚒"
    }
}

/// First emoji whose keyword appears in `status`.
pub(super) fn status_emoji(status: &str, table: &[(&str, &'static str)]) -> &'static str {
    table
        .iter()
        .find(|(keyword, _)| status.contains(keyword))
        .map(|(_, emoji)| *emoji)
        .unwrap_or("")
}

/// Render a dispatch record.
///
/// ```text
/// 🚒 <a href="..">台南消防出勤</a> | 已到達 📍
///
/// 📍 <b>中西區民族路二段</b> (火災)
/// 派遣分隊: 中正分隊
///
/// 案件編號: 1130201001
/// 受理時間: 2026/02/01 08:00:00
/// ```
pub(super) fn render(record: &Record, config: &SourceConfig, emoji_table: &[(&str, &'static str)]) -> String {
    let case_type = record.field(CASE_TYPE);
    let status = record.status.as_deref().unwrap_or_default();

    let display_name = escape_html(config.display_name_or(&config.name));
    let service = if config.url.is_empty() {
        display_name
    } else {
        format!("<a href=\"{}\">{}</a>", escape_html(&config.url), display_name)
    };

    let mut message = format!("{} {} | {}", case_emoji(case_type), service, escape_html(status));
    let emoji = status_emoji(status, emoji_table);
    if !emoji.is_empty() {
        message.push(' ');
        message.push_str(emoji);
    }
    message.push_str("\n\n");

    let location = escape_html(record.field(LOCATION));
    match record.fields.get(MAP_URL) {
        Some(map_url) => message.push_str(&format!(
            "📍 <a href=\"{}\"><b>{}</b></a>",
            escape_html(map_url),
            location
        )),
        None => message.push_str(&format!("📍 <b>{location}</b>")),
    }
    if !case_type.is_empty() {
        message.push_str(&format!(" ({})", escape_html(case_type)));
    }
    message.push('\n');

    let unit = record.field(UNIT);
    if !unit.is_empty() {
        message.push_str(&format!("派遣分隊: {}\n", escape_html(unit)));
    }

    message.push('\n');
    let case_id = record.field(CASE_ID);
    if !case_id.is_empty() {
        message.push_str(&format!("案件編號: {}\n", escape_html(case_id)));
    }
    message.push_str(&format!("受理時間: {}", escape_html(record.field(ACCEPTED_AT))));
    message
}
