//! Text cleanup for scraped markup and outbound HTML messages.

use std::sync::OnceLock;

use regex::Regex;
use unicode_segmentation::UnicodeSegmentation;

fn tag_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<[^>]*>").expect("valid tag regex"))
}

fn numeric_entity_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"&#(x?)([0-9a-fA-F]+);").expect("valid entity regex"))
}

/// Decode numeric character references (`&#25105;`, `&#x6211;`).
pub fn decode_numeric_entities(text: &str) -> String {
    numeric_entity_regex()
        .replace_all(text, |caps: &regex::Captures<'_>| {
            let radix = if caps[1].is_empty() { 10 } else { 16 };
            u32::from_str_radix(&caps[2], radix)
                .ok()
                .and_then(char::from_u32)
                .map(String::from)
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

/// Remove tags, decode common entities, and collapse whitespace.
pub fn strip_html(html: &str) -> String {
    let without_tags = tag_regex().replace_all(html, "");
    let decoded = decode_numeric_entities(&without_tags)
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&");
    normalize_whitespace(&decoded)
}

/// Collapse runs of whitespace into single spaces.
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Escape text for Telegram's HTML parse mode.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

/// Keep at most `max` grapheme clusters.
pub fn truncate_graphemes(text: &str, max: usize) -> String {
    let mut graphemes = text.grapheme_indices(true);
    match graphemes.nth(max) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

/// Keep at most `max` grapheme clusters, marking the cut with an ellipsis.
pub fn truncate_with_ellipsis(text: &str, max: usize) -> String {
    if max == 0 {
        return String::new();
    }
    if text.graphemes(true).count() <= max {
        return text.to_string();
    }
    let mut truncated = truncate_graphemes(text, max - 1);
    truncated.push('…');
    truncated
}
