// src/message.rs
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// One feed entry. `id` grows with recency and is the only ordering/dedup key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    pub created_at: String,
    pub body: String,
}

impl Message {
    pub fn new(id: i64, created_at: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            id,
            created_at: created_at.into(),
            body: body.into(),
        }
    }

    /// Date part of `created_at` (`"2021-03-04 10:00"` → `"2021-03-04"`).
    pub fn date(&self) -> &str {
        self.created_at
            .split_whitespace()
            .next()
            .unwrap_or_default()
    }
}

/// Feeds report today's items as bare `HH:MM`. Prefix `today` unless the value
/// already carries a date (detected by the `-` separator). Applied once at ingestion.
pub fn normalize_created_at(raw: &str, today: NaiveDate) -> String {
    let raw = raw.trim();
    if raw.contains('-') {
        return raw.to_string();
    }
    format!("{} {}", today.format("%Y-%m-%d"), raw)
}

/// Plain-text rendition of a rich-text body, used for alert content.
pub fn plain_text(s: &str) -> String {
    static RE_TAGS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)</?[^>]+>").unwrap());
    static RE_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

    let decoded = html_escape::decode_html_entities(s);
    let stripped = RE_TAGS.replace_all(&decoded, " ");
    RE_WS.replace_all(&stripped, " ").trim().to_string()
}
