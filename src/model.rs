//! Wire data model and lenient normalization.
//!
//! News payloads are normalized field by field: a missing or wrong-typed
//! field defaults alone and never fails the surrounding item or request.
//! Health, vocabulary and retry payloads are typed with serde defaults so
//! partially populated reports still deserialize.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::filter::Lang;

/// Placeholder provenance for items whose source was dropped upstream.
pub const UNKNOWN_SOURCE: &str = "Unknown Source";

/// A single normalized news entry. Every field is defined; rendering
/// never has to reason about partially populated items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsItem {
    pub id: i64,
    pub source_name: String,
    pub source_url: String,
    pub article_url: String,
    pub title: String,
    pub summary: String,
    pub content: String,
    pub language: Lang,
    pub published_at: DateTime<Utc>,
    pub fetched_at: DateTime<Utc>,
    pub china_related: bool,
    pub image_url: Option<String>,
    pub country_tags: Vec<String>,
    pub topic_tags: Vec<String>,
}

/// Normalized `/api/news` response.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewsList {
    pub total: u64,
    pub items: Vec<NewsItem>,
}

/// Build a fully populated item out of whatever the wire delivered.
pub fn normalize_news_item(raw: &Value) -> NewsItem {
    NewsItem {
        id: raw.get("id").and_then(Value::as_i64).unwrap_or(0),
        source_name: text_or(raw, "source_name", UNKNOWN_SOURCE),
        source_url: text_or(raw, "source_url", ""),
        article_url: text_or(raw, "article_url", ""),
        title: text_or(raw, "title", ""),
        summary: text_or(raw, "summary", ""),
        content: text_or(raw, "content", ""),
        language: raw
            .get("language")
            .and_then(Value::as_str)
            .map(Lang::from_param)
            .unwrap_or_default(),
        published_at: timestamp_or_now(raw, "published_at"),
        fetched_at: timestamp_or_now(raw, "fetched_at"),
        china_related: raw
            .get("china_related")
            .and_then(Value::as_bool)
            .unwrap_or(false),
        image_url: raw
            .get("image_url")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string),
        country_tags: tags(raw, "country_tags"),
        topic_tags: tags(raw, "topic_tags"),
    }
}

/// Normalize a whole `/api/news` payload. Missing `total` or `items`
/// degrade to zero / empty rather than erroring.
pub fn normalize_news_list(raw: &Value) -> NewsList {
    let items = raw
        .get("items")
        .and_then(Value::as_array)
        .map(|entries| entries.iter().map(normalize_news_item).collect())
        .unwrap_or_default();
    NewsList {
        total: raw.get("total").and_then(Value::as_u64).unwrap_or(0),
        items,
    }
}

fn text_or(raw: &Value, key: &str, default: &str) -> String {
    raw.get(key)
        .and_then(Value::as_str)
        .unwrap_or(default)
        .to_string()
}

fn timestamp_or_now(raw: &Value, key: &str) -> DateTime<Utc> {
    raw.get(key)
        .and_then(Value::as_str)
        .and_then(parse_timestamp)
        .unwrap_or_else(Utc::now)
}

/// Label sets are unordered but deduplicated; non-string entries are
/// dropped, first occurrence wins.
fn tags(raw: &Value, key: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    if let Some(entries) = raw.get(key).and_then(Value::as_array) {
        for entry in entries {
            if let Some(label) = entry.as_str() {
                if !label.is_empty() && !out.iter().any(|seen| seen == label) {
                    out.push(label.to_string());
                }
            }
        }
    }
    out
}

/// Parse an ISO-8601 timestamp. Values without an offset are taken as UTC
/// (the backend emits both forms).
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// Point-in-time ingestion status of one upstream source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceStatus {
    Up,
    Degraded,
    Down,
    #[default]
    #[serde(other)]
    Unknown,
}

impl SourceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceStatus::Up => "up",
            SourceStatus::Degraded => "degraded",
            SourceStatus::Down => "down",
            SourceStatus::Unknown => "unknown",
        }
    }
}

/// Snapshot row from `/api/sources/health`, not a history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceHealth {
    #[serde(default)]
    pub source_name: String,
    #[serde(default)]
    pub feed_url: String,
    #[serde(default)]
    pub last_status: SourceStatus,
    #[serde(default)]
    pub consecutive_failures: u32,
    #[serde(default)]
    pub last_error: Option<String>,
    #[serde(default)]
    pub last_latency_ms: Option<u64>,
    #[serde(default)]
    pub last_items_count: u32,
    #[serde(default = "Utc::now", deserialize_with = "de_timestamp_or_now")]
    pub last_checked_at: DateTime<Utc>,
    #[serde(default, deserialize_with = "de_timestamp_opt")]
    pub last_success_at: Option<DateTime<Utc>>,
}

fn de_timestamp_or_now<'de, D>(de: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(de)?;
    Ok(raw
        .as_deref()
        .and_then(parse_timestamp)
        .unwrap_or_else(Utc::now))
}

fn de_timestamp_opt<'de, D>(de: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(de)?;
    Ok(raw.as_deref().and_then(parse_timestamp))
}

/// Aggregate counts of the backend retry queue; no per-item detail is
/// exposed to the client.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryMetrics {
    #[serde(default)]
    pub pending: u64,
    #[serde(default)]
    pub due: u64,
}

/// Enumerable vocabulary for the country/topic selectors. Legitimately
/// empty before the first load and after a failed one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterOptions {
    #[serde(default)]
    pub countries: Vec<String>,
    #[serde(default)]
    pub topics: Vec<String>,
}

/// Turn a canonical dash-separated label into display form,
/// e.g. `united-states` -> `United States`.
pub fn pretty_label(label: &str) -> String {
    label
        .split('-')
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
