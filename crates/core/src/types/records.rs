//! Records exchanged with the monitoring backend.
//!
//! Field names follow the backend's JSON. Optional fields are tolerant of
//! both missing keys and explicit `null`s.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use super::id::{AnalysisId, NotificationId, UserId};
use super::status::RiskStatus;

/// A monitored user as returned by `/patients` and `/users`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientRecord {
    pub id: UserId,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient_age")]
    pub age: Option<u32>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub medical_history: Option<String>,
    #[serde(default)]
    pub social_media_handle: Option<String>,
    #[serde(default)]
    pub status: RiskStatus,
    /// Timestamp of the most recent analysis, as sent by the backend.
    #[serde(default)]
    pub last_update: Option<String>,
}

/// `/users` returns the same shape as `/patients`.
pub type UserRecord = PatientRecord;

/// One slice of the risk distribution chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskSlice {
    pub name: String,
    pub value: u64,
    pub color: String,
}

/// One point of the average-score trend line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendPoint {
    pub date: String,
    #[serde(rename = "avgScore")]
    pub avg_score: f64,
}

/// Server-derived analytics. Never mutated client-side.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AnalyticsSnapshot {
    #[serde(default)]
    pub risk_distribution: Vec<RiskSlice>,
    #[serde(default)]
    pub trend_data: Vec<TrendPoint>,
}

/// An unread alert raised by the backend (typically for a RED analysis).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: NotificationId,
    pub message: String,
    pub timestamp: String,
    #[serde(default)]
    pub user_id: Option<UserId>,
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub content_preview: Option<String>,
    #[serde(default)]
    pub is_read: bool,
}

/// Verdict of a link found inside an analysed message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UrlAnalysis {
    pub url: String,
    #[serde(default)]
    pub analysis: serde_json::Value,
}

/// Output of `/analyze` and `/analyze-image`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    #[serde(default)]
    pub level: RiskStatus,
    /// Risk score on a 0-10 scale.
    #[serde(default)]
    pub score: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub reason: String,
    #[serde(default)]
    pub recommendation: Option<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub media_context: Option<String>,
    #[serde(default)]
    pub url_analyses: Vec<UrlAnalysis>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub user_id: Option<UserId>,
}

/// One row of `/history/:userId`, newest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    #[serde(default)]
    pub id: Option<AnalysisId>,
    pub timestamp: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub content: String,
    #[serde(default)]
    pub result_level: RiskStatus,
    #[serde(default)]
    pub score: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub reason: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub recommendation: Option<String>,
}

/// A high-risk case from `/export/red-cases`.
///
/// Older backends export spreadsheet-style column names (`ID`, `Name`,
/// `Risk_Reason`, `Last_Update`); both spellings are accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RedCase {
    #[serde(alias = "ID")]
    pub user_id: UserId,
    #[serde(default, alias = "Name")]
    pub name: Option<String>,
    #[serde(default)]
    pub score: f64,
    #[serde(default, alias = "Risk_Reason", deserialize_with = "null_as_default")]
    pub reason: String,
    #[serde(default, alias = "Last_Update")]
    pub timestamp: Option<String>,
}

/// `/health` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendHealth {
    pub status: String,
    #[serde(default)]
    pub ai_ready: bool,
    #[serde(default)]
    pub db: Option<String>,
}

/// Parse a backend timestamp.
///
/// The backend emits naive ISO-8601 (`2025-01-31T10:20:30.123456`), which
/// is interpreted as UTC. RFC 3339 timestamps are accepted as well.
#[must_use]
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Ages typed into intake forms may round-trip as strings.
fn lenient_age<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match raw {
        Some(serde_json::Value::Number(n)) => n.as_u64().and_then(|v| u32::try_from(v).ok()),
        Some(serde_json::Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
