//! Core audit feed types
//!
//! Wire types use the snake_case field names the guardrails API emits.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of an audit log entry
///
/// The API issues integer ids; string ids are tolerated so a backend swap
/// does not break the feed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntryId {
    Number(i64),
    Text(String),
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryId::Number(n) => write!(f, "{}", n),
            EntryId::Text(s) => f.write_str(s),
        }
    }
}

/// One recorded moderation decision, as returned by `GET /audit/logs`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditLogEntry {
    /// Stable identifier, used as the display key
    pub id: EntryId,

    /// True when the request was allowed, false when blocked
    pub is_safe: bool,

    /// Processing time of the original request in milliseconds
    pub latency_ms: f64,

    /// Optional explanation; `None` or empty means "no annotation"
    #[serde(default)]
    pub reason: Option<String>,

    /// ISO-8601 date-time without a timezone suffix, implicitly UTC
    pub timestamp: String,

    /// Model that served the original request
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// PII categories detected in the original request
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pii_detected: Vec<String>,
}

impl AuditLogEntry {
    /// The annotation, if present and non-empty
    pub fn reason_text(&self) -> Option<&str> {
        self.reason.as_deref().filter(|r| !r.is_empty())
    }
}

/// Aggregated usage statistics, as returned by `GET /audit/stats`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuditStats {
    pub total_requests: u64,
    pub blocked_requests: u64,
    /// Percentage of blocked requests (0–100)
    pub block_rate: f64,
    /// Mean latency in milliseconds, rounded to 2 decimals
    pub avg_latency: f64,
}

impl AuditStats {
    /// Compute statistics over a set of entries
    pub fn from_entries(entries: &[AuditLogEntry]) -> Self {
        let total = entries.len() as u64;
        if total == 0 {
            return Self::default();
        }

        let blocked = entries.iter().filter(|e| !e.is_safe).count() as u64;
        let latency_sum: f64 = entries.iter().map(|e| e.latency_ms).sum();
        let avg = latency_sum / total as f64;

        Self {
            total_requests: total,
            blocked_requests: blocked,
            block_rate: blocked as f64 / total as f64 * 100.0,
            avg_latency: (avg * 100.0).round() / 100.0,
        }
    }
}

/// Local mirror of the server-side audit log
///
/// `entries` is only ever replaced wholesale.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedState {
    /// Entries in server response order
    pub entries: Vec<AuditLogEntry>,

    /// Ticket of the fetch that produced `entries` (0 = never loaded)
    pub sequence: u64,

    /// When `entries` was last replaced
    pub last_updated: Option<DateTime<Utc>>,
}

impl FeedState {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}
