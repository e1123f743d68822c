//! Presentation of the audit feed
//!
//! Everything here is derived from `AuditLogEntry` values; nothing is stored.
//! Timestamps from the API carry no zone suffix and are interpreted as UTC,
//! then shown as a time of day in the renderer's display zone.

use crate::types::{AuditLogEntry, EntryId};
use chrono::{DateTime, Local, TimeZone, Utc};
use colored::Colorize;
use std::fmt;

/// Latency above which a row is flagged as elevated
pub const DEFAULT_LATENCY_THRESHOLD_MS: f64 = 200.0;

/// Shown in the reason column when an entry carries no annotation
pub const SAFE_REASON_PLACEHOLDER: &str = "Safe Request";

/// Empty-state headline
pub const EMPTY_TITLE: &str = "No logs found yet";

/// Empty-state hint
pub const EMPTY_HINT: &str = "Send a request from the Playground to see it appear here!";

/// Allowed/blocked status badge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Badge {
    Allowed,
    Blocked,
}

impl Badge {
    pub fn for_entry(entry: &AuditLogEntry) -> Self {
        if entry.is_safe {
            Badge::Allowed
        } else {
            Badge::Blocked
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Badge::Allowed => "ALLOWED",
            Badge::Blocked => "BLOCKED",
        }
    }
}

impl fmt::Display for Badge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Display values for one entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowView {
    pub id: EntryId,
    pub badge: Badge,
    /// Latency rounded to the nearest millisecond, e.g. `"45ms"`
    pub latency: String,
    /// Latency exceeds the threshold
    pub latency_elevated: bool,
    /// Reason text, or the safe-request placeholder
    pub reason: String,
    /// False when `reason` is the placeholder
    pub has_reason: bool,
    /// Time of day in the display zone, or the raw timestamp if unparseable
    pub time: String,
}

/// Display model for the whole feed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedView {
    /// No entries: show the empty-state placeholder
    Empty,
    Rows(Vec<RowView>),
}

/// Turns entries into display rows for a given time zone
#[derive(Debug, Clone)]
pub struct Renderer<Tz: TimeZone> {
    tz: Tz,
    latency_threshold_ms: f64,
}

impl Renderer<Local> {
    /// Renderer using the machine's local time zone
    pub fn local() -> Self {
        Self::new(Local)
    }
}

impl<Tz: TimeZone> Renderer<Tz>
where
    Tz::Offset: fmt::Display,
{
    pub fn new(tz: Tz) -> Self {
        Self {
            tz,
            latency_threshold_ms: DEFAULT_LATENCY_THRESHOLD_MS,
        }
    }

    pub fn with_latency_threshold(mut self, threshold_ms: f64) -> Self {
        self.latency_threshold_ms = threshold_ms;
        self
    }

    pub fn row(&self, entry: &AuditLogEntry) -> RowView {
        let (reason, has_reason) = match entry.reason_text() {
            Some(text) => (text.to_string(), true),
            None => (SAFE_REASON_PLACEHOLDER.to_string(), false),
        };

        RowView {
            id: entry.id.clone(),
            badge: Badge::for_entry(entry),
            latency: format_latency(entry.latency_ms),
            latency_elevated: entry.latency_ms > self.latency_threshold_ms,
            reason,
            has_reason,
            time: self.time_of_day(&entry.timestamp),
        }
    }

    /// Rows in entry order, or `FeedView::Empty`
    pub fn feed(&self, entries: &[AuditLogEntry]) -> FeedView {
        if entries.is_empty() {
            return FeedView::Empty;
        }
        FeedView::Rows(entries.iter().map(|e| self.row(e)).collect())
    }

    fn time_of_day(&self, raw: &str) -> String {
        match parse_utc_timestamp(raw) {
            Some(utc) => utc.with_timezone(&self.tz).format("%H:%M:%S").to_string(),
            None => {
                tracing::debug!(timestamp = %raw, "Unparseable audit timestamp");
                raw.to_string()
            }
        }
    }
}

/// Interpret an API timestamp as UTC
///
/// Zone-less timestamps get a `Z` appended; timestamps that already carry an
/// offset are honoured as-is.
pub fn parse_utc_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    DateTime::parse_from_rfc3339(&format!("{}Z", raw))
        .or_else(|_| DateTime::parse_from_rfc3339(raw))
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
}

/// Latency rounded to the nearest whole millisecond
pub fn format_latency(latency_ms: f64) -> String {
    format!("{}ms", latency_ms.round() as i64)
}

impl FeedView {
    pub fn is_empty(&self) -> bool {
        matches!(self, FeedView::Empty)
    }

    pub fn rows(&self) -> &[RowView] {
        match self {
            FeedView::Empty => &[],
            FeedView::Rows(rows) => rows,
        }
    }

    /// Render as a plain-text table
    ///
    /// With `color`, badges are green/red, elevated latency is yellow and
    /// the placeholder is dimmed; without it, elevated latency is marked `!`.
    pub fn to_table(&self, color: bool) -> String {
        let rows = match self {
            FeedView::Empty => return format!("{}\n{}\n", EMPTY_TITLE, EMPTY_HINT),
            FeedView::Rows(rows) => rows,
        };

        let latency_cell = |row: &RowView| {
            if row.latency_elevated && !color {
                format!("{} !", row.latency)
            } else {
                row.latency.clone()
            }
        };

        let status_w = "STATUS".len().max(Badge::Allowed.label().len());
        let latency_w = rows
            .iter()
            .map(|r| latency_cell(r).len())
            .chain(std::iter::once("LATENCY".len()))
            .max()
            .unwrap_or_default();
        let reason_w = rows
            .iter()
            .map(|r| r.reason.chars().count())
            .chain(std::iter::once("REASON".len()))
            .max()
            .unwrap_or_default();

        let mut out = String::new();
        let header = format!(
            "{:<status_w$}  {:<latency_w$}  {:<reason_w$}  TIME",
            "STATUS", "LATENCY", "REASON"
        );
        out.push_str(&if color {
            header.bold().to_string()
        } else {
            header
        });
        out.push('\n');

        for row in rows {
            let status = format!("{:<status_w$}", row.badge.label());
            let latency = format!("{:<latency_w$}", latency_cell(row));
            let pad = reason_w.saturating_sub(row.reason.chars().count());
            let reason = format!("{}{}", row.reason, " ".repeat(pad));

            if color {
                let status = match row.badge {
                    Badge::Allowed => status.green().bold(),
                    Badge::Blocked => status.red().bold(),
                };
                let latency = if row.latency_elevated {
                    latency.yellow()
                } else {
                    latency.normal()
                };
                let reason = if row.has_reason {
                    reason.normal()
                } else {
                    reason.dimmed()
                };
                out.push_str(&format!(
                    "{}  {}  {}  {}\n",
                    status,
                    latency,
                    reason,
                    row.time.dimmed()
                ));
            } else {
                out.push_str(&format!("{}  {}  {}  {}\n", status, latency, reason, row.time));
            }
        }

        out
    }
}
