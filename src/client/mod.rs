//! Audit API client trait — the seam between the feed and the guardrails API
//!
//! The controller only talks to an `AuditClient`. The HTTP implementation
//! talks to the real API; the in-memory implementation serves scripted
//! replies for tests and demos.

use crate::error::Result;
use crate::types::{AuditLogEntry, AuditStats};
use async_trait::async_trait;

pub mod http;
pub mod memory;

/// Path of the audit-log endpoint, relative to the API base URL
pub const LOGS_PATH: &str = "audit/logs";

/// Path of the usage-statistics endpoint, relative to the API base URL
pub const STATS_PATH: &str = "audit/stats";

/// Header carrying the API key
pub const API_KEY_HEADER: &str = "x-api-key";

/// Read access to the audit API
#[async_trait]
pub trait AuditClient: Send + Sync {
    /// Fetch the current audit log, in server order
    ///
    /// Issues exactly one read request.
    async fn fetch_logs(&self, api_key: &str) -> Result<Vec<AuditLogEntry>>;

    /// Fetch aggregated usage statistics
    async fn fetch_stats(&self, api_key: &str) -> Result<AuditStats>;

    /// Client name (e.g., "http", "memory")
    fn name(&self) -> &str;
}
