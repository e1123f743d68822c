//! Audit feed configuration

use crate::error::{FeedError, Result};
use crate::signal::AUDIT_LOG_UPDATE;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Environment variable holding the audit API base URL
pub const ENV_API_URL: &str = "AUDIT_FEED_API_URL";
/// Environment variable overriding the safety-net poll period (seconds)
pub const ENV_POLL_SECS: &str = "AUDIT_FEED_POLL_SECS";
/// Environment variable overriding the elevated-latency threshold (ms)
pub const ENV_LATENCY_THRESHOLD_MS: &str = "AUDIT_FEED_LATENCY_THRESHOLD_MS";
/// Environment variable overriding the HTTP request timeout (seconds)
pub const ENV_TIMEOUT_SECS: &str = "AUDIT_FEED_TIMEOUT_SECS";

/// Configuration for the audit feed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    /// Base URL of the guardrails API (e.g. `https://api.example.com/api/v1`)
    ///
    /// No default. An empty value is rejected by `validate()`.
    #[serde(default)]
    pub base_url: String,

    /// Safety-net poll period in seconds (default: 60)
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Latency above which a row is flagged as elevated (default: 200ms)
    #[serde(default = "default_latency_threshold_ms")]
    pub latency_threshold_ms: f64,

    /// HTTP request timeout in seconds (default: 10)
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Name of the bus signal announcing a new audit entry
    #[serde(default = "default_update_signal")]
    pub update_signal: String,
}

fn default_poll_interval_secs() -> u64 {
    60
}

fn default_latency_threshold_ms() -> f64 {
    200.0
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_update_signal() -> String {
    AUDIT_LOG_UPDATE.to_string()
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            poll_interval_secs: default_poll_interval_secs(),
            latency_threshold_ms: default_latency_threshold_ms(),
            request_timeout_secs: default_request_timeout_secs(),
            update_signal: default_update_signal(),
        }
    }
}

impl FeedConfig {
    /// Create a config pointing at the given base URL, other fields defaulted
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup
    ///
    /// Unset keys keep their defaults; malformed numbers are errors.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(url) = lookup(ENV_API_URL) {
            config.base_url = url.trim().to_string();
        }
        if let Some(raw) = lookup(ENV_POLL_SECS) {
            config.poll_interval_secs = parse_var(ENV_POLL_SECS, &raw)?;
        }
        if let Some(raw) = lookup(ENV_LATENCY_THRESHOLD_MS) {
            config.latency_threshold_ms = parse_var(ENV_LATENCY_THRESHOLD_MS, &raw)?;
        }
        if let Some(raw) = lookup(ENV_TIMEOUT_SECS) {
            config.request_timeout_secs = parse_var(ENV_TIMEOUT_SECS, &raw)?;
        }

        Ok(config)
    }

    /// Check the configuration is usable
    pub fn validate(&self) -> Result<()> {
        if self.base_url.trim().is_empty() {
            return Err(FeedError::Config(format!(
                "API base URL is not set (export {})",
                ENV_API_URL
            )));
        }
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(FeedError::Config(format!(
                "API base URL must start with http:// or https://, got '{}'",
                self.base_url
            )));
        }
        if self.poll_interval_secs == 0 {
            return Err(FeedError::Config(
                "poll interval must be at least 1 second".to_string(),
            ));
        }
        if self.request_timeout_secs == 0 {
            return Err(FeedError::Config(
                "request timeout must be at least 1 second".to_string(),
            ));
        }
        if !self.latency_threshold_ms.is_finite() || self.latency_threshold_ms < 0.0 {
            return Err(FeedError::Config(format!(
                "latency threshold must be a non-negative number, got {}",
                self.latency_threshold_ms
            )));
        }
        if self.update_signal.is_empty() {
            return Err(FeedError::Config("update signal name is empty".to_string()));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Full URL for an API path, tolerating a trailing slash on the base
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e| FeedError::Config(format!("Invalid value '{}' for {}: {}", raw, key, e)))
}
