//! HTTP audit client backed by reqwest

use super::{AuditClient, API_KEY_HEADER, LOGS_PATH, STATS_PATH};
use crate::config::FeedConfig;
use crate::error::{FeedError, Result};
use crate::types::{AuditLogEntry, AuditStats};
use async_trait::async_trait;
use serde::de::DeserializeOwned;

/// Audit client for the guardrails HTTP API
pub struct HttpAuditClient {
    http: reqwest::Client,
    config: FeedConfig,
}

impl HttpAuditClient {
    /// Build a client from a validated configuration
    pub fn new(config: FeedConfig) -> Result<Self> {
        config.validate()?;

        let http = reqwest::Client::builder()
            .user_agent(concat!("audit-feed/", env!("CARGO_PKG_VERSION")))
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| FeedError::Config(format!("Failed to build HTTP client: {}", e)))?;

        tracing::debug!(base_url = %config.base_url, "Audit HTTP client ready");

        Ok(Self { http, config })
    }

    pub fn config(&self) -> &FeedConfig {
        &self.config
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, api_key: &str) -> Result<T> {
        let url = self.config.endpoint(path);

        let response = self
            .http
            .get(&url)
            .header(API_KEY_HEADER, api_key)
            .send()
            .await
            .map_err(|e| FeedError::Transport {
                url: url.clone(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FeedError::Status {
                url,
                status: status.as_u16(),
                body,
            });
        }

        let body = response.bytes().await.map_err(|e| FeedError::Transport {
            url: url.clone(),
            reason: e.to_string(),
        })?;

        serde_json::from_slice(&body).map_err(|e| FeedError::Decode {
            url,
            reason: e.to_string(),
        })
    }
}

#[async_trait]
impl AuditClient for HttpAuditClient {
    async fn fetch_logs(&self, api_key: &str) -> Result<Vec<AuditLogEntry>> {
        let entries: Vec<AuditLogEntry> = self.get_json(LOGS_PATH, api_key).await?;
        tracing::trace!(count = entries.len(), "Fetched audit logs");
        Ok(entries)
    }

    async fn fetch_stats(&self, api_key: &str) -> Result<AuditStats> {
        self.get_json(STATS_PATH, api_key).await
    }

    fn name(&self) -> &str {
        "http"
    }
}
