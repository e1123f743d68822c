//! Error types for audit-feed

use thiserror::Error;

/// Errors that can occur while fetching or presenting the audit feed
#[derive(Debug, Error)]
pub enum FeedError {
    /// No API key is available (not yet authenticated)
    #[error("No API key available")]
    MissingCredential,

    /// Network-level failure reaching the audit API
    #[error("Failed to reach '{url}': {reason}")]
    Transport {
        url: String,
        reason: String,
    },

    /// Audit API answered with a non-success status
    #[error("Audit API returned {status} for '{url}': {body}")]
    Status {
        url: String,
        status: u16,
        body: String,
    },

    /// Response body could not be decoded into the expected shape
    #[error("Failed to decode response from '{url}': {reason}")]
    Decode {
        url: String,
        reason: String,
    },

    /// Serialization/deserialization failure outside of a response body
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl FeedError {
    /// True for failures that never produced an HTTP response
    pub fn is_transport(&self) -> bool {
        matches!(self, FeedError::Transport { .. })
    }

    /// True for failures where the API answered but the answer was unusable
    pub fn is_application(&self) -> bool {
        matches!(self, FeedError::Status { .. } | FeedError::Decode { .. })
    }
}

/// Result type alias for audit feed operations
pub type Result<T> = std::result::Result<T, FeedError>;
