//! # audit-feed
//!
//! Live audit feed for a guardrails/moderation API.
//!
//! ## Overview
//!
//! `audit-feed` keeps a local mirror of the server-side audit log
//! (allowed/blocked decisions, latency, reason, timestamp) and keeps it fresh:
//! it fetches once on activation, again whenever a new-entry signal is
//! published on the [`SignalBus`], every poll period as a safety net, and on
//! demand.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use audit_feed::{
//!     AuditFeedController, FeedConfig, HttpAuditClient, MemoryCredentialStore, Renderer,
//!     SignalBus, AUDIT_LOG_UPDATE,
//! };
//!
//! # async fn example() -> audit_feed::Result<()> {
//! let config = FeedConfig::new("https://guardrails.example.com/api/v1");
//! let client = Arc::new(HttpAuditClient::new(config.clone())?);
//! let credentials = Arc::new(MemoryCredentialStore::with_key("sk_live_123"));
//!
//! let controller = Arc::new(AuditFeedController::from_config(client, credentials, &config));
//! let bus = SignalBus::new();
//! let handle = controller.activate(&bus);
//!
//! // Somewhere else, after submitting a playground request:
//! bus.notify(AUDIT_LOG_UPDATE);
//!
//! let view = Renderer::local().feed(&controller.entries());
//! print!("{}", view.to_table(false));
//!
//! handle.deactivate().await;
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - **AuditClient** trait — read access to the audit API (HTTP or in-memory)
//! - **CredentialStore** trait — read-only view of the current API key
//! - **SignalBus** — named zero-payload publish/subscribe
//! - **AuditFeedController** — owns the feed state and runs refreshes
//! - **Renderer** — derives badges, latency, reason and local time for display

pub mod client;
pub mod config;
pub mod controller;
pub mod credential;
pub mod error;
pub mod render;
pub mod signal;
pub mod types;

// Re-export core types
pub use client::{AuditClient, API_KEY_HEADER, LOGS_PATH, STATS_PATH};
pub use config::FeedConfig;
pub use controller::{AuditFeedController, FeedHandle, RefreshOutcome, Trigger};
pub use credential::{CredentialStore, MemoryCredentialStore};
pub use error::{FeedError, Result};
pub use render::{Badge, FeedView, Renderer, RowView};
pub use signal::{SignalBus, SignalSubscription, AUDIT_LOG_UPDATE};
pub use types::{AuditLogEntry, AuditStats, EntryId, FeedState};

// Re-export clients for convenience
pub use client::http::HttpAuditClient;
pub use client::memory::{MemoryAuditClient, Reply};
