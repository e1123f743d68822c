//! In-memory audit client for testing and single-process use
//!
//! Serves a mutable log, or scripted replies queued ahead of time. Every
//! call is recorded so callers can assert how many requests were issued.

use super::{AuditClient, LOGS_PATH};
use crate::error::{FeedError, Result};
use crate::types::{AuditLogEntry, AuditStats};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// A scripted reply to one `fetch_logs` call
#[derive(Debug, Clone)]
pub enum Reply {
    /// Successful response with these entries
    Entries(Vec<AuditLogEntry>),
    /// Network-level failure
    Unreachable(String),
    /// Non-success HTTP status
    Status(u16),
    /// Body that does not decode as a list of entries
    Malformed,
    /// Resolve the inner reply after a delay
    Delayed(Duration, Box<Reply>),
}

impl Reply {
    pub fn delayed(delay: Duration, reply: Reply) -> Self {
        Reply::Delayed(delay, Box::new(reply))
    }
}

/// In-memory audit client
#[derive(Debug, Default)]
pub struct MemoryAuditClient {
    logs: Mutex<Vec<AuditLogEntry>>,
    script: Mutex<VecDeque<Reply>>,
    keys: Mutex<Vec<String>>,
    calls: AtomicUsize,
}

impl MemoryAuditClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a client serving the given log
    pub fn with_logs(logs: Vec<AuditLogEntry>) -> Self {
        let client = Self::new();
        client.set_logs(logs);
        client
    }

    /// Replace the served log
    pub fn set_logs(&self, logs: Vec<AuditLogEntry>) {
        *self.logs.lock().unwrap_or_else(|e| e.into_inner()) = logs;
    }

    /// Queue a reply for the next unscripted call
    ///
    /// Queued replies are consumed in call order; once the queue is empty
    /// the served log is returned.
    pub fn push_reply(&self, reply: Reply) {
        self.script
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(reply);
    }

    /// Number of `fetch_logs` calls received
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// API keys presented, in call order
    pub fn keys_seen(&self) -> Vec<String> {
        self.keys.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn next_reply(&self) -> Reply {
        let scripted = self
            .script
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front();
        scripted.unwrap_or_else(|| Reply::Entries(self.current_logs()))
    }

    fn current_logs(&self) -> Vec<AuditLogEntry> {
        self.logs.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

fn memory_url(path: &str) -> String {
    format!("memory://{}", path)
}

async fn resolve(mut reply: Reply) -> Result<Vec<AuditLogEntry>> {
    loop {
        return match reply {
            Reply::Delayed(delay, inner) => {
                tokio::time::sleep(delay).await;
                reply = *inner;
                continue;
            }
            Reply::Entries(entries) => Ok(entries),
            Reply::Unreachable(reason) => Err(FeedError::Transport {
                url: memory_url(LOGS_PATH),
                reason,
            }),
            Reply::Status(status) => Err(FeedError::Status {
                url: memory_url(LOGS_PATH),
                status,
                body: String::new(),
            }),
            Reply::Malformed => Err(FeedError::Decode {
                url: memory_url(LOGS_PATH),
                reason: "expected a JSON array of audit entries".to_string(),
            }),
        };
    }
}

#[async_trait]
impl AuditClient for MemoryAuditClient {
    async fn fetch_logs(&self, api_key: &str) -> Result<Vec<AuditLogEntry>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.keys
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(api_key.to_string());

        let reply = self.next_reply();
        resolve(reply).await
    }

    async fn fetch_stats(&self, _api_key: &str) -> Result<AuditStats> {
        Ok(AuditStats::from_entries(&self.current_logs()))
    }

    fn name(&self) -> &str {
        "memory"
    }
}
