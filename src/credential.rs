//! Credential access for the audit feed
//!
//! The feed only ever reads the API key. Whoever owns the session (login,
//! logout) writes it through a concrete store; the controller receives a
//! `CredentialStore` capability and reads it fresh on every refresh.

use std::sync::RwLock;

/// Read-only accessor for the current API key
pub trait CredentialStore: Send + Sync {
    /// The current API key, or `None` when not authenticated
    fn api_key(&self) -> Option<String>;
}

/// In-memory credential store
///
/// Empty or whitespace-only keys are treated as absent.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    key: RwLock<Option<String>>,
}

impl MemoryCredentialStore {
    /// Create an empty (logged out) store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store already holding a key
    pub fn with_key(key: impl Into<String>) -> Self {
        let store = Self::new();
        store.login(key);
        store
    }

    /// Create a store holding `key` if one is given
    pub fn from_option(key: Option<String>) -> Self {
        let store = Self::new();
        if let Some(key) = key {
            store.login(key);
        }
        store
    }

    /// Store a key
    pub fn login(&self, key: impl Into<String>) {
        let key = key.into();
        let mut guard = self.key.write().unwrap_or_else(|e| e.into_inner());
        *guard = if key.trim().is_empty() { None } else { Some(key) };
        tracing::debug!(authenticated = guard.is_some(), "Credential updated");
    }

    /// Forget the stored key
    pub fn logout(&self) {
        let mut guard = self.key.write().unwrap_or_else(|e| e.into_inner());
        *guard = None;
        tracing::debug!("Credential cleared");
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn api_key(&self) -> Option<String> {
        self.key
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}
