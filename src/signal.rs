//! Process-wide publish/subscribe channel for zero-payload named signals
//!
//! Producers (the playground submission flow) call `notify` after creating
//! an audit entry; consumers (the audit feed) hold a `SignalSubscription`
//! for as long as they are active. Dropping the subscription unsubscribes.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;

/// Signal broadcast when a new audit entry likely exists
pub const AUDIT_LOG_UPDATE: &str = "audit-log-update";

const DEFAULT_CAPACITY: usize = 64;

/// Named signal bus
///
/// Cheap to clone; all clones share the same channels.
#[derive(Debug, Clone)]
pub struct SignalBus {
    channels: Arc<RwLock<HashMap<String, broadcast::Sender<()>>>>,
    capacity: usize,
}

impl Default for SignalBus {
    fn default() -> Self {
        Self::new()
    }
}

impl SignalBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a bus whose per-signal backlog holds `capacity` undelivered signals
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            channels: Arc::new(RwLock::new(HashMap::new())),
            capacity: capacity.max(1),
        }
    }

    /// Broadcast a signal, returning how many subscribers were notified
    pub fn publish(&self, name: &str) -> usize {
        let sent = {
            let channels = self.channels.read().unwrap_or_else(|e| e.into_inner());
            match channels.get(name) {
                Some(tx) => tx.send(()).ok(),
                None => return 0,
            }
        };

        // send only fails when nobody is listening
        sent.unwrap_or_else(|| {
            self.prune();
            0
        })
    }

    /// Broadcast a signal, logging the fan-out
    pub fn notify(&self, name: &str) {
        let receivers = self.publish(name);
        tracing::debug!(signal = %name, receivers, "Signal published");
    }

    /// Subscribe to a named signal
    pub fn subscribe(&self, name: &str) -> SignalSubscription {
        let rx = {
            let mut channels = self.channels.write().unwrap_or_else(|e| e.into_inner());
            channels.retain(|_, tx| tx.receiver_count() > 0);
            channels
                .entry(name.to_string())
                .or_insert_with(|| broadcast::channel(self.capacity).0)
                .subscribe()
        };

        tracing::debug!(signal = %name, "Signal subscription created");

        SignalSubscription {
            name: name.to_string(),
            rx,
        }
    }

    /// Number of signal names that currently have a channel
    pub fn signal_count(&self) -> usize {
        self.channels.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Drop channels whose subscribers are all gone
    fn prune(&self) {
        let mut channels = self.channels.write().unwrap_or_else(|e| e.into_inner());
        channels.retain(|_, tx| tx.receiver_count() > 0);
    }

    /// Number of live subscriptions for a signal
    pub fn subscriber_count(&self, name: &str) -> usize {
        let channels = self.channels.read().unwrap_or_else(|e| e.into_inner());
        channels.get(name).map(|tx| tx.receiver_count()).unwrap_or(0)
    }
}

/// Handle receiving one named signal
#[derive(Debug)]
pub struct SignalSubscription {
    name: String,
    rx: broadcast::Receiver<()>,
}

impl SignalSubscription {
    /// Signal name this subscription listens to
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Wait for the next signal
    ///
    /// Returns how many signals this wake-up accounts for: 1 normally, or the
    /// number of dropped signals when the subscriber fell behind the backlog.
    /// Returns `None` once every bus handle has been dropped.
    pub async fn next(&mut self) -> Option<u64> {
        match self.rx.recv().await {
            Ok(()) => Some(1),
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(signal = %self.name, skipped, "Signal subscriber lagged");
                Some(skipped)
            }
            Err(RecvError::Closed) => None,
        }
    }

    /// Stop receiving signals
    pub fn unsubscribe(self) {
        tracing::debug!(signal = %self.name, "Signal subscription released");
    }
}
