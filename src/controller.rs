//! Audit feed controller — keeps a freshness-bounded local mirror of the
//! server-side audit log
//!
//! Every trigger (activation, bus signal, poll tick, manual request) runs the
//! same `refresh()`. Refreshes are independent tasks and may overlap; each
//! takes a ticket before dispatch and its response is applied only if no
//! newer response has been applied already.

use crate::client::AuditClient;
use crate::config::FeedConfig;
use crate::credential::CredentialStore;
use crate::signal::{SignalBus, SignalSubscription, AUDIT_LOG_UPDATE};
use crate::types::{AuditLogEntry, FeedState};
use chrono::Utc;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior};

/// Shortest accepted poll period
pub const MIN_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// What caused a refresh
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// Controller activation
    Mount,
    /// Update signal from the bus
    Signal,
    /// Safety-net poll tick
    Timer,
    /// User-initiated refresh
    Manual,
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Trigger::Mount => "mount",
            Trigger::Signal => "signal",
            Trigger::Timer => "timer",
            Trigger::Manual => "manual",
        })
    }
}

/// Result of a single refresh attempt
#[derive(Debug, Clone, PartialEq)]
pub enum RefreshOutcome {
    /// Entries were replaced with the response
    Applied { count: usize, sequence: u64 },
    /// No API key; nothing was fetched
    Skipped,
    /// A newer response was already applied; this one was discarded
    Superseded { sequence: u64 },
    /// Fetch failed; previous entries retained
    Failed { reason: String },
}

impl RefreshOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, RefreshOutcome::Applied { .. })
    }
}

/// Owns the feed state and performs refreshes
pub struct AuditFeedController {
    client: Arc<dyn AuditClient>,
    credentials: Arc<dyn CredentialStore>,
    state: watch::Sender<FeedState>,
    tickets: AtomicU64,
    poll_interval: Duration,
    update_signal: String,
}

impl AuditFeedController {
    /// Create a controller with a 60s poll and the `audit-log-update` signal
    pub fn new(client: Arc<dyn AuditClient>, credentials: Arc<dyn CredentialStore>) -> Self {
        let (state, _) = watch::channel(FeedState::default());
        Self {
            client,
            credentials,
            state,
            tickets: AtomicU64::new(0),
            poll_interval: FeedConfig::default().poll_interval(),
            update_signal: AUDIT_LOG_UPDATE.to_string(),
        }
    }

    /// Create a controller using the poll period and signal name from `config`
    pub fn from_config(
        client: Arc<dyn AuditClient>,
        credentials: Arc<dyn CredentialStore>,
        config: &FeedConfig,
    ) -> Self {
        Self::new(client, credentials)
            .with_poll_interval(config.poll_interval())
            .with_update_signal(config.update_signal.clone())
    }

    /// Set the safety-net poll period (clamped to `MIN_POLL_INTERVAL`)
    pub fn with_poll_interval(mut self, period: Duration) -> Self {
        self.poll_interval = period.max(MIN_POLL_INTERVAL);
        self
    }

    pub fn with_update_signal(mut self, name: impl Into<String>) -> Self {
        self.update_signal = name.into();
        self
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn update_signal(&self) -> &str {
        &self.update_signal
    }

    /// Copy of the current feed state
    pub fn snapshot(&self) -> FeedState {
        self.state.borrow().clone()
    }

    /// Copy of the current entries
    pub fn entries(&self) -> Vec<AuditLogEntry> {
        self.state.borrow().entries.clone()
    }

    /// Receiver notified every time entries are replaced
    pub fn watch(&self) -> watch::Receiver<FeedState> {
        self.state.subscribe()
    }

    /// Fetch the audit log once and replace the local entries on success
    ///
    /// Never fails: a missing credential is a silent no-op and fetch errors
    /// are logged and leave the entries untouched.
    pub async fn refresh(&self) -> RefreshOutcome {
        let Some(api_key) = self.credentials.api_key() else {
            tracing::debug!("No API key available, skipping audit feed refresh");
            return RefreshOutcome::Skipped;
        };

        let ticket = self.tickets.fetch_add(1, Ordering::SeqCst) + 1;

        match self.client.fetch_logs(&api_key).await {
            Ok(entries) => self.apply(ticket, entries),
            Err(e) => {
                tracing::warn!(
                    client = %self.client.name(),
                    ticket,
                    error = %e,
                    "Failed to fetch audit logs"
                );
                RefreshOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        }
    }

    fn apply(&self, ticket: u64, entries: Vec<AuditLogEntry>) -> RefreshOutcome {
        let count = entries.len();

        let applied = self.state.send_if_modified(|state| {
            if ticket <= state.sequence {
                return false;
            }
            state.entries = entries;
            state.sequence = ticket;
            state.last_updated = Some(Utc::now());
            true
        });

        if applied {
            tracing::debug!(ticket, entries = count, "Audit feed refreshed");
            RefreshOutcome::Applied {
                count,
                sequence: ticket,
            }
        } else {
            tracing::debug!(ticket, "Discarding superseded audit feed response");
            RefreshOutcome::Superseded { sequence: ticket }
        }
    }

    /// Run `refresh()` as an independent task
    pub fn spawn_refresh(self: &Arc<Self>, trigger: Trigger) -> JoinHandle<RefreshOutcome> {
        let controller = Arc::clone(self);
        tokio::spawn(async move {
            let outcome = controller.refresh().await;
            tracing::trace!(%trigger, ?outcome, "Refresh finished");
            outcome
        })
    }

    /// Activate the feed: fetch now, then refresh on every bus signal and
    /// every poll period until the returned handle is deactivated or dropped
    pub fn activate(self: &Arc<Self>, bus: &SignalBus) -> FeedHandle {
        let subscription = bus.subscribe(&self.update_signal);
        let mut ticker = tokio::time::interval_at(
            Instant::now() + self.poll_interval,
            self.poll_interval,
        );
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mount = self.spawn_refresh(Trigger::Mount);
        let listener = tokio::spawn(listen(Arc::clone(self), subscription));
        let poller = tokio::spawn(poll(Arc::clone(self), ticker));

        tracing::info!(
            signal = %self.update_signal,
            poll_secs = self.poll_interval.as_secs(),
            "Audit feed activated"
        );

        FeedHandle {
            controller: Arc::clone(self),
            mount: Some(mount),
            tasks: vec![listener, poller],
        }
    }
}

async fn listen(controller: Arc<AuditFeedController>, mut subscription: SignalSubscription) {
    // a lagged wake-up accounts for several signals; each gets its own refresh
    while let Some(signals) = subscription.next().await {
        for _ in 0..signals {
            controller.spawn_refresh(Trigger::Signal);
        }
    }
    tracing::debug!(signal = %subscription.name(), "Signal bus closed, listener stopped");
}

async fn poll(controller: Arc<AuditFeedController>, mut ticker: Interval) {
    loop {
        ticker.tick().await;
        controller.spawn_refresh(Trigger::Timer);
    }
}

/// Handle to an activated feed
///
/// Holds the bus subscription and the poll timer. Deactivating (or dropping)
/// the handle releases both; refreshes already dispatched run to completion.
pub struct FeedHandle {
    controller: Arc<AuditFeedController>,
    mount: Option<JoinHandle<RefreshOutcome>>,
    tasks: Vec<JoinHandle<()>>,
}

impl FeedHandle {
    pub fn controller(&self) -> &Arc<AuditFeedController> {
        &self.controller
    }

    /// Wait for the activation-time fetch
    ///
    /// Returns `None` if it was already awaited or the task panicked.
    pub async fn initial_load(&mut self) -> Option<RefreshOutcome> {
        let mount = self.mount.take()?;
        mount.await.ok()
    }

    /// User-initiated refresh
    pub fn refresh_now(&self) -> JoinHandle<RefreshOutcome> {
        self.controller.spawn_refresh(Trigger::Manual)
    }

    /// True while the signal listener or poll timer is still running
    pub fn is_active(&self) -> bool {
        self.tasks.iter().any(|task| !task.is_finished())
    }

    /// Release the bus subscription and cancel the poll timer
    ///
    /// Returns once both are gone, so no further trigger can fire.
    pub async fn deactivate(mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
            // cancellation is the expected result
            let _ = task.await;
        }
        tracing::info!("Audit feed deactivated");
    }
}

impl Drop for FeedHandle {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}
