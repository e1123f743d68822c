//! Audit feed lifecycle integration tests
//!
//! End-to-end tests exercising activation, every refresh trigger, teardown,
//! and rendering with the in-memory audit client.

use audit_feed::{
    AuditFeedController, AuditLogEntry, Badge, FeedView, MemoryAuditClient,
    MemoryCredentialStore, RefreshOutcome, Renderer, Reply, SignalBus, AUDIT_LOG_UPDATE,
};
use audit_feed::render::{EMPTY_TITLE, SAFE_REASON_PLACEHOLDER};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;

struct Fixture {
    controller: Arc<AuditFeedController>,
    client: Arc<MemoryAuditClient>,
    credentials: Arc<MemoryCredentialStore>,
    bus: SignalBus,
}

fn fixture(key: Option<&str>) -> Fixture {
    let client = Arc::new(MemoryAuditClient::new());
    let credentials = Arc::new(match key {
        Some(k) => MemoryCredentialStore::with_key(k),
        None => MemoryCredentialStore::new(),
    });
    let controller = Arc::new(AuditFeedController::new(
        client.clone(),
        credentials.clone(),
    ));
    Fixture {
        controller,
        client,
        credentials,
        bus: SignalBus::new(),
    }
}

fn entries(json: &str) -> Vec<AuditLogEntry> {
    serde_json::from_str(json).unwrap()
}

fn sample_entries() -> Vec<AuditLogEntry> {
    entries(
        r#"[
            {"id": 3, "is_safe": false, "latency_ms": 88.0, "reason": "jailbreak", "timestamp": "2024-01-01T00:00:10"},
            {"id": 2, "is_safe": true, "latency_ms": 12.0, "reason": null, "timestamp": "2024-01-01T00:00:05"}
        ]"#,
    )
}

/// Let spawned trigger and refresh tasks run to completion
async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}

// ─── Activation ──────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_activation_fetches_immediately() {
    let f = fixture(Some("sk_test"));
    f.client.set_logs(sample_entries());

    let mut handle = f.controller.activate(&f.bus);
    let outcome = handle.initial_load().await.unwrap();

    assert!(outcome.is_applied());
    assert_eq!(f.client.calls(), 1);
    assert_eq!(f.controller.entries().len(), 2);
    assert!(handle.is_active());
    assert_eq!(f.bus.subscriber_count(AUDIT_LOG_UPDATE), 1);

    handle.deactivate().await;
}

#[tokio::test(start_paused = true)]
async fn test_activation_without_key_stays_empty() {
    let f = fixture(None);
    f.client.set_logs(sample_entries());

    let mut handle = f.controller.activate(&f.bus);
    assert_eq!(handle.initial_load().await, Some(RefreshOutcome::Skipped));

    f.bus.notify(AUDIT_LOG_UPDATE);
    settle().await;
    tokio::time::advance(Duration::from_secs(60)).await;
    settle().await;

    assert_eq!(f.client.calls(), 0);
    assert!(f.controller.entries().is_empty());

    handle.deactivate().await;
}

#[tokio::test(start_paused = true)]
async fn test_login_after_activation_is_picked_up() {
    let f = fixture(None);
    f.client.set_logs(sample_entries());

    let mut handle = f.controller.activate(&f.bus);
    handle.initial_load().await;
    assert!(f.controller.entries().is_empty());

    f.credentials.login("sk_late");
    f.bus.notify(AUDIT_LOG_UPDATE);
    settle().await;

    assert_eq!(f.client.keys_seen(), vec!["sk_late"]);
    assert_eq!(f.controller.entries().len(), 2);

    handle.deactivate().await;
}

// ─── Triggers ────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_each_signal_triggers_one_refresh() {
    let f = fixture(Some("sk_test"));
    let mut handle = f.controller.activate(&f.bus);
    handle.initial_load().await;
    assert_eq!(f.client.calls(), 1);

    f.bus.notify(AUDIT_LOG_UPDATE);
    settle().await;
    assert_eq!(f.client.calls(), 2);

    // back-to-back signals are not debounced
    f.bus.notify(AUDIT_LOG_UPDATE);
    f.bus.notify(AUDIT_LOG_UPDATE);
    settle().await;
    assert_eq!(f.client.calls(), 4);

    handle.deactivate().await;
}

#[tokio::test(start_paused = true)]
async fn test_signal_burst_beyond_backlog_is_not_coalesced() {
    let f = fixture(Some("sk_test"));
    let bus = SignalBus::with_capacity(8);
    let mut handle = f.controller.activate(&bus);
    handle.initial_load().await;
    assert_eq!(f.client.calls(), 1);

    for _ in 0..100 {
        bus.notify(AUDIT_LOG_UPDATE);
    }
    for _ in 0..1_000 {
        if f.client.calls() >= 101 {
            break;
        }
        tokio::task::yield_now().await;
    }
    settle().await;

    assert_eq!(f.client.calls(), 101);

    handle.deactivate().await;
}

#[tokio::test(start_paused = true)]
async fn test_unrelated_signal_is_ignored() {
    let f = fixture(Some("sk_test"));
    let mut handle = f.controller.activate(&f.bus);
    handle.initial_load().await;

    f.bus.notify("stats-update");
    settle().await;
    assert_eq!(f.client.calls(), 1);

    handle.deactivate().await;
}

#[tokio::test(start_paused = true)]
async fn test_timer_refreshes_every_period() {
    let f = fixture(Some("sk_test"));
    let mut handle = f.controller.activate(&f.bus);
    handle.initial_load().await;
    assert_eq!(f.client.calls(), 1);

    tokio::time::advance(Duration::from_secs(59)).await;
    settle().await;
    assert_eq!(f.client.calls(), 1);

    tokio::time::advance(Duration::from_secs(1)).await;
    settle().await;
    assert_eq!(f.client.calls(), 2);

    tokio::time::advance(Duration::from_secs(60)).await;
    settle().await;
    assert_eq!(f.client.calls(), 3);

    handle.deactivate().await;
}

#[tokio::test(start_paused = true)]
async fn test_custom_poll_interval() {
    let client = Arc::new(MemoryAuditClient::new());
    let credentials = Arc::new(MemoryCredentialStore::with_key("sk_test"));
    let controller = Arc::new(
        AuditFeedController::new(client.clone(), credentials)
            .with_poll_interval(Duration::from_secs(5)),
    );
    let bus = SignalBus::new();

    let mut handle = controller.activate(&bus);
    handle.initial_load().await;

    tokio::time::advance(Duration::from_secs(5)).await;
    settle().await;
    tokio::time::advance(Duration::from_secs(5)).await;
    settle().await;
    assert_eq!(client.calls(), 3);

    handle.deactivate().await;
}

#[tokio::test(start_paused = true)]
async fn test_manual_refresh() {
    let f = fixture(Some("sk_test"));
    let mut handle = f.controller.activate(&f.bus);
    handle.initial_load().await;

    f.client.set_logs(sample_entries());
    let outcome = handle.refresh_now().await.unwrap();
    assert_eq!(
        outcome,
        RefreshOutcome::Applied {
            count: 2,
            sequence: 2
        }
    );
    assert_eq!(f.controller.entries().len(), 2);

    handle.deactivate().await;
}

#[tokio::test(start_paused = true)]
async fn test_triggers_do_not_suppress_each_other() {
    let f = fixture(Some("sk_test"));
    let mut handle = f.controller.activate(&f.bus);
    handle.initial_load().await;

    f.bus.notify(AUDIT_LOG_UPDATE);
    let manual = handle.refresh_now();
    tokio::time::advance(Duration::from_secs(60)).await;
    manual.await.unwrap();
    settle().await;

    // mount + signal + manual + timer
    assert_eq!(f.client.calls(), 4);

    handle.deactivate().await;
}

#[tokio::test(start_paused = true)]
async fn test_overlapping_refreshes_keep_newest_response() {
    let f = fixture(Some("sk_test"));
    f.client.push_reply(Reply::delayed(
        Duration::from_millis(500),
        Reply::Entries(entries(
            r#"[{"id": 1, "is_safe": true, "latency_ms": 5.0, "timestamp": "2024-01-01T00:00:00"}]"#,
        )),
    ));
    f.client.push_reply(Reply::Entries(sample_entries()));

    let mut handle = f.controller.activate(&f.bus);
    settle().await;
    f.bus.notify(AUDIT_LOG_UPDATE);
    settle().await;
    assert_eq!(f.controller.entries().len(), 2);

    // the slow activation fetch finishes last and must not regress the feed
    assert_eq!(
        handle.initial_load().await,
        Some(RefreshOutcome::Superseded { sequence: 1 })
    );
    assert_eq!(f.controller.entries(), sample_entries());

    handle.deactivate().await;
}

// ─── Failure handling ────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_failed_refresh_keeps_stale_feed() {
    let f = fixture(Some("sk_test"));
    f.client.set_logs(sample_entries());

    let mut handle = f.controller.activate(&f.bus);
    handle.initial_load().await;
    let before = f.controller.snapshot();

    f.client.push_reply(Reply::Status(500));
    f.bus.notify(AUDIT_LOG_UPDATE);
    settle().await;
    assert_eq!(f.client.calls(), 2);
    assert_eq!(f.controller.snapshot(), before);

    f.client.push_reply(Reply::Unreachable("dns failure".to_string()));
    tokio::time::advance(Duration::from_secs(60)).await;
    settle().await;
    assert_eq!(f.client.calls(), 3);
    assert_eq!(f.controller.snapshot(), before);

    // recovers on the next trigger
    f.client.set_logs(Vec::new());
    handle.refresh_now().await.unwrap();
    assert!(f.controller.entries().is_empty());

    handle.deactivate().await;
}

// ─── Teardown ────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_deactivate_releases_subscription_and_timer() {
    let f = fixture(Some("sk_test"));
    let mut handle = f.controller.activate(&f.bus);
    handle.initial_load().await;
    assert_eq!(f.bus.subscriber_count(AUDIT_LOG_UPDATE), 1);

    handle.deactivate().await;
    assert_eq!(f.bus.subscriber_count(AUDIT_LOG_UPDATE), 0);

    assert_eq!(f.bus.publish(AUDIT_LOG_UPDATE), 0);
    tokio::time::advance(Duration::from_secs(600)).await;
    settle().await;

    assert_eq!(f.client.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_drop_handle_stops_triggers() {
    let f = fixture(Some("sk_test"));
    let mut handle = f.controller.activate(&f.bus);
    handle.initial_load().await;

    drop(handle);
    settle().await;
    assert_eq!(f.bus.subscriber_count(AUDIT_LOG_UPDATE), 0);

    f.bus.notify(AUDIT_LOG_UPDATE);
    tokio::time::advance(Duration::from_secs(120)).await;
    settle().await;
    assert_eq!(f.client.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_in_flight_refresh_completes_after_deactivate() {
    let f = fixture(Some("sk_test"));
    let mut handle = f.controller.activate(&f.bus);
    handle.initial_load().await;

    f.client.push_reply(Reply::delayed(
        Duration::from_secs(2),
        Reply::Entries(sample_entries()),
    ));
    let in_flight = handle.refresh_now();
    settle().await;
    handle.deactivate().await;

    assert!(in_flight.await.unwrap().is_applied());
    assert_eq!(f.controller.entries().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_reactivation_after_teardown() {
    let f = fixture(Some("sk_test"));

    let handle = f.controller.activate(&f.bus);
    handle.deactivate().await;
    settle().await;

    let mut handle = f.controller.activate(&f.bus);
    handle.initial_load().await;
    assert_eq!(f.bus.subscriber_count(AUDIT_LOG_UPDATE), 1);

    f.bus.notify(AUDIT_LOG_UPDATE);
    settle().await;
    assert_eq!(f.client.calls(), 3);

    handle.deactivate().await;
}

// ─── Rendering ───────────────────────────────────────────────────

#[tokio::test]
async fn test_allowed_entry_renders() {
    let f = fixture(Some("sk_test"));
    f.client.set_logs(entries(
        r#"[{"id":1,"is_safe":true,"latency_ms":45.2,"reason":null,"timestamp":"2024-01-01T00:00:00"}]"#,
    ));
    f.controller.refresh().await;

    let view = Renderer::new(Utc).feed(&f.controller.entries());
    let rows = view.rows();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].badge, Badge::Allowed);
    assert_eq!(rows[0].latency, "45ms");
    assert!(!rows[0].latency_elevated);
    assert_eq!(rows[0].reason, SAFE_REASON_PLACEHOLDER);
    assert_eq!(rows[0].time, "00:00:00");
}

#[tokio::test]
async fn test_blocked_entry_renders() {
    let f = fixture(Some("sk_test"));
    f.client.set_logs(entries(
        r#"[{"id":2,"is_safe":false,"latency_ms":312.9,"reason":"profanity","timestamp":"2024-01-01T00:00:05"}]"#,
    ));
    f.controller.refresh().await;

    let view = Renderer::new(Utc).feed(&f.controller.entries());
    let row = &view.rows()[0];
    assert_eq!(row.badge.label(), "BLOCKED");
    assert_eq!(row.latency, "313ms");
    assert!(row.latency_elevated);
    assert_eq!(row.reason, "profanity");
}

#[tokio::test]
async fn test_empty_response_clears_feed_and_shows_placeholder() {
    let f = fixture(Some("sk_test"));
    f.client.set_logs(sample_entries());
    f.controller.refresh().await;
    assert!(!Renderer::new(Utc).feed(&f.controller.entries()).is_empty());

    f.client.set_logs(Vec::new());
    let outcome = f.controller.refresh().await;
    assert_eq!(
        outcome,
        RefreshOutcome::Applied {
            count: 0,
            sequence: 2
        }
    );
    assert!(f.controller.entries().is_empty());
    assert_eq!(Renderer::new(Utc).feed(&f.controller.entries()), FeedView::Empty);
}

#[tokio::test(start_paused = true)]
async fn test_failed_first_load_renders_empty_state() {
    let f = fixture(Some("sk_test"));
    f.client.push_reply(Reply::Status(500));
    let rx = f.controller.watch();

    let mut handle = f.controller.activate(&f.bus);
    let outcome = handle.initial_load().await.unwrap();
    assert!(matches!(outcome, RefreshOutcome::Failed { .. }));

    // no replacement happened, so watchers are never woken
    assert!(!rx.has_changed().unwrap());
    let state = f.controller.snapshot();
    assert!(state.last_updated.is_none());
    assert_eq!(Renderer::new(Utc).feed(&state.entries), FeedView::Empty);
    assert!(Renderer::new(Utc)
        .feed(&state.entries)
        .to_table(false)
        .contains(EMPTY_TITLE));

    handle.deactivate().await;
}

#[tokio::test]
async fn test_watchers_see_each_replacement() {
    let f = fixture(Some("sk_test"));
    let mut rx = f.controller.watch();

    f.client.set_logs(sample_entries());
    f.controller.refresh().await;
    rx.changed().await.unwrap();
    assert_eq!(rx.borrow_and_update().entries.len(), 2);

    f.client.set_logs(Vec::new());
    f.controller.refresh().await;
    rx.changed().await.unwrap();
    assert!(rx.borrow_and_update().entries.is_empty());
}
