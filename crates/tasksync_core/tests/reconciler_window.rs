mod support;

use std::time::Duration;

use support::{expected_ids, ids, task, tasks, ScriptedCollection};
use tasksync_core::{
    PaginationMode, RemoteChange, StoreError, SyncConfig, SyncError, SyncOperation, SyncPhase,
    WindowReconciler,
};

fn reconciler(
    collection: &std::sync::Arc<ScriptedCollection>,
    page_size: u32,
) -> WindowReconciler<ScriptedCollection> {
    let config = SyncConfig::default().with_page_size(page_size);
    WindowReconciler::new(collection.clone(), &config).unwrap()
}

#[test]
fn first_page_then_short_second_page_exhausts_pagination() {
    let collection = ScriptedCollection::with_tasks(tasks(1..=15));
    let mut window = reconciler(&collection, 10);

    window.start().unwrap();
    assert_eq!(ids(window.records()), expected_ids(1..=10));
    assert!(window.has_more());
    assert_eq!(window.phase(), SyncPhase::Ready);
    assert!(window.is_listening());

    assert!(window.load_more().unwrap());
    assert_eq!(ids(window.records()), expected_ids(1..=15));
    assert!(!window.has_more());

    let queries = collection.query_count();
    assert!(!window.load_more().unwrap());
    assert_eq!(collection.query_count(), queries);
}

#[test]
fn has_more_is_true_only_for_full_first_page() {
    for (count, expect_more) in [(3, false), (9, false), (10, true), (12, true)] {
        let collection = ScriptedCollection::with_tasks(tasks(1..=count));
        let mut window = reconciler(&collection, 10);
        window.start().unwrap();
        assert_eq!(window.has_more(), expect_more, "collection of {count}");
    }
}

#[test]
fn exact_multiple_needs_one_empty_fetch_in_short_page_mode() {
    let collection = ScriptedCollection::with_tasks(tasks(1..=10));
    let mut window = reconciler(&collection, 10);
    window.start().unwrap();
    assert!(window.has_more());

    assert!(window.load_more().unwrap());
    assert_eq!(window.records().len(), 10);
    assert!(!window.has_more());
}

#[test]
fn look_ahead_mode_detects_end_of_collection_exactly() {
    let collection = ScriptedCollection::with_tasks(tasks(1..=10));
    let config = SyncConfig::default()
        .with_page_size(10)
        .with_pagination(PaginationMode::LookAhead);
    let mut window = WindowReconciler::new(collection.clone(), &config).unwrap();

    window.start().unwrap();
    assert_eq!(window.records().len(), 10);
    assert!(!window.has_more());
}

#[test]
fn modified_event_updates_visible_record_in_place() {
    let collection = ScriptedCollection::with_tasks(tasks(1..=3));
    let mut window = reconciler(&collection, 10);
    window.start().unwrap();

    let mut r2 = task(2);
    r2.completed = true;
    collection.emit(RemoteChange::modified(r2.clone()));
    assert_eq!(window.pump(), 1);

    assert_eq!(ids(window.records()), expected_ids(1..=3));
    assert_eq!(window.records()[1], r2);
}

#[test]
fn modified_event_outside_window_is_ignored() {
    let collection = ScriptedCollection::with_tasks(tasks(1..=15));
    let mut window = reconciler(&collection, 10);
    window.start().unwrap();
    let before = window.records().to_vec();

    let mut r12 = task(12);
    r12.title = "edited elsewhere".to_string();
    collection.emit(RemoteChange::modified(r12));
    assert_eq!(window.pump(), 0);
    assert_eq!(window.records(), before.as_slice());
}

#[test]
fn removed_event_drops_exactly_that_record() {
    let collection = ScriptedCollection::with_tasks(tasks(1..=5));
    let mut window = reconciler(&collection, 10);
    window.start().unwrap();

    collection.emit(RemoteChange::removed(task(3)));
    window.pump();
    assert_eq!(ids(window.records()), vec!["r1", "r2", "r4", "r5"]);

    // Redelivery after a reconnect changes nothing.
    collection.emit(RemoteChange::removed(task(3)));
    assert_eq!(window.pump(), 0);
    assert_eq!(window.records().len(), 4);
}

#[test]
fn removed_record_is_not_resurrected_by_late_added_event() {
    let collection = ScriptedCollection::with_tasks(tasks(1..=3));
    let mut window = reconciler(&collection, 10);
    window.start().unwrap();

    collection.emit(RemoteChange::removed(task(2)));
    collection.emit(RemoteChange::added(task(2)));
    window.pump();
    assert_eq!(ids(window.records()), vec!["r1", "r3"]);
}

#[test]
fn added_events_only_refresh_admitted_records() {
    let collection = ScriptedCollection::with_tasks(tasks(1..=3));
    let mut window = reconciler(&collection, 10);
    window.start().unwrap();

    let mut stranger = task(99);
    stranger.id = "someone-else".to_string();
    collection.emit(RemoteChange::added(stranger));
    let mut r1 = task(1);
    r1.description = "fresh".to_string();
    collection.emit(RemoteChange::added(r1.clone()));

    assert_eq!(window.pump(), 1);
    assert_eq!(ids(window.records()), expected_ids(1..=3));
    assert_eq!(window.records()[0], r1);
}

#[test]
fn duplicate_modified_delivery_is_idempotent() {
    let collection = ScriptedCollection::with_tasks(tasks(1..=3));
    let mut window = reconciler(&collection, 10);
    window.start().unwrap();

    let mut r3 = task(3);
    r3.completed = true;
    collection.emit(RemoteChange::modified(r3.clone()));
    window.pump();
    let once = window.records().to_vec();

    collection.emit(RemoteChange::modified(r3));
    window.pump();
    assert_eq!(window.records(), once.as_slice());
}

#[test]
fn changes_to_records_paged_in_after_subscribing_apply() {
    let collection = ScriptedCollection::with_tasks(tasks(1..=15));
    let mut window = reconciler(&collection, 10);
    window.start().unwrap();
    window.load_more().unwrap();

    let mut r13 = task(13);
    r13.completed = true;
    collection.emit(RemoteChange::modified(r13.clone()));
    collection.emit(RemoteChange::removed(task(14)));
    window.pump();

    assert_eq!(window.records()[12], r13);
    assert!(!window.store().contains("r14"));
    assert_eq!(window.records().len(), 14);
}

#[test]
fn refresh_discards_events_from_the_previous_subscription() {
    let collection = ScriptedCollection::with_tasks(tasks(1..=15));
    let mut window = reconciler(&collection, 10);
    window.start().unwrap();
    let old_subscription = collection.last_subscription_id();

    // Queued before the refresh, never pumped.
    let mut r2 = task(2);
    r2.title = "stale edit".to_string();
    collection.emit(RemoteChange::modified(r2));

    // r1 disappears remotely without an event reaching the new window.
    collection.replace_silently({
        let mut moved = task(1);
        moved.created_at = 0;
        moved
    });

    window.refresh().unwrap();
    assert_eq!(collection.live_subscriptions(), 1);
    assert_ne!(collection.last_subscription_id(), old_subscription);
    assert!(!window.store().contains("r1"));

    // Late delivery on the old subscription.
    collection.emit_to(old_subscription, RemoteChange::added(task(1)));
    collection.emit_to(old_subscription, RemoteChange::removed(task(3)));
    assert_eq!(window.pump(), 0);

    assert!(!window.store().contains("r1"));
    assert!(window.store().contains("r3"));
    assert_eq!(window.records()[0].title, "Task 2");
}

#[test]
fn transient_load_more_failure_preserves_window() {
    let collection = ScriptedCollection::with_tasks(tasks(1..=15));
    let mut window = reconciler(&collection, 10);
    window.start().unwrap();

    collection.fail_next_query(StoreError::unavailable("backend offline"));
    let err = window.load_more().unwrap_err();
    assert!(err.is_retryable());
    assert_eq!(window.phase(), SyncPhase::Ready);
    assert_eq!(ids(window.records()), expected_ids(1..=10));
    assert!(window.has_more());
    assert!(window.is_listening());
    assert_eq!(
        window.view().error_message().as_deref(),
        Some("Failed to load more tasks. Please try again.")
    );

    assert!(window.load_more().unwrap());
    assert_eq!(window.records().len(), 15);
    assert!(window.last_error().is_none());
}

#[test]
fn permission_failure_on_start_is_not_retryable() {
    let collection = ScriptedCollection::with_tasks(tasks(1..=3));
    let mut window = reconciler(&collection, 10);

    collection.fail_next_query(StoreError::permission_denied("missing role"));
    let err = window.start().unwrap_err();
    assert!(!err.is_retryable());
    assert!(matches!(
        err,
        SyncError::Store {
            operation: SyncOperation::Start,
            source: StoreError::Permission { .. }
        }
    ));
    assert_eq!(window.phase(), SyncPhase::Ready);
    assert!(window.records().is_empty());
    assert!(!window.is_listening());

    window.refresh().unwrap();
    assert_eq!(window.records().len(), 3);
    assert!(window.is_listening());
}

#[test]
fn failed_refresh_keeps_previous_window() {
    let collection = ScriptedCollection::with_tasks(tasks(1..=4));
    let mut window = reconciler(&collection, 10);
    window.start().unwrap();

    collection.fail_next_query(StoreError::unavailable("offline"));
    assert!(window.refresh().is_err());
    assert_eq!(ids(window.records()), expected_ids(1..=4));
    assert_eq!(collection.live_subscriptions(), 0);
    assert_eq!(window.phase(), SyncPhase::Ready);
}

#[test]
fn feed_failure_kills_subscription_and_keeps_window() {
    let collection = ScriptedCollection::with_tasks(tasks(1..=3));
    let mut window = reconciler(&collection, 10);
    window.start().unwrap();

    collection.fail_feed(StoreError::unavailable("stream reset"));
    window.pump();
    assert!(!window.is_listening());
    assert_eq!(collection.live_subscriptions(), 0);
    assert_eq!(window.records().len(), 3);
    assert_eq!(
        window.view().error_message().as_deref(),
        Some("Failed to sync tasks. Please try again.")
    );

    collection.emit(RemoteChange::removed(task(1)));
    assert_eq!(window.pump(), 0);

    window.refresh().unwrap();
    assert!(window.is_listening());
    assert!(window.last_error().is_none());
}

#[test]
fn feed_fault_survives_a_successful_load_more() {
    let collection = ScriptedCollection::with_tasks(tasks(1..=15));
    let mut window = reconciler(&collection, 10);
    window.start().unwrap();

    collection.fail_feed(StoreError::unavailable("stream reset"));
    window.pump();
    assert!(window.load_more().unwrap());
    assert_eq!(window.records().len(), 15);

    assert!(!window.is_listening());
    assert_eq!(
        window.last_error().and_then(SyncError::operation),
        Some(SyncOperation::Feed)
    );
    assert_eq!(
        window.view().error_message().as_deref(),
        Some("Failed to sync tasks. Please try again.")
    );
}

#[test]
fn stop_then_start_reloads_window() {
    let collection = ScriptedCollection::with_tasks(tasks(1..=3));
    let mut window = reconciler(&collection, 10);
    window.start().unwrap();
    window.start().unwrap();
    assert_eq!(collection.live_subscriptions(), 1);

    window.stop();
    assert_eq!(window.phase(), SyncPhase::Idle);
    assert_eq!(collection.live_subscriptions(), 0);

    let queries = collection.query_count();
    window.start().unwrap();
    assert_eq!(collection.query_count(), queries + 1);
    assert_eq!(collection.live_subscriptions(), 1);
}

#[test]
fn load_more_before_start_is_rejected() {
    let collection = ScriptedCollection::with_tasks(tasks(1..=3));
    let mut window = reconciler(&collection, 2);
    let err = window.load_more().unwrap_err();
    assert!(matches!(
        err,
        SyncError::InvalidPhase {
            operation: SyncOperation::LoadMore,
            phase: SyncPhase::Idle
        }
    ));
}

#[test]
fn dispose_unsubscribes_and_rejects_further_operations() {
    let collection = ScriptedCollection::with_tasks(tasks(1..=3));
    let mut window = reconciler(&collection, 10);
    window.start().unwrap();

    window.dispose();
    assert_eq!(collection.live_subscriptions(), 0);
    assert_eq!(window.phase(), SyncPhase::Disposed);
    assert_eq!(window.start().unwrap_err(), SyncError::Disposed);
    assert_eq!(window.refresh().unwrap_err(), SyncError::Disposed);
    assert_eq!(window.load_more().unwrap_err(), SyncError::Disposed);

    window.stop();
    assert_eq!(window.phase(), SyncPhase::Disposed);
}

#[test]
fn dropping_reconciler_unsubscribes() {
    let collection = ScriptedCollection::with_tasks(tasks(1..=3));
    {
        let mut window = reconciler(&collection, 10);
        window.start().unwrap();
        assert_eq!(collection.live_subscriptions(), 1);
    }
    assert_eq!(collection.live_subscriptions(), 0);
}

#[test]
fn view_filters_visible_records_by_search_term() {
    let collection = ScriptedCollection::with_tasks(tasks(1..=12));
    let mut window = reconciler(&collection, 10);
    window.start().unwrap();

    let view = window.view();
    assert_eq!(view.filtered("task 1").len(), 2); // "Task 1", "Task 10"
    assert_eq!(view.filtered("DESCRIPTION 3").len(), 1);
    assert_eq!(view.filtered("").len(), 10);
    assert!(view.filtered("task 12").is_empty());
    assert!(view.has_more);
    assert!(!view.loading);
}

#[test]
fn pump_wait_applies_change_pushed_from_another_thread() {
    let collection = ScriptedCollection::with_tasks(tasks(1..=3));
    let mut window = reconciler(&collection, 10);
    window.start().unwrap();
    assert_eq!(window.pump_wait(Duration::from_millis(10)), 0);

    let mut r3 = task(3);
    r3.completed = true;
    let remote = collection.clone();
    std::thread::spawn(move || remote.emit(RemoteChange::modified(r3)))
        .join()
        .unwrap();

    assert_eq!(window.pump_wait(Duration::from_secs(5)), 1);
    assert!(window.records()[2].completed);
}
