//! End-to-end maintenance blocking through the coordinator.

use maintgate_core::{
    CoreError, CoordinatorConfig, IsolationLevel, NodeRole, RetryConfig, TableId,
    TransactionHandle,
};
use maintgate_storage::MaintenanceStore;
use maintgate_testkit::prelude::*;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

const T7: u64 = 7;

fn begin(t: &TestCoordinator) -> TransactionHandle {
    t.begin_transaction(IsolationLevel::ReadCommitted, false).unwrap()
}

#[test]
fn single_deleter_commit_unblocks_once() {
    let t = TestCoordinator::new();
    let a = begin(&t);

    t.metadata(a).unwrap().delete_from(T7).unwrap();
    assert!(t.store.is_blocked(T7).unwrap());

    t.commit(a).unwrap();

    assert!(!t.store.is_blocked(T7).unwrap());
    assert_eq!(t.store.unblock_calls(), 1);
    assert_eq!(t.pending_retries(), 0);
}

#[test]
fn table_stays_blocked_until_last_deleter_finishes() {
    let t = TestCoordinator::new();
    let a = begin(&t);
    let b = begin(&t);

    t.metadata(a).unwrap().delete_from(T7).unwrap();
    t.metadata(b).unwrap().delete_from(T7).unwrap();

    t.commit(a).unwrap();
    assert!(t.store.is_blocked(T7).unwrap());
    assert_eq!(t.deleters(TableId::new(T7)), vec![t.metadata(b).unwrap().transaction_id()]);
    assert_eq!(t.store.unblock_calls(), 0);

    let meta_b = t.metadata(b).unwrap();
    t.rollback(b).unwrap();
    assert!(!t.store.is_blocked(T7).unwrap());
    assert!(meta_b.was_rolled_back());
}

#[test]
fn failed_unblock_is_retried_until_it_succeeds() {
    let t = TestCoordinator::new();
    let a = begin(&t);
    t.metadata(a).unwrap().delete_from(T7).unwrap();

    // The commit's own attempt and two retries fail.
    t.store.fail_next_unblocks(3);
    t.commit(a).unwrap();

    assert!(wait_until(DEFAULT_WAIT, || !t.store.is_blocked(T7).unwrap()));
    assert_eq!(t.store.unblock_calls(), 4);
    assert!(wait_until(DEFAULT_WAIT, || t.pending_retries() == 0));

    let stats = t.stats();
    assert_eq!(stats.unblock_failures, 3);
    assert_eq!(stats.unblocks, 1);
    assert_eq!(stats.retries_scheduled, 1);
    assert_eq!(stats.transactions_committed, 1);
}

#[test]
fn failed_unblock_does_not_fail_rollback() {
    let t = TestCoordinator::new();
    let a = begin(&t);
    t.metadata(a).unwrap().delete_from(T7).unwrap();

    t.store.set_down(true);
    assert!(t.rollback(a).is_ok());
    assert!(t.store.is_blocked(T7).unwrap());

    thread::sleep(Duration::from_millis(50));
    t.store.set_down(false);
    assert!(wait_until(DEFAULT_WAIT, || !t.store.is_blocked(T7).unwrap()));
}

#[test]
fn double_commit_fails_without_side_effects() {
    let t = TestCoordinator::new();
    let a = begin(&t);
    let b = begin(&t);
    t.metadata(a).unwrap().delete_from(T7).unwrap();
    t.commit(a).unwrap();

    t.metadata(b).unwrap().delete_from(T7).unwrap();
    let unblocks_before = t.store.unblock_calls();

    let again = t.commit(a);
    assert!(matches!(again, Err(CoreError::UnknownTransaction { .. })));
    assert!(again.unwrap_err().is_contract_violation());
    let after_rollback = t.rollback(a);
    assert!(matches!(after_rollback, Err(CoreError::UnknownTransaction { .. })));

    assert!(t.is_blocked(TableId::new(T7)));
    assert!(t.store.is_blocked(T7).unwrap());
    assert_eq!(t.store.unblock_calls(), unblocks_before);
    t.commit(b).unwrap();
}

#[test]
fn metadata_of_finished_transaction_is_unknown() {
    let t = TestCoordinator::new();
    let a = begin(&t);
    t.commit(a).unwrap();

    assert!(matches!(t.metadata(a), Err(CoreError::UnknownTransaction { .. })));
}

#[test]
fn unsupported_isolation_rejected() {
    let t = TestCoordinator::new();
    let result = t.begin_transaction(IsolationLevel::Serializable, false);

    assert!(matches!(result, Err(CoreError::UnsupportedIsolation { .. })));
    assert_eq!(t.active_transactions(), 0);
}

#[test]
fn block_failure_fails_the_delete() {
    let t = TestCoordinator::new();
    let a = begin(&t);
    let meta = t.metadata(a).unwrap();

    t.store.fail_next_blocks(1);
    let result = meta.delete_from(T7);
    assert!(matches!(result, Err(CoreError::Store(_))));
    assert!(!t.is_blocked(TableId::new(T7)));
    assert!(meta.deleted_tables().is_empty());

    // Nothing recorded, so finishing touches no table.
    t.rollback(a).unwrap();
    assert_eq!(t.store.unblock_calls(), 0);
    assert_eq!(t.stats().block_failures, 1);
}

#[test]
fn transaction_spanning_tables_unblocks_each() {
    let t = TestCoordinator::new();
    let a = begin(&t);
    let b = begin(&t);
    let meta_a = t.metadata(a).unwrap();
    for table in [1u64, 2, 3] {
        meta_a.delete_from(table).unwrap();
    }
    t.metadata(b).unwrap().delete_from(2u64).unwrap();

    t.commit(a).unwrap();
    assert_eq!(t.store.blocked_tables().unwrap(), vec![2]);
    assert_eq!(t.blocked_tables(), vec![TableId::new(2)]);

    t.commit(b).unwrap();
    assert!(t.store.blocked_tables().unwrap().is_empty());
}

#[test]
fn repeated_delete_statements_share_one_entry() {
    let t = TestCoordinator::new();
    let a = begin(&t);
    let meta = t.metadata(a).unwrap();

    meta.delete_from(T7).unwrap();
    meta.delete_from(T7).unwrap();
    assert_eq!(t.store.block_calls(), 1);

    let duplicate = meta.hook().begin_delete(T7);
    assert!(matches!(duplicate, Err(CoreError::DuplicateDeletion { .. })));
    assert_eq!(t.store.block_calls(), 1);

    t.commit(a).unwrap();
    assert!(!t.store.is_blocked(T7).unwrap());
}

#[test]
fn stale_retry_does_not_clear_new_block() {
    let config = fast_config().retry(RetryConfig::new().with_delay(Duration::from_millis(200)));
    let t = TestCoordinator::with_config(config);

    let a = begin(&t);
    t.metadata(a).unwrap().delete_from(T7).unwrap();
    t.store.fail_next_unblocks(1);
    t.commit(a).unwrap();
    assert!(wait_until(DEFAULT_WAIT, || t.pending_retries() == 1));

    // A new deleter arrives before the retry fires.
    let b = begin(&t);
    t.metadata(b).unwrap().delete_from(T7).unwrap();

    assert!(wait_until(DEFAULT_WAIT, || t.stats().retries_superseded == 1));
    assert!(t.store.is_blocked(T7).unwrap());

    t.commit(b).unwrap();
    assert!(!t.store.is_blocked(T7).unwrap());
}

#[test]
fn controller_start_clears_dangling_blocks() {
    let t = TestCoordinator::controller([3, 7, 9]);

    assert!(t.store.blocked_tables().unwrap().is_empty());
    assert_eq!(t.stats().recoveries, 1);
}

#[test]
fn controller_start_failure_can_be_retried() {
    let store = Arc::new(FlakyStore::with_blocked([5]));
    let coordinator = TestCoordinator::unstarted(
        Arc::clone(&store),
        fast_config().role(NodeRole::Controller),
    );

    store.set_down(true);
    assert!(coordinator.start().is_err());
    let early = coordinator.begin_transaction(IsolationLevel::ReadCommitted, false);
    assert!(matches!(early, Err(CoreError::NotStarted)));

    store.set_down(false);
    coordinator.start().unwrap();
    assert!(!store.is_blocked(5).unwrap());
}

#[test]
fn controller_recovery_never_clears_live_blocks() {
    let store = Arc::new(FlakyStore::with_blocked([3]));
    let coordinator = TestCoordinator::unstarted(
        Arc::clone(&store),
        fast_config().role(NodeRole::Controller),
    );

    // No deleter can exist before recovery has run.
    let early = coordinator.begin_transaction(IsolationLevel::ReadCommitted, false);
    assert!(matches!(early, Err(CoreError::NotStarted)));
    assert_eq!(coordinator.active_transactions(), 0);

    coordinator.start().unwrap();
    assert!(!store.is_blocked(3).unwrap());

    let a = coordinator
        .begin_transaction(IsolationLevel::ReadCommitted, false)
        .unwrap();
    coordinator.metadata(a).unwrap().delete_from(T7).unwrap();

    // A repeated start is a no-op and leaves the live block alone.
    coordinator.start().unwrap();
    assert!(coordinator.is_blocked(TableId::new(T7)));
    assert!(store.is_blocked(T7).unwrap());
    assert_eq!(store.unblock_all_calls(), 1);

    coordinator.commit(a).unwrap();
    assert!(!store.is_blocked(T7).unwrap());
}

#[test]
fn delete_hook_after_finish_is_rejected() {
    let t = TestCoordinator::new();
    let a = begin(&t);
    let meta = t.metadata(a).unwrap();
    meta.delete_from(T7).unwrap();
    t.rollback(a).unwrap();

    let late = meta.hook().begin_delete(9u64);
    assert!(matches!(late, Err(CoreError::FinishedTransaction { .. })));
    assert!(t.blocked_tables().is_empty());
    assert!(t.store.blocked_tables().unwrap().is_empty());
    assert_eq!(t.store.block_calls(), 1);
}

#[test]
fn worker_start_keeps_blocks_of_other_nodes() {
    let store = Arc::new(FlakyStore::with_blocked([5]));
    let t = TestCoordinator::with_store(Arc::clone(&store), fast_config());

    assert!(t.store.is_blocked(5).unwrap());
    assert_eq!(store.unblock_all_calls(), 0);
}

#[test]
fn shutdown_drains_pending_retries() {
    let config = CoordinatorConfig::new()
        .retry(RetryConfig::new().with_delay(Duration::from_secs(60)))
        .drain_on_shutdown(true);
    let t = TestCoordinator::with_config(config);

    let a = begin(&t);
    t.metadata(a).unwrap().delete_from(T7).unwrap();
    t.store.fail_next_unblocks(1);
    t.commit(a).unwrap();
    assert!(wait_until(DEFAULT_WAIT, || t.pending_retries() == 1));

    t.shutdown();
    assert!(!t.store.is_blocked(T7).unwrap());
    assert_eq!(t.pending_retries(), 0);
}

#[test]
fn many_concurrent_deleters_unblock_after_the_last() {
    let t = TestCoordinator::new();
    let handles: Vec<_> = (0..16).map(|_| begin(&t)).collect();

    thread::scope(|scope| {
        for &h in &handles {
            let t = &t;
            scope.spawn(move || t.metadata(h).unwrap().delete_from(T7).unwrap());
        }
    });
    assert_eq!(t.deleters(TableId::new(T7)).len(), 16);

    let (last, rest) = handles.split_last().unwrap();
    thread::scope(|scope| {
        for &h in rest {
            let t = &t;
            scope.spawn(move || t.commit(h).unwrap());
        }
    });
    assert!(t.store.is_blocked(T7).unwrap());
    assert_eq!(t.store.unblock_calls(), 0);

    t.commit(*last).unwrap();
    assert!(!t.store.is_blocked(T7).unwrap());
    assert_eq!(t.store.unblock_calls(), 1);
}

#[test]
fn stress_with_intermittent_unblock_failures() {
    let t = TestCoordinator::new();
    t.store.fail_next_unblocks(20);

    let config = StressConfig {
        transactions_per_thread: 100,
        threads: 6,
        tables: 3,
        tables_per_transaction: 2,
    };
    let result = stress_concurrent_deleters(&t, &config);

    assert_eq!(result.failed_ops, 0);
    assert!(t.blocked_tables().is_empty());
    assert!(wait_until(DEFAULT_WAIT, || t.store.blocked_tables().unwrap().is_empty()));
}
