//! Stress drivers for the coordinator.
//!
//! These verify bookkeeping under many concurrent deleters sharing a small
//! set of tables.

use crate::metadata::RecordingFactory;
use maintgate_core::{Coordinator, IsolationLevel, TableId};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

/// Result of a stress test run.
#[derive(Debug, Clone)]
pub struct StressTestResult {
    /// Total transactions run.
    pub total_ops: usize,
    /// Transactions that finished without error.
    pub successful_ops: usize,
    /// Transactions that hit an error.
    pub failed_ops: usize,
    /// Total duration.
    pub duration: Duration,
    /// Transactions per second.
    pub ops_per_second: f64,
}

impl StressTestResult {
    /// Creates a new result.
    pub fn new(successful: usize, failed: usize, duration: Duration) -> Self {
        let total = successful + failed;
        let ops_per_second = if duration.as_secs_f64() > 0.0 {
            total as f64 / duration.as_secs_f64()
        } else {
            0.0
        };

        Self {
            total_ops: total,
            successful_ops: successful,
            failed_ops: failed,
            duration,
            ops_per_second,
        }
    }
}

/// Configuration for stress tests.
#[derive(Debug, Clone)]
pub struct StressConfig {
    /// Transactions per thread.
    pub transactions_per_thread: usize,
    /// Number of concurrent threads.
    pub threads: usize,
    /// Number of distinct tables deleted from.
    pub tables: u64,
    /// Tables touched per transaction.
    pub tables_per_transaction: usize,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            transactions_per_thread: 200,
            threads: 8,
            tables: 4,
            tables_per_transaction: 2,
        }
    }
}

/// Runs concurrent transactions that delete from overlapping tables.
///
/// Every third transaction rolls back, the rest commit. After this returns
/// every transaction has finished, so the coordinator should report no
/// blocked tables.
pub fn stress_concurrent_deleters(
    coordinator: &Coordinator<RecordingFactory>,
    config: &StressConfig,
) -> StressTestResult {
    let successful = AtomicUsize::new(0);
    let failed = AtomicUsize::new(0);
    let start = Instant::now();

    thread::scope(|scope| {
        for t in 0..config.threads {
            let successful = &successful;
            let failed = &failed;
            scope.spawn(move || {
                for i in 0..config.transactions_per_thread {
                    match run_one(coordinator, config, t, i) {
                        Ok(()) => successful.fetch_add(1, Ordering::Relaxed),
                        Err(_) => failed.fetch_add(1, Ordering::Relaxed),
                    };
                }
            });
        }
    });

    StressTestResult::new(
        successful.load(Ordering::Relaxed),
        failed.load(Ordering::Relaxed),
        start.elapsed(),
    )
}

fn run_one(
    coordinator: &Coordinator<RecordingFactory>,
    config: &StressConfig,
    thread_idx: usize,
    i: usize,
) -> maintgate_core::CoreResult<()> {
    let handle = coordinator.begin_transaction(IsolationLevel::ReadCommitted, false)?;
    let metadata = coordinator.metadata(handle)?;

    let mut result = Ok(());
    for k in 0..config.tables_per_transaction {
        let table = ((thread_idx + i + k) as u64) % config.tables.max(1);
        result = metadata.delete_from(TableId::new(table));
        if result.is_err() {
            break;
        }
    }

    if i % 3 == 0 || result.is_err() {
        coordinator.rollback(handle)?;
    } else {
        coordinator.commit(handle)?;
    }
    result
}
