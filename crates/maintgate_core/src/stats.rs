//! Coordinator statistics.
//!
//! Counters for monitoring how often maintenance is blocked and how healthy
//! the maintenance store is.
//!
//! # Usage
//!
//! ```rust,ignore
//! let stats = coordinator.stats();
//! println!("Blocks: {}", stats.blocks);
//! println!("Unblock failures: {}", stats.unblock_failures);
//! ```

use std::sync::atomic::{AtomicU64, Ordering};

/// Coordinator statistics.
///
/// All counters are atomic and can be read while transactions are running.
/// Values are monotonically increasing.
#[derive(Debug, Default)]
pub struct GateStats {
    // Transaction counters
    transactions_begun: AtomicU64,
    transactions_committed: AtomicU64,
    transactions_rolled_back: AtomicU64,

    // Store calls
    blocks: AtomicU64,
    block_failures: AtomicU64,
    unblocks: AtomicU64,
    unblock_failures: AtomicU64,
    recoveries: AtomicU64,

    // Retry worker
    retries_scheduled: AtomicU64,
    retries_superseded: AtomicU64,
    retries_abandoned: AtomicU64,
}

impl GateStats {
    /// Creates a new stats instance.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_begin(&self) {
        self.transactions_begun.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_commit(&self) {
        self.transactions_committed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_rollback(&self) {
        self.transactions_rolled_back.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_block(&self, ok: bool) {
        if ok {
            self.blocks.fetch_add(1, Ordering::Relaxed);
        } else {
            self.block_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn record_unblock(&self, ok: bool) {
        if ok {
            self.unblocks.fetch_add(1, Ordering::Relaxed);
        } else {
            self.unblock_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn record_recovery(&self) {
        self.recoveries.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_retry_scheduled(&self) {
        self.retries_scheduled.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_retry_superseded(&self) {
        self.retries_superseded.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_retry_abandoned(&self) {
        self.retries_abandoned.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns the number of successful block calls.
    pub fn blocks(&self) -> u64 {
        self.blocks.load(Ordering::Relaxed)
    }

    /// Returns the number of successful unblock calls.
    pub fn unblocks(&self) -> u64 {
        self.unblocks.load(Ordering::Relaxed)
    }

    /// Returns the number of failed unblock calls.
    ///
    /// Each failure is followed by a retry, so a steadily growing value
    /// means the store is unhealthy.
    pub fn unblock_failures(&self) -> u64 {
        self.unblock_failures.load(Ordering::Relaxed)
    }

    /// Returns a snapshot of all stats.
    pub fn snapshot(&self) -> GateStatsSnapshot {
        let load = |counter: &AtomicU64| counter.load(Ordering::Relaxed);
        GateStatsSnapshot {
            transactions_begun: load(&self.transactions_begun),
            transactions_committed: load(&self.transactions_committed),
            transactions_rolled_back: load(&self.transactions_rolled_back),
            blocks: load(&self.blocks),
            block_failures: load(&self.block_failures),
            unblocks: load(&self.unblocks),
            unblock_failures: load(&self.unblock_failures),
            recoveries: load(&self.recoveries),
            retries_scheduled: load(&self.retries_scheduled),
            retries_superseded: load(&self.retries_superseded),
            retries_abandoned: load(&self.retries_abandoned),
        }
    }
}

/// A point-in-time snapshot of coordinator statistics.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GateStatsSnapshot {
    /// Transactions begun.
    pub transactions_begun: u64,
    /// Transactions committed.
    pub transactions_committed: u64,
    /// Transactions rolled back.
    pub transactions_rolled_back: u64,
    /// Successful block calls.
    pub blocks: u64,
    /// Failed block calls.
    pub block_failures: u64,
    /// Successful unblock calls, including retries.
    pub unblocks: u64,
    /// Failed unblock calls, including retries.
    pub unblock_failures: u64,
    /// Start-up recoveries that cleared every block.
    pub recoveries: u64,
    /// Tables handed to the retry worker.
    pub retries_scheduled: u64,
    /// Retries skipped because a new deleter blocked the table again.
    pub retries_superseded: u64,
    /// Retries dropped at shutdown or after the attempt cap.
    pub retries_abandoned: u64,
}
