//! Failure-injecting maintenance store.

use maintgate_storage::{InMemoryStore, MaintenanceStore, StorageError, StorageResult};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// An [`InMemoryStore`] that fails on demand.
///
/// Failures are armed per operation ("fail the next N unblocks") or
/// globally with [`set_down`](Self::set_down). Every call is counted,
/// including failed ones. A failed call leaves the flags untouched.
#[derive(Debug, Default)]
pub struct FlakyStore {
    inner: InMemoryStore,
    down: AtomicBool,
    fail_blocks: AtomicUsize,
    fail_unblocks: AtomicUsize,
    block_calls: AtomicUsize,
    unblock_calls: AtomicUsize,
    unblock_all_calls: AtomicUsize,
}

impl FlakyStore {
    /// Creates a healthy store with no blocks.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a healthy store with pre-existing blocks.
    pub fn with_blocked(tables: impl IntoIterator<Item = u64>) -> Self {
        Self {
            inner: InMemoryStore::with_blocked(tables),
            ..Self::default()
        }
    }

    /// Makes every call fail until set back to `false`.
    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    /// Fails the next `n` block calls.
    pub fn fail_next_blocks(&self, n: usize) {
        self.fail_blocks.store(n, Ordering::SeqCst);
    }

    /// Fails the next `n` unblock calls.
    pub fn fail_next_unblocks(&self, n: usize) {
        self.fail_unblocks.store(n, Ordering::SeqCst);
    }

    /// Returns the number of block calls so far.
    pub fn block_calls(&self) -> usize {
        self.block_calls.load(Ordering::SeqCst)
    }

    /// Returns the number of unblock calls so far.
    pub fn unblock_calls(&self) -> usize {
        self.unblock_calls.load(Ordering::SeqCst)
    }

    /// Returns the number of unblock-all calls so far.
    pub fn unblock_all_calls(&self) -> usize {
        self.unblock_all_calls.load(Ordering::SeqCst)
    }

    fn check(&self, armed: &AtomicUsize, op: &str) -> StorageResult<()> {
        if self.down.load(Ordering::SeqCst) {
            return Err(StorageError::unavailable(format!("{op}: store down")));
        }
        let tripped = armed
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if tripped {
            return Err(StorageError::unavailable(format!("{op}: injected failure")));
        }
        Ok(())
    }
}

impl MaintenanceStore for FlakyStore {
    fn block_maintenance(&self, table_id: u64) -> StorageResult<()> {
        self.block_calls.fetch_add(1, Ordering::SeqCst);
        self.check(&self.fail_blocks, "block")?;
        self.inner.block_maintenance(table_id)
    }

    fn unblock_maintenance(&self, table_id: u64) -> StorageResult<()> {
        self.unblock_calls.fetch_add(1, Ordering::SeqCst);
        self.check(&self.fail_unblocks, "unblock")?;
        self.inner.unblock_maintenance(table_id)
    }

    fn unblock_all_maintenance(&self) -> StorageResult<()> {
        self.unblock_all_calls.fetch_add(1, Ordering::SeqCst);
        if self.down.load(Ordering::SeqCst) {
            return Err(StorageError::unavailable("unblock all: store down"));
        }
        self.inner.unblock_all_maintenance()
    }

    fn is_blocked(&self, table_id: u64) -> StorageResult<bool> {
        self.inner.is_blocked(table_id)
    }

    fn blocked_tables(&self) -> StorageResult<Vec<u64>> {
        self.inner.blocked_tables()
    }
}
