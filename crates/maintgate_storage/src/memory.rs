//! In-memory maintenance store.

use crate::backend::MaintenanceStore;
use crate::error::StorageResult;
use parking_lot::RwLock;
use std::collections::BTreeSet;

/// An in-memory maintenance store.
///
/// Flags live only as long as the process. Suitable for:
/// - Unit tests
/// - Integration tests
/// - Single-process deployments where maintenance runs in-process
///
/// # Thread Safety
///
/// This store is thread-safe and can be shared across threads.
///
/// # Example
///
/// ```rust
/// use maintgate_storage::{InMemoryStore, MaintenanceStore};
///
/// let store = InMemoryStore::with_blocked([1, 2]);
/// store.unblock_all_maintenance().unwrap();
/// assert!(store.blocked_tables().unwrap().is_empty());
/// ```
#[derive(Debug, Default)]
pub struct InMemoryStore {
    blocked: RwLock<BTreeSet<u64>>,
}

impl InMemoryStore {
    /// Creates a new store with no blocked tables.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store with pre-existing blocks.
    ///
    /// Useful for testing crash recovery.
    #[must_use]
    pub fn with_blocked(tables: impl IntoIterator<Item = u64>) -> Self {
        Self {
            blocked: RwLock::new(tables.into_iter().collect()),
        }
    }

    /// Returns the number of blocked tables.
    #[must_use]
    pub fn blocked_count(&self) -> usize {
        self.blocked.read().len()
    }
}

impl MaintenanceStore for InMemoryStore {
    fn block_maintenance(&self, table_id: u64) -> StorageResult<()> {
        self.blocked.write().insert(table_id);
        Ok(())
    }

    fn unblock_maintenance(&self, table_id: u64) -> StorageResult<()> {
        self.blocked.write().remove(&table_id);
        Ok(())
    }

    fn unblock_all_maintenance(&self) -> StorageResult<()> {
        self.blocked.write().clear();
        Ok(())
    }

    fn is_blocked(&self, table_id: u64) -> StorageResult<bool> {
        Ok(self.blocked.read().contains(&table_id))
    }

    fn blocked_tables(&self) -> StorageResult<Vec<u64>> {
        Ok(self.blocked.read().iter().copied().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_new_has_no_blocks() {
        let store = InMemoryStore::new();
        assert_eq!(store.blocked_count(), 0);
        assert!(!store.is_blocked(1).unwrap());
    }

    #[test]
    fn memory_block_and_unblock() {
        let store = InMemoryStore::new();
        store.block_maintenance(7).unwrap();
        assert!(store.is_blocked(7).unwrap());
        assert!(!store.is_blocked(8).unwrap());

        store.unblock_maintenance(7).unwrap();
        assert!(!store.is_blocked(7).unwrap());
    }

    #[test]
    fn memory_block_is_idempotent() {
        let store = InMemoryStore::new();
        store.block_maintenance(3).unwrap();
        store.block_maintenance(3).unwrap();
        assert_eq!(store.blocked_count(), 1);

        store.unblock_maintenance(3).unwrap();
        store.unblock_maintenance(3).unwrap();
        assert_eq!(store.blocked_count(), 0);
    }

    #[test]
    fn memory_unblock_all() {
        let store = InMemoryStore::with_blocked([4, 9, 2]);
        assert_eq!(store.blocked_tables().unwrap(), vec![2, 4, 9]);

        store.unblock_all_maintenance().unwrap();
        assert!(store.blocked_tables().unwrap().is_empty());
    }
}
