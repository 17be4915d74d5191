//! Maintenance store trait definition.

use crate::error::StorageResult;

/// External persistence for per-table maintenance flags.
///
/// A blocked table must not be picked up by background compaction or merge
/// jobs. Stores are shared between every transaction thread and the retry
/// worker, so all methods take `&self`.
///
/// # Invariants
///
/// - `block_maintenance` on a blocked table is a no-op
/// - `unblock_maintenance` on an unblocked table is a no-op
/// - After `unblock_all_maintenance` returns, no table is blocked
/// - A successful call is visible to every later call on the same store
///
/// # Implementors
///
/// - [`super::InMemoryStore`] - For testing
/// - [`super::FileStore`] - For persistent flags
pub trait MaintenanceStore: Send + Sync {
    /// Marks maintenance for `table_id` as suspended.
    ///
    /// # Errors
    ///
    /// Returns an error if the flag could not be recorded.
    fn block_maintenance(&self, table_id: u64) -> StorageResult<()>;

    /// Clears the suspension for `table_id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the flag could not be cleared.
    fn unblock_maintenance(&self, table_id: u64) -> StorageResult<()>;

    /// Clears the suspension for every table.
    ///
    /// Used once at controller start-up to drop blocks left behind by a
    /// crashed process.
    ///
    /// # Errors
    ///
    /// Returns an error if the flags could not be cleared.
    fn unblock_all_maintenance(&self) -> StorageResult<()>;

    /// Returns whether maintenance for `table_id` is currently suspended.
    ///
    /// # Errors
    ///
    /// Returns an error if the flag could not be read.
    fn is_blocked(&self, table_id: u64) -> StorageResult<bool>;

    /// Returns every blocked table in ascending order.
    ///
    /// # Errors
    ///
    /// Returns an error if the flags could not be read.
    fn blocked_tables(&self) -> StorageResult<Vec<u64>>;
}
