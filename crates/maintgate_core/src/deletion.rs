//! Bookkeeping of which transactions are deleting from which tables.
//!
//! A table is blocked while at least one transaction holds a deletion
//! entry for it. Entries live until the owning transaction terminates, not
//! until the delete statement finishes.
//!
//! ## Invariants
//!
//! - A (table, transaction) pair is recorded at most once
//! - Entries are only recorded for open transactions, so none outlives
//!   the `finish_all` of its owner
//! - "Remove entry, then test emptiness" happens inside one critical
//!   section, so exactly one finisher observes a table becoming empty

use crate::error::{CoreError, CoreResult};
use crate::types::{TableId, TransactionId};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use tracing::debug;

#[derive(Debug, Default)]
struct Entries {
    deletions: HashMap<TableId, HashSet<TransactionId>>,
    open: HashSet<TransactionId>,
}

impl Entries {
    fn check(&self, table: TableId, transaction: TransactionId) -> CoreResult<()> {
        if !self.open.contains(&transaction) {
            return Err(CoreError::finished_transaction(transaction));
        }
        match self.deletions.get(&table) {
            Some(deleters) if deleters.contains(&transaction) => {
                Err(CoreError::duplicate_deletion(table, transaction))
            }
            _ => Ok(()),
        }
    }
}

/// Tracks in-flight deleters per table.
///
/// One mutex covers the whole map. Contention is low and the emptiness
/// check spans a table's whole entry set, so per-table locks would buy
/// nothing. The lock is never held across maintenance store calls.
#[derive(Debug, Default)]
pub struct DeletionTracker {
    entries: Mutex<Entries>,
}

impl DeletionTracker {
    /// Creates an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens `transaction` so it may record deletions.
    pub fn open(&self, transaction: TransactionId) {
        self.entries.lock().open.insert(transaction);
    }

    /// Returns whether `transaction` is open.
    #[must_use]
    pub fn is_open(&self, transaction: TransactionId) -> bool {
        self.entries.lock().open.contains(&transaction)
    }

    /// Fails if `transaction` is not open or already holds an entry for
    /// `table`.
    ///
    /// Lets callers reject a contract violation before touching the store.
    pub fn check_new(&self, table: TableId, transaction: TransactionId) -> CoreResult<()> {
        self.entries.lock().check(table, transaction)
    }

    /// Records that `transaction` is deleting from `table`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::FinishedTransaction`] if the transaction is not
    /// open, or [`CoreError::DuplicateDeletion`] if the pair is already
    /// recorded. The tracker is left unchanged.
    pub fn begin_delete(&self, table: TableId, transaction: TransactionId) -> CoreResult<()> {
        let mut entries = self.entries.lock();
        entries.check(table, transaction)?;
        entries.deletions.entry(table).or_default().insert(transaction);
        debug!(%table, %transaction, "deletion recorded");
        Ok(())
    }

    /// Removes the entry for (`table`, `transaction`).
    ///
    /// Returns `true` if the table has no deleters left and was blocked by
    /// this entry, i.e. the caller must now unblock it. Removing an entry
    /// that does not exist returns `false`.
    pub fn finish_delete(&self, table: TableId, transaction: TransactionId) -> bool {
        let mut entries = self.entries.lock();
        let Some(deleters) = entries.deletions.get_mut(&table) else {
            return false;
        };
        if !deleters.remove(&transaction) {
            return false;
        }
        let emptied = deleters.is_empty();
        if emptied {
            entries.deletions.remove(&table);
        }
        emptied
    }

    /// Closes `transaction` and removes every entry it owns.
    ///
    /// Returns the tables that became empty as a result, in no particular
    /// order. Each one needs its own unblock.
    pub fn finish_all(&self, transaction: TransactionId) -> Vec<TableId> {
        let mut entries = self.entries.lock();
        entries.open.remove(&transaction);
        let mut emptied = Vec::new();
        entries.deletions.retain(|&table, deleters| {
            if deleters.remove(&transaction) && deleters.is_empty() {
                emptied.push(table);
                return false;
            }
            true
        });
        if !emptied.is_empty() {
            debug!(%transaction, tables = emptied.len(), "last deleter finished");
        }
        emptied
    }

    /// Returns whether any transaction is deleting from `table`.
    #[must_use]
    pub fn is_blocked(&self, table: TableId) -> bool {
        self.entries.lock().deletions.contains_key(&table)
    }

    /// Returns the transactions currently deleting from `table`.
    #[must_use]
    pub fn deleters(&self, table: TableId) -> Vec<TransactionId> {
        self.entries
            .lock()
            .deletions
            .get(&table)
            .map(|deleters| deleters.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Returns every table with at least one deleter, ascending.
    #[must_use]
    pub fn blocked_tables(&self) -> Vec<TableId> {
        let mut tables: Vec<_> = self.entries.lock().deletions.keys().copied().collect();
        tables.sort_unstable();
        tables
    }

    /// Returns the total number of (table, transaction) entries.
    #[must_use]
    pub fn entry_count(&self) -> usize {
        self.entries.lock().deletions.values().map(HashSet::len).sum()
    }
}
