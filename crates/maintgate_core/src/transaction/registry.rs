//! Transaction registry.

use crate::error::{CoreError, CoreResult};
use crate::transaction::context::TransactionContext;
use crate::types::{IsolationLevel, TransactionHandle, TransactionId};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Maps live transaction handles to their contexts.
///
/// The registry only tracks lifetimes: a handle is inserted by
/// [`begin`](Self::begin) and removed exactly once by
/// [`remove`](Self::remove). What happens at commit or rollback is up to
/// the caller. There is no compound invariant across entries, so a plain
/// read-write lock suffices.
pub struct TransactionRegistry<M> {
    transactions: RwLock<HashMap<TransactionHandle, TransactionContext<M>>>,
}

impl<M> TransactionRegistry<M> {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            transactions: RwLock::new(HashMap::new()),
        }
    }

    /// Registers a new transaction.
    ///
    /// `build` receives the new transaction's ID and returns its metadata.
    /// It runs before the handle becomes visible and must not block.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::UnsupportedIsolation`] if `isolation` is
    /// stricter than [`IsolationLevel::SUPPORTED`].
    pub fn begin(
        &self,
        isolation: IsolationLevel,
        read_only: bool,
        build: impl FnOnce(TransactionId) -> M,
    ) -> CoreResult<TransactionHandle> {
        if !IsolationLevel::SUPPORTED.meets_requirement_of(isolation) {
            return Err(CoreError::UnsupportedIsolation {
                requested: isolation,
                supported: IsolationLevel::SUPPORTED,
            });
        }

        let handle = TransactionHandle::new();
        let metadata = build(handle.transaction_id());
        let context = TransactionContext::new(handle, isolation, read_only, metadata);
        self.transactions.write().insert(handle, context);

        debug!(transaction = %handle, %isolation, read_only, "transaction registered");
        Ok(handle)
    }

    /// Unregisters a transaction and returns its context.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::UnknownTransaction`] if the handle was never
    /// registered or has already been removed.
    pub fn remove(&self, handle: TransactionHandle) -> CoreResult<TransactionContext<M>> {
        self.transactions
            .write()
            .remove(&handle)
            .ok_or_else(|| CoreError::unknown_transaction(handle))
    }

    /// Returns the metadata of a live transaction.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::UnknownTransaction`] if the handle is not live.
    pub fn metadata(&self, handle: TransactionHandle) -> CoreResult<Arc<M>> {
        self.transactions
            .read()
            .get(&handle)
            .map(|context| Arc::clone(context.metadata()))
            .ok_or_else(|| CoreError::unknown_transaction(handle))
    }

    /// Returns whether `handle` is live.
    #[must_use]
    pub fn contains(&self, handle: TransactionHandle) -> bool {
        self.transactions.read().contains_key(&handle)
    }

    /// Returns the number of live transactions.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.transactions.read().len()
    }

    /// Returns the handles of all live transactions.
    #[must_use]
    pub fn handles(&self) -> Vec<TransactionHandle> {
        self.transactions.read().keys().copied().collect()
    }
}

impl<M> Default for TransactionRegistry<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M> std::fmt::Debug for TransactionRegistry<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionRegistry")
            .field("active_count", &self.active_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> TransactionRegistry<TransactionId> {
        TransactionRegistry::new()
    }

    #[test]
    fn begin_registers_transaction() {
        let reg = registry();
        let handle = reg.begin(IsolationLevel::ReadCommitted, false, |id| id).unwrap();

        assert!(reg.contains(handle));
        assert_eq!(reg.active_count(), 1);
        assert_eq!(*reg.metadata(handle).unwrap(), handle.transaction_id());
    }

    #[test]
    fn weaker_isolation_accepted() {
        let reg = registry();
        assert!(reg.begin(IsolationLevel::ReadUncommitted, true, |id| id).is_ok());
    }

    #[test]
    fn stricter_isolation_rejected() {
        let reg = registry();
        for level in [IsolationLevel::RepeatableRead, IsolationLevel::Serializable] {
            let mut built = false;
            let result = reg.begin(level, false, |id| {
                built = true;
                id
            });
            assert!(matches!(result, Err(CoreError::UnsupportedIsolation { .. })));
            assert!(!built);
        }
        assert_eq!(reg.active_count(), 0);
    }

    #[test]
    fn remove_returns_context_once() {
        let reg = registry();
        let handle = reg.begin(IsolationLevel::ReadCommitted, true, |id| id).unwrap();

        let ctx = reg.remove(handle).unwrap();
        assert_eq!(ctx.handle(), handle);
        assert!(ctx.is_read_only());

        let again = reg.remove(handle);
        assert!(matches!(again, Err(CoreError::UnknownTransaction { .. })));
        assert!(reg.metadata(handle).is_err());
    }

    #[test]
    fn handles_lists_live_transactions() {
        let reg = registry();
        let a = reg.begin(IsolationLevel::ReadCommitted, false, |id| id).unwrap();
        let b = reg.begin(IsolationLevel::ReadCommitted, false, |id| id).unwrap();
        reg.remove(a).unwrap();

        assert_eq!(reg.handles(), vec![b]);
    }
}
