//! Per-transaction state and the seams to the metadata layer.

use crate::error::CoreResult;
use crate::types::{IsolationLevel, TableId, TransactionHandle, TransactionId};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Receiver of "this transaction starts deleting from this table".
///
/// Implemented by the coordinator. Metadata never sees it directly, only
/// through a [`DeleteHook`].
pub trait DeletionSink: Send + Sync {
    /// Blocks maintenance on `table` for `transaction`.
    ///
    /// # Errors
    ///
    /// Fails if the block could not be recorded; the delete must not run.
    fn begin_delete(&self, table: TableId, transaction: TransactionId) -> CoreResult<()>;
}

/// Capability handed to each transaction's metadata at construction.
///
/// Bound to one transaction. The delete path calls
/// [`DeleteHook::begin_delete`] once per table before it removes any rows.
#[derive(Clone)]
pub struct DeleteHook {
    transaction: TransactionId,
    sink: Arc<dyn DeletionSink>,
}

impl DeleteHook {
    /// Creates a hook for `transaction` that reports to `sink`.
    pub fn new(transaction: TransactionId, sink: Arc<dyn DeletionSink>) -> Self {
        Self { transaction, sink }
    }

    /// Returns the owning transaction.
    #[must_use]
    pub fn transaction_id(&self) -> TransactionId {
        self.transaction
    }

    /// Announces that the owning transaction is about to delete from
    /// `table`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::CoreError::DuplicateDeletion`] if this transaction
    /// already announced `table`, or the store error if maintenance could
    /// not be blocked. Either way the delete must fail.
    pub fn begin_delete(&self, table: impl Into<TableId>) -> CoreResult<()> {
        self.sink.begin_delete(table.into(), self.transaction)
    }
}

impl std::fmt::Debug for DeleteHook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeleteHook")
            .field("transaction", &self.transaction)
            .finish_non_exhaustive()
    }
}

/// Transaction-scoped metadata produced by a [`MetadataFactory`].
///
/// This is the catalog side of a transaction: whatever the connector needs
/// to plan and execute statements. The coordinator only needs to roll it
/// back.
pub trait TransactionMetadata: Send + Sync + 'static {
    /// Undoes any uncommitted catalog changes.
    fn rollback(&self);
}

/// Builds metadata for new transactions.
pub trait MetadataFactory: Send + Sync {
    /// The metadata type handed to the query engine.
    type Metadata: TransactionMetadata;

    /// Creates metadata for a fresh transaction.
    ///
    /// `deletes` must be invoked by the metadata's delete path.
    fn create(&self, deletes: DeleteHook) -> Self::Metadata;
}

/// Everything the registry keeps about a live transaction.
#[derive(Debug)]
pub struct TransactionContext<M> {
    handle: TransactionHandle,
    isolation: IsolationLevel,
    read_only: bool,
    began_at: Instant,
    metadata: Arc<M>,
}

impl<M> TransactionContext<M> {
    pub(crate) fn new(
        handle: TransactionHandle,
        isolation: IsolationLevel,
        read_only: bool,
        metadata: M,
    ) -> Self {
        Self {
            handle,
            isolation,
            read_only,
            began_at: Instant::now(),
            metadata: Arc::new(metadata),
        }
    }

    /// Returns the handle.
    #[must_use]
    pub fn handle(&self) -> TransactionHandle {
        self.handle
    }

    /// Returns the transaction ID.
    #[must_use]
    pub fn transaction_id(&self) -> TransactionId {
        self.handle.transaction_id()
    }

    /// Returns the isolation level the engine requested.
    #[must_use]
    pub fn isolation(&self) -> IsolationLevel {
        self.isolation
    }

    /// Returns whether the engine declared the transaction read-only.
    #[must_use]
    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Returns how long the transaction has been open.
    #[must_use]
    pub fn age(&self) -> Duration {
        self.began_at.elapsed()
    }

    /// Returns the metadata.
    #[must_use]
    pub fn metadata(&self) -> &Arc<M> {
        &self.metadata
    }
}
