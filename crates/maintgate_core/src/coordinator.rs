//! The coordinator: composition root for maintenance blocking.

use crate::config::CoordinatorConfig;
use crate::deletion::DeletionTracker;
use crate::error::{CoreError, CoreResult};
use crate::gate::MaintenanceGate;
use crate::retry::{RetryScheduler, UnblockAttempt, UnblockTarget};
use crate::stats::{GateStats, GateStatsSnapshot};
use crate::transaction::{
    DeleteHook, DeletionSink, MetadataFactory, TransactionMetadata, TransactionRegistry,
};
use crate::types::{IsolationLevel, NodeRole, TableId, TransactionHandle, TransactionId};
use maintgate_storage::MaintenanceStore;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error, warn};

/// State reachable from delete hooks and the retry worker.
struct Shared {
    gate: MaintenanceGate,
    tracker: DeletionTracker,
}

impl DeletionSink for Shared {
    fn begin_delete(&self, table: TableId, transaction: TransactionId) -> CoreResult<()> {
        self.tracker.check_new(table, transaction)?;

        // Block and record under the latch so a concurrent unblock of the
        // same table either runs before the block or sees the new entry.
        let _latch = self.gate.latch(table);
        self.gate.block(table)?;
        let recorded = self.tracker.begin_delete(table, transaction);
        if recorded.is_err() && !self.tracker.is_blocked(table) {
            // The transaction finished while the block was in flight.
            if let Err(e) = self.gate.unblock(table) {
                warn!(%table, error = %e, "failed to undo block of finished transaction");
            }
        }
        recorded
    }
}

impl UnblockTarget for Shared {
    fn attempt_unblock(&self, table: TableId) -> UnblockAttempt {
        let _latch = self.gate.latch(table);
        if self.tracker.is_blocked(table) {
            return UnblockAttempt::Superseded;
        }
        match self.gate.unblock(table) {
            Ok(()) => UnblockAttempt::Unblocked,
            Err(e) => UnblockAttempt::Failed(e),
        }
    }
}

/// Keeps table maintenance suspended while transactions delete from it.
///
/// The coordinator implements the connector side of the query engine's
/// transaction protocol:
///
/// - [`begin_transaction`](Self::begin_transaction) builds metadata wired
///   with a [`DeleteHook`]; the delete path calls it before removing rows,
///   which blocks maintenance on that table
/// - [`commit`](Self::commit) and [`rollback`](Self::rollback) release the
///   transaction's deletion entries and unblock every table it was the last
///   deleter of
///
/// A failed block fails the delete. A failed unblock never fails the
/// commit or rollback; the table is handed to a background retry worker
/// instead.
///
/// # Example
///
/// ```rust,ignore
/// let coordinator = Coordinator::new(store, factory, CoordinatorConfig::default())?;
/// coordinator.start()?;
///
/// let txn = coordinator.begin_transaction(IsolationLevel::ReadCommitted, false)?;
/// coordinator.metadata(txn)?.delete_rows(TableId::new(7))?;
/// coordinator.commit(txn)?;
/// ```
pub struct Coordinator<F: MetadataFactory> {
    shared: Arc<Shared>,
    registry: TransactionRegistry<F::Metadata>,
    factory: F,
    retries: RetryScheduler,
    stats: Arc<GateStats>,
    config: CoordinatorConfig,
    start_lock: Mutex<()>,
    started: AtomicBool,
    closed: AtomicBool,
}

impl<F: MetadataFactory> Coordinator<F> {
    /// Creates a coordinator and starts its retry worker.
    ///
    /// Call [`start`](Self::start) before serving transactions.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the retry
    /// worker cannot be spawned.
    pub fn new(
        store: Arc<dyn MaintenanceStore>,
        factory: F,
        config: CoordinatorConfig,
    ) -> CoreResult<Self> {
        config.validate()?;

        let stats = Arc::new(GateStats::new());
        let shared = Arc::new(Shared {
            gate: MaintenanceGate::new(store, config.signal_stripes, Arc::clone(&stats)),
            tracker: DeletionTracker::new(),
        });
        let retries = RetryScheduler::start(&config.retry, Arc::clone(&shared), Arc::clone(&stats))?;

        Ok(Self {
            shared,
            registry: TransactionRegistry::new(),
            factory,
            retries,
            stats,
            config,
            start_lock: Mutex::new(()),
            started: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        })
    }

    /// Runs start-up recovery.
    ///
    /// On the controller this clears every maintenance block in the store:
    /// blocks held by transactions of a crashed process have no in-memory
    /// owner left to release them. Other nodes do nothing. Transactions are
    /// refused until this succeeds, so recovery never clears a block held
    /// by a live deleter of this process. Only the first successful call
    /// has an effect.
    ///
    /// # Errors
    ///
    /// Returns the store error if the blocks could not be cleared. The call
    /// may be repeated.
    pub fn start(&self) -> CoreResult<()> {
        let _guard = self.start_lock.lock();
        if self.started.load(Ordering::SeqCst) {
            return Ok(());
        }
        if self.config.role == NodeRole::Controller {
            self.shared.gate.unblock_all()?;
        }
        self.started.store(true, Ordering::SeqCst);
        Ok(())
    }

    /// Returns whether [`start`](Self::start) has succeeded.
    #[must_use]
    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    /// Connector transactions are limited to one writing statement.
    #[must_use]
    pub fn is_single_statement_writes_only(&self) -> bool {
        true
    }

    /// Begins a transaction.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::UnsupportedIsolation`] for isolation stricter
    /// than read-committed, [`CoreError::NotStarted`] before
    /// [`start`](Self::start) has succeeded, or
    /// [`CoreError::CoordinatorClosed`] after shutdown.
    pub fn begin_transaction(
        &self,
        isolation: IsolationLevel,
        read_only: bool,
    ) -> CoreResult<TransactionHandle> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(CoreError::CoordinatorClosed);
        }
        if !self.is_started() {
            return Err(CoreError::NotStarted);
        }

        let sink: Arc<dyn DeletionSink> = self.shared.clone();
        let handle = self.registry.begin(isolation, read_only, |id| {
            self.shared.tracker.open(id);
            self.factory.create(DeleteHook::new(id, sink))
        })?;
        self.stats.record_begin();
        Ok(handle)
    }

    /// Returns the metadata of a live transaction.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::UnknownTransaction`] if the handle is not live.
    pub fn metadata(&self, handle: TransactionHandle) -> CoreResult<Arc<F::Metadata>> {
        self.registry.metadata(handle)
    }

    /// Commits a transaction.
    ///
    /// Unblocks maintenance on every table this transaction was the last
    /// deleter of. Unblock failures are retried in the background and do
    /// not fail the commit.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::UnknownTransaction`] if the handle is not live.
    /// Nothing is released in that case.
    pub fn commit(&self, handle: TransactionHandle) -> CoreResult<()> {
        let context = self.registry.remove(handle)?;
        self.release(context.transaction_id());
        self.stats.record_commit();
        debug!(transaction = %handle, "transaction committed");
        Ok(())
    }

    /// Rolls back a transaction.
    ///
    /// Releases deletion entries like [`commit`](Self::commit), then rolls
    /// back the transaction's metadata.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::UnknownTransaction`] if the handle is not live.
    pub fn rollback(&self, handle: TransactionHandle) -> CoreResult<()> {
        let context = self.registry.remove(handle)?;
        self.release(context.transaction_id());
        context.metadata().rollback();
        self.stats.record_rollback();
        debug!(transaction = %handle, "transaction rolled back");
        Ok(())
    }

    fn release(&self, transaction: TransactionId) {
        for table in self.shared.tracker.finish_all(transaction) {
            self.unblock_maintenance(table);
        }
    }

    fn unblock_maintenance(&self, table: TableId) {
        let UnblockAttempt::Failed(e) = self.shared.attempt_unblock(table) else {
            return;
        };
        warn!(%table, error = %e, "failed to unblock maintenance, will retry");
        if let Err(e) = self.retries.schedule(table) {
            error!(%table, error = %e, "cannot retry unblock; table stays blocked until controller restart");
        }
    }

    /// Stops the coordinator.
    ///
    /// New transactions are refused. Live transactions may still commit or
    /// roll back, but their failed unblocks are no longer retried. Pending
    /// retries are drained or abandoned per
    /// [`CoordinatorConfig::drain_on_shutdown`].
    pub fn shutdown(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let live = self.registry.active_count();
        if live > 0 {
            warn!(live, "shutting down with live transactions");
        }
        self.retries.shutdown(self.config.drain_on_shutdown);
    }

    /// Returns whether [`shutdown`](Self::shutdown) has run.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Returns whether any live transaction is deleting from `table`.
    #[must_use]
    pub fn is_blocked(&self, table: TableId) -> bool {
        self.shared.tracker.is_blocked(table)
    }

    /// Returns the tables with at least one live deleter.
    #[must_use]
    pub fn blocked_tables(&self) -> Vec<TableId> {
        self.shared.tracker.blocked_tables()
    }

    /// Returns the transactions currently deleting from `table`.
    #[must_use]
    pub fn deleters(&self, table: TableId) -> Vec<TransactionId> {
        self.shared.tracker.deleters(table)
    }

    /// Returns the number of live transactions.
    #[must_use]
    pub fn active_transactions(&self) -> usize {
        self.registry.active_count()
    }

    /// Returns the number of tables waiting for an unblock retry.
    #[must_use]
    pub fn pending_retries(&self) -> usize {
        self.retries.pending()
    }

    /// Returns a snapshot of the coordinator's counters.
    #[must_use]
    pub fn stats(&self) -> GateStatsSnapshot {
        self.stats.snapshot()
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    /// Returns the metadata factory.
    #[must_use]
    pub fn factory(&self) -> &F {
        &self.factory
    }
}

impl<F: MetadataFactory> Drop for Coordinator<F> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl<F: MetadataFactory> std::fmt::Debug for Coordinator<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coordinator")
            .field("role", &self.config.role)
            .field("active_transactions", &self.active_transactions())
            .field("blocked_tables", &self.blocked_tables().len())
            .field("pending_retries", &self.pending_retries())
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}
