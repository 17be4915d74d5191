//! Forwarding layer over the maintenance store.

use crate::error::CoreResult;
use crate::stats::GateStats;
use crate::types::TableId;
use maintgate_storage::MaintenanceStore;
use parking_lot::{Mutex, MutexGuard};
use std::sync::Arc;
use tracing::{info, warn};

/// Wraps the external block/unblock calls for one coordinator.
///
/// Every store failure originates here. The gate also owns the signal
/// latches: a fixed set of mutex stripes indexed by table ID. Callers hold
/// a table's latch across its store call and the matching tracker update,
/// which keeps a late unblock from overtaking a newer block of the same
/// table.
pub struct MaintenanceGate {
    store: Arc<dyn MaintenanceStore>,
    latches: Box<[Mutex<()>]>,
    stats: Arc<GateStats>,
}

impl MaintenanceGate {
    /// Creates a gate over `store` with `stripes` signal latches.
    ///
    /// `stripes` is clamped to at least one.
    pub fn new(store: Arc<dyn MaintenanceStore>, stripes: usize, stats: Arc<GateStats>) -> Self {
        let latches = (0..stripes.max(1)).map(|_| Mutex::new(())).collect();
        Self {
            store,
            latches,
            stats,
        }
    }

    /// Locks the signal latch covering `table`.
    pub fn latch(&self, table: TableId) -> MutexGuard<'_, ()> {
        let stripe = (table.as_u64() % self.latches.len() as u64) as usize;
        self.latches[stripe].lock()
    }

    /// Suspends maintenance for `table`.
    ///
    /// # Errors
    ///
    /// Returns the store error. The delete that asked for the block must
    /// not proceed.
    pub fn block(&self, table: TableId) -> CoreResult<()> {
        let result = self.store.block_maintenance(table.as_u64());
        self.stats.record_block(result.is_ok());
        if let Err(e) = &result {
            warn!(%table, error = %e, "failed to block maintenance");
        }
        Ok(result?)
    }

    /// Resumes maintenance for `table`.
    ///
    /// # Errors
    ///
    /// Returns the store error. Callers on the transaction path hand the
    /// table to the retry worker instead of propagating it.
    pub fn unblock(&self, table: TableId) -> CoreResult<()> {
        let result = self.store.unblock_maintenance(table.as_u64());
        self.stats.record_unblock(result.is_ok());
        Ok(result?)
    }

    /// Clears every block in the store.
    ///
    /// # Errors
    ///
    /// Returns the store error.
    pub fn unblock_all(&self) -> CoreResult<()> {
        self.store.unblock_all_maintenance()?;
        self.stats.record_recovery();
        info!("cleared all maintenance blocks");
        Ok(())
    }

    /// Returns whether the store reports `table` as blocked.
    ///
    /// # Errors
    ///
    /// Returns the store error.
    pub fn store_blocked(&self, table: TableId) -> CoreResult<bool> {
        Ok(self.store.is_blocked(table.as_u64())?)
    }
}

impl std::fmt::Debug for MaintenanceGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MaintenanceGate")
            .field("latches", &self.latches.len())
            .finish_non_exhaustive()
    }
}
