//! # maintgate core
//!
//! Transaction-scoped maintenance blocking for storage connectors.
//!
//! While any transaction is deleting rows from a table, background
//! maintenance (compaction, merges) on that table must stay suspended.
//! Once the last such transaction commits or rolls back, maintenance is
//! resumed, and resumption keeps being retried until the store accepts it.
//!
//! This crate provides:
//! - [`Coordinator`] - the transaction lifecycle consumed by the query engine
//! - [`DeletionTracker`] - which transactions are deleting from which tables
//! - [`TransactionRegistry`] - live transaction handles and their metadata
//! - [`MaintenanceGate`] - forwarding to the [`maintgate_storage::MaintenanceStore`]
//! - [`RetryScheduler`] - background retries for failed unblocks

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod coordinator;
mod deletion;
mod error;
mod gate;
mod retry;
mod stats;
mod transaction;
mod types;

pub use config::{CoordinatorConfig, RetryConfig};
pub use coordinator::Coordinator;
pub use deletion::DeletionTracker;
pub use error::{CoreError, CoreResult};
pub use gate::MaintenanceGate;
pub use retry::{RetryScheduler, UnblockAttempt, UnblockTarget, RETRY_THREAD_NAME};
pub use stats::{GateStats, GateStatsSnapshot};
pub use transaction::{
    DeleteHook, DeletionSink, MetadataFactory, TransactionContext, TransactionMetadata,
    TransactionRegistry,
};
pub use types::{IsolationLevel, NodeRole, TableId, TransactionHandle, TransactionId};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
