//! Error types for maintgate core.

use crate::types::{IsolationLevel, TableId, TransactionHandle, TransactionId};
use std::io;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in coordinator operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The maintenance store rejected or failed a call.
    #[error("maintenance store error: {0}")]
    Store(#[from] maintgate_storage::StorageError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Requested isolation is stricter than the connector supports.
    #[error("isolation level {requested} not supported (max {supported})")]
    UnsupportedIsolation {
        /// The level the engine asked for.
        requested: IsolationLevel,
        /// The strongest supported level.
        supported: IsolationLevel,
    },

    /// The handle is not a live transaction.
    #[error("no such transaction: {handle}")]
    UnknownTransaction {
        /// The handle that was looked up.
        handle: TransactionHandle,
    },

    /// A transaction started deleting from the same table twice.
    #[error("{transaction} already deleting from {table}")]
    DuplicateDeletion {
        /// The table.
        table: TableId,
        /// The transaction.
        transaction: TransactionId,
    },

    /// A delete hook was used after its transaction committed or rolled
    /// back.
    #[error("{transaction} has already finished")]
    FinishedTransaction {
        /// The transaction.
        transaction: TransactionId,
    },

    /// Transactions were requested before start-up recovery succeeded.
    #[error("coordinator not started")]
    NotStarted,

    /// The coordinator has been shut down.
    #[error("coordinator is shut down")]
    CoordinatorClosed,

    /// The retry scheduler no longer accepts work.
    #[error("retry scheduler is stopped")]
    SchedulerStopped,

    /// Configuration rejected.
    #[error("invalid configuration: {message}")]
    InvalidConfig {
        /// Description of the problem.
        message: String,
    },
}

impl CoreError {
    /// Creates an unknown transaction error.
    pub fn unknown_transaction(handle: TransactionHandle) -> Self {
        Self::UnknownTransaction { handle }
    }

    /// Creates a duplicate deletion error.
    pub fn duplicate_deletion(table: TableId, transaction: TransactionId) -> Self {
        Self::DuplicateDeletion { table, transaction }
    }

    /// Creates a finished transaction error.
    pub fn finished_transaction(transaction: TransactionId) -> Self {
        Self::FinishedTransaction { transaction }
    }

    /// Creates an invalid configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Returns whether this error is a caller contract violation rather
    /// than a failure of the maintenance store.
    #[must_use]
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedIsolation { .. }
                | Self::UnknownTransaction { .. }
                | Self::DuplicateDeletion { .. }
                | Self::FinishedTransaction { .. }
        )
    }
}
