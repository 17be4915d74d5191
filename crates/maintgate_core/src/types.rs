//! Core type definitions for maintgate.

use std::fmt;
use uuid::Uuid;

/// Identifier of a table whose maintenance can be blocked.
///
/// Table IDs are assigned by the catalog and are stable for the lifetime of
/// the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TableId(pub u64);

impl TableId {
    /// Creates a new table ID.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw ID value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tbl:{}", self.0)
    }
}

impl From<u64> for TableId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// Unique identifier for a transaction.
///
/// Random (UUID v4) and never reused, so IDs from different coordinators
/// cannot collide in logs or in the flag store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TransactionId(Uuid);

impl TransactionId {
    /// Generates a fresh transaction ID.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wraps an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "txn:{}", self.0)
    }
}

/// Opaque handle the query engine holds for one transaction.
///
/// Created by `begin_transaction`, retired by `commit` or `rollback`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransactionHandle {
    id: TransactionId,
}

impl TransactionHandle {
    pub(crate) fn new() -> Self {
        Self {
            id: TransactionId::generate(),
        }
    }

    /// Returns the transaction this handle refers to.
    #[must_use]
    pub const fn transaction_id(&self) -> TransactionId {
        self.id
    }
}

impl fmt::Display for TransactionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.id.fmt(f)
    }
}

/// Transaction isolation levels, weakest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum IsolationLevel {
    /// Dirty reads allowed.
    ReadUncommitted,
    /// Only committed data is visible.
    ReadCommitted,
    /// Rows read once do not change.
    RepeatableRead,
    /// Full serializability.
    Serializable,
}

impl IsolationLevel {
    /// The strongest level a connector transaction provides.
    pub const SUPPORTED: Self = Self::ReadCommitted;

    /// Returns whether a transaction running at `self` satisfies a request
    /// for `requested`.
    #[must_use]
    pub fn meets_requirement_of(self, requested: Self) -> bool {
        self >= requested
    }
}

impl fmt::Display for IsolationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ReadUncommitted => "READ UNCOMMITTED",
            Self::ReadCommitted => "READ COMMITTED",
            Self::RepeatableRead => "REPEATABLE READ",
            Self::Serializable => "SERIALIZABLE",
        };
        f.write_str(name)
    }
}

/// Role of the node running a coordinator.
///
/// Only the controller clears dangling maintenance blocks at start-up;
/// workers would otherwise wipe blocks held by live transactions elsewhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum NodeRole {
    /// The cluster controller.
    Controller,
    /// Any other node.
    #[default]
    Worker,
}
