//! # maintgate testkit
//!
//! Test utilities for maintgate.
//!
//! This crate provides:
//! - A failure-injecting maintenance store
//! - A metadata factory that records what transactions did
//! - Coordinator fixtures with fast retries
//! - A concurrent deleter stress driver
//!
//! ## Usage
//!
//! ```rust,ignore
//! use maintgate_testkit::prelude::*;
//!
//! #[test]
//! fn unblock_survives_store_outage() {
//!     let t = TestCoordinator::new();
//!     let txn = t.begin_transaction(IsolationLevel::ReadCommitted, false).unwrap();
//!     t.metadata(txn).unwrap().delete_from(7u64).unwrap();
//!     t.store.fail_next_unblocks(2);
//!     t.commit(txn).unwrap();
//!     assert!(wait_until(DEFAULT_WAIT, || !t.store.is_blocked(7).unwrap()));
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod metadata;
pub mod store;
pub mod stress;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::metadata::*;
    pub use crate::store::*;
    pub use crate::stress::*;
    pub use maintgate_core::{IsolationLevel, NodeRole, TableId};
    pub use maintgate_storage::MaintenanceStore;
}

pub use fixtures::*;
pub use metadata::*;
pub use store::*;
pub use stress::*;
