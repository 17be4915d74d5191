//! # maintgate storage
//!
//! The persistence side of maintenance blocking.
//!
//! A [`MaintenanceStore`] owns one boolean per table: "maintenance for this
//! table is suspended". The coordinator in `maintgate_core` decides *when*
//! a table is blocked; stores only remember the flag and make it durable.
//!
//! ## Design Principles
//!
//! - Every operation is idempotent
//! - Stores know nothing about transactions or deleters
//! - Must be `Send + Sync` for concurrent access
//!
//! ## Available Stores
//!
//! - [`InMemoryStore`] - For testing and single-process deployments
//! - [`FileStore`] - Flags persisted in a locked flag file
//!
//! ## Example
//!
//! ```rust
//! use maintgate_storage::{InMemoryStore, MaintenanceStore};
//!
//! let store = InMemoryStore::new();
//! store.block_maintenance(7).unwrap();
//! assert!(store.is_blocked(7).unwrap());
//! store.unblock_maintenance(7).unwrap();
//! assert!(!store.is_blocked(7).unwrap());
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
mod memory;

pub use backend::MaintenanceStore;
pub use error::{StorageError, StorageResult};
pub use file::{FileStore, FLAG_FILE_VERSION};
pub use memory::InMemoryStore;
