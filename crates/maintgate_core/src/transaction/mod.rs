//! Transaction lifecycle bookkeeping.
//!
//! The query engine drives transactions through opaque handles:
//! - **begin** allocates a handle and builds the transaction's metadata
//! - **commit** / **rollback** retire the handle exactly once
//! - each transaction's metadata carries a [`DeleteHook`] bound to it

mod context;
mod registry;

pub use context::{
    DeleteHook, DeletionSink, MetadataFactory, TransactionContext, TransactionMetadata,
};
pub use registry::TransactionRegistry;
