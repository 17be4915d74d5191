//! Recording metadata for coordinator tests.

use maintgate_core::{
    CoreResult, DeleteHook, MetadataFactory, TableId, TransactionId, TransactionMetadata,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Metadata that stands in for a connector's catalog layer.
///
/// [`delete_from`](Self::delete_from) behaves like a delete statement:
/// the first delete on a table announces it through the hook, later ones
/// in the same transaction do not.
#[derive(Debug)]
pub struct RecordingMetadata {
    hook: DeleteHook,
    deleted: Mutex<Vec<TableId>>,
    rolled_back: AtomicBool,
}

impl RecordingMetadata {
    /// Returns the transaction this metadata belongs to.
    pub fn transaction_id(&self) -> TransactionId {
        self.hook.transaction_id()
    }

    /// Returns the raw delete hook.
    pub fn hook(&self) -> &DeleteHook {
        &self.hook
    }

    /// Deletes rows from `table`.
    ///
    /// # Errors
    ///
    /// Fails if maintenance could not be blocked.
    pub fn delete_from(&self, table: impl Into<TableId>) -> CoreResult<()> {
        let table = table.into();
        let mut deleted = self.deleted.lock();
        if deleted.contains(&table) {
            return Ok(());
        }
        self.hook.begin_delete(table)?;
        deleted.push(table);
        Ok(())
    }

    /// Returns the tables this transaction deleted from.
    pub fn deleted_tables(&self) -> Vec<TableId> {
        self.deleted.lock().clone()
    }

    /// Returns whether the coordinator rolled this metadata back.
    pub fn was_rolled_back(&self) -> bool {
        self.rolled_back.load(Ordering::SeqCst)
    }
}

impl TransactionMetadata for RecordingMetadata {
    fn rollback(&self) {
        self.rolled_back.store(true, Ordering::SeqCst);
    }
}

/// Factory producing [`RecordingMetadata`].
#[derive(Debug, Default)]
pub struct RecordingFactory {
    created: AtomicUsize,
}

impl RecordingFactory {
    /// Creates a factory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns how many metadata instances were created.
    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }
}

impl MetadataFactory for RecordingFactory {
    type Metadata = RecordingMetadata;

    fn create(&self, deletes: DeleteHook) -> RecordingMetadata {
        self.created.fetch_add(1, Ordering::SeqCst);
        RecordingMetadata {
            hook: deletes,
            deleted: Mutex::new(Vec::new()),
            rolled_back: AtomicBool::new(false),
        }
    }
}
