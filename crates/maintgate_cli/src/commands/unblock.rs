//! Unblock command implementation.

use maintgate_core::TableId;
use maintgate_storage::MaintenanceStore;
use std::path::Path;
use tracing::{info, warn};

/// Runs the unblock command.
pub fn run(path: &Path, table: u64) -> Result<(), Box<dyn std::error::Error>> {
    let store = super::open_existing(path)?;
    let table_id = TableId::new(table);

    if !store.is_blocked(table)? {
        warn!(table = %table_id, "table was not blocked");
        println!("{table_id} is not blocked");
        return Ok(());
    }

    store.unblock_maintenance(table)?;
    info!(table = %table_id, "maintenance unblocked by operator");
    println!("Unblocked maintenance on {table_id}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use maintgate_storage::FileStore;
    use tempfile::TempDir;

    #[test]
    fn unblock_clears_only_that_table() {
        let dir = TempDir::new().unwrap();
        {
            let store = FileStore::open(dir.path()).unwrap();
            store.block_maintenance(1).unwrap();
            store.block_maintenance(2).unwrap();
        }

        run(dir.path(), 1).unwrap();
        run(dir.path(), 1).unwrap();

        let store = FileStore::open(dir.path()).unwrap();
        assert_eq!(store.blocked_tables().unwrap(), vec![2]);
    }
}
