//! Block command implementation.

use maintgate_core::TableId;
use maintgate_storage::MaintenanceStore;
use std::path::Path;
use tracing::info;

/// Runs the block command.
///
/// Suspends maintenance on `table` until it is unblocked by hand or by a
/// controller restart.
pub fn run(path: &Path, table: u64) -> Result<(), Box<dyn std::error::Error>> {
    let store = super::open_existing(path)?;
    let was_blocked = store.is_blocked(table)?;
    store.block_maintenance(table)?;

    let table = TableId::new(table);
    if was_blocked {
        println!("{table} was already blocked");
    } else {
        info!(%table, "maintenance blocked by operator");
        println!("Blocked maintenance on {table}");
    }
    Ok(())
}
