//! Unblock-all command implementation.
//!
//! Performs the same recovery a controller runs at start-up. Useful when a
//! controller cannot be restarted but a crashed node left blocks behind.

use maintgate_core::TableId;
use maintgate_storage::MaintenanceStore;
use std::path::Path;
use tracing::info;

/// Runs the unblock-all command.
///
/// With `dry_run` the blocked tables are listed but left untouched.
pub fn run(path: &Path, dry_run: bool) -> Result<(), Box<dyn std::error::Error>> {
    let store = super::open_existing(path)?;
    let blocked = store.blocked_tables()?;

    if blocked.is_empty() {
        println!("No blocked tables");
        return Ok(());
    }

    if dry_run {
        println!("Would unblock {} table(s):", blocked.len());
        for id in &blocked {
            println!("  {}", TableId::new(*id));
        }
        return Ok(());
    }

    store.unblock_all_maintenance()?;
    info!(count = blocked.len(), "cleared all maintenance blocks");
    println!("Unblocked {} table(s)", blocked.len());
    Ok(())
}
