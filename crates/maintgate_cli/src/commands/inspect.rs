//! Inspect command implementation.

use maintgate_core::TableId;
use maintgate_storage::{MaintenanceStore, FLAG_FILE_VERSION};
use serde::Serialize;
use std::path::Path;

/// Flag store inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Store path.
    pub path: String,
    /// Flag file format version.
    pub format_version: u16,
    /// Number of blocked tables.
    pub blocked_count: usize,
    /// Blocked table ids, ascending.
    pub blocked: Vec<u64>,
    /// Status of a single table (if requested).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table: Option<TableStatus>,
}

/// Maintenance status of one table.
#[derive(Debug, Serialize)]
pub struct TableStatus {
    /// Table id.
    pub id: u64,
    /// Whether maintenance is blocked.
    pub blocked: bool,
}

/// Reads the flags at `path`.
pub fn inspect(
    path: &Path,
    table: Option<u64>,
) -> Result<InspectResult, Box<dyn std::error::Error>> {
    let store = super::open_existing(path)?;
    let blocked = store.blocked_tables()?;

    let table = match table {
        Some(id) => Some(TableStatus {
            id,
            blocked: store.is_blocked(id)?,
        }),
        None => None,
    };

    Ok(InspectResult {
        path: path.display().to_string(),
        format_version: FLAG_FILE_VERSION,
        blocked_count: blocked.len(),
        blocked,
        table,
    })
}

/// Runs the inspect command.
pub fn run(
    path: &Path,
    table: Option<u64>,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let result = inspect(path, table)?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => {
            print_text_output(&result);
        }
    }

    Ok(())
}

fn print_text_output(result: &InspectResult) {
    println!("Maintenance Flag Store");
    println!("======================");
    println!();
    println!("Path:    {}", result.path);
    println!("Format:  v{}", result.format_version);
    println!();
    println!("Blocked tables: {}", result.blocked_count);
    for id in &result.blocked {
        println!("  {}", TableId::new(*id));
    }

    if let Some(status) = &result.table {
        println!();
        let state = if status.blocked { "blocked" } else { "open" };
        println!("{}: {}", TableId::new(status.id), state);
    }
}
