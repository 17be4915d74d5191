//! CLI command implementations.

pub mod block;
pub mod inspect;
pub mod unblock;
pub mod unblock_all;

use maintgate_storage::FileStore;
use std::path::Path;

/// Opens the flag store at `path`, refusing to create a new one.
pub(crate) fn open_existing(path: &Path) -> Result<FileStore, Box<dyn std::error::Error>> {
    if !path.is_dir() {
        return Err(format!("No flag store found at {:?}", path).into());
    }
    Ok(FileStore::open(path)?)
}
