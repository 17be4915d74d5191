//! File-based maintenance store.
//!
//! ## Directory Layout
//!
//! ```text
//! flags_dir/
//! ├── LOCK              # Advisory lock (fs2), one owner per directory
//! ├── MAINTENANCE       # CBOR-encoded flag file
//! └── MAINTENANCE.tmp   # Temporary file during atomic rewrite
//! ```

use crate::backend::MaintenanceStore;
use crate::error::{StorageError, StorageResult};
use fs2::FileExt;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

const LOCK_FILE: &str = "LOCK";
const FLAG_FILE: &str = "MAINTENANCE";
const FLAG_TEMP: &str = "MAINTENANCE.tmp";

/// Current flag file format version.
pub const FLAG_FILE_VERSION: u16 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct FlagFile {
    version: u16,
    blocked: BTreeSet<u64>,
}

/// A maintenance store that persists flags to a directory.
///
/// Flags survive process restarts, which is what makes
/// `unblock_all_maintenance` at controller start-up meaningful.
///
/// # Durability
///
/// Every change rewrites the flag file through write-then-rename and syncs
/// it before returning. The in-memory view is only updated once the new
/// file is durable, so a failed write leaves the store unchanged.
///
/// # Thread Safety
///
/// The store is thread-safe. Across processes, an exclusive lock on
/// `LOCK` ensures only one store owns the directory.
///
/// # Example
///
/// ```no_run
/// use maintgate_storage::{FileStore, MaintenanceStore};
/// use std::path::Path;
///
/// let store = FileStore::open(Path::new("flags")).unwrap();
/// store.block_maintenance(42).unwrap();
/// ```
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    blocked: RwLock<BTreeSet<u64>>,
    _lock_file: File,
}

impl FileStore {
    /// Opens or creates a flag directory.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Locked`] if another store owns the directory,
    /// [`StorageError::Corrupted`] if the flag file cannot be decoded, or an
    /// I/O error.
    pub fn open(path: &Path) -> StorageResult<Self> {
        fs::create_dir_all(path)?;

        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path.join(LOCK_FILE))?;

        if lock_file.try_lock_exclusive().is_err() {
            return Err(StorageError::Locked);
        }

        let blocked = load_flags(&path.join(FLAG_FILE))?;

        Ok(Self {
            path: path.to_path_buf(),
            blocked: RwLock::new(blocked),
            _lock_file: lock_file,
        })
    }

    /// Returns the flag directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn update(&self, change: impl FnOnce(&mut BTreeSet<u64>) -> bool) -> StorageResult<()> {
        let mut blocked = self.blocked.write();
        let mut next = blocked.clone();
        if !change(&mut next) {
            return Ok(());
        }
        self.persist(&next)?;
        *blocked = next;
        Ok(())
    }

    fn persist(&self, blocked: &BTreeSet<u64>) -> StorageResult<()> {
        let flags = FlagFile {
            version: FLAG_FILE_VERSION,
            blocked: blocked.clone(),
        };
        let mut data = Vec::new();
        ciborium::into_writer(&flags, &mut data)
            .map_err(|e| StorageError::Corrupted(e.to_string()))?;

        let temp_path = self.path.join(FLAG_TEMP);
        let mut file = File::create(&temp_path)?;
        file.write_all(&data)?;
        file.sync_all()?;
        drop(file);

        fs::rename(&temp_path, self.path.join(FLAG_FILE))?;
        sync_directory(&self.path)
    }
}

fn load_flags(path: &Path) -> StorageResult<BTreeSet<u64>> {
    if !path.exists() {
        return Ok(BTreeSet::new());
    }

    let mut data = Vec::new();
    File::open(path)?.read_to_end(&mut data)?;
    if data.is_empty() {
        return Ok(BTreeSet::new());
    }

    let flags: FlagFile = ciborium::from_reader(data.as_slice())
        .map_err(|e| StorageError::Corrupted(e.to_string()))?;
    if flags.version != FLAG_FILE_VERSION {
        return Err(StorageError::Corrupted(format!(
            "unsupported flag file version {}",
            flags.version
        )));
    }
    Ok(flags.blocked)
}

#[cfg(unix)]
fn sync_directory(path: &Path) -> StorageResult<()> {
    File::open(path)?.sync_all()?;
    Ok(())
}

#[cfg(not(unix))]
fn sync_directory(_path: &Path) -> StorageResult<()> {
    Ok(())
}

impl MaintenanceStore for FileStore {
    fn block_maintenance(&self, table_id: u64) -> StorageResult<()> {
        self.update(|blocked| blocked.insert(table_id))
    }

    fn unblock_maintenance(&self, table_id: u64) -> StorageResult<()> {
        self.update(|blocked| blocked.remove(&table_id))
    }

    fn unblock_all_maintenance(&self) -> StorageResult<()> {
        self.update(|blocked| {
            let changed = !blocked.is_empty();
            blocked.clear();
            changed
        })
    }

    fn is_blocked(&self, table_id: u64) -> StorageResult<bool> {
        Ok(self.blocked.read().contains(&table_id))
    }

    fn blocked_tables(&self) -> StorageResult<Vec<u64>> {
        Ok(self.blocked.read().iter().copied().collect())
    }
}
