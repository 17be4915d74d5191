//! Test fixtures and coordinator helpers.
//!
//! Provides coordinators wired to a [`FlakyStore`] or a temporary
//! [`FileStore`], with retry delays short enough for tests.

use crate::metadata::RecordingFactory;
use crate::store::FlakyStore;
use maintgate_core::{Coordinator, CoordinatorConfig, NodeRole, RetryConfig};
use maintgate_storage::FileStore;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tempfile::TempDir;

/// How long [`wait_until`] callers usually wait before failing a test.
pub const DEFAULT_WAIT: Duration = Duration::from_secs(5);

/// Retry delay used by the fixtures.
pub const FAST_RETRY: Duration = Duration::from_millis(10);

/// A coordinator config with [`FAST_RETRY`].
pub fn fast_config() -> CoordinatorConfig {
    CoordinatorConfig::new().retry(RetryConfig::new().with_delay(FAST_RETRY))
}

/// Polls `check` until it returns `true` or `timeout` elapses.
///
/// Returns the final result of `check`.
pub fn wait_until(timeout: Duration, mut check: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if check() {
            return true;
        }
        thread::sleep(Duration::from_millis(2));
    }
    check()
}

/// A coordinator over a [`FlakyStore`].
pub struct TestCoordinator {
    /// The coordinator.
    pub coordinator: Coordinator<RecordingFactory>,
    /// The store, for arming failures and checking flags.
    pub store: Arc<FlakyStore>,
}

impl TestCoordinator {
    /// Creates a started worker-role coordinator with fast retries.
    pub fn new() -> Self {
        Self::with_config(fast_config())
    }

    /// Creates a started coordinator with `config`.
    pub fn with_config(config: CoordinatorConfig) -> Self {
        Self::with_store(Arc::new(FlakyStore::new()), config)
    }

    /// Creates a started controller whose store begins with `blocked`.
    pub fn controller(blocked: impl IntoIterator<Item = u64>) -> Self {
        let store = Arc::new(FlakyStore::with_blocked(blocked));
        Self::with_store(store, fast_config().role(NodeRole::Controller))
    }

    /// Creates a started coordinator over an existing store.
    pub fn with_store(store: Arc<FlakyStore>, config: CoordinatorConfig) -> Self {
        let coordinator = Self::unstarted(Arc::clone(&store), config);
        coordinator.start().expect("Failed to start coordinator");
        Self { coordinator, store }
    }

    /// Creates a coordinator without running start-up recovery.
    pub fn unstarted(store: Arc<FlakyStore>, config: CoordinatorConfig) -> Coordinator<RecordingFactory> {
        Coordinator::new(store, RecordingFactory::new(), config)
            .expect("Failed to create coordinator")
    }
}

impl Default for TestCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl std::ops::Deref for TestCoordinator {
    type Target = Coordinator<RecordingFactory>;

    fn deref(&self) -> &Self::Target {
        &self.coordinator
    }
}

/// A coordinator over a [`FileStore`] in a temporary directory.
pub struct FileCoordinator {
    /// The coordinator.
    pub coordinator: Coordinator<RecordingFactory>,
    /// The store.
    pub store: Arc<FileStore>,
    temp_dir: TempDir,
}

impl FileCoordinator {
    /// Creates a started coordinator with `role`.
    pub fn new(role: NodeRole) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let store = Arc::new(FileStore::open(temp_dir.path()).expect("Failed to open flag store"));
        let coordinator = Coordinator::new(
            Arc::clone(&store) as Arc<dyn maintgate_storage::MaintenanceStore>,
            RecordingFactory::new(),
            fast_config().role(role),
        )
        .expect("Failed to create coordinator");
        coordinator.start().expect("Failed to start coordinator");

        Self {
            coordinator,
            store,
            temp_dir,
        }
    }

    /// Shuts the coordinator down and releases the flag directory.
    ///
    /// Returns the directory so a new store can be opened on it.
    pub fn close(self) -> TempDir {
        self.coordinator.shutdown();
        drop(self.coordinator);
        drop(self.store);
        self.temp_dir
    }
}

impl std::ops::Deref for FileCoordinator {
    type Target = Coordinator<RecordingFactory>;

    fn deref(&self) -> &Self::Target {
        &self.coordinator
    }
}
