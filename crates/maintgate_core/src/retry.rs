//! Background retries for failed unblocks.
//!
//! A failed unblock must not fail the commit or rollback that triggered it,
//! but the table must not stay blocked forever either. Such tables are
//! handed to a [`RetryScheduler`], which retries them at a fixed delay on a
//! single dedicated thread until the store accepts the call.
//!
//! # Usage
//!
//! ```rust,ignore
//! let scheduler = RetryScheduler::start(&RetryConfig::default(), target, stats)?;
//! scheduler.schedule(TableId::new(7))?;
//! // ...
//! scheduler.shutdown(true);
//! ```

use crate::config::RetryConfig;
use crate::error::{CoreError, CoreResult};
use crate::stats::GateStats;
use crate::types::TableId;
use parking_lot::Mutex;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Name of the retry worker thread.
pub const RETRY_THREAD_NAME: &str = "maintgate-unblock-retry";

/// Outcome of one unblock attempt.
#[derive(Debug)]
pub enum UnblockAttempt {
    /// The store cleared the block.
    Unblocked,
    /// A new deleter blocked the table again; nothing to do.
    Superseded,
    /// The store call failed.
    Failed(CoreError),
}

/// Something that can attempt to unblock a table.
///
/// Implemented by the coordinator, which re-checks the deletion tracker
/// under the table's signal latch before calling the store.
pub trait UnblockTarget: Send + Sync + 'static {
    /// Makes one unblock attempt for `table`.
    fn attempt_unblock(&self, table: TableId) -> UnblockAttempt;
}

enum Command {
    Schedule(TableId),
    Shutdown { drain: bool },
}

/// Fixed-delay retry worker for failed unblocks.
///
/// Retries run on one background thread so they never occupy a
/// transaction thread. A table is queued at most once at a time; retries
/// of different tables are independent and unordered.
pub struct RetryScheduler {
    sender: Mutex<Option<Sender<Command>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    pending: Arc<AtomicUsize>,
}

impl RetryScheduler {
    /// Spawns the retry worker.
    ///
    /// # Errors
    ///
    /// Returns an error if `config` is invalid or the thread cannot be
    /// spawned.
    pub fn start<T: UnblockTarget>(
        config: &RetryConfig,
        target: Arc<T>,
        stats: Arc<GateStats>,
    ) -> CoreResult<Self> {
        config.validate()?;

        let (tx, rx) = mpsc::channel();
        let pending = Arc::new(AtomicUsize::new(0));
        let worker = Worker {
            target,
            delay: config.delay,
            max_attempts: config.max_attempts,
            queue: BinaryHeap::new(),
            attempts: HashMap::new(),
            pending: Arc::clone(&pending),
            stats,
        };

        let handle = thread::Builder::new()
            .name(RETRY_THREAD_NAME.to_string())
            .spawn(move || worker.run(rx))?;

        Ok(Self {
            sender: Mutex::new(Some(tx)),
            worker: Mutex::new(Some(handle)),
            pending,
        })
    }

    /// Queues an unblock retry for `table` after the configured delay.
    ///
    /// A table that is already queued is not queued twice.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::SchedulerStopped`] after shutdown.
    pub fn schedule(&self, table: TableId) -> CoreResult<()> {
        let sender = self.sender.lock();
        let tx = sender.as_ref().ok_or(CoreError::SchedulerStopped)?;
        tx.send(Command::Schedule(table))
            .map_err(|_| CoreError::SchedulerStopped)
    }

    /// Returns the number of tables waiting for a retry.
    ///
    /// Updated by the worker, so a just-scheduled table may not be counted
    /// yet.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    /// Returns whether the scheduler still accepts work.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.sender.lock().is_some()
    }

    /// Stops the worker and waits for it to exit.
    ///
    /// With `drain`, every pending table gets one immediate final attempt;
    /// otherwise pending tables are abandoned. Calling this twice is a
    /// no-op.
    pub fn shutdown(&self, drain: bool) {
        if let Some(tx) = self.sender.lock().take() {
            let _ = tx.send(Command::Shutdown { drain });
        }
        if let Some(handle) = self.worker.lock().take() {
            if handle.join().is_err() {
                error!("unblock retry worker panicked");
            }
        }
    }
}

impl Drop for RetryScheduler {
    fn drop(&mut self) {
        self.shutdown(false);
    }
}

impl std::fmt::Debug for RetryScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryScheduler")
            .field("running", &self.is_running())
            .field("pending", &self.pending())
            .finish()
    }
}

struct Worker<T> {
    target: Arc<T>,
    delay: Duration,
    max_attempts: Option<u32>,
    queue: BinaryHeap<Reverse<(Instant, TableId)>>,
    /// Retries made so far per queued table.
    attempts: HashMap<TableId, u32>,
    pending: Arc<AtomicUsize>,
    stats: Arc<GateStats>,
}

impl<T: UnblockTarget> Worker<T> {
    fn run(mut self, rx: Receiver<Command>) {
        loop {
            let command = match self.next_deadline() {
                Some(deadline) => {
                    let now = Instant::now();
                    if deadline <= now {
                        None
                    } else {
                        match rx.recv_timeout(deadline - now) {
                            Ok(command) => Some(command),
                            Err(RecvTimeoutError::Timeout) => None,
                            Err(RecvTimeoutError::Disconnected) => {
                                Some(Command::Shutdown { drain: false })
                            }
                        }
                    }
                }
                None => Some(rx.recv().unwrap_or(Command::Shutdown { drain: false })),
            };

            match command {
                Some(Command::Schedule(table)) => self.enqueue(table),
                Some(Command::Shutdown { drain }) => {
                    self.stop(drain);
                    return;
                }
                None => self.run_due(),
            }
        }
    }

    fn next_deadline(&self) -> Option<Instant> {
        self.queue.peek().map(|Reverse((deadline, _))| *deadline)
    }

    fn enqueue(&mut self, table: TableId) {
        if self.attempts.contains_key(&table) {
            debug!(%table, "unblock retry already pending");
            return;
        }
        self.attempts.insert(table, 0);
        self.queue.push(Reverse((Instant::now() + self.delay, table)));
        self.stats.record_retry_scheduled();
        self.sync_pending();
    }

    fn run_due(&mut self) {
        let now = Instant::now();
        while let Some(Reverse((deadline, table))) = self.queue.peek().copied() {
            if deadline > now {
                break;
            }
            self.queue.pop();
            self.retry(table);
        }
        self.sync_pending();
    }

    fn retry(&mut self, table: TableId) {
        let attempt = self.attempts.get(&table).copied().unwrap_or(0) + 1;
        match self.target.attempt_unblock(table) {
            UnblockAttempt::Unblocked => {
                info!(%table, attempt, "unblocked maintenance after retry");
                self.attempts.remove(&table);
            }
            UnblockAttempt::Superseded => {
                debug!(%table, "table blocked again, dropping retry");
                self.stats.record_retry_superseded();
                self.attempts.remove(&table);
            }
            UnblockAttempt::Failed(e) => {
                if self.max_attempts.is_some_and(|max| attempt >= max) {
                    error!(%table, attempt, error = %e, "giving up on unblocking maintenance");
                    self.stats.record_retry_abandoned();
                    self.attempts.remove(&table);
                    return;
                }
                warn!(%table, attempt, error = %e, "failed to unblock maintenance, will retry");
                self.attempts.insert(table, attempt);
                self.queue.push(Reverse((Instant::now() + self.delay, table)));
            }
        }
    }

    fn stop(&mut self, drain: bool) {
        let tables: Vec<TableId> = self.attempts.keys().copied().collect();
        self.queue.clear();

        if drain {
            for table in tables {
                match self.target.attempt_unblock(table) {
                    UnblockAttempt::Unblocked | UnblockAttempt::Superseded => {}
                    UnblockAttempt::Failed(e) => {
                        warn!(%table, error = %e, "final unblock attempt failed");
                        self.stats.record_retry_abandoned();
                    }
                }
            }
        } else if !tables.is_empty() {
            warn!(count = tables.len(), "abandoning pending unblock retries");
            for _ in &tables {
                self.stats.record_retry_abandoned();
            }
        }

        self.attempts.clear();
        self.sync_pending();
    }

    fn sync_pending(&self) {
        self.pending.store(self.attempts.len(), Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    /// Plays back scripted outcomes, then succeeds.
    #[derive(Default)]
    struct Scripted {
        outcomes: Mutex<VecDeque<UnblockAttempt>>,
        calls: Mutex<Vec<TableId>>,
    }

    impl Scripted {
        fn failing(times: usize) -> Arc<Self> {
            let scripted = Self::default();
            for _ in 0..times {
                scripted.outcomes.lock().push_back(UnblockAttempt::Failed(
                    CoreError::Store(maintgate_storage::StorageError::unavailable("down")),
                ));
            }
            Arc::new(scripted)
        }

        fn calls(&self) -> usize {
            self.calls.lock().len()
        }
    }

    impl UnblockTarget for Scripted {
        fn attempt_unblock(&self, table: TableId) -> UnblockAttempt {
            self.calls.lock().push(table);
            self.outcomes
                .lock()
                .pop_front()
                .unwrap_or(UnblockAttempt::Unblocked)
        }
    }

    fn fast() -> RetryConfig {
        RetryConfig::new().with_delay(Duration::from_millis(10))
    }

    fn wait_until(mut check: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if check() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        check()
    }

    #[test]
    fn retries_until_success() {
        let target = Scripted::failing(2);
        let stats = Arc::new(GateStats::new());
        let scheduler = RetryScheduler::start(&fast(), Arc::clone(&target), Arc::clone(&stats)).unwrap();

        scheduler.schedule(TableId::new(7)).unwrap();

        assert!(wait_until(|| target.calls() == 3 && scheduler.pending() == 0));
        assert_eq!(stats.snapshot().retries_scheduled, 1);
        scheduler.shutdown(false);
        assert_eq!(target.calls(), 3);
    }

    #[test]
    fn duplicate_schedule_is_coalesced() {
        let target = Scripted::failing(0);
        let stats = Arc::new(GateStats::new());
        let config = RetryConfig::new().with_delay(Duration::from_millis(100));
        let scheduler = RetryScheduler::start(&config, Arc::clone(&target), Arc::clone(&stats)).unwrap();

        scheduler.schedule(TableId::new(1)).unwrap();
        scheduler.schedule(TableId::new(1)).unwrap();

        assert!(wait_until(|| target.calls() >= 1 && scheduler.pending() == 0));
        thread::sleep(Duration::from_millis(150));
        assert_eq!(target.calls(), 1);
        assert_eq!(stats.snapshot().retries_scheduled, 1);
    }

    #[test]
    fn attempt_cap_abandons_table() {
        let target = Scripted::failing(10);
        let stats = Arc::new(GateStats::new());
        let config = fast().with_max_attempts(2);
        let scheduler = RetryScheduler::start(&config, Arc::clone(&target), Arc::clone(&stats)).unwrap();

        scheduler.schedule(TableId::new(3)).unwrap();

        assert!(wait_until(|| stats.snapshot().retries_abandoned == 1));
        assert_eq!(target.calls(), 2);
        assert_eq!(scheduler.pending(), 0);
    }

    #[test]
    fn superseded_attempt_is_dropped() {
        let target = Arc::new(Scripted::default());
        target.outcomes.lock().push_back(UnblockAttempt::Superseded);
        let stats = Arc::new(GateStats::new());
        let scheduler = RetryScheduler::start(&fast(), Arc::clone(&target), Arc::clone(&stats)).unwrap();

        scheduler.schedule(TableId::new(4)).unwrap();

        assert!(wait_until(|| stats.snapshot().retries_superseded == 1));
        thread::sleep(Duration::from_millis(50));
        assert_eq!(target.calls(), 1);
    }

    #[test]
    fn drain_makes_final_attempt() {
        let target = Scripted::failing(0);
        let stats = Arc::new(GateStats::new());
        let config = RetryConfig::new().with_delay(Duration::from_secs(60));
        let scheduler = RetryScheduler::start(&config, Arc::clone(&target), Arc::clone(&stats)).unwrap();

        scheduler.schedule(TableId::new(9)).unwrap();
        assert!(wait_until(|| scheduler.pending() == 1));

        scheduler.shutdown(true);
        assert_eq!(target.calls(), 1);
        assert_eq!(scheduler.pending(), 0);
        assert_eq!(stats.snapshot().retries_abandoned, 0);
    }

    #[test]
    fn shutdown_without_drain_abandons() {
        let target = Scripted::failing(0);
        let stats = Arc::new(GateStats::new());
        let config = RetryConfig::new().with_delay(Duration::from_secs(60));
        let scheduler = RetryScheduler::start(&config, Arc::clone(&target), Arc::clone(&stats)).unwrap();

        scheduler.schedule(TableId::new(9)).unwrap();
        assert!(wait_until(|| scheduler.pending() == 1));

        scheduler.shutdown(false);
        assert_eq!(target.calls(), 0);
        assert_eq!(stats.snapshot().retries_abandoned, 1);
    }

    #[test]
    fn schedule_after_shutdown_fails() {
        let scheduler =
            RetryScheduler::start(&fast(), Scripted::failing(0), Arc::new(GateStats::new())).unwrap();
        scheduler.shutdown(false);
        scheduler.shutdown(false);

        assert!(!scheduler.is_running());
        let result = scheduler.schedule(TableId::new(1));
        assert!(matches!(result, Err(CoreError::SchedulerStopped)));
    }

    #[test]
    fn invalid_config_rejected() {
        let config = RetryConfig::new().with_delay(Duration::ZERO);
        let result = RetryScheduler::start(&config, Scripted::failing(0), Arc::new(GateStats::new()));
        assert!(matches!(result, Err(CoreError::InvalidConfig { .. })));
    }
}
