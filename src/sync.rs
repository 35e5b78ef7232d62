//! Durable result queue and its delivery loop.
//!
//! Every finished result is written to the `pendingResults` record before
//! anything else happens to it. A sync cycle walks the queue in order, hands
//! each entry to [`remote::deliver`], and moves acknowledged entries to the
//! `history` record in the same store transaction that shrinks the queue.
//! Entries are only ever removed on acknowledgement.
//!
//! Cycles are single-flight: a cycle requested while another is running is
//! skipped. The [`SyncWorker`] runs cycles on a background thread on a fixed
//! period, when connectivity comes back, and right after an enqueue. Worker
//! triggers that arrive during a cycle are coalesced into one follow-up cycle.

use crate::connectivity::ConnectivityMonitor;
use crate::error::{StoreError, StoreResult};
use crate::record::{HistoryEntry, TypingResult};
use crate::remote::{self, DeliveryOutcome, ResultStore};
use crate::store::LocalStore;
use crate::timer::Interval;
use chrono::{DateTime, Local};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Rows shown by the history view
pub const HISTORY_VIEW_LIMIT: usize = 30;

/// Accepts finished results for delivery
pub trait ResultSink {
    fn enqueue(&self, result: TypingResult) -> StoreResult<()>;
}

impl<T: ResultSink + ?Sized> ResultSink for &T {
    fn enqueue(&self, result: TypingResult) -> StoreResult<()> {
        (**self).enqueue(result)
    }
}

/// Read access to the queue for the presentation layer
pub trait QueueView {
    fn history_view(&self, limit: usize) -> StoreResult<Vec<HistoryRow>>;

    /// Latest worker status, if something changed since the last call
    fn latest_status(&self) -> Option<SyncStatus> {
        None
    }
}

/// What triggered a sync cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
#[strum(serialize_all = "snake_case")]
pub enum SyncTrigger {
    Periodic,
    ConnectivityRestored,
    Enqueued,
    Manual,
}

/// Summary of one sync cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub attempted: usize,
    pub accepted: usize,
    pub rejected: usize,
    pub unreachable: usize,
    pub remaining: usize,
    /// Another cycle was already running, nothing was attempted
    pub skipped: bool,
}

impl CycleReport {
    fn skipped() -> Self {
        Self {
            skipped: true,
            ..Self::default()
        }
    }
}

/// One row of the history view
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryRow {
    pub result: TypingResult,
    pub synced_at: Option<DateTime<Local>>,
}

impl HistoryRow {
    pub fn is_synced(&self) -> bool {
        self.synced_at.is_some()
    }
}

struct FlightGuard<'a>(&'a AtomicBool);

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// The queue owner. Store access is serialized by a mutex held only for
/// reads and writes of the queue, never across network calls.
pub struct Synchronizer<S, R> {
    store: Mutex<S>,
    remote: R,
    in_flight: AtomicBool,
    stopping: AtomicBool,
}

impl<S, R> Synchronizer<S, R> {
    /// Make the running cycle (and any later one) stop before its next
    /// delivery attempt. Entries not yet attempted stay queued.
    pub fn request_stop(&self) {
        self.stopping.store(true, Ordering::Release);
    }

    pub fn is_stopping(&self) -> bool {
        self.stopping.load(Ordering::Acquire)
    }
}

impl<S: LocalStore, R: ResultStore> Synchronizer<S, R> {
    pub fn new(store: S, remote: R) -> Self {
        Self {
            store: Mutex::new(store),
            remote,
            in_flight: AtomicBool::new(false),
            stopping: AtomicBool::new(false),
        }
    }

    fn lock_store(&self) -> MutexGuard<'_, S> {
        // Queue writes are single store calls, so a poisoned lock still
        // guards a consistent queue.
        self.store.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Append to the durable queue. Returns the new queue length.
    pub fn enqueue(&self, result: TypingResult) -> StoreResult<usize> {
        let store = self.lock_store();
        let mut pending = store.pending()?;
        pending.push(result);
        store.save_pending(&pending)?;
        info!(pending = pending.len(), "result queued");
        Ok(pending.len())
    }

    pub fn deliver_one(&self, result: &TypingResult) -> DeliveryOutcome {
        remote::deliver(&self.remote, result)
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Attempt every queued entry once, in order.
    pub fn sync_cycle(&self) -> StoreResult<CycleReport> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("sync cycle already running, skipping");
            return Ok(CycleReport::skipped());
        }
        let _guard = FlightGuard(&self.in_flight);

        let snapshot = self.lock_store().pending()?;
        if snapshot.is_empty() {
            return Ok(CycleReport::default());
        }

        let mut report = CycleReport::default();
        let mut delivered = vec![false; snapshot.len()];
        for (i, result) in snapshot.iter().enumerate() {
            if self.is_stopping() {
                debug!(left = snapshot.len() - i, "stop requested, leaving the rest queued");
                break;
            }
            report.attempted += 1;
            match self.deliver_one(result) {
                DeliveryOutcome::Accepted => {
                    delivered[i] = true;
                    report.accepted += 1;
                }
                DeliveryOutcome::Rejected => report.rejected += 1,
                DeliveryOutcome::Unreachable => report.unreachable += 1,
            }
        }

        let store = self.lock_store();
        // Only this cycle removes entries and enqueue only appends, so the
        // current queue is the snapshot followed by anything queued since.
        let current = store.pending()?;
        if current.len() < snapshot.len() {
            return Err(StoreError::QueueShrank {
                expected: snapshot.len(),
                found: current.len(),
            });
        }
        let newer = &current[snapshot.len()..];

        let mut remaining = Vec::with_capacity(current.len());
        let mut synced = Vec::new();
        for (result, ok) in snapshot.into_iter().zip(delivered) {
            if ok {
                synced.push(result);
            } else {
                remaining.push(result);
            }
        }
        remaining.extend_from_slice(newer);
        report.remaining = remaining.len();

        if !synced.is_empty() {
            let now = Local::now();
            let mut history = store.history()?;
            history.extend(synced.into_iter().map(|result| HistoryEntry {
                result,
                synced_at: now,
            }));
            store.save_pending_and_history(&remaining, &history)?;
        }

        info!(
            attempted = report.attempted,
            accepted = report.accepted,
            remaining = report.remaining,
            "sync cycle finished"
        );
        Ok(report)
    }

    pub fn pending(&self) -> StoreResult<Vec<TypingResult>> {
        self.lock_store().pending()
    }

    pub fn history(&self) -> StoreResult<Vec<HistoryEntry>> {
        self.lock_store().history()
    }

    /// Synced history followed by pending entries, last `limit`, newest first
    pub fn history_view(&self, limit: usize) -> StoreResult<Vec<HistoryRow>> {
        let store = self.lock_store();
        let synced = store.history()?.into_iter().map(|entry| HistoryRow {
            result: entry.result,
            synced_at: Some(entry.synced_at),
        });
        let pending = store.pending()?.into_iter().map(|result| HistoryRow {
            result,
            synced_at: None,
        });

        let mut rows: Vec<HistoryRow> = synced.chain(pending).collect();
        let skip = rows.len().saturating_sub(limit);
        rows.drain(..skip);
        rows.reverse();
        Ok(rows)
    }

    pub fn remote(&self) -> &R {
        &self.remote
    }
}

impl<S: LocalStore, R: ResultStore> QueueView for Synchronizer<S, R> {
    fn history_view(&self, limit: usize) -> StoreResult<Vec<HistoryRow>> {
        Synchronizer::history_view(self, limit)
    }
}

impl<S: LocalStore, R: ResultStore> ResultSink for Synchronizer<S, R> {
    fn enqueue(&self, result: TypingResult) -> StoreResult<()> {
        Synchronizer::enqueue(self, result).map(|_| ())
    }
}

/// Commands accepted by the worker thread
#[derive(Debug)]
pub enum SyncCommand {
    Trigger(SyncTrigger),
    Shutdown,
}

/// Queue state reported back after each cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncStatus {
    pub pending: usize,
    pub online: Option<bool>,
    pub last_cycle: Option<CycleReport>,
}

#[derive(Debug, Clone, Copy)]
pub struct WorkerSettings {
    pub interval: Duration,
    pub probe_period: Duration,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(15),
            probe_period: ConnectivityMonitor::DEFAULT_PROBE_PERIOD,
        }
    }
}

/// Background thread running sync cycles
pub struct SyncWorker<S, R> {
    sync: Arc<Synchronizer<S, R>>,
    tx: Sender<SyncCommand>,
    status_rx: Receiver<SyncStatus>,
    handle: Option<JoinHandle<()>>,
}

impl<S, R> SyncWorker<S, R>
where
    S: LocalStore + Send + 'static,
    R: ResultStore + Send + Sync + 'static,
{
    /// Start the worker. A first cycle runs immediately to drain anything
    /// left over from a previous run.
    pub fn spawn(sync: Synchronizer<S, R>, settings: WorkerSettings) -> Self {
        let sync = Arc::new(sync);
        let (tx, rx) = mpsc::channel();
        let (status_tx, status_rx) = mpsc::channel();

        let worker = Arc::clone(&sync);
        let handle = thread::spawn(move || run_worker(&worker, &rx, &status_tx, settings));

        let _ = tx.send(SyncCommand::Trigger(SyncTrigger::Manual));
        Self {
            sync,
            tx,
            status_rx,
            handle: Some(handle),
        }
    }

    pub fn trigger(&self, trigger: SyncTrigger) {
        if self.tx.send(SyncCommand::Trigger(trigger)).is_err() {
            warn!(%trigger, "sync worker is gone");
        }
    }

    /// Latest status published by the worker, if any arrived since last call
    pub fn latest_status(&self) -> Option<SyncStatus> {
        self.status_rx.try_iter().last()
    }

    pub fn synchronizer(&self) -> &Synchronizer<S, R> {
        &self.sync
    }

    pub fn shutdown(mut self) {
        self.stop();
    }
}

impl<S, R> SyncWorker<S, R> {
    /// Stop the thread. A cycle in progress finishes its current delivery
    /// attempt and leaves the remaining entries queued for the next run.
    fn stop(&mut self) {
        self.sync.request_stop();
        let _ = self.tx.send(SyncCommand::Shutdown);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("sync worker panicked");
            }
        }
    }
}

impl<S, R> ResultSink for SyncWorker<S, R>
where
    S: LocalStore + Send + 'static,
    R: ResultStore + Send + Sync + 'static,
{
    fn enqueue(&self, result: TypingResult) -> StoreResult<()> {
        self.sync.enqueue(result)?;
        self.trigger(SyncTrigger::Enqueued);
        Ok(())
    }
}

impl<S, R> QueueView for SyncWorker<S, R>
where
    S: LocalStore + Send + 'static,
    R: ResultStore + Send + Sync + 'static,
{
    fn history_view(&self, limit: usize) -> StoreResult<Vec<HistoryRow>> {
        self.sync.history_view(limit)
    }

    fn latest_status(&self) -> Option<SyncStatus> {
        SyncWorker::latest_status(self)
    }
}

impl<S, R> Drop for SyncWorker<S, R> {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_worker<S: LocalStore, R: ResultStore>(
    sync: &Synchronizer<S, R>,
    rx: &Receiver<SyncCommand>,
    status_tx: &Sender<SyncStatus>,
    settings: WorkerSettings,
) {
    let start = Instant::now();
    let mut periodic = Interval::new(settings.interval);
    periodic.start(start);
    let mut connectivity = ConnectivityMonitor::new(settings.probe_period);
    connectivity.start(start);

    let wake = settings.probe_period.min(settings.interval);
    let mut follow_up: Option<SyncTrigger> = None;
    loop {
        // A trigger held over from the last cycle runs without waiting
        let received = if follow_up.is_some() {
            rx.try_recv().map_err(|e| match e {
                TryRecvError::Empty => RecvTimeoutError::Timeout,
                TryRecvError::Disconnected => RecvTimeoutError::Disconnected,
            })
        } else {
            rx.recv_timeout(wake)
        };
        let trigger = match received {
            Ok(SyncCommand::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
            Ok(SyncCommand::Trigger(trigger)) => Some(trigger),
            Err(RecvTimeoutError::Timeout) => None,
        };

        let now = Instant::now();
        let restored = connectivity.poll(now, || sync.remote().is_reachable());
        let due = periodic.poll(now) > 0;

        let trigger = trigger
            .or(follow_up.take())
            .or(restored.then_some(SyncTrigger::ConnectivityRestored))
            .or(due.then_some(SyncTrigger::Periodic));
        let Some(trigger) = trigger else {
            continue;
        };

        debug!(%trigger, "running sync cycle");
        let report = match sync.sync_cycle() {
            Ok(report) => Some(report),
            Err(e) => {
                error!(error = %e, "sync cycle failed");
                None
            }
        };

        // Entries queued while the cycle ran were not in its snapshot, so
        // triggers that piled up meanwhile collapse into one more cycle.
        let mut shutdown = false;
        for command in rx.try_iter() {
            match command {
                SyncCommand::Shutdown => shutdown = true,
                SyncCommand::Trigger(trigger) => {
                    follow_up.get_or_insert(trigger);
                }
            }
        }

        let pending = sync.pending().map(|p| p.len()).unwrap_or_default();
        let _ = status_tx.send(SyncStatus {
            pending,
            online: connectivity.is_online(),
            last_cycle: report,
        });

        if shutdown {
            break;
        }
    }
    debug!("sync worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::difficulty::{Difficulty, Plan};
    use crate::error::RemoteError;
    use crate::record::{LegacyPayload, ResultStatus};
    use crate::store::SqliteStore;
    use assert_matches::assert_matches;
    use std::sync::atomic::AtomicUsize;
    use tempfile::tempdir;

    fn result(wpm: u32) -> TypingResult {
        TypingResult {
            participant: "guest".into(),
            plan: Plan::Free,
            difficulty: Difficulty::Easy,
            wpm,
            accuracy: 90,
            elapsed_seconds: 30,
            status: ResultStatus::Completed,
            created_at: Local::now(),
        }
    }

    /// Accepts results whose wpm is even; unreachable while `down` is set
    #[derive(Default)]
    struct Picky {
        down: AtomicBool,
        calls: AtomicUsize,
    }

    impl ResultStore for Picky {
        fn submit_primary(&self, result: &TypingResult) -> Result<(), RemoteError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.down.load(Ordering::SeqCst) {
                return Err(RemoteError::Unreachable("down".into()));
            }
            if result.wpm % 2 == 0 {
                Ok(())
            } else {
                Err(RemoteError::Rejected("odd".into()))
            }
        }

        fn submit_fallback(&self, _payload: &LegacyPayload) -> Result<(), RemoteError> {
            Err(RemoteError::Rejected("legacy refuses too".into()))
        }

        fn is_reachable(&self) -> bool {
            !self.down.load(Ordering::SeqCst)
        }
    }

    fn wpms(results: &[TypingResult]) -> Vec<u32> {
        results.iter().map(|r| r.wpm).collect()
    }

    /// Accepts everything after `delay`; clones share the call counter
    #[derive(Clone)]
    struct Slow {
        delay: Duration,
        calls: Arc<AtomicUsize>,
    }

    impl Slow {
        fn new(delay: Duration) -> Self {
            Self {
                delay,
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    impl ResultStore for Slow {
        fn submit_primary(&self, _result: &TypingResult) -> Result<(), RemoteError> {
            thread::sleep(self.delay);
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn submit_fallback(&self, _payload: &LegacyPayload) -> Result<(), RemoteError> {
            Err(RemoteError::Rejected("unused".into()))
        }

        fn is_reachable(&self) -> bool {
            true
        }
    }

    /// Accepts a result and wipes the shared queue behind the cycle's back
    struct Truncating {
        store: SqliteStore,
    }

    impl ResultStore for Truncating {
        fn submit_primary(&self, _result: &TypingResult) -> Result<(), RemoteError> {
            self.store
                .save_pending(&[])
                .map_err(|e| RemoteError::Unreachable(e.to_string()))
        }

        fn submit_fallback(&self, _payload: &LegacyPayload) -> Result<(), RemoteError> {
            Err(RemoteError::Rejected("unused".into()))
        }

        fn is_reachable(&self) -> bool {
            true
        }
    }

    fn quiet_settings() -> WorkerSettings {
        WorkerSettings {
            interval: Duration::from_secs(60),
            probe_period: Duration::from_secs(60),
        }
    }

    #[test]
    fn test_enqueue_is_durable_immediately() {
        let sync = Synchronizer::new(SqliteStore::open_in_memory().unwrap(), Picky::default());
        assert_eq!(sync.enqueue(result(10)).unwrap(), 1);
        assert_eq!(sync.enqueue(result(12)).unwrap(), 2);
        assert_eq!(wpms(&sync.pending().unwrap()), vec![10, 12]);
    }

    #[test]
    fn test_cycle_moves_accepted_to_history() {
        let sync = Synchronizer::new(SqliteStore::open_in_memory().unwrap(), Picky::default());
        for wpm in [10, 11, 12, 13] {
            sync.enqueue(result(wpm)).unwrap();
        }

        let report = sync.sync_cycle().unwrap();
        assert_eq!(report.attempted, 4);
        assert_eq!(report.accepted, 2);
        assert_eq!(report.rejected, 2);
        assert_eq!(report.remaining, 2);

        assert_eq!(wpms(&sync.pending().unwrap()), vec![11, 13]);
        let history: Vec<u32> = sync.history().unwrap().iter().map(|e| e.result.wpm).collect();
        assert_eq!(history, vec![10, 12]);
    }

    #[test]
    fn test_unreachable_cycle_leaves_queue_untouched() {
        let remote = Picky::default();
        remote.down.store(true, Ordering::SeqCst);
        let sync = Synchronizer::new(SqliteStore::open_in_memory().unwrap(), remote);
        for wpm in [2, 4, 6] {
            sync.enqueue(result(wpm)).unwrap();
        }
        let before = sync.pending().unwrap();

        let report = sync.sync_cycle().unwrap();
        assert_eq!(report.unreachable, 3);
        assert_eq!(sync.pending().unwrap(), before);
        assert!(sync.history().unwrap().is_empty());
    }

    #[test]
    fn test_empty_queue_makes_no_calls() {
        let sync = Synchronizer::new(SqliteStore::open_in_memory().unwrap(), Picky::default());
        assert_eq!(sync.sync_cycle().unwrap(), CycleReport::default());
        assert_eq!(sync.remote().calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_cycle_in_flight_skips() {
        let sync = Synchronizer::new(SqliteStore::open_in_memory().unwrap(), Picky::default());
        sync.enqueue(result(2)).unwrap();

        sync.in_flight.store(true, Ordering::SeqCst);
        assert!(sync.sync_cycle().unwrap().skipped);
        assert_eq!(sync.remote().calls.load(Ordering::SeqCst), 0);
        assert_eq!(sync.pending().unwrap().len(), 1);

        sync.in_flight.store(false, Ordering::SeqCst);
        assert_eq!(sync.sync_cycle().unwrap().accepted, 1);
        assert!(!sync.is_in_flight());
    }

    #[test]
    fn test_history_view_newest_first_with_pending_last_in() {
        let sync = Synchronizer::new(SqliteStore::open_in_memory().unwrap(), Picky::default());
        sync.enqueue(result(2)).unwrap();
        sync.enqueue(result(4)).unwrap();
        sync.sync_cycle().unwrap();
        sync.enqueue(result(7)).unwrap();

        let rows = sync.history_view(HISTORY_VIEW_LIMIT).unwrap();
        let view: Vec<(u32, bool)> = rows.iter().map(|r| (r.result.wpm, r.is_synced())).collect();
        assert_eq!(view, vec![(7, false), (4, true), (2, true)]);
    }

    #[test]
    fn test_history_view_limit() {
        let sync = Synchronizer::new(SqliteStore::open_in_memory().unwrap(), Picky::default());
        for wpm in 0..40 {
            sync.enqueue(result(wpm)).unwrap();
        }
        let rows = sync.history_view(HISTORY_VIEW_LIMIT).unwrap();
        assert_eq!(rows.len(), HISTORY_VIEW_LIMIT);
        assert_eq!(rows[0].result.wpm, 39);
        assert_eq!(rows[29].result.wpm, 10);
    }

    #[test]
    fn test_worker_drains_on_start_and_shuts_down() {
        let sync = Synchronizer::new(SqliteStore::open_in_memory().unwrap(), Picky::default());
        sync.enqueue(result(20)).unwrap();

        let worker = SyncWorker::spawn(
            sync,
            WorkerSettings {
                interval: Duration::from_secs(60),
                probe_period: Duration::from_secs(60),
            },
        );

        let deadline = Instant::now() + Duration::from_secs(5);
        while !worker.synchronizer().pending().unwrap().is_empty() {
            assert!(Instant::now() < deadline, "worker never synced");
            thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(worker.synchronizer().history().unwrap().len(), 1);
        worker.shutdown();
    }

    #[test]
    fn test_worker_enqueue_triggers_delivery() {
        let sync = Synchronizer::new(SqliteStore::open_in_memory().unwrap(), Picky::default());
        let worker = SyncWorker::spawn(
            sync,
            WorkerSettings {
                interval: Duration::from_secs(60),
                probe_period: Duration::from_secs(60),
            },
        );

        ResultSink::enqueue(&worker, result(8)).unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        while worker.synchronizer().history().unwrap().is_empty() {
            assert!(Instant::now() < deadline, "enqueued result never delivered");
            thread::sleep(Duration::from_millis(10));
        }
        assert!(worker.synchronizer().pending().unwrap().is_empty());
    }

    #[test]
    fn test_queue_shrinking_under_a_cycle_is_reported() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("typeforge.db");
        let remote = Truncating {
            store: SqliteStore::open(&path).unwrap(),
        };
        let sync = Synchronizer::new(SqliteStore::open(&path).unwrap(), remote);
        sync.enqueue(result(2)).unwrap();
        sync.enqueue(result(4)).unwrap();

        assert_matches!(
            sync.sync_cycle(),
            Err(StoreError::QueueShrank {
                expected: 2,
                found: 0
            })
        );
        assert!(!sync.is_in_flight());
    }

    #[test]
    fn test_stop_request_leaves_queue_untouched() {
        let sync = Synchronizer::new(SqliteStore::open_in_memory().unwrap(), Picky::default());
        sync.enqueue(result(2)).unwrap();
        sync.enqueue(result(4)).unwrap();

        sync.request_stop();
        let report = sync.sync_cycle().unwrap();
        assert_eq!(report.attempted, 0);
        assert_eq!(report.remaining, 2);
        assert_eq!(sync.remote().calls.load(Ordering::SeqCst), 0);
        assert_eq!(wpms(&sync.pending().unwrap()), vec![2, 4]);
    }

    #[test]
    fn test_worker_drop_does_not_wait_for_whole_cycle() {
        let remote = Slow::new(Duration::from_millis(100));
        let calls = Arc::clone(&remote.calls);
        let sync = Synchronizer::new(SqliteStore::open_in_memory().unwrap(), remote);
        for wpm in 0..10 {
            sync.enqueue(result(wpm)).unwrap();
        }

        let worker = SyncWorker::spawn(sync, quiet_settings());
        thread::sleep(Duration::from_millis(150));

        let started = Instant::now();
        drop(worker);
        assert!(
            started.elapsed() < Duration::from_millis(600),
            "drop waited {:?}",
            started.elapsed()
        );
        assert!(calls.load(Ordering::SeqCst) < 10);
    }

    #[test]
    fn test_worker_runs_follow_up_for_enqueue_during_cycle() {
        let remote = Slow::new(Duration::from_millis(150));
        let sync = Synchronizer::new(SqliteStore::open_in_memory().unwrap(), remote);
        let worker = SyncWorker::spawn(sync, quiet_settings());

        ResultSink::enqueue(&worker, result(30)).unwrap();
        thread::sleep(Duration::from_millis(50));
        ResultSink::enqueue(&worker, result(31)).unwrap();

        let deadline = Instant::now() + Duration::from_secs(2);
        while !worker.synchronizer().pending().unwrap().is_empty() {
            assert!(
                Instant::now() < deadline,
                "result queued mid-cycle waited for the periodic timer"
            );
            thread::sleep(Duration::from_millis(10));
        }
        let history: Vec<u32> = worker
            .synchronizer()
            .history()
            .unwrap()
            .iter()
            .map(|e| e.result.wpm)
            .collect();
        assert_eq!(history, vec![30, 31]);
        worker.shutdown();
    }
}
