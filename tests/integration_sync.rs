use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use chrono::Local;
use tempfile::tempdir;
use typeforge::connectivity::ConnectivityMonitor;
use typeforge::difficulty::{Difficulty, Plan};
use typeforge::error::RemoteError;
use typeforge::record::{LegacyPayload, ResultStatus, TypingResult};
use typeforge::remote::ResultStore;
use typeforge::store::SqliteStore;
use typeforge::sync::{ResultSink, SyncWorker, Synchronizer, WorkerSettings};

fn result(wpm: u32) -> TypingResult {
    TypingResult {
        participant: "Guest".into(),
        plan: Plan::Free,
        difficulty: Difficulty::Easy,
        wpm,
        accuracy: 95,
        elapsed_seconds: 30,
        status: ResultStatus::Completed,
        created_at: Local::now(),
    }
}

/// Remote that accepts everything while up; records the order of primary calls.
///
/// Clones share state so a test can flip reachability under a running worker.
#[derive(Clone, Default)]
struct Switchable {
    down: Arc<AtomicBool>,
    legacy_calls: Arc<AtomicUsize>,
    seen: Arc<Mutex<Vec<u32>>>,
}

impl Switchable {
    fn offline() -> Self {
        let remote = Self::default();
        remote.set_down(true);
        remote
    }

    fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    fn seen(&self) -> Vec<u32> {
        self.seen.lock().unwrap().clone()
    }
}

impl ResultStore for Switchable {
    fn submit_primary(&self, result: &TypingResult) -> Result<(), RemoteError> {
        if self.down.load(Ordering::SeqCst) {
            return Err(RemoteError::Unreachable("connection refused".into()));
        }
        self.seen.lock().unwrap().push(result.wpm);
        Ok(())
    }

    fn submit_fallback(&self, _payload: &LegacyPayload) -> Result<(), RemoteError> {
        self.legacy_calls.fetch_add(1, Ordering::SeqCst);
        Err(RemoteError::Rejected("not expected".into()))
    }

    fn is_reachable(&self) -> bool {
        !self.down.load(Ordering::SeqCst)
    }
}

fn wpms(results: &[TypingResult]) -> Vec<u32> {
    results.iter().map(|r| r.wpm).collect()
}

#[test]
fn offline_results_drain_when_connectivity_returns() {
    let sync = Synchronizer::new(SqliteStore::open_in_memory().unwrap(), Switchable::offline());
    let mut monitor = ConnectivityMonitor::default();

    for wpm in [41, 42, 43] {
        sync.enqueue(result(wpm)).unwrap();
    }
    assert!(!monitor.observe(sync.remote().is_reachable()));

    let report = sync.sync_cycle().unwrap();
    assert_eq!(report.attempted, 3);
    assert_eq!(report.unreachable, 3);
    assert_eq!(report.remaining, 3);
    assert_eq!(wpms(&sync.pending().unwrap()), vec![41, 42, 43]);
    assert!(sync.history().unwrap().is_empty());
    assert_eq!(sync.remote().legacy_calls.load(Ordering::SeqCst), 0);

    sync.remote().set_down(false);
    assert!(monitor.observe(sync.remote().is_reachable()));

    let report = sync.sync_cycle().unwrap();
    assert_eq!(report.accepted, 3);
    assert_eq!(report.remaining, 0);
    assert!(sync.pending().unwrap().is_empty());

    let history: Vec<u32> = sync
        .history()
        .unwrap()
        .iter()
        .map(|entry| entry.result.wpm)
        .collect();
    assert_eq!(history, vec![41, 42, 43]);
    assert_eq!(sync.remote().seen(), vec![41, 42, 43]);
}

#[test]
fn probe_poll_detects_restore() {
    let remote = Switchable::offline();
    let mut monitor = ConnectivityMonitor::new(Duration::from_secs(5));
    let t0 = Instant::now();
    monitor.start(t0);

    assert!(!monitor.poll(t0 + Duration::from_secs(1), || remote.is_reachable()));
    assert!(!monitor.poll(t0 + Duration::from_secs(5), || remote.is_reachable()));
    assert_eq!(monitor.is_online(), Some(false));

    remote.set_down(false);
    assert!(monitor.poll(t0 + Duration::from_secs(10), || remote.is_reachable()));
    assert!(!monitor.poll(t0 + Duration::from_secs(15), || remote.is_reachable()));
}

#[test]
fn queue_survives_restart() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("typeforge.db");

    {
        let sync = Synchronizer::new(SqliteStore::open(&path).unwrap(), Switchable::offline());
        sync.enqueue(result(50)).unwrap();
        sync.enqueue(result(51)).unwrap();
        sync.sync_cycle().unwrap();
    }

    let sync = Synchronizer::new(SqliteStore::open(&path).unwrap(), Switchable::default());
    assert_eq!(wpms(&sync.pending().unwrap()), vec![50, 51]);

    sync.sync_cycle().unwrap();
    drop(sync);

    let reopened = SqliteStore::open(&path).unwrap();
    let sync = Synchronizer::new(reopened, Switchable::default());
    assert!(sync.pending().unwrap().is_empty());
    assert_eq!(sync.history().unwrap().len(), 2);
}

#[test]
fn worker_delivers_results_enqueued_through_it() {
    let remote = Switchable::offline();
    let worker = SyncWorker::spawn(
        Synchronizer::new(SqliteStore::open_in_memory().unwrap(), remote.clone()),
        WorkerSettings {
            interval: Duration::from_millis(20),
            probe_period: Duration::from_millis(10),
        },
    );

    worker.enqueue(result(60)).unwrap();
    worker.enqueue(result(61)).unwrap();
    thread::sleep(Duration::from_millis(60));
    assert_eq!(worker.synchronizer().pending().unwrap().len(), 2);

    remote.set_down(false);
    let mut drained = false;
    for _ in 0..200 {
        if worker.synchronizer().pending().unwrap().is_empty() {
            drained = true;
            break;
        }
        thread::sleep(Duration::from_millis(10));
    }
    assert!(drained, "worker should drain the queue once the remote is back");
    assert_eq!(remote.seen(), vec![60, 61]);

    worker.shutdown();
}
