use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::Serialize;

use crate::types::{ConfirmationDecision, WorkerOutcome};

/// Events emitted by the coordinator and its workers.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum IngestEvent {
    RunStarted { workers: usize },
    WorkerStarted { source: String },
    CollectionNonEmpty { source: String, count: u64 },
    GateAcquired { source: String, waited: Duration },
    DecisionMade { source: String, decision: ConfirmationDecision },
    CollectionCleared { source: String, removed: u64 },
    WorkerFinished { source: String, outcome: WorkerOutcome },
    WorkerFailed {
        source: String,
        operation: &'static str,
        message: String,
    },
    RunFinished {
        elapsed: Duration,
        metrics: IngestMetricsSnapshot,
    },
}

/// Observer hook for ingestion events.
///
/// Called from worker threads; implementations must not block for long.
pub trait IngestObserver: Send + Sync {
    fn on_event(&self, event: &IngestEvent);
}

/// Forwards events to `tracing`.
#[derive(Debug, Default)]
pub struct TracingObserver;

impl IngestObserver for TracingObserver {
    fn on_event(&self, event: &IngestEvent) {
        match event {
            IngestEvent::RunStarted { workers } => {
                tracing::info!(workers, "running {workers} ingest workers");
            }
            IngestEvent::WorkerStarted { source } => tracing::debug!(source = %source, "worker started"),
            IngestEvent::CollectionNonEmpty { source, count } => {
                tracing::info!(source = %source, count, "target collection already holds data");
            }
            IngestEvent::GateAcquired { source, waited } => {
                tracing::debug!(source = %source, waited = ?waited, "confirmation gate acquired");
            }
            IngestEvent::DecisionMade { source, decision } => {
                tracing::info!(source = %source, decision = ?decision, "overwrite decision");
            }
            IngestEvent::CollectionCleared { source, removed } => {
                tracing::info!(source = %source, removed, "existing documents removed");
            }
            IngestEvent::WorkerFinished { source, outcome } => {
                tracing::info!(source = %source, outcome = ?outcome, "worker finished");
            }
            IngestEvent::WorkerFailed {
                source,
                operation,
                message,
            } => tracing::error!(source = %source, operation, "{message}"),
            IngestEvent::RunFinished { elapsed, metrics } => {
                tracing::info!(elapsed = ?elapsed, "all workers completed: {metrics}");
            }
        }
    }
}

/// An observer that fans out events to a list of observers.
#[derive(Default)]
pub struct CompositeObserver {
    observers: Vec<Arc<dyn IngestObserver>>,
}

impl CompositeObserver {
    /// Create a new composite observer from a list of observers.
    pub fn new(observers: Vec<Arc<dyn IngestObserver>>) -> Self {
        Self { observers }
    }
}

impl fmt::Debug for CompositeObserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeObserver")
            .field("observers_len", &self.observers.len())
            .finish()
    }
}

impl IngestObserver for CompositeObserver {
    fn on_event(&self, event: &IngestEvent) {
        for o in &self.observers {
            o.on_event(event);
        }
    }
}

/// Appends one JSON object per event to a local log file.
#[derive(Debug)]
pub struct FileObserver {
    path: PathBuf,
    lock: Mutex<()>,
}

#[derive(Serialize)]
struct LoggedEvent<'a> {
    ts: u64,
    #[serde(flatten)]
    event: &'a IngestEvent,
}

impl FileObserver {
    /// Create a file observer that appends events to `path`.
    ///
    /// Writes are best-effort; failures to open/write the log file are reported through
    /// `tracing` and otherwise ignored.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            lock: Mutex::new(()),
        }
    }

    fn append_line(&self, line: &str) {
        let _guard = self.lock.lock().ok();
        let written = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .and_then(|mut f| writeln!(f, "{line}"));
        if let Err(err) = written {
            tracing::warn!(path = %self.path.display(), "event log write failed: {err}");
        }
    }
}

impl IngestObserver for FileObserver {
    fn on_event(&self, event: &IngestEvent) {
        let logged = LoggedEvent { ts: unix_ts(), event };
        match serde_json::to_string(&logged) {
            Ok(line) => self.append_line(&line),
            Err(err) => tracing::warn!("event log serialization failed: {err}"),
        }
    }
}

fn unix_ts() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Real-time counters for an ingestion run.
///
/// Workers update these while running; callers can snapshot them at any time.
#[derive(Debug, Default)]
pub struct IngestMetrics {
    workers_started: AtomicU64,
    workers_finished: AtomicU64,
    workers_failed: AtomicU64,
    workers_skipped: AtomicU64,
    workers_cancelled: AtomicU64,
    rows_inserted: AtomicU64,
    documents_removed: AtomicU64,
    gate_wait_ns: AtomicU64,
    elapsed_ns: AtomicU64,
}

impl IngestMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_worker_start(&self) {
        let _ = self.workers_started.fetch_add(1, Ordering::SeqCst);
    }

    pub fn on_worker_finish(&self, outcome: &WorkerOutcome) {
        let _ = self.workers_finished.fetch_add(1, Ordering::SeqCst);
        match outcome {
            WorkerOutcome::Inserted { .. } => {}
            WorkerOutcome::Skipped => {
                let _ = self.workers_skipped.fetch_add(1, Ordering::SeqCst);
            }
            WorkerOutcome::Cancelled { .. } => {
                let _ = self.workers_cancelled.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    pub fn on_worker_failure(&self) {
        let _ = self.workers_failed.fetch_add(1, Ordering::SeqCst);
    }

    pub fn on_row_inserted(&self) {
        let _ = self.rows_inserted.fetch_add(1, Ordering::SeqCst);
    }

    pub fn on_documents_removed(&self, n: u64) {
        let _ = self.documents_removed.fetch_add(n, Ordering::SeqCst);
    }

    pub fn on_gate_wait(&self, d: Duration) {
        let _ = self.gate_wait_ns.fetch_add(duration_ns(d), Ordering::SeqCst);
    }

    pub fn end_run(&self, elapsed: Duration) {
        self.elapsed_ns.store(duration_ns(elapsed), Ordering::SeqCst);
    }

    pub fn snapshot(&self) -> IngestMetricsSnapshot {
        let elapsed_ns = self.elapsed_ns.load(Ordering::SeqCst);
        IngestMetricsSnapshot {
            workers_started: self.workers_started.load(Ordering::SeqCst),
            workers_finished: self.workers_finished.load(Ordering::SeqCst),
            workers_failed: self.workers_failed.load(Ordering::SeqCst),
            workers_skipped: self.workers_skipped.load(Ordering::SeqCst),
            workers_cancelled: self.workers_cancelled.load(Ordering::SeqCst),
            rows_inserted: self.rows_inserted.load(Ordering::SeqCst),
            documents_removed: self.documents_removed.load(Ordering::SeqCst),
            gate_wait: Duration::from_nanos(self.gate_wait_ns.load(Ordering::SeqCst)),
            elapsed: (elapsed_ns > 0).then(|| Duration::from_nanos(elapsed_ns)),
        }
    }
}

fn duration_ns(d: Duration) -> u64 {
    u64::try_from(d.as_nanos()).unwrap_or(u64::MAX)
}

/// Immutable snapshot of [`IngestMetrics`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestMetricsSnapshot {
    pub workers_started: u64,
    pub workers_finished: u64,
    pub workers_failed: u64,
    pub workers_skipped: u64,
    pub workers_cancelled: u64,
    pub rows_inserted: u64,
    pub documents_removed: u64,
    pub gate_wait: Duration,
    pub elapsed: Option<Duration>,
}

impl fmt::Display for IngestMetricsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "workers={}/{} (skipped={}, cancelled={}, failed={}), rows_inserted={}, documents_removed={}, gate_wait={:?}, elapsed={:?}",
            self.workers_finished,
            self.workers_started,
            self.workers_skipped,
            self.workers_cancelled,
            self.workers_failed,
            self.rows_inserted,
            self.documents_removed,
            self.gate_wait,
            self.elapsed
        )
    }
}
