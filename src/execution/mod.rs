//! Worker coordination for an ingestion run.
//!
//! This module sits "above" [`crate::ingestion`] and provides:
//!
//! - [`WorkerCoordinator`]: one worker thread per source, joined on an N-of-N barrier
//! - [`ConfirmationGate`]: mutual exclusion for the interactive overwrite prompt
//! - [`CancelSignal`]: the first fatal error stops sibling workers at their next safe point

mod gate;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, mpsc};
use std::time::Instant;

use rayon::ThreadPoolBuilder;

use crate::error::IngestResult;
use crate::ingestion::observability::{IngestEvent, IngestMetrics, IngestObserver};
use crate::ingestion::worker::IngestWorker;
use crate::store::StorePool;
use crate::types::{RunSummary, SourceDescriptor, SourceSet, WorkerOutcome};

pub use gate::{ConfirmationGate, Console, GateToken, LineConsole, StdConsole};

/// Shared stop flag raised by the first worker that fails.
#[derive(Debug, Default)]
pub struct CancelSignal {
    cancelled: AtomicBool,
}

impl CancelSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask every worker sharing this signal to stop.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Runs one [`IngestWorker`] per source in parallel and waits for all of them.
///
/// There is no bounded pool: every source gets its own thread, so a worker blocked at the
/// prompt never delays a sibling that does not need the console.
///
/// When a worker fails, the coordinator raises a [`CancelSignal`]; siblings stop before their
/// next prompt or insert and release their sessions. Once every worker has returned, the first
/// error is handed back. Documents inserted before the failure are kept.
pub struct WorkerCoordinator {
    store: Arc<dyn StorePool>,
    gate: ConfirmationGate,
    observer: Option<Arc<dyn IngestObserver>>,
    metrics: Arc<IngestMetrics>,
}

impl WorkerCoordinator {
    /// Create a coordinator over a dialed store and the console gate.
    pub fn new(store: Arc<dyn StorePool>, gate: ConfirmationGate) -> Self {
        Self {
            store,
            gate,
            observer: None,
            metrics: Arc::new(IngestMetrics::new()),
        }
    }

    /// Attach an observer for ingestion events (logging/event log).
    pub fn with_observer(mut self, observer: Arc<dyn IngestObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Get a handle to real-time ingestion metrics.
    pub fn metrics(&self) -> Arc<IngestMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Ingest every source of `sources`, returning once all workers have finished.
    pub fn run(&self, sources: &SourceSet) -> IngestResult<RunSummary> {
        let start = Instant::now();
        self.emit(IngestEvent::RunStarted {
            workers: sources.len(),
        });
        if sources.is_empty() {
            return Ok(self.finish(start, RunSummary::default()));
        }

        let pool = ThreadPoolBuilder::new()
            .num_threads(sources.len())
            .thread_name(|i| format!("ingest-worker-{i}"))
            .build()?;

        let cancel = CancelSignal::new();
        let (tx, rx) = mpsc::channel();
        pool.scope(|s| {
            for (idx, source) in sources.iter().enumerate() {
                let tx = tx.clone();
                let cancel = &cancel;
                s.spawn(move |_| {
                    let result = self.run_worker(source, cancel);
                    if result.is_err() {
                        cancel.cancel();
                    }
                    // The receiver outlives the scope.
                    let _ = tx.send((idx, result));
                });
            }
        });
        drop(tx);

        // Completion order: the first error received is the first one raised.
        let mut outcomes: Vec<Option<WorkerOutcome>> = vec![None; sources.len()];
        let mut first_error = None;
        for (idx, result) in rx {
            match result {
                Ok(outcome) => outcomes[idx] = Some(outcome),
                Err(err) => {
                    if first_error.is_none() {
                        first_error = Some(err);
                    }
                }
            }
        }

        let summary = RunSummary {
            outcomes: sources
                .iter()
                .zip(outcomes)
                .filter_map(|(source, outcome)| outcome.map(|o| (source.name().to_owned(), o)))
                .collect(),
        };
        let summary = self.finish(start, summary);
        match first_error {
            Some(err) => Err(err),
            None => Ok(summary),
        }
    }

    fn run_worker(&self, source: &SourceDescriptor, cancel: &CancelSignal) -> IngestResult<WorkerOutcome> {
        self.metrics.on_worker_start();
        self.emit(IngestEvent::WorkerStarted {
            source: source.name().to_owned(),
        });

        let mut worker = IngestWorker::new(source, self.store.as_ref(), &self.gate, cancel)
            .with_metrics(&self.metrics);
        if let Some(observer) = self.observer.as_deref() {
            worker = worker.with_observer(observer);
        }
        let result = worker.run();

        match &result {
            Ok(outcome) => {
                self.metrics.on_worker_finish(outcome);
                self.emit(IngestEvent::WorkerFinished {
                    source: source.name().to_owned(),
                    outcome: *outcome,
                });
            }
            Err(err) => {
                self.metrics.on_worker_failure();
                self.emit(IngestEvent::WorkerFailed {
                    source: source.name().to_owned(),
                    operation: err.operation(),
                    message: err.to_string(),
                });
            }
        }
        result
    }

    fn finish(&self, start: Instant, summary: RunSummary) -> RunSummary {
        let elapsed = start.elapsed();
        self.metrics.end_run(elapsed);
        self.emit(IngestEvent::RunFinished {
            elapsed,
            metrics: self.metrics.snapshot(),
        });
        summary
    }

    fn emit(&self, event: IngestEvent) {
        if let Some(obs) = &self.observer {
            obs.on_event(&event);
        }
    }
}

impl std::fmt::Debug for WorkerCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerCoordinator")
            .field("observer_set", &self.observer.is_some())
            .field("metrics", &self.metrics.snapshot())
            .finish_non_exhaustive()
    }
}
