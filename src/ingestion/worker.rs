//! Per-source ingest worker.

use crate::error::{IngestError, IngestResult};
use crate::execution::{CancelSignal, ConfirmationGate};
use crate::store::{Collection, StorePool};
use crate::types::{ConfirmationDecision, SourceDescriptor, WorkerOutcome};

use super::csv::RowReader;
use super::observability::{IngestEvent, IngestMetrics, IngestObserver};

/// Ingests one source into its collection.
///
/// The worker:
///
/// 1. copies a private session from the pool (released when the worker returns, on every path)
/// 2. counts the target collection
/// 3. if it is non-empty, asks for an overwrite decision through the [`ConfirmationGate`];
///    `Overwrite` removes the existing documents before the gate is released, `Skip` ends the
///    worker with nothing inserted
/// 4. streams the CSV file and inserts one document per data row, in file order, each insert
///    completing before the next row is read
///
/// Sibling cancellation is checked before prompting, again before clearing the collection after
/// an `Overwrite` answer, and before every insert.
pub struct IngestWorker<'a> {
    source: &'a SourceDescriptor,
    pool: &'a dyn StorePool,
    gate: &'a ConfirmationGate,
    cancel: &'a CancelSignal,
    metrics: Option<&'a IngestMetrics>,
    observer: Option<&'a dyn IngestObserver>,
}

impl<'a> IngestWorker<'a> {
    pub fn new(
        source: &'a SourceDescriptor,
        pool: &'a dyn StorePool,
        gate: &'a ConfirmationGate,
        cancel: &'a CancelSignal,
    ) -> Self {
        Self {
            source,
            pool,
            gate,
            cancel,
            metrics: None,
            observer: None,
        }
    }

    /// Record counters into `metrics`.
    pub fn with_metrics(mut self, metrics: &'a IngestMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Report progress to `observer`.
    pub fn with_observer(mut self, observer: &'a dyn IngestObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Run the worker to completion.
    pub fn run(&self) -> IngestResult<WorkerOutcome> {
        let session = self
            .pool
            .session()
            .map_err(|e| IngestError::Connection { source: e })?;
        let collection = session.collection(self.source.collection());

        let existing = collection.count().map_err(|e| IngestError::CollectionCount {
            collection: collection.name().to_owned(),
            source: e,
        })?;
        if existing > 0 {
            self.emit(IngestEvent::CollectionNonEmpty {
                source: self.source.name().to_owned(),
                count: existing,
            });
            if let Some(outcome) = self.confirm_overwrite(&collection)? {
                return Ok(outcome);
            }
        }

        self.insert_rows(&collection)
    }

    /// Resolve the overwrite decision while holding the gate.
    ///
    /// Returns the final outcome when the worker must stop, `None` to go on ingesting.
    fn confirm_overwrite(&self, collection: &Collection<'_>) -> IngestResult<Option<WorkerOutcome>> {
        let mut token = self.gate.acquire();
        if let Some(metrics) = self.metrics {
            metrics.on_gate_wait(token.waited());
        }
        self.emit(IngestEvent::GateAcquired {
            source: self.source.name().to_owned(),
            waited: token.waited(),
        });

        if self.cancel.is_cancelled() {
            return Ok(Some(WorkerOutcome::Cancelled { inserted: 0 }));
        }

        let decision = token.prompt(self.source.name())?;
        self.emit(IngestEvent::DecisionMade {
            source: self.source.name().to_owned(),
            decision,
        });

        match decision {
            ConfirmationDecision::Overwrite => {
                // A sibling may have failed while the operator was answering.
                if self.cancel.is_cancelled() {
                    return Ok(Some(WorkerOutcome::Cancelled { inserted: 0 }));
                }
                let removed = collection.drop_all().map_err(|e| IngestError::CollectionDrop {
                    collection: collection.name().to_owned(),
                    source: e,
                })?;
                token.release();
                if let Some(metrics) = self.metrics {
                    metrics.on_documents_removed(removed);
                }
                self.emit(IngestEvent::CollectionCleared {
                    source: self.source.name().to_owned(),
                    removed,
                });
                Ok(None)
            }
            ConfirmationDecision::Skip => {
                token.release();
                Ok(Some(WorkerOutcome::Skipped))
            }
        }
    }

    fn insert_rows(&self, collection: &Collection<'_>) -> IngestResult<WorkerOutcome> {
        let mut rows = RowReader::open(self.source)?;
        tracing::debug!(
            source = self.source.name(),
            path = %self.source.path().display(),
            fields = rows.header().len(),
            "reading csv"
        );

        let mut inserted = 0u64;
        while let Some(record) = rows.next_record()? {
            if self.cancel.is_cancelled() {
                return Ok(WorkerOutcome::Cancelled { inserted });
            }
            collection.insert(&record).map_err(|e| IngestError::Insert {
                collection: collection.name().to_owned(),
                source: e,
            })?;
            inserted += 1;
            if let Some(metrics) = self.metrics {
                metrics.on_row_inserted();
            }
        }

        Ok(WorkerOutcome::Inserted { rows: inserted })
    }

    fn emit(&self, event: IngestEvent) {
        if let Some(obs) = self.observer {
            obs.on_event(&event);
        }
    }
}
