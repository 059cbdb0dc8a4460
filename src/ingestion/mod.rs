//! Per-source ingestion.
//!
//! - [`csv`]: header and row reading, tolerant of lone-CR line endings
//! - [`worker`]: [`IngestWorker`], which loads one source into its collection
//! - [`observability`]: events, observers and run metrics
//!
//! Runs over several sources are driven by [`crate::execution::WorkerCoordinator`].

pub mod csv;
pub mod observability;
pub mod worker;

pub use self::csv::RowReader;
pub use observability::{
    CompositeObserver, FileObserver, IngestEvent, IngestMetrics, IngestMetricsSnapshot, IngestObserver,
    TracingObserver,
};
pub use worker::IngestWorker;
