//! `fanout-ingest` loads several independent CSV datasets into the collections of a document
//! store concurrently, one worker per dataset.
//!
//! Workers share a single interactive console: when a target collection already holds data,
//! the worker asks whether to overwrite it, and the [`execution::ConfirmationGate`] makes sure
//! only one worker talks to the console at a time.
//!
//! ## Flow
//!
//! - [`config::IngestConfig`] describes the run and builds the [`types::SourceSet`]
//! - [`bootstrap::ensure_data_source`] makes sure every `<source>.csv` is present locally
//! - [`execution::WorkerCoordinator::run`] starts one [`ingestion::IngestWorker`] per source and
//!   waits for all of them
//! - each worker counts its collection, resolves the overwrite decision if needed, then inserts
//!   one document per CSV data row, in file order
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use fanout_ingest::execution::{ConfirmationGate, WorkerCoordinator};
//! use fanout_ingest::ingestion::TracingObserver;
//! use fanout_ingest::store::MemoryStore;
//! use fanout_ingest::types::SourceSet;
//!
//! # fn main() -> Result<(), fanout_ingest::IngestError> {
//! let sources = SourceSet::from_dir("data", ["contacts-au", "contacts-us"])?;
//! let store = MemoryStore::new();
//! let coordinator = WorkerCoordinator::new(Arc::new(store.clone()), ConfirmationGate::stdio())
//!     .with_observer(Arc::new(TracingObserver));
//!
//! let summary = coordinator.run(&sources)?;
//! println!("inserted={}", summary.rows_inserted());
//! # Ok(())
//! # }
//! ```
//!
//! ## Failure policy
//!
//! Any error other than an unrecognized prompt answer is fatal for the run. The first failing
//! worker raises a cancellation signal; siblings stop before their next prompt or insert, the
//! coordinator joins every worker and returns that first error. Documents inserted before the
//! failure stay in the store.
//!
//! ## Modules
//!
//! - [`config`]: startup configuration (environment driven, no flags)
//! - [`bootstrap`]: local data-directory preparation
//! - [`execution`]: coordinator, confirmation gate, cancellation
//! - [`ingestion`]: CSV reading, the per-source worker, observers and metrics
//! - [`store`]: document-store traits and backends
//! - [`types`]: sources, records and outcomes
//! - [`error`]: error types used across the crate

pub mod bootstrap;
pub mod config;
pub mod error;
pub mod execution;
pub mod ingestion;
pub mod store;
pub mod types;

pub use error::{IngestError, IngestResult};
