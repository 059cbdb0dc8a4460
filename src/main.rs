//! Loads every registered CSV source into its collection, asking before overwriting data.

use std::process;
use std::sync::Arc;

use fanout_ingest::bootstrap::ensure_data_source;
use fanout_ingest::config::IngestConfig;
use fanout_ingest::execution::{ConfirmationGate, WorkerCoordinator};
use fanout_ingest::ingestion::{CompositeObserver, FileObserver, IngestObserver, TracingObserver};
use fanout_ingest::store::MongoPool;
use fanout_ingest::{IngestError, IngestResult};
use tracing_subscriber::EnvFilter;

fn main() {
    // Logs go to stderr; stdout carries the overwrite prompts.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = run() {
        eprintln!("{}: {err}", err.operation());
        process::exit(1);
    }
}

fn run() -> IngestResult<()> {
    let config = IngestConfig::from_env()?;
    let sources = config.source_set()?;
    ensure_data_source(&config, &sources)?;

    let store = MongoPool::dial(&config.store_uri, &config.database)
        .map_err(|e| IngestError::Connection { source: e })?;

    let mut observers: Vec<Arc<dyn IngestObserver>> = vec![Arc::new(TracingObserver)];
    if let Some(path) = &config.event_log {
        observers.push(Arc::new(FileObserver::new(path)));
    }

    let coordinator = WorkerCoordinator::new(Arc::new(store), ConfirmationGate::stdio())
        .with_observer(Arc::new(CompositeObserver::new(observers)));
    let summary = coordinator.run(&sources)?;

    tracing::info!(
        sources = summary.outcomes.len(),
        rows = summary.rows_inserted(),
        "all queries completed"
    );
    Ok(())
}
