use std::path::PathBuf;

use thiserror::Error;

use crate::store::StoreError;

/// Convenience result type for ingestion operations.
pub type IngestResult<T> = Result<T, IngestError>;

/// Error type returned by workers, the coordinator and the startup steps.
///
/// Every variant is fatal for the whole run. An unrecognized answer at the overwrite prompt is
/// not represented here: the gate handles it by prompting again.
#[derive(Debug, Error)]
pub enum IngestError {
    /// The store could not be dialed or a session could not be copied from the pool.
    #[error("connect to store: {source}")]
    Connection {
        #[source]
        source: StoreError,
    },

    /// Counting the documents of a target collection failed.
    #[error("count existing data in '{collection}': {source}")]
    CollectionCount {
        collection: String,
        #[source]
        source: StoreError,
    },

    /// Removing the existing documents of a target collection failed.
    #[error("drop {collection}: {source}")]
    CollectionDrop {
        collection: String,
        #[source]
        source: StoreError,
    },

    /// The source file could not be opened.
    #[error("open csv '{}': {source}", .path.display())]
    FileOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The source file is not readable as CSV (syntax error, missing or invalid header).
    #[error("read '{source_name}': {message}")]
    RowParse { source_name: String, message: String },

    /// A data row does not have one value per header field.
    #[error(
        "read '{source_name}' line {line}: row has {found} fields, header declares {expected}"
    )]
    ArityMismatch {
        source_name: String,
        line: u64,
        expected: usize,
        found: usize,
    },

    /// Inserting one document failed.
    #[error("insert row into '{collection}': {source}")]
    Insert {
        collection: String,
        #[source]
        source: StoreError,
    },

    /// The console was closed or could not be read/written while prompting.
    #[error("confirm overwrite of '{source_name}': {source}")]
    Console {
        source_name: String,
        #[source]
        source: std::io::Error,
    },

    /// The local data directory could not be prepared.
    #[error("supply data source: {message}")]
    Bootstrap { message: String },

    /// The startup configuration is invalid.
    #[error("invalid configuration: {message}")]
    Config { message: String },

    /// The worker threads could not be started.
    #[error("start workers: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),

    /// Underlying I/O error outside of a specific source file.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl IngestError {
    /// Short label of the operation that failed, printed on fatal exit.
    pub fn operation(&self) -> &'static str {
        match self {
            Self::Connection { .. } => "Create session",
            Self::CollectionCount { .. } => "Count existing data",
            Self::CollectionDrop { .. } => "Drop collection",
            Self::FileOpen { .. } => "Open CSV",
            Self::RowParse { .. } | Self::ArityMismatch { .. } => "Read row",
            Self::Insert { .. } => "Insert row",
            Self::Console { .. } => "Confirm overwrite",
            Self::Bootstrap { .. } => "Supply data source",
            Self::Config { .. } => "Load configuration",
            Self::WorkerPool(_) => "Start workers",
            Self::Io(_) => "I/O",
        }
    }
}
