//! Document-store access used by the ingest workers.
//!
//! The store is an opaque dependency: workers only need a per-collection document count, a way
//! to remove every document of a collection, and single-document inserts.
//!
//! - [`StorePool`] is the shared, dialed connection pool.
//! - [`StoreSession`] is a private handle copied from the pool for one worker; dropping it returns
//!   its connection to the pool.
//! - [`Collection`] is a named view over a session.
//!
//! Backends:
//! - [`memory::MemoryStore`]: in-process store, used by tests and embedders
//! - [`mongo::MongoPool`] (requires the Cargo feature `mongo`): MongoDB via the synchronous driver

pub mod memory;
#[cfg(feature = "mongo")]
pub mod mongo;

use std::error::Error as StdError;

use thiserror::Error;

use crate::types::FieldRecord;

pub use memory::MemoryStore;
#[cfg(feature = "mongo")]
pub use mongo::MongoPool;

/// Convenience result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Generic store-operation error. Backends map every failure into this type.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Failure described by the backend itself.
    #[error("{0}")]
    Message(String),

    /// Failure raised by an underlying driver.
    #[error(transparent)]
    Backend(Box<dyn StdError + Send + Sync>),
}

impl StoreError {
    /// Wrap a driver error.
    pub fn backend(err: impl StdError + Send + Sync + 'static) -> Self {
        Self::Backend(Box::new(err))
    }
}

/// A dialed store that hands out independent per-worker sessions.
pub trait StorePool: Send + Sync {
    /// Copy a session sharing the pool's underlying connections.
    fn session(&self) -> StoreResult<Box<dyn StoreSession>>;
}

/// A worker-private session handle.
pub trait StoreSession: Send {
    /// Number of documents currently in `collection`.
    fn count(&self, collection: &str) -> StoreResult<u64>;

    /// Remove every document of `collection`, returning how many were removed.
    fn drop_all(&self, collection: &str) -> StoreResult<u64>;

    /// Insert one document into `collection`.
    fn insert(&self, collection: &str, document: &FieldRecord) -> StoreResult<()>;
}

impl dyn StoreSession + '_ {
    /// Named view over this session.
    pub fn collection<'a>(&'a self, name: &'a str) -> Collection<'a> {
        Collection { session: self, name }
    }
}

/// A named collection reached through a [`StoreSession`].
pub struct Collection<'a> {
    session: &'a dyn StoreSession,
    name: &'a str,
}

impl Collection<'_> {
    /// Collection name.
    pub fn name(&self) -> &str {
        self.name
    }

    /// Number of documents in the collection.
    pub fn count(&self) -> StoreResult<u64> {
        self.session.count(self.name)
    }

    /// Remove every document of the collection.
    pub fn drop_all(&self) -> StoreResult<u64> {
        self.session.drop_all(self.name)
    }

    /// Insert one document.
    pub fn insert(&self, document: &FieldRecord) -> StoreResult<()> {
        self.session.insert(self.name, document)
    }
}
