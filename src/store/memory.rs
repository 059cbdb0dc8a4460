//! In-process document store.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::types::FieldRecord;

use super::{StorePool, StoreResult, StoreSession};

type Collections = HashMap<String, Vec<FieldRecord>>;

/// A [`StorePool`] keeping collections in memory.
///
/// Cloning the store, or copying a session from it, shares the same collections.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    collections: Arc<Mutex<Collections>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append documents to a collection, creating it if needed.
    pub fn seed(&self, collection: &str, documents: impl IntoIterator<Item = FieldRecord>) {
        self.lock()
            .entry(collection.to_owned())
            .or_default()
            .extend(documents);
    }

    /// Documents of a collection in insertion order (empty if the collection does not exist).
    pub fn documents(&self, collection: &str) -> Vec<FieldRecord> {
        self.lock().get(collection).cloned().unwrap_or_default()
    }

    /// Names of collections holding at least one document, sorted.
    pub fn collection_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .lock()
            .iter()
            .filter(|(_, docs)| !docs.is_empty())
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }

    fn lock(&self) -> MutexGuard<'_, Collections> {
        self.collections.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl StorePool for MemoryStore {
    fn session(&self) -> StoreResult<Box<dyn StoreSession>> {
        Ok(Box::new(self.clone()))
    }
}

impl StoreSession for MemoryStore {
    fn count(&self, collection: &str) -> StoreResult<u64> {
        Ok(self.lock().get(collection).map_or(0, |docs| docs.len() as u64))
    }

    fn drop_all(&self, collection: &str) -> StoreResult<u64> {
        let removed = self.lock().remove(collection).unwrap_or_default();
        Ok(removed.len() as u64)
    }

    fn insert(&self, collection: &str, document: &FieldRecord) -> StoreResult<()> {
        self.lock()
            .entry(collection.to_owned())
            .or_default()
            .push(document.clone());
        Ok(())
    }
}
