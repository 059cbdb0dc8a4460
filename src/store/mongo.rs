//! MongoDB backend (feature `mongo`), built on the driver's synchronous API.

use mongodb::bson::{Document, doc};
use mongodb::sync::{Client, Collection as MongoCollection, Database};

use crate::types::FieldRecord;

use super::{StoreError, StorePool, StoreResult, StoreSession};

/// A dialed MongoDB deployment, scoped to one database.
///
/// The driver client owns the connection pool; sessions are clones of it.
#[derive(Debug, Clone)]
pub struct MongoPool {
    database: Database,
}

impl MongoPool {
    /// Connect to `uri` and check the server answers a ping.
    pub fn dial(uri: &str, database: &str) -> StoreResult<Self> {
        let client = Client::with_uri_str(uri).map_err(StoreError::backend)?;
        client
            .database("admin")
            .run_command(doc! { "ping": 1 }, None)
            .map_err(StoreError::backend)?;
        tracing::debug!(uri, database, "store reachable");
        Ok(Self {
            database: client.database(database),
        })
    }

    fn collection(&self, name: &str) -> MongoCollection<Document> {
        self.database.collection::<Document>(name)
    }
}

impl StorePool for MongoPool {
    fn session(&self) -> StoreResult<Box<dyn StoreSession>> {
        Ok(Box::new(self.clone()))
    }
}

impl StoreSession for MongoPool {
    fn count(&self, collection: &str) -> StoreResult<u64> {
        self.collection(collection)
            .count_documents(doc! {}, None)
            .map_err(StoreError::backend)
    }

    fn drop_all(&self, collection: &str) -> StoreResult<u64> {
        let result = self
            .collection(collection)
            .delete_many(doc! {}, None)
            .map_err(StoreError::backend)?;
        Ok(result.deleted_count)
    }

    fn insert(&self, collection: &str, document: &FieldRecord) -> StoreResult<()> {
        let mut doc = Document::new();
        for (name, value) in document.iter() {
            doc.insert(name, value);
        }
        self.collection(collection)
            .insert_one(doc, None)
            .map_err(StoreError::backend)?;
        Ok(())
    }
}
