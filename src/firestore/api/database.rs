use std::sync::Arc;

use crate::firestore::api::query::{Query, StructuredQuery};
use crate::firestore::api::write_batch::WriteBatch;
use crate::firestore::error::FirestoreResult;
use crate::firestore::model::{DatabaseId, DocumentKey, ResourcePath};
use crate::firestore::remote::serializer::JsonProtoSerializer;
use crate::firestore::remote::watch_change_aggregator::WatchState;

/// Entry point scoped to one database. Cheap to clone.
#[derive(Clone, Debug)]
pub struct Firestore {
    inner: Arc<FirestoreInner>,
}

#[derive(Debug)]
struct FirestoreInner {
    database_id: DatabaseId,
    serializer: JsonProtoSerializer,
}

impl Firestore {
    pub fn new(database_id: DatabaseId) -> Self {
        let serializer = JsonProtoSerializer::new(database_id.clone());
        let inner = FirestoreInner {
            database_id,
            serializer,
        };
        Self {
            inner: Arc::new(inner),
        }
    }

    /// The fully qualified database identifier (project + database name).
    pub fn database_id(&self) -> &DatabaseId {
        &self.inner.database_id
    }

    /// Returns the project identifier backing this database.
    pub fn project_id(&self) -> &str {
        self.inner.database_id.project_id()
    }

    /// Returns the logical database name (usually `"(default)"`).
    pub fn database(&self) -> &str {
        self.inner.database_id.database()
    }

    pub fn serializer(&self) -> &JsonProtoSerializer {
        &self.inner.serializer
    }

    /// Starts a query over the collection at `path` (an odd number of segments,
    /// e.g. `"users/alovelace/repos"`).
    pub fn collection(&self, path: &str) -> FirestoreResult<Query> {
        let resource = ResourcePath::from_string(path)?;
        Query::new(self.inner.database_id.clone(), resource)
    }

    /// Returns the key of the document at `path` (collection/doc pairs).
    pub fn doc(&self, path: &str) -> FirestoreResult<DocumentKey> {
        DocumentKey::from_string(path)
    }

    pub fn batch(&self) -> WriteBatch {
        WriteBatch::new(self.inner.database_id.clone())
    }

    /// Creates the client-side state for listening to `query` as `target_id`.
    pub fn listen(&self, target_id: i32, query: &StructuredQuery) -> WatchState {
        WatchState::for_query(target_id, query)
    }
}
