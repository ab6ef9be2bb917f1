use std::collections::BTreeMap;

use crate::firestore::api::operations::{Mutation, SetOptions};
use crate::firestore::constants::MAX_BATCH_WRITES;
use crate::firestore::error::{FirestoreError, FirestoreErrorCode, FirestoreResult};
use crate::firestore::model::{DatabaseId, DocumentKey, FieldPath, Precondition, Write};
use crate::firestore::value::FirestoreValue;

/// Body of a `Commit` call: the target database and the writes to apply atomically.
#[derive(Clone, Debug, PartialEq)]
pub struct CommitRequest {
    database: String,
    writes: Vec<Write>,
}

impl CommitRequest {
    pub fn database(&self) -> &str {
        &self.database
    }

    pub fn writes(&self) -> &[Write] {
        &self.writes
    }
}

/// Resolves mutations one by one and accumulates their writes for a single commit.
///
/// A mutation that fails to resolve leaves the batch untouched.
#[derive(Clone, Debug)]
pub struct WriteBatch {
    database_id: DatabaseId,
    mutations: usize,
    writes: Vec<Write>,
}

impl WriteBatch {
    pub fn new(database_id: DatabaseId) -> Self {
        Self {
            database_id,
            mutations: 0,
            writes: Vec::new(),
        }
    }

    pub fn add(&mut self, mutation: Mutation) -> FirestoreResult<&mut Self> {
        self.ensure_capacity()?;
        let writes = mutation.resolve()?;
        self.writes.extend(writes);
        self.mutations += 1;
        Ok(self)
    }

    pub fn create(
        &mut self,
        key: DocumentKey,
        data: BTreeMap<String, FirestoreValue>,
    ) -> FirestoreResult<&mut Self> {
        self.add(Mutation::create(key, data))
    }

    pub fn set(
        &mut self,
        key: DocumentKey,
        data: BTreeMap<String, FirestoreValue>,
        options: Option<SetOptions>,
    ) -> FirestoreResult<&mut Self> {
        self.add(Mutation::set(key, data, options.unwrap_or_default()))
    }

    /// Updates with dotted keys. The document must exist unless `precondition` says otherwise.
    pub fn update(
        &mut self,
        key: DocumentKey,
        data: BTreeMap<String, FirestoreValue>,
        precondition: Option<Precondition>,
    ) -> FirestoreResult<&mut Self> {
        let mut mutation = Mutation::update(key, data);
        if let Some(precondition) = precondition {
            mutation = mutation.with_precondition(precondition);
        }
        self.add(mutation)
    }

    pub fn update_paths(
        &mut self,
        key: DocumentKey,
        updates: Vec<(FieldPath, FirestoreValue)>,
        precondition: Option<Precondition>,
    ) -> FirestoreResult<&mut Self> {
        let mut mutation = Mutation::update_paths(key, updates);
        if let Some(precondition) = precondition {
            mutation = mutation.with_precondition(precondition);
        }
        self.add(mutation)
    }

    pub fn delete(
        &mut self,
        key: DocumentKey,
        precondition: Option<Precondition>,
    ) -> FirestoreResult<&mut Self> {
        let mut mutation = Mutation::delete(key);
        if let Some(precondition) = precondition {
            mutation = mutation.with_precondition(precondition);
        }
        self.add(mutation)
    }

    /// Number of mutations added, not the number of writes they produced.
    pub fn len(&self) -> usize {
        self.mutations
    }

    pub fn is_empty(&self) -> bool {
        self.mutations == 0
    }

    pub fn writes(&self) -> &[Write] {
        &self.writes
    }

    pub fn commit_request(&self) -> CommitRequest {
        CommitRequest {
            database: self.database_id.database_name(),
            writes: self.writes.clone(),
        }
    }

    fn ensure_capacity(&self) -> FirestoreResult<()> {
        if self.mutations >= MAX_BATCH_WRITES {
            return Err(FirestoreError::new(
                FirestoreErrorCode::ResourceExhausted,
                format!("WriteBatch cannot contain more than {MAX_BATCH_WRITES} operations"),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::firestore::model::WriteOperation;
    use crate::firestore::test_support::{doc_key, fields, int};

    fn batch() -> WriteBatch {
        WriteBatch::new(DatabaseId::default("projectID"))
    }

    #[test]
    fn accumulates_writes_in_order() {
        let mut batch = batch();
        batch
            .set(
                doc_key("C/a"),
                fields([("x", int(1)), ("t", FirestoreValue::server_timestamp())]),
                None,
            )
            .unwrap()
            .delete(doc_key("C/b"), None)
            .unwrap();

        assert_eq!(batch.len(), 2);
        let request = batch.commit_request();
        assert_eq!(request.database(), "projects/projectID/databases/(default)");
        let kinds: Vec<&str> = request
            .writes()
            .iter()
            .map(|write| match write.operation() {
                WriteOperation::Update { .. } => "update",
                WriteOperation::Transform { .. } => "transform",
                WriteOperation::Delete { .. } => "delete",
            })
            .collect();
        assert_eq!(kinds, vec!["update", "transform", "delete"]);
    }

    #[test]
    fn failed_mutation_leaves_batch_untouched() {
        let mut batch = batch();
        let err = batch
            .create(doc_key("C/a"), fields([("x", FirestoreValue::delete_field())]))
            .unwrap_err();
        assert_eq!(err.code_str(), "firestore/sentinel-misuse");
        assert!(batch.is_empty());
        assert!(batch.writes().is_empty());
    }

    #[test]
    fn enforces_batch_limit() {
        let mut batch = batch();
        for index in 0..MAX_BATCH_WRITES {
            batch.delete(doc_key(&format!("C/d{index}")), None).unwrap();
        }
        let err = batch.delete(doc_key("C/overflow"), None).unwrap_err();
        assert_eq!(err.code, FirestoreErrorCode::ResourceExhausted);
        assert_eq!(batch.len(), MAX_BATCH_WRITES);
    }
}
