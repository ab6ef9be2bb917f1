use crate::firestore::constants::DEFAULT_DATABASE_ID;
use crate::firestore::error::{malformed_path, FirestoreResult};
use crate::firestore::model::{DocumentKey, ResourcePath};

/// Project and database a client talks to. Every resource name is rendered below it.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct DatabaseId {
    project_id: String,
    database: String,
}

impl DatabaseId {
    pub fn new(project_id: impl Into<String>, database: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            database: database.into(),
        }
    }

    pub fn default(project_id: impl Into<String>) -> Self {
        Self::new(project_id, DEFAULT_DATABASE_ID)
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    /// `projects/{project}/databases/{database}`
    pub fn database_name(&self) -> String {
        format!("projects/{}/databases/{}", self.project_id, self.database)
    }

    /// `projects/{project}/databases/{database}/documents`
    pub fn documents_root(&self) -> String {
        format!("{}/documents", self.database_name())
    }

    pub fn resource_name(&self, path: &ResourcePath) -> String {
        if path.is_empty() {
            return self.documents_root();
        }
        format!("{}/{}", self.documents_root(), path.canonical_string())
    }

    pub fn document_name(&self, key: &DocumentKey) -> String {
        self.resource_name(key.path())
    }

    /// Parses a fully qualified document name that belongs to this database.
    pub fn parse_document_name(&self, name: &str) -> FirestoreResult<DocumentKey> {
        let root = self.documents_root();
        let relative = name
            .strip_prefix(&root)
            .and_then(|rest| rest.strip_prefix('/'))
            .ok_or_else(|| {
                malformed_path(format!("Document name {name:?} is not below {root:?}"))
            })?;
        DocumentKey::from_string(relative)
    }
}
