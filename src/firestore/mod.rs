//! Client-side resolution for Firestore: turns mutations into commit writes,
//! query clauses into structured queries, and listen streams into snapshots.

pub mod api;
mod constants;
pub mod error;
pub mod model;
pub(crate) mod query_evaluator;
pub mod remote;
pub mod value;

#[cfg(test)]
pub(crate) mod test_support;

pub use api::{
    resolve_mutation, resolve_query, Clause, CommitRequest, Cursor, Firestore, Mutation,
    MutationKind, Query, SetOptions, StructuredQuery, WriteBatch,
};
pub use constants::{DEFAULT_DATABASE_ID, DOCUMENT_ID_FIELD, MAX_BATCH_WRITES};
pub use error::{FirestoreError, FirestoreErrorCode, FirestoreResult};
pub use remote::{WatchRegistry, WatchSnapshot, WatchState};
