mod database;
pub mod operations;
pub mod query;
mod write_batch;

pub use database::Firestore;
pub use operations::{resolve_mutation, Mutation, MutationKind, SetOptions};
pub use query::{
    resolve_query, Bound, Clause, Cursor, FieldFilter, Filter, FilterOperator, OrderBy,
    OrderDirection, Query, StructuredQuery, UnaryFilter, UnaryOperator,
};
pub use write_batch::{CommitRequest, WriteBatch};
