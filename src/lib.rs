//! Client-side resolution logic for the Firestore API.
//!
//! * [`firestore::api`] resolves mutations into commit writes and query clauses
//!   into structured queries.
//! * [`firestore::remote`] turns a listen stream into a sequence of consistent
//!   snapshots, and encodes/decodes the REST JSON mapping.
//!
//! ```
//! use std::collections::BTreeMap;
//!
//! use firestore_resolve::firestore::model::DatabaseId;
//! use firestore_resolve::firestore::value::FirestoreValue;
//! use firestore_resolve::firestore::Firestore;
//!
//! let firestore = Firestore::new(DatabaseId::default("my-project"));
//! let mut batch = firestore.batch();
//! let mut data = BTreeMap::new();
//! data.insert("updated".to_string(), FirestoreValue::server_timestamp());
//! batch.create(firestore.doc("cities/sf")?, data)?;
//! assert_eq!(batch.commit_request().writes().len(), 1);
//! # Ok::<(), firestore_resolve::firestore::FirestoreError>(())
//! ```

pub mod firestore;
pub mod platform;
