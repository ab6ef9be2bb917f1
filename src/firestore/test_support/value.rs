use std::collections::BTreeMap;

use crate::firestore::model::{Document, Timestamp};
use crate::firestore::value::{FirestoreValue, MapValue};

use super::path::doc_key;

pub fn int(value: i64) -> FirestoreValue {
    FirestoreValue::from_integer(value)
}

pub fn fields<'a, I>(entries: I) -> BTreeMap<String, FirestoreValue>
where
    I: IntoIterator<Item = (&'a str, FirestoreValue)>,
{
    entries
        .into_iter()
        .map(|(key, value)| (key.to_string(), value))
        .collect()
}

pub fn map<'a, I>(entries: I) -> FirestoreValue
where
    I: IntoIterator<Item = (&'a str, FirestoreValue)>,
{
    FirestoreValue::from_map(fields(entries))
}

pub fn empty_map() -> FirestoreValue {
    FirestoreValue::from_map(BTreeMap::new())
}

/// Document at `path` whose single field `a` holds `a`, updated at `update_seconds`.
pub fn doc_with_a(path: &str, a: i64, update_seconds: i64) -> Document {
    Document::new(doc_key(path), MapValue::new(fields([("a", int(a))])))
        .with_create_time(Timestamp::from_seconds(1))
        .with_update_time(Timestamp::from_seconds(update_seconds))
}
