use crate::firestore::model::{DocumentKey, FieldPath, Timestamp};
use crate::firestore::value::{FirestoreValue, MapValue};

/// A stored document: identity, fields and server timestamps.
///
/// The update time is the only change signal the watch engine looks at.
#[derive(Clone, Debug, PartialEq)]
pub struct Document {
    key: DocumentKey,
    fields: MapValue,
    create_time: Option<Timestamp>,
    update_time: Option<Timestamp>,
}

impl Document {
    pub fn new(key: DocumentKey, fields: MapValue) -> Self {
        Self {
            key,
            fields,
            create_time: None,
            update_time: None,
        }
    }

    pub fn with_create_time(mut self, create_time: Timestamp) -> Self {
        self.create_time = Some(create_time);
        self
    }

    pub fn with_update_time(mut self, update_time: Timestamp) -> Self {
        self.update_time = Some(update_time);
        self
    }

    pub fn key(&self) -> &DocumentKey {
        &self.key
    }

    pub fn fields(&self) -> &MapValue {
        &self.fields
    }

    pub fn field(&self, path: &FieldPath) -> Option<&FirestoreValue> {
        self.fields.get_path(path)
    }

    pub fn create_time(&self) -> Option<Timestamp> {
        self.create_time
    }

    pub fn update_time(&self) -> Option<Timestamp> {
        self.update_time
    }
}
