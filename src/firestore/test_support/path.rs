use crate::firestore::model::{DocumentKey, FieldPath, ResourcePath};

pub fn resource_path(path: &str) -> ResourcePath {
    ResourcePath::from_string(path).expect("valid resource path")
}

pub fn field_path(segments: &[&str]) -> FieldPath {
    FieldPath::new(segments.iter().copied()).expect("valid field path")
}

pub fn doc_key(path: &str) -> DocumentKey {
    DocumentKey::from_string(path).expect("valid document key")
}
