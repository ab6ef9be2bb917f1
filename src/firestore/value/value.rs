use std::collections::BTreeMap;

use crate::firestore::model::Timestamp;
use crate::firestore::value::{ArrayValue, MapValue};

#[derive(Clone, Debug, PartialEq)]
pub struct FirestoreValue {
    kind: ValueKind,
}

/// Write-only markers that are resolved into masks and server transforms.
///
/// Sentinels are only meaningful inside mutation input; stored documents and
/// query values never carry them.
#[derive(Clone, Debug, PartialEq)]
pub enum SentinelValue {
    Delete,
    ServerTimestamp,
    ArrayUnion(Vec<FirestoreValue>),
    ArrayRemove(Vec<FirestoreValue>),
}

impl SentinelValue {
    pub fn name(&self) -> &'static str {
        match self {
            SentinelValue::Delete => "Delete",
            SentinelValue::ServerTimestamp => "ServerTimestamp",
            SentinelValue::ArrayUnion(_) => "ArrayUnion",
            SentinelValue::ArrayRemove(_) => "ArrayRemove",
        }
    }

    /// Everything except `Delete` becomes a field transform.
    pub fn is_transform(&self) -> bool {
        !matches!(self, SentinelValue::Delete)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum ValueKind {
    Null,
    Boolean(bool),
    Integer(i64),
    Double(f64),
    Timestamp(Timestamp),
    String(String),
    Reference(String),
    Array(ArrayValue),
    Map(MapValue),
    Sentinel(SentinelValue),
}

impl FirestoreValue {
    pub fn from_kind(kind: ValueKind) -> Self {
        Self { kind }
    }

    pub fn null() -> Self {
        Self::from_kind(ValueKind::Null)
    }

    pub fn from_bool(value: bool) -> Self {
        Self::from_kind(ValueKind::Boolean(value))
    }

    pub fn from_integer(value: i64) -> Self {
        Self::from_kind(ValueKind::Integer(value))
    }

    pub fn from_double(value: f64) -> Self {
        Self::from_kind(ValueKind::Double(value))
    }

    pub fn from_timestamp(value: Timestamp) -> Self {
        Self::from_kind(ValueKind::Timestamp(value))
    }

    pub fn from_string(value: impl Into<String>) -> Self {
        Self::from_kind(ValueKind::String(value.into()))
    }

    /// A reference holds the fully qualified document name
    /// (`projects/{p}/databases/{d}/documents/{path}`).
    pub fn from_reference(name: impl Into<String>) -> Self {
        Self::from_kind(ValueKind::Reference(name.into()))
    }

    pub fn from_array(values: Vec<FirestoreValue>) -> Self {
        Self::from_kind(ValueKind::Array(ArrayValue::new(values)))
    }

    pub fn from_map(map: BTreeMap<String, FirestoreValue>) -> Self {
        Self::from_kind(ValueKind::Map(MapValue::new(map)))
    }

    /// Removes the field it is assigned to. Only valid where a field mask is written.
    pub fn delete_field() -> Self {
        Self::from_kind(ValueKind::Sentinel(SentinelValue::Delete))
    }

    /// Populates the field with the commit time on the server.
    pub fn server_timestamp() -> Self {
        Self::from_kind(ValueKind::Sentinel(SentinelValue::ServerTimestamp))
    }

    /// Appends each element not already present in the stored array.
    pub fn array_union(elements: Vec<FirestoreValue>) -> Self {
        Self::from_kind(ValueKind::Sentinel(SentinelValue::ArrayUnion(elements)))
    }

    /// Removes every occurrence of each element from the stored array.
    pub fn array_remove(elements: Vec<FirestoreValue>) -> Self {
        Self::from_kind(ValueKind::Sentinel(SentinelValue::ArrayRemove(elements)))
    }

    pub fn kind(&self) -> &ValueKind {
        &self.kind
    }

    pub fn into_kind(self) -> ValueKind {
        self.kind
    }

    pub fn sentinel(&self) -> Option<&SentinelValue> {
        match &self.kind {
            ValueKind::Sentinel(sentinel) => Some(sentinel),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self.kind, ValueKind::Null)
    }

    pub fn is_nan(&self) -> bool {
        matches!(self.kind, ValueKind::Double(value) if value.is_nan())
    }

    pub fn as_map(&self) -> Option<&MapValue> {
        match &self.kind {
            ValueKind::Map(map) => Some(map),
            _ => None,
        }
    }

    /// True when a sentinel appears at any depth, including inside arrays.
    pub fn contains_sentinel(&self) -> bool {
        match &self.kind {
            ValueKind::Sentinel(_) => true,
            ValueKind::Array(array) => array.values().iter().any(FirestoreValue::contains_sentinel),
            ValueKind::Map(map) => map.fields().values().any(FirestoreValue::contains_sentinel),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_basic_values() {
        let v = FirestoreValue::from_string("hello");
        match v.kind() {
            ValueKind::String(value) => assert_eq!(value, "hello"),
            _ => panic!("unexpected kind"),
        }
    }

    #[test]
    fn detects_nested_sentinels() {
        let mut inner = BTreeMap::new();
        inner.insert("b".to_string(), FirestoreValue::server_timestamp());
        let value = FirestoreValue::from_array(vec![
            FirestoreValue::from_integer(1),
            FirestoreValue::from_map(inner),
        ]);
        assert!(value.contains_sentinel());
        assert!(!FirestoreValue::from_array(vec![FirestoreValue::null()]).contains_sentinel());
    }

    #[test]
    fn classifies_sentinels() {
        let delete = FirestoreValue::delete_field();
        assert!(!delete.sentinel().unwrap().is_transform());
        let union = FirestoreValue::array_union(vec![FirestoreValue::from_integer(1)]);
        assert!(union.sentinel().unwrap().is_transform());
        assert_eq!(union.sentinel().unwrap().name(), "ArrayUnion");
    }

    #[test]
    fn nan_detection() {
        assert!(FirestoreValue::from_double(f64::NAN).is_nan());
        assert!(!FirestoreValue::from_double(1.5).is_nan());
        assert!(FirestoreValue::null().is_null());
    }
}
