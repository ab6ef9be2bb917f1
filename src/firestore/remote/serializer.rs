use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use serde_json::{json, Value as JsonValue};

use crate::firestore::api::query::StructuredQuery;
use crate::firestore::api::CommitRequest;
use crate::firestore::error::{invalid_argument, sentinel_misuse, FirestoreError, FirestoreResult};
use crate::firestore::model::{
    DatabaseId, Document, DocumentKey, FieldPath, FieldTransform, Precondition, Timestamp,
    TransformOperation, Write, WriteOperation,
};
use crate::firestore::remote::structured_query;
use crate::firestore::value::{ArrayValue, FirestoreValue, MapValue, ValueKind};

/// Encodes resolved writes and queries into the Firestore v1 JSON mapping, and
/// decodes documents and values coming back from the backend.
#[derive(Clone, Debug)]
pub struct JsonProtoSerializer {
    database_id: DatabaseId,
}

impl JsonProtoSerializer {
    pub fn new(database_id: DatabaseId) -> Self {
        Self { database_id }
    }

    pub fn database_id(&self) -> &DatabaseId {
        &self.database_id
    }

    pub fn database_name(&self) -> String {
        self.database_id.database_name()
    }

    pub fn document_name(&self, key: &DocumentKey) -> String {
        self.database_id.document_name(key)
    }

    pub fn document_key_from_name(&self, name: &str) -> FirestoreResult<DocumentKey> {
        self.database_id.parse_document_name(name)
    }

    pub fn encode_commit_request(&self, request: &CommitRequest) -> FirestoreResult<JsonValue> {
        let writes = request
            .writes()
            .iter()
            .map(|write| self.encode_write(write))
            .collect::<FirestoreResult<Vec<_>>>()?;
        Ok(json!({
            "database": request.database(),
            "writes": writes,
        }))
    }

    pub fn encode_write(&self, write: &Write) -> FirestoreResult<JsonValue> {
        let mut encoded = serde_json::Map::new();
        match write.operation() {
            WriteOperation::Update { key, fields, mask } => {
                encoded.insert(
                    "update".to_string(),
                    json!({
                        "name": self.document_name(key),
                        "fields": encode_map_fields(fields)?,
                    }),
                );
                if let Some(mask) = mask {
                    let paths: Vec<String> = mask.iter().map(FieldPath::canonical_string).collect();
                    encoded.insert("updateMask".to_string(), json!({ "fieldPaths": paths }));
                }
            }
            WriteOperation::Transform {
                key,
                field_transforms,
            } => {
                encoded.insert(
                    "transform".to_string(),
                    json!({
                        "document": self.document_name(key),
                        "fieldTransforms": self.encode_field_transforms(field_transforms)?,
                    }),
                );
            }
            WriteOperation::Delete { key } => {
                encoded.insert("delete".to_string(), json!(self.document_name(key)));
            }
        }

        if let Some(precondition) = write.precondition() {
            encoded.insert(
                "currentDocument".to_string(),
                encode_precondition(precondition)?,
            );
        }
        Ok(JsonValue::Object(encoded))
    }

    /// Encodes a resolved query as a `StructuredQuery` message.
    pub fn encode_structured_query(&self, query: &StructuredQuery) -> FirestoreResult<JsonValue> {
        structured_query::encode_structured_query(self, query)
    }

    fn encode_field_transforms(&self, transforms: &[FieldTransform]) -> FirestoreResult<Vec<JsonValue>> {
        let mut encoded = Vec::with_capacity(transforms.len());
        for transform in transforms {
            let field_path = transform.field_path().canonical_string();
            let json = match transform.operation() {
                TransformOperation::ServerTimestamp => json!({
                    "fieldPath": field_path,
                    "setToServerValue": "REQUEST_TIME"
                }),
                TransformOperation::ArrayUnion(elements) => json!({
                    "fieldPath": field_path,
                    "appendMissingElements": { "values": encode_values(elements)? }
                }),
                TransformOperation::ArrayRemove(elements) => json!({
                    "fieldPath": field_path,
                    "removeAllFromArray": { "values": encode_values(elements)? }
                }),
            };
            encoded.push(json);
        }
        Ok(encoded)
    }

    /// Decodes a `Document` message. Missing `fields` means the document has no user fields.
    pub fn decode_document(&self, value: &JsonValue) -> FirestoreResult<Document> {
        let name = value
            .get("name")
            .and_then(JsonValue::as_str)
            .ok_or_else(|| invalid_argument("Document missing name"))?;
        let key = self.document_key_from_name(name)?;
        let fields = decode_map_value(value)?;

        let mut document = Document::new(key, fields);
        if let Some(create_time) = optional_timestamp(value, "createTime")? {
            document = document.with_create_time(create_time);
        }
        if let Some(update_time) = optional_timestamp(value, "updateTime")? {
            document = document.with_update_time(update_time);
        }
        Ok(document)
    }

    pub fn decode_map_value(&self, value: &JsonValue) -> FirestoreResult<MapValue> {
        decode_map_value(value)
    }

    pub fn encode_value(&self, value: &FirestoreValue) -> FirestoreResult<JsonValue> {
        encode_value(value)
    }

    pub fn decode_value(&self, value: &JsonValue) -> FirestoreResult<FirestoreValue> {
        decode_value(value)
    }

    pub fn decode_timestamp_string(&self, value: &str) -> FirestoreResult<Timestamp> {
        parse_timestamp(value)
    }

    pub fn encode_timestamp(&self, timestamp: &Timestamp) -> FirestoreResult<String> {
        encode_timestamp(timestamp)
    }
}

fn encode_precondition(precondition: &Precondition) -> FirestoreResult<JsonValue> {
    Ok(match precondition {
        Precondition::Exists(exists) => json!({ "exists": exists }),
        Precondition::UpdateTime(time) => json!({ "updateTime": encode_timestamp(time)? }),
    })
}

fn encode_map_fields(map: &MapValue) -> FirestoreResult<JsonValue> {
    let mut fields = serde_json::Map::new();
    for (key, value) in map.fields() {
        fields.insert(key.clone(), encode_value(value)?);
    }
    Ok(JsonValue::Object(fields))
}

fn encode_values(values: &[FirestoreValue]) -> FirestoreResult<Vec<JsonValue>> {
    values.iter().map(encode_value).collect()
}

fn encode_value(value: &FirestoreValue) -> FirestoreResult<JsonValue> {
    Ok(match value.kind() {
        ValueKind::Null => json!({ "nullValue": JsonValue::Null }),
        ValueKind::Boolean(boolean) => json!({ "booleanValue": boolean }),
        ValueKind::Integer(integer) => json!({ "integerValue": integer.to_string() }),
        ValueKind::Double(double) => encode_double(*double),
        ValueKind::Timestamp(timestamp) => {
            json!({ "timestampValue": encode_timestamp(timestamp)? })
        }
        ValueKind::String(string) => json!({ "stringValue": string }),
        ValueKind::Reference(reference) => json!({ "referenceValue": reference }),
        ValueKind::Array(array) => {
            json!({ "arrayValue": { "values": encode_values(array.values())? } })
        }
        ValueKind::Map(map) => json!({
            "mapValue": {
                "fields": encode_map_fields(map)?
            }
        }),
        ValueKind::Sentinel(sentinel) => {
            return Err(sentinel_misuse(format!(
                "{} must be resolved into a field transform before encoding",
                sentinel.name()
            )))
        }
    })
}

// JSON numbers cannot carry NaN or the infinities; the proto3 JSON mapping uses strings.
fn encode_double(value: f64) -> JsonValue {
    if value.is_nan() {
        json!({ "doubleValue": "NaN" })
    } else if value.is_infinite() {
        let rendered = if value > 0.0 { "Infinity" } else { "-Infinity" };
        json!({ "doubleValue": rendered })
    } else {
        json!({ "doubleValue": value })
    }
}

fn decode_map_value(value: &JsonValue) -> FirestoreResult<MapValue> {
    let fields = match value.get("fields") {
        None | Some(JsonValue::Null) => return Ok(MapValue::default()),
        Some(JsonValue::Object(fields)) => fields,
        Some(other) => {
            return Err(invalid_argument(format!(
                "Expected 'fields' to be an object, got {other}"
            )))
        }
    };
    fields
        .iter()
        .map(|(key, value)| Ok((key.clone(), decode_value(value)?)))
        .collect::<FirestoreResult<BTreeMap<_, _>>>()
        .map(MapValue::new)
}

/// A `Value` message is an object holding exactly one `<type>Value` member.
fn decode_value(value: &JsonValue) -> FirestoreResult<FirestoreValue> {
    let mut members = value.as_object().into_iter().flatten();
    let (Some((tag, payload)), None) = (members.next(), members.next()) else {
        return Err(invalid_argument(format!(
            "Expected a single-member Value object, got {value}"
        )));
    };

    let kind = match tag.as_str() {
        "nullValue" => ValueKind::Null,
        "booleanValue" => ValueKind::Boolean(
            payload
                .as_bool()
                .ok_or_else(|| payload_mismatch(tag, payload))?,
        ),
        "integerValue" => ValueKind::Integer(decode_integer(payload)?),
        "doubleValue" => ValueKind::Double(decode_double(payload)?),
        "timestampValue" => ValueKind::Timestamp(parse_timestamp(payload_str(tag, payload)?)?),
        "stringValue" => ValueKind::String(payload_str(tag, payload)?.to_string()),
        "referenceValue" => ValueKind::Reference(payload_str(tag, payload)?.to_string()),
        "arrayValue" => {
            let values = match payload.get("values") {
                None | Some(JsonValue::Null) => Vec::new(),
                Some(JsonValue::Array(entries)) => entries
                    .iter()
                    .map(decode_value)
                    .collect::<FirestoreResult<Vec<_>>>()?,
                Some(_) => return Err(payload_mismatch(tag, payload)),
            };
            ValueKind::Array(ArrayValue::new(values))
        }
        "mapValue" => ValueKind::Map(decode_map_value(payload)?),
        other => {
            return Err(invalid_argument(format!(
                "Unsupported value type '{other}'"
            )))
        }
    };
    Ok(FirestoreValue::from_kind(kind))
}

// int64 travels as a decimal string in proto3 JSON, but plain numbers are accepted too.
fn decode_integer(payload: &JsonValue) -> FirestoreResult<i64> {
    match payload {
        JsonValue::String(text) => i64::from_str(text)
            .map_err(|err| invalid_argument(format!("Invalid integerValue {text:?}: {err}"))),
        JsonValue::Number(number) => number
            .as_i64()
            .ok_or_else(|| invalid_argument(format!("integerValue {number} is out of range"))),
        _ => Err(payload_mismatch("integerValue", payload)),
    }
}

fn decode_double(payload: &JsonValue) -> FirestoreResult<f64> {
    match payload {
        JsonValue::Number(number) => number
            .as_f64()
            .ok_or_else(|| payload_mismatch("doubleValue", payload)),
        JsonValue::String(text) => f64::from_str(text)
            .map_err(|err| invalid_argument(format!("Invalid doubleValue {text:?}: {err}"))),
        _ => Err(payload_mismatch("doubleValue", payload)),
    }
}

fn payload_str<'a>(tag: &str, payload: &'a JsonValue) -> FirestoreResult<&'a str> {
    payload.as_str().ok_or_else(|| payload_mismatch(tag, payload))
}

fn payload_mismatch(tag: &str, payload: &JsonValue) -> FirestoreError {
    invalid_argument(format!("Unexpected payload for {tag}: {payload}"))
}

fn optional_timestamp(value: &JsonValue, field: &str) -> FirestoreResult<Option<Timestamp>> {
    value
        .get(field)
        .and_then(JsonValue::as_str)
        .map(parse_timestamp)
        .transpose()
}

fn encode_timestamp(timestamp: &Timestamp) -> FirestoreResult<String> {
    let nanos = u32::try_from(timestamp.nanos)
        .map_err(|_| invalid_argument(format!("Timestamp {timestamp} has negative nanos")))?;
    Utc.timestamp_opt(timestamp.seconds, nanos)
        .single()
        .map(|datetime| datetime.to_rfc3339_opts(SecondsFormat::AutoSi, true))
        .ok_or_else(|| invalid_argument(format!("Timestamp {timestamp} is out of range")))
}

fn parse_timestamp(value: &str) -> FirestoreResult<Timestamp> {
    let datetime = DateTime::parse_from_rfc3339(value)
        .map_err(|err| invalid_argument(format!("Invalid timestamp: {err}")))?;
    let datetime_utc = datetime.with_timezone(&Utc);
    Ok(Timestamp::new(
        datetime_utc.timestamp(),
        datetime_utc.timestamp_subsec_nanos() as i32,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::firestore::test_support::{doc_key, field_path, fields, int};

    fn serializer() -> JsonProtoSerializer {
        JsonProtoSerializer::new(DatabaseId::default("projectID"))
    }

    #[test]
    fn encodes_update_write_with_mask_and_precondition() {
        let write = Write::new(
            WriteOperation::Update {
                key: doc_key("C/d"),
                fields: MapValue::new(fields([("a", int(1))])),
                mask: Some(vec![field_path(&["a"]), field_path(&["b", "c.d"])]),
            },
            Some(Precondition::Exists(true)),
        );

        let encoded = serializer().encode_write(&write).unwrap();
        assert_eq!(
            encoded,
            json!({
                "update": {
                    "name": "projects/projectID/databases/(default)/documents/C/d",
                    "fields": { "a": { "integerValue": "1" } }
                },
                "updateMask": { "fieldPaths": ["a", "b.`c.d`"] },
                "currentDocument": { "exists": true }
            })
        );
    }

    #[test]
    fn encodes_transform_write() {
        let write = Write::new(
            WriteOperation::Transform {
                key: doc_key("C/d"),
                field_transforms: vec![
                    FieldTransform::new(field_path(&["a"]), TransformOperation::ServerTimestamp),
                    FieldTransform::new(
                        field_path(&["b"]),
                        TransformOperation::ArrayUnion(vec![int(1), int(2)]),
                    ),
                ],
            },
            Some(Precondition::UpdateTime(Timestamp::new(42, 0))),
        );

        let encoded = serializer().encode_write(&write).unwrap();
        assert_eq!(
            encoded["transform"]["fieldTransforms"],
            json!([
                { "fieldPath": "a", "setToServerValue": "REQUEST_TIME" },
                {
                    "fieldPath": "b",
                    "appendMissingElements": {
                        "values": [{ "integerValue": "1" }, { "integerValue": "2" }]
                    }
                }
            ])
        );
        assert_eq!(
            encoded["currentDocument"],
            json!({ "updateTime": "1970-01-01T00:00:42Z" })
        );
    }

    #[test]
    fn encodes_delete_without_precondition() {
        let write = Write::new(WriteOperation::Delete { key: doc_key("C/d") }, None);
        let encoded = serializer().encode_write(&write).unwrap();
        assert_eq!(
            encoded,
            json!({ "delete": "projects/projectID/databases/(default)/documents/C/d" })
        );
    }

    #[test]
    fn refuses_to_encode_sentinels() {
        let err = serializer()
            .encode_value(&FirestoreValue::server_timestamp())
            .unwrap_err();
        assert_eq!(err.code_str(), "firestore/sentinel-misuse");
    }

    #[test]
    fn decodes_documents() {
        let document = serializer()
            .decode_document(&json!({
                "name": "projects/projectID/databases/(default)/documents/C/d1",
                "fields": {
                    "a": { "integerValue": "3" },
                    "nested": { "mapValue": { "fields": { "flag": { "booleanValue": true } } } },
                    "n": { "doubleValue": "NaN" }
                },
                "createTime": "1970-01-01T00:00:01Z",
                "updateTime": "1970-01-01T00:00:02.5Z"
            }))
            .unwrap();

        assert_eq!(document.key(), &doc_key("C/d1"));
        assert_eq!(document.field(&field_path(&["a"])), Some(&int(3)));
        assert_eq!(
            document.field(&field_path(&["nested", "flag"])),
            Some(&FirestoreValue::from_bool(true))
        );
        assert!(document.field(&field_path(&["n"])).unwrap().is_nan());
        assert_eq!(document.create_time(), Some(Timestamp::new(1, 0)));
        assert_eq!(document.update_time(), Some(Timestamp::new(2, 500_000_000)));
    }

    #[test]
    fn rejects_documents_from_other_databases() {
        let err = serializer()
            .decode_document(&json!({
                "name": "projects/other/databases/(default)/documents/C/d1"
            }))
            .unwrap_err();
        assert_eq!(err.code_str(), "firestore/malformed-path");
    }

    #[test]
    fn encodes_non_finite_doubles_as_strings() {
        let encoded = serializer()
            .encode_value(&FirestoreValue::from_double(f64::NAN))
            .unwrap();
        assert_eq!(encoded, json!({ "doubleValue": "NaN" }));
        let decoded = serializer().decode_value(&encoded).unwrap();
        assert!(decoded.is_nan());
    }

    #[test]
    fn rejects_ambiguous_or_unsupported_values() {
        let err = serializer()
            .decode_value(&json!({ "stringValue": "a", "integerValue": "1" }))
            .unwrap_err();
        assert_eq!(err.code_str(), "firestore/invalid-argument");
        assert!(serializer()
            .decode_value(&json!({ "bytesValue": "AA==" }))
            .is_err());
    }
}
