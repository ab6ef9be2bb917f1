use serde_json::{json, Value as JsonValue};

use crate::firestore::api::query::{Bound, FieldFilter, Filter, StructuredQuery, UnaryFilter};
use crate::firestore::error::FirestoreResult;
use crate::firestore::remote::serializer::JsonProtoSerializer;

pub(crate) fn encode_structured_query(
    serializer: &JsonProtoSerializer,
    query: &StructuredQuery,
) -> FirestoreResult<JsonValue> {
    let mut structured = serde_json::Map::new();

    if let Some(fields) = query.select() {
        let field_entries: Vec<_> = fields
            .iter()
            .map(|field| json!({ "fieldPath": field.canonical_string() }))
            .collect();
        structured.insert("select".to_string(), json!({ "fields": field_entries }));
    }

    structured.insert(
        "from".to_string(),
        json!([{ "collectionId": query.collection_id() }]),
    );

    if let Some(filter) = query.filter() {
        structured.insert("where".to_string(), encode_filter(serializer, filter)?);
    }

    if !query.order_by().is_empty() {
        let orders: Vec<_> = query
            .order_by()
            .iter()
            .map(|order| {
                json!({
                    "field": { "fieldPath": order.field().canonical_string() },
                    "direction": order.direction().as_str(),
                })
            })
            .collect();
        structured.insert("orderBy".to_string(), JsonValue::Array(orders));
    }

    if let Some(start) = query.start_at() {
        structured.insert("startAt".to_string(), encode_cursor(serializer, start)?);
    }

    if let Some(end) = query.end_at() {
        structured.insert("endAt".to_string(), encode_cursor(serializer, end)?);
    }

    if let Some(offset) = query.offset() {
        structured.insert("offset".to_string(), json!(offset));
    }

    if let Some(limit) = query.limit() {
        structured.insert("limit".to_string(), json!(limit));
    }

    Ok(JsonValue::Object(structured))
}

fn encode_filter(serializer: &JsonProtoSerializer, filter: &Filter) -> FirestoreResult<JsonValue> {
    match filter {
        Filter::Field(field) => encode_field_filter(serializer, field),
        Filter::Unary(unary) => Ok(encode_unary_filter(unary)),
        Filter::And(filters) => {
            let nested = filters
                .iter()
                .map(|filter| encode_filter(serializer, filter))
                .collect::<FirestoreResult<Vec<_>>>()?;
            Ok(json!({
                "compositeFilter": {
                    "op": "AND",
                    "filters": nested
                }
            }))
        }
    }
}

fn encode_field_filter(
    serializer: &JsonProtoSerializer,
    filter: &FieldFilter,
) -> FirestoreResult<JsonValue> {
    Ok(json!({
        "fieldFilter": {
            "field": { "fieldPath": filter.field().canonical_string() },
            "op": filter.operator().as_str(),
            "value": serializer.encode_value(filter.value())?
        }
    }))
}

fn encode_unary_filter(filter: &UnaryFilter) -> JsonValue {
    json!({
        "unaryFilter": {
            "field": { "fieldPath": filter.field().canonical_string() },
            "op": filter.operator().as_str(),
        }
    })
}

fn encode_cursor(serializer: &JsonProtoSerializer, bound: &Bound) -> FirestoreResult<JsonValue> {
    let values = bound
        .values()
        .iter()
        .map(|value| serializer.encode_value(value))
        .collect::<FirestoreResult<Vec<_>>>()?;
    Ok(json!({
        "values": values,
        "before": bound.before(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::firestore::api::query::{Cursor, FilterOperator, OrderDirection, Query};
    use crate::firestore::model::DatabaseId;
    use crate::firestore::test_support::{field_path, int, resource_path};
    use crate::firestore::value::FirestoreValue;

    fn serializer() -> JsonProtoSerializer {
        JsonProtoSerializer::new(DatabaseId::default("projectID"))
    }

    fn base_query() -> Query {
        Query::new(DatabaseId::default("projectID"), resource_path("C")).unwrap()
    }

    #[test]
    fn encodes_every_clause() {
        let query = base_query()
            .select(vec![field_path(&["a"])])
            .where_field(field_path(&["a"]), FilterOperator::GreaterThan, int(5))
            .where_field(field_path(&["b"]), FilterOperator::Equal, FirestoreValue::null())
            .order_by(field_path(&["a"]), OrderDirection::Descending)
            .start_after(Cursor::Values(vec![int(7)]))
            .offset(2)
            .limit(10)
            .resolve()
            .unwrap();

        let encoded = encode_structured_query(&serializer(), &query).unwrap();
        assert_eq!(
            encoded,
            json!({
                "select": { "fields": [{ "fieldPath": "a" }] },
                "from": [{ "collectionId": "C" }],
                "where": {
                    "compositeFilter": {
                        "op": "AND",
                        "filters": [
                            {
                                "fieldFilter": {
                                    "field": { "fieldPath": "a" },
                                    "op": "GREATER_THAN",
                                    "value": { "integerValue": "5" }
                                }
                            },
                            {
                                "unaryFilter": {
                                    "field": { "fieldPath": "b" },
                                    "op": "IS_NULL"
                                }
                            }
                        ]
                    }
                },
                "orderBy": [{ "field": { "fieldPath": "a" }, "direction": "DESCENDING" }],
                "startAt": { "values": [{ "integerValue": "7" }], "before": false },
                "offset": 2,
                "limit": 10
            })
        );
    }

    #[test]
    fn single_filter_is_not_wrapped() {
        let query = base_query()
            .where_field(field_path(&["a"]), FilterOperator::Equal, int(1))
            .resolve()
            .unwrap();
        let encoded = encode_structured_query(&serializer(), &query).unwrap();
        assert!(encoded["where"].get("fieldFilter").is_some());
        assert!(encoded.get("orderBy").is_none());
    }
}
