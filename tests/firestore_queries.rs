use std::collections::BTreeMap;
use std::str::FromStr;

use firestore_resolve::firestore::api::{
    Bound, Cursor, Filter, FilterOperator, OrderBy, OrderDirection, Query, UnaryOperator,
};
use firestore_resolve::firestore::model::{DatabaseId, Document, DocumentKey, FieldPath};
use firestore_resolve::firestore::value::{FirestoreValue, MapValue};
use firestore_resolve::firestore::{Firestore, FirestoreErrorCode};
use serde_json::json;

fn firestore() -> Firestore {
    Firestore::new(DatabaseId::default("projectID"))
}

fn query() -> Query {
    firestore().collection("C").unwrap()
}

fn path(dotted: &str) -> FieldPath {
    FieldPath::from_dot_separated(dotted).unwrap()
}

fn int(value: i64) -> FirestoreValue {
    FirestoreValue::from_integer(value)
}

fn snapshot(id: &str, a: i64, b: i64) -> Document {
    let fields: BTreeMap<String, FirestoreValue> =
        [("a".to_string(), int(a)), ("b".to_string(), int(b))].into();
    Document::new(
        DocumentKey::from_string(&format!("C/{id}")).unwrap(),
        MapValue::new(fields),
    )
}

#[test]
fn cursors_follow_explicit_order() {
    let resolved = query()
        .order_by(path("a"), OrderDirection::Ascending)
        .start_at(Cursor::Values(vec![int(7)]))
        .end_before(Cursor::Values(vec![int(9)]))
        .resolve()
        .unwrap();

    assert_eq!(
        resolved.order_by(),
        &[OrderBy::new(path("a"), OrderDirection::Ascending)]
    );
    assert_eq!(resolved.start_at(), Some(&Bound::new(vec![int(7)], true)));
    assert_eq!(resolved.end_at(), Some(&Bound::new(vec![int(9)], true)));
}

#[test]
fn last_cursor_clause_for_an_edge_wins() {
    let resolved = query()
        .order_by(path("a"), OrderDirection::Ascending)
        .start_at(Cursor::Values(vec![int(1)]))
        .start_after(Cursor::Values(vec![int(2)]))
        .end_before(Cursor::Values(vec![int(8)]))
        .end_at(Cursor::Values(vec![int(9)]))
        .limit(3)
        .limit(4)
        .resolve()
        .unwrap();

    assert_eq!(resolved.start_at(), Some(&Bound::new(vec![int(2)], false)));
    assert_eq!(resolved.end_at(), Some(&Bound::new(vec![int(9)], false)));
    assert_eq!(resolved.limit(), Some(4));
}

#[test]
fn where_order_does_not_change_the_filter_set() {
    let forward = query()
        .where_field(path("a"), FilterOperator::GreaterThan, int(5))
        .where_field(path("b"), FilterOperator::Equal, int(3))
        .resolve()
        .unwrap();
    let reversed = query()
        .where_field(path("b"), FilterOperator::Equal, int(3))
        .where_field(path("a"), FilterOperator::GreaterThan, int(5))
        .resolve()
        .unwrap();

    let members = |filter: Option<&Filter>| match filter {
        Some(Filter::And(filters)) => filters.clone(),
        other => panic!("expected a composite filter, got {other:?}"),
    };
    let forward = members(forward.filter());
    let reversed = members(reversed.filter());
    assert_eq!(forward.len(), 2);
    assert!(forward.iter().all(|filter| reversed.contains(filter)));
}

#[test]
fn null_and_nan_become_unary_filters() {
    let resolved = query()
        .where_field(path("a"), FilterOperator::Equal, FirestoreValue::null())
        .resolve()
        .unwrap();
    match resolved.filter() {
        Some(Filter::Unary(unary)) => assert_eq!(unary.operator(), UnaryOperator::IsNull),
        other => panic!("expected a unary filter, got {other:?}"),
    }

    let resolved = query()
        .where_field(path("a"), FilterOperator::Equal, FirestoreValue::from_double(f64::NAN))
        .resolve()
        .unwrap();
    match resolved.filter() {
        Some(Filter::Unary(unary)) => assert_eq!(unary.operator(), UnaryOperator::IsNan),
        other => panic!("expected a unary filter, got {other:?}"),
    }

    let err = query()
        .where_field(path("a"), FilterOperator::LessThan, FirestoreValue::null())
        .resolve()
        .unwrap_err();
    assert_eq!(err.code, FirestoreErrorCode::InvalidArgument);
}

#[test]
fn sentinels_are_rejected_in_filters_and_cursors() {
    let err = query()
        .where_field(path("a"), FilterOperator::Equal, FirestoreValue::server_timestamp())
        .resolve()
        .unwrap_err();
    assert_eq!(err.code, FirestoreErrorCode::SentinelMisuse);

    let err = query()
        .order_by(path("a"), OrderDirection::Ascending)
        .start_at(Cursor::Values(vec![FirestoreValue::delete_field()]))
        .resolve()
        .unwrap_err();
    assert_eq!(err.code, FirestoreErrorCode::SentinelMisuse);
}

#[test]
fn cursor_length_must_match_order() {
    let err = query()
        .order_by(path("a"), OrderDirection::Ascending)
        .start_at(Cursor::Values(vec![int(1), int(2)]))
        .resolve()
        .unwrap_err();
    assert_eq!(err.code, FirestoreErrorCode::CursorMismatch);
}

#[test]
fn snapshot_cursor_appends_document_id_order() {
    let resolved = query()
        .order_by(path("a"), OrderDirection::Descending)
        .start_at(Cursor::Snapshot(snapshot("d", 7, 8)))
        .resolve()
        .unwrap();

    assert_eq!(
        resolved.order_by(),
        &[
            OrderBy::new(path("a"), OrderDirection::Descending),
            OrderBy::new(FieldPath::document_id(), OrderDirection::Descending),
        ]
    );
    assert_eq!(
        resolved.start_at(),
        Some(&Bound::new(
            vec![
                int(7),
                FirestoreValue::from_reference(
                    "projects/projectID/databases/(default)/documents/C/d"
                ),
            ],
            true
        ))
    );
}

#[test]
fn snapshot_cursor_orders_by_first_inequality() {
    let resolved = query()
        .where_field(path("b"), FilterOperator::LessThan, int(10))
        .end_at(Cursor::Snapshot(snapshot("d", 7, 8)))
        .resolve()
        .unwrap();

    let fields: Vec<String> = resolved
        .order_by()
        .iter()
        .map(|order| order.field().canonical_string())
        .collect();
    assert_eq!(fields, vec!["b", "__name__"]);
    assert_eq!(resolved.end_at().map(Bound::values).map(<[_]>::len), Some(2));
}

#[test]
fn snapshot_from_another_collection_is_rejected() {
    let foreign = Document::new(
        DocumentKey::from_string("Other/d").unwrap(),
        MapValue::new(BTreeMap::new()),
    );
    let err = query()
        .start_after(Cursor::Snapshot(foreign))
        .resolve()
        .unwrap_err();
    assert_eq!(err.code, FirestoreErrorCode::CursorMismatch);
}

#[test]
fn resolved_query_encodes_as_structured_query() {
    let resolved = query()
        .select(vec![path("a")])
        .where_field(path("a"), FilterOperator::from_str(">").unwrap(), int(5))
        .order_by(path("a"), OrderDirection::from_str("desc").unwrap())
        .start_after(Cursor::Values(vec![int(9)]))
        .offset(2)
        .limit(10)
        .resolve()
        .unwrap();

    let encoded = firestore()
        .serializer()
        .encode_structured_query(&resolved)
        .unwrap();
    assert_eq!(
        encoded,
        json!({
            "select": { "fields": [{ "fieldPath": "a" }] },
            "from": [{ "collectionId": "C" }],
            "where": {
                "fieldFilter": {
                    "field": { "fieldPath": "a" },
                    "op": "GREATER_THAN",
                    "value": { "integerValue": "5" }
                }
            },
            "orderBy": [{ "field": { "fieldPath": "a" }, "direction": "DESCENDING" }],
            "startAt": { "values": [{ "integerValue": "9" }], "before": false },
            "offset": 2,
            "limit": 10
        })
    );
}
