use std::str::FromStr;

use crate::firestore::error::{
    cursor_mismatch, invalid_argument, malformed_path, sentinel_misuse, FirestoreError,
    FirestoreResult,
};
use crate::firestore::model::{DatabaseId, Document, FieldPath, ResourcePath};
use crate::firestore::value::{FirestoreValue, ValueKind};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FilterOperator {
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    Equal,
    ArrayContains,
    In,
    ArrayContainsAny,
}

impl FilterOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterOperator::LessThan => "LESS_THAN",
            FilterOperator::LessThanOrEqual => "LESS_THAN_OR_EQUAL",
            FilterOperator::GreaterThan => "GREATER_THAN",
            FilterOperator::GreaterThanOrEqual => "GREATER_THAN_OR_EQUAL",
            FilterOperator::Equal => "EQUAL",
            FilterOperator::ArrayContains => "ARRAY_CONTAINS",
            FilterOperator::In => "IN",
            FilterOperator::ArrayContainsAny => "ARRAY_CONTAINS_ANY",
        }
    }

    /// Range comparisons; these imply an ordering on their field for snapshot cursors.
    pub fn is_inequality(&self) -> bool {
        matches!(
            self,
            FilterOperator::LessThan
                | FilterOperator::LessThanOrEqual
                | FilterOperator::GreaterThan
                | FilterOperator::GreaterThanOrEqual
        )
    }
}

impl FromStr for FilterOperator {
    type Err = FirestoreError;

    fn from_str(op: &str) -> Result<Self, Self::Err> {
        match op {
            "<" => Ok(FilterOperator::LessThan),
            "<=" => Ok(FilterOperator::LessThanOrEqual),
            ">" => Ok(FilterOperator::GreaterThan),
            ">=" => Ok(FilterOperator::GreaterThanOrEqual),
            "==" => Ok(FilterOperator::Equal),
            "array-contains" => Ok(FilterOperator::ArrayContains),
            "in" => Ok(FilterOperator::In),
            "array-contains-any" => Ok(FilterOperator::ArrayContainsAny),
            other => Err(invalid_argument(format!("Unsupported where operator {other:?}"))),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OrderDirection {
    Ascending,
    Descending,
}

impl OrderDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderDirection::Ascending => "ASCENDING",
            OrderDirection::Descending => "DESCENDING",
        }
    }
}

impl FromStr for OrderDirection {
    type Err = FirestoreError;

    fn from_str(direction: &str) -> Result<Self, Self::Err> {
        match direction {
            "asc" | "ASCENDING" => Ok(OrderDirection::Ascending),
            "desc" | "DESCENDING" => Ok(OrderDirection::Descending),
            other => Err(invalid_argument(format!("Unsupported order direction {other:?}"))),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum UnaryOperator {
    IsNull,
    IsNan,
}

impl UnaryOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnaryOperator::IsNull => "IS_NULL",
            UnaryOperator::IsNan => "IS_NAN",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct FieldFilter {
    field: FieldPath,
    operator: FilterOperator,
    value: FirestoreValue,
}

impl FieldFilter {
    pub fn field(&self) -> &FieldPath {
        &self.field
    }

    pub fn operator(&self) -> FilterOperator {
        self.operator
    }

    pub fn value(&self) -> &FirestoreValue {
        &self.value
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct UnaryFilter {
    field: FieldPath,
    operator: UnaryOperator,
}

impl UnaryFilter {
    pub fn field(&self) -> &FieldPath {
        &self.field
    }

    pub fn operator(&self) -> UnaryOperator {
        self.operator
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Filter {
    Field(FieldFilter),
    Unary(UnaryFilter),
    /// Conjunction of every nested filter.
    And(Vec<Filter>),
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct OrderBy {
    field: FieldPath,
    direction: OrderDirection,
}

impl OrderBy {
    pub fn new(field: FieldPath, direction: OrderDirection) -> Self {
        Self { field, direction }
    }

    pub fn field(&self) -> &FieldPath {
        &self.field
    }

    pub fn direction(&self) -> OrderDirection {
        self.direction
    }
}

/// A resolved cursor position. `before` is true when the position sits before the
/// listed values (start-at, end-before).
#[derive(Clone, Debug, PartialEq)]
pub struct Bound {
    values: Vec<FirestoreValue>,
    before: bool,
}

impl Bound {
    pub fn new(values: Vec<FirestoreValue>, before: bool) -> Self {
        Self { values, before }
    }

    pub fn values(&self) -> &[FirestoreValue] {
        &self.values
    }

    pub fn before(&self) -> bool {
        self.before
    }
}

/// Where a cursor clause gets its values from.
#[derive(Clone, Debug, PartialEq)]
pub enum Cursor {
    /// One value per explicit order_by entry.
    Values(Vec<FirestoreValue>),
    /// Values are read out of the document in the final ordering.
    Snapshot(Document),
}

#[derive(Clone, Debug, PartialEq)]
pub enum Clause {
    Select(Vec<FieldPath>),
    Where {
        field: FieldPath,
        operator: FilterOperator,
        value: FirestoreValue,
    },
    OrderBy {
        field: FieldPath,
        direction: OrderDirection,
    },
    Offset(i32),
    Limit(i32),
    StartAt(Cursor),
    StartAfter(Cursor),
    EndAt(Cursor),
    EndBefore(Cursor),
}

/// Normalized query, ready to be encoded as a `StructuredQuery` message.
#[derive(Clone, Debug, PartialEq)]
pub struct StructuredQuery {
    select: Option<Vec<FieldPath>>,
    collection_id: String,
    filter: Option<Filter>,
    order_by: Vec<OrderBy>,
    start_at: Option<Bound>,
    end_at: Option<Bound>,
    offset: Option<i32>,
    limit: Option<i32>,
}

impl StructuredQuery {
    pub fn select(&self) -> Option<&[FieldPath]> {
        self.select.as_deref()
    }

    pub fn collection_id(&self) -> &str {
        &self.collection_id
    }

    pub fn filter(&self) -> Option<&Filter> {
        self.filter.as_ref()
    }

    pub fn order_by(&self) -> &[OrderBy] {
        &self.order_by
    }

    pub fn start_at(&self) -> Option<&Bound> {
        self.start_at.as_ref()
    }

    pub fn end_at(&self) -> Option<&Bound> {
        self.end_at.as_ref()
    }

    pub fn offset(&self) -> Option<i32> {
        self.offset
    }

    pub fn limit(&self) -> Option<i32> {
        self.limit
    }
}

/// A query against a single collection, built up clause by clause.
///
/// Clauses are only validated by [`Query::resolve`].
#[derive(Clone, Debug, PartialEq)]
pub struct Query {
    database_id: DatabaseId,
    collection_path: ResourcePath,
    clauses: Vec<Clause>,
}

impl Query {
    pub fn new(database_id: DatabaseId, collection_path: ResourcePath) -> FirestoreResult<Self> {
        if collection_path.len() % 2 == 0 {
            return Err(malformed_path(
                "Queries must reference a collection (odd number of path segments)",
            ));
        }
        Ok(Self {
            database_id,
            collection_path,
            clauses: Vec::new(),
        })
    }

    pub fn database_id(&self) -> &DatabaseId {
        &self.database_id
    }

    pub fn collection_path(&self) -> &ResourcePath {
        &self.collection_path
    }

    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    pub fn with_clause(mut self, clause: Clause) -> Self {
        self.clauses.push(clause);
        self
    }

    pub fn select(self, fields: Vec<FieldPath>) -> Self {
        self.with_clause(Clause::Select(fields))
    }

    pub fn where_field(self, field: FieldPath, operator: FilterOperator, value: FirestoreValue) -> Self {
        self.with_clause(Clause::Where {
            field,
            operator,
            value,
        })
    }

    pub fn order_by(self, field: FieldPath, direction: OrderDirection) -> Self {
        self.with_clause(Clause::OrderBy { field, direction })
    }

    pub fn offset(self, offset: i32) -> Self {
        self.with_clause(Clause::Offset(offset))
    }

    pub fn limit(self, limit: i32) -> Self {
        self.with_clause(Clause::Limit(limit))
    }

    pub fn start_at(self, cursor: Cursor) -> Self {
        self.with_clause(Clause::StartAt(cursor))
    }

    pub fn start_after(self, cursor: Cursor) -> Self {
        self.with_clause(Clause::StartAfter(cursor))
    }

    pub fn end_at(self, cursor: Cursor) -> Self {
        self.with_clause(Clause::EndAt(cursor))
    }

    pub fn end_before(self, cursor: Cursor) -> Self {
        self.with_clause(Clause::EndBefore(cursor))
    }

    pub fn resolve(&self) -> FirestoreResult<StructuredQuery> {
        resolve_query(&self.database_id, &self.collection_path, &self.clauses)
    }
}

/// Folds `clauses` into a [`StructuredQuery`].
///
/// Select, offset, limit and each cursor edge keep the last clause seen; where and
/// order_by clauses accumulate in arrival order.
pub fn resolve_query(
    database_id: &DatabaseId,
    collection_path: &ResourcePath,
    clauses: &[Clause],
) -> FirestoreResult<StructuredQuery> {
    let collection_id = collection_path
        .last_segment()
        .ok_or_else(|| malformed_path("Queries require a collection path"))?
        .to_string();

    let mut select = None;
    let mut filters = Vec::new();
    let mut first_inequality: Option<&FieldPath> = None;
    let mut explicit_order = Vec::new();
    let mut offset = None;
    let mut limit = None;
    let mut start: Option<(&Cursor, bool)> = None;
    let mut end: Option<(&Cursor, bool)> = None;

    for clause in clauses {
        match clause {
            Clause::Select(fields) if fields.is_empty() => {
                select = Some(vec![FieldPath::document_id()]);
            }
            Clause::Select(fields) => select = Some(fields.clone()),
            Clause::Where {
                field,
                operator,
                value,
            } => {
                filters.push(build_filter(field, *operator, value)?);
                if operator.is_inequality() && first_inequality.is_none() {
                    first_inequality = Some(field);
                }
            }
            Clause::OrderBy { field, direction } => {
                explicit_order.push(OrderBy::new(field.clone(), *direction));
            }
            Clause::Offset(value) => offset = Some(*value),
            Clause::Limit(value) => limit = Some(*value),
            Clause::StartAt(cursor) => start = Some((cursor, true)),
            Clause::StartAfter(cursor) => start = Some((cursor, false)),
            Clause::EndAt(cursor) => end = Some((cursor, false)),
            Clause::EndBefore(cursor) => end = Some((cursor, true)),
        }
    }

    let has_snapshot_cursor = [start, end]
        .iter()
        .flatten()
        .any(|(cursor, _)| matches!(cursor, Cursor::Snapshot(_)));
    let order_by = if has_snapshot_cursor {
        implicit_order(&explicit_order, first_inequality)
    } else {
        explicit_order.clone()
    };

    let cursor_context = CursorContext {
        database_id,
        collection_path,
        explicit_order: &explicit_order,
        order_by: &order_by,
    };
    let start_at = start
        .map(|(cursor, before)| cursor_context.resolve(cursor, before))
        .transpose()?;
    let end_at = end
        .map(|(cursor, before)| cursor_context.resolve(cursor, before))
        .transpose()?;

    let filter = match filters.len() {
        0 => None,
        1 => filters.pop(),
        _ => Some(Filter::And(filters)),
    };

    Ok(StructuredQuery {
        select,
        collection_id,
        filter,
        order_by,
        start_at,
        end_at,
        offset,
        limit,
    })
}

fn build_filter(
    field: &FieldPath,
    operator: FilterOperator,
    value: &FirestoreValue,
) -> FirestoreResult<Filter> {
    if let Some(sentinel) = find_sentinel_name(value) {
        return Err(sentinel_misuse(format!(
            "{sentinel} cannot be used in a where clause (field '{field}')"
        )));
    }

    let unary = if value.is_null() {
        Some(UnaryOperator::IsNull)
    } else if value.is_nan() {
        Some(UnaryOperator::IsNan)
    } else {
        None
    };
    if let Some(unary) = unary {
        if operator != FilterOperator::Equal {
            return Err(invalid_argument(format!(
                "Only equality comparisons are allowed against null and NaN (field '{field}')"
            )));
        }
        return Ok(Filter::Unary(UnaryFilter {
            field: field.clone(),
            operator: unary,
        }));
    }

    if matches!(operator, FilterOperator::In | FilterOperator::ArrayContainsAny)
        && !matches!(value.kind(), ValueKind::Array(_))
    {
        return Err(invalid_argument(format!(
            "'{}' filters require an array value (field '{field}')",
            operator.as_str()
        )));
    }

    Ok(Filter::Field(FieldFilter {
        field: field.clone(),
        operator,
        value: value.clone(),
    }))
}

/// Ordering used when a cursor is taken from a document snapshot: the explicit
/// order, or the first inequality field when there is none, closed off by the
/// document id.
fn implicit_order(explicit: &[OrderBy], first_inequality: Option<&FieldPath>) -> Vec<OrderBy> {
    let mut order_by = explicit.to_vec();
    if order_by.is_empty() {
        if let Some(field) = first_inequality {
            order_by.push(OrderBy::new(field.clone(), OrderDirection::Ascending));
        }
    }
    if !order_by.iter().any(|order| order.field().is_document_id()) {
        let direction = order_by
            .last()
            .map(OrderBy::direction)
            .unwrap_or(OrderDirection::Ascending);
        order_by.push(OrderBy::new(FieldPath::document_id(), direction));
    }
    order_by
}

struct CursorContext<'a> {
    database_id: &'a DatabaseId,
    collection_path: &'a ResourcePath,
    explicit_order: &'a [OrderBy],
    order_by: &'a [OrderBy],
}

impl CursorContext<'_> {
    fn resolve(&self, cursor: &Cursor, before: bool) -> FirestoreResult<Bound> {
        let values = match cursor {
            Cursor::Values(values) => self.values_bound(values)?,
            Cursor::Snapshot(document) => self.snapshot_bound(document)?,
        };
        Ok(Bound::new(values, before))
    }

    fn values_bound(&self, values: &[FirestoreValue]) -> FirestoreResult<Vec<FirestoreValue>> {
        if values.is_empty() {
            return Err(cursor_mismatch("Cursors require at least one value"));
        }
        if values.len() != self.explicit_order.len() {
            return Err(cursor_mismatch(format!(
                "Cursor has {} values but the query has {} order_by clauses",
                values.len(),
                self.explicit_order.len()
            )));
        }
        values
            .iter()
            .zip(self.explicit_order)
            .map(|(value, order)| self.cursor_value(value, order))
            .collect()
    }

    fn cursor_value(&self, value: &FirestoreValue, order: &OrderBy) -> FirestoreResult<FirestoreValue> {
        if let Some(sentinel) = find_sentinel_name(value) {
            return Err(sentinel_misuse(format!(
                "{sentinel} cannot be used as a cursor value (field '{}')",
                order.field()
            )));
        }
        if !order.field().is_document_id() {
            return Ok(value.clone());
        }
        match value.kind() {
            ValueKind::String(id) if !id.is_empty() && !id.contains('/') => {
                let path = self.collection_path.child(id.as_str());
                Ok(FirestoreValue::from_reference(
                    self.database_id.resource_name(&path),
                ))
            }
            ValueKind::Reference(_) => Ok(value.clone()),
            _ => Err(cursor_mismatch(format!(
                "Cursor values for the document id must be document ids within '{}'",
                self.collection_path
            ))),
        }
    }

    fn snapshot_bound(&self, document: &Document) -> FirestoreResult<Vec<FirestoreValue>> {
        if !self.collection_path.is_immediate_parent_of(document.key().path()) {
            return Err(cursor_mismatch(format!(
                "Cursor document '{}' does not belong to collection '{}'",
                document.key(),
                self.collection_path
            )));
        }
        self.order_by
            .iter()
            .map(|order| {
                if order.field().is_document_id() {
                    return Ok(FirestoreValue::from_reference(
                        self.database_id.document_name(document.key()),
                    ));
                }
                document.field(order.field()).cloned().ok_or_else(|| {
                    cursor_mismatch(format!(
                        "Cursor document '{}' has no value for order_by field '{}'",
                        document.key(),
                        order.field()
                    ))
                })
            })
            .collect()
    }
}

fn find_sentinel_name(value: &FirestoreValue) -> Option<&'static str> {
    match value.kind() {
        ValueKind::Sentinel(sentinel) => Some(sentinel.name()),
        ValueKind::Array(array) => array.values().iter().find_map(find_sentinel_name),
        ValueKind::Map(map) => map.fields().values().find_map(find_sentinel_name),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::firestore::model::{DocumentKey, Timestamp};
    use crate::firestore::test_support::{field_path, fields, int, resource_path};
    use crate::firestore::value::MapValue;

    fn query() -> Query {
        Query::new(DatabaseId::default("projectID"), resource_path("C")).unwrap()
    }

    fn snapshot(path: &str) -> Document {
        Document::new(
            DocumentKey::from_string(path).unwrap(),
            MapValue::new(fields([("a", int(7)), ("b", int(8))])),
        )
        .with_update_time(Timestamp::from_seconds(42))
    }

    fn reference(path: &str) -> FirestoreValue {
        FirestoreValue::from_reference(format!(
            "projects/projectID/databases/(default)/documents/{path}"
        ))
    }

    #[test]
    fn parses_operators() {
        assert_eq!("<=".parse::<FilterOperator>().unwrap(), FilterOperator::LessThanOrEqual);
        let err = "!=".parse::<FilterOperator>().unwrap_err();
        assert_eq!(err.code_str(), "firestore/invalid-argument");
        assert_eq!("desc".parse::<OrderDirection>().unwrap(), OrderDirection::Descending);
    }

    #[test]
    fn empty_select_projects_document_id() {
        let resolved = query().select(Vec::new()).resolve().unwrap();
        assert_eq!(resolved.select(), Some(&[FieldPath::document_id()][..]));
    }

    #[test]
    fn last_clause_wins_for_limit_offset_and_cursor_edges() {
        let resolved = query()
            .order_by(field_path(&["a"]), OrderDirection::Ascending)
            .limit(2)
            .offset(3)
            .limit(5)
            .offset(1)
            .start_at(Cursor::Values(vec![int(1)]))
            .start_after(Cursor::Values(vec![int(2)]))
            .end_at(Cursor::Values(vec![int(9)]))
            .end_before(Cursor::Values(vec![int(8)]))
            .resolve()
            .unwrap();
        assert_eq!(resolved.limit(), Some(5));
        assert_eq!(resolved.offset(), Some(1));
        assert_eq!(resolved.start_at(), Some(&Bound::new(vec![int(2)], false)));
        assert_eq!(resolved.end_at(), Some(&Bound::new(vec![int(8)], true)));
    }

    #[test]
    fn null_and_nan_equality_become_unary_filters() {
        let resolved = query()
            .where_field(field_path(&["a"]), FilterOperator::Equal, FirestoreValue::null())
            .resolve()
            .unwrap();
        assert!(matches!(
            resolved.filter(),
            Some(Filter::Unary(filter)) if filter.operator() == UnaryOperator::IsNull
        ));

        let err = query()
            .where_field(
                field_path(&["a"]),
                FilterOperator::LessThan,
                FirestoreValue::from_double(f64::NAN),
            )
            .resolve()
            .unwrap_err();
        assert_eq!(err.code_str(), "firestore/invalid-argument");
    }

    #[test]
    fn document_id_cursor_values_become_references() {
        let resolved = query()
            .order_by(FieldPath::document_id(), OrderDirection::Ascending)
            .start_at(Cursor::Values(vec![FirestoreValue::from_string("D1")]))
            .resolve()
            .unwrap();
        assert_eq!(resolved.start_at().unwrap().values(), &[reference("C/D1")]);

        let err = query()
            .order_by(FieldPath::document_id(), OrderDirection::Ascending)
            .start_at(Cursor::Values(vec![FirestoreValue::from_string("D1/E/x")]))
            .resolve()
            .unwrap_err();
        assert_eq!(err.code_str(), "firestore/cursor-mismatch");
    }

    #[test]
    fn inequality_implies_order_for_snapshot_cursors() {
        let resolved = query()
            .where_field(field_path(&["a"]), FilterOperator::LessThanOrEqual, int(3))
            .end_before(Cursor::Snapshot(snapshot("C/D")))
            .resolve()
            .unwrap();
        assert_eq!(
            resolved.order_by(),
            &[
                OrderBy::new(field_path(&["a"]), OrderDirection::Ascending),
                OrderBy::new(FieldPath::document_id(), OrderDirection::Ascending),
            ]
        );
        assert_eq!(resolved.end_at(), Some(&Bound::new(vec![int(7), reference("C/D")], true)));
    }

    #[test]
    fn snapshot_from_other_collection_is_rejected() {
        let err = query()
            .start_at(Cursor::Snapshot(snapshot("C2/D")))
            .resolve()
            .unwrap_err();
        assert_eq!(err.code_str(), "firestore/cursor-mismatch");
    }

    #[test]
    fn snapshot_missing_order_field_is_rejected() {
        let err = query()
            .order_by(field_path(&["z"]), OrderDirection::Ascending)
            .start_at(Cursor::Snapshot(snapshot("C/D")))
            .resolve()
            .unwrap_err();
        assert_eq!(err.code_str(), "firestore/cursor-mismatch");
    }

    #[test]
    fn in_requires_array_value() {
        let err = query()
            .where_field(field_path(&["a"]), FilterOperator::In, int(1))
            .resolve()
            .unwrap_err();
        assert_eq!(err.code_str(), "firestore/invalid-argument");
    }
}
