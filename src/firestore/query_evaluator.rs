use std::cmp::Ordering;

use crate::firestore::api::query::{OrderBy, OrderDirection};
use crate::firestore::model::Document;
use crate::firestore::value::compare_values;

/// Orders two documents the way a query with `order_by` returns them.
///
/// Each ordering compares the field value with [`compare_values`]; a document
/// missing the field sorts before every document that has it. `__name__`
/// compares document keys. Ties fall back to the document path, ascending, so the
/// result is total over distinct documents.
pub(crate) fn compare_documents(left: &Document, right: &Document, order_by: &[OrderBy]) -> Ordering {
    for order in order_by {
        let ordering = if order.field().is_document_id() {
            left.key().cmp(right.key())
        } else {
            match (left.field(order.field()), right.field(order.field())) {
                (Some(left_value), Some(right_value)) => compare_values(left_value, right_value),
                (None, Some(_)) => Ordering::Less,
                (Some(_), None) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            }
        };

        let ordering = match order.direction() {
            OrderDirection::Ascending => ordering,
            OrderDirection::Descending => ordering.reverse(),
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    left.key().cmp(right.key())
}
