use std::collections::BTreeMap;

use crate::firestore::api::query::{OrderBy, StructuredQuery};
use crate::firestore::error::{
    inconsistency, internal_error, protocol_violation, FirestoreResult,
};
use crate::firestore::model::{Document, DocumentKey, Timestamp};
use crate::firestore::query_evaluator::compare_documents;
use crate::firestore::remote::remote_event::{DocumentViewChange, WatchSnapshot};
use crate::firestore::remote::watch_change::{
    DocumentChange, ExistenceFilterChange, TargetChangeState, WatchChange, WatchTargetChange,
};

/// Client-side state of a single listen target.
///
/// Watch events are buffered as pending changes and only folded into the visible
/// document set when the server marks a consistent point (a global `NO_CHANGE`
/// with a read time while the target is current). Each fold produces at most one
/// [`WatchSnapshot`].
#[derive(Debug, Clone)]
pub struct WatchState {
    target_id: i32,
    order_by: Vec<OrderBy>,
    current: bool,
    has_emitted: bool,
    documents: BTreeMap<DocumentKey, Document>,
    ordered: Vec<Document>,
    pending: BTreeMap<DocumentKey, Option<Document>>,
    resume_token: Option<Vec<u8>>,
    read_time: Option<Timestamp>,
}

impl WatchState {
    pub fn new(target_id: i32, order_by: Vec<OrderBy>) -> Self {
        Self {
            target_id,
            order_by,
            current: false,
            has_emitted: false,
            documents: BTreeMap::new(),
            ordered: Vec::new(),
            pending: BTreeMap::new(),
            resume_token: None,
            read_time: None,
        }
    }

    /// Listens to `query`, keeping documents in the order the query returns them.
    pub fn for_query(target_id: i32, query: &StructuredQuery) -> Self {
        Self::new(target_id, query.order_by().to_vec())
    }

    pub fn target_id(&self) -> i32 {
        self.target_id
    }

    pub fn is_current(&self) -> bool {
        self.current
    }

    pub fn resume_token(&self) -> Option<&[u8]> {
        self.resume_token.as_deref()
    }

    /// Read time of the last consistent point, emitted or not.
    pub fn read_time(&self) -> Option<Timestamp> {
        self.read_time
    }

    /// Documents of the last computed snapshot, in query order.
    pub fn documents(&self) -> &[Document] {
        &self.ordered
    }

    /// Applies one event. Returns a snapshot when the event completes a
    /// consistent point and either nothing was emitted yet or the document set
    /// changed.
    ///
    /// Any error leaves the state unusable; the subscription must be torn down.
    pub fn resolve_event(&mut self, change: WatchChange) -> FirestoreResult<Option<WatchSnapshot>> {
        match change {
            WatchChange::TargetChange(change) => self.handle_target_change(change),
            WatchChange::DocumentChange(change) => {
                self.handle_document_change(change);
                Ok(None)
            }
            WatchChange::DocumentDelete(delete) => {
                self.pending.insert(delete.key, None);
                Ok(None)
            }
            WatchChange::DocumentRemove(remove) => {
                self.pending.insert(remove.key, None);
                Ok(None)
            }
            WatchChange::ExistenceFilter(filter) => {
                self.check_existence_filter(filter)?;
                Ok(None)
            }
        }
    }

    fn handle_target_change(
        &mut self,
        change: WatchTargetChange,
    ) -> FirestoreResult<Option<WatchSnapshot>> {
        if let Some(cause) = change.cause {
            log::debug!("watch target {} failed: {cause}", self.target_id);
            return Err(cause);
        }

        match change.state {
            TargetChangeState::NoChange => {
                if let Some(token) = change.resume_token {
                    self.resume_token = Some(token);
                }
                match change.read_time {
                    Some(read_time) if change.target_ids.is_empty() && self.current => {
                        self.compute_snapshot(read_time)
                    }
                    _ => Ok(None),
                }
            }
            TargetChangeState::Add => match change.target_ids.first() {
                Some(id) if *id == self.target_id => Ok(None),
                Some(id) => Err(protocol_violation(format!(
                    "Target {id} added on the stream for target {}",
                    self.target_id
                ))),
                None => Ok(None),
            },
            TargetChangeState::Remove => Err(protocol_violation(format!(
                "Target {} removed by the server without a cause",
                self.target_id
            ))),
            TargetChangeState::Current => {
                self.current = true;
                Ok(None)
            }
            TargetChangeState::Reset => {
                self.reset();
                Ok(None)
            }
        }
    }

    fn handle_document_change(&mut self, change: DocumentChange) {
        let key = change.document.key().clone();
        if change.target_ids.contains(&self.target_id) {
            self.pending.insert(key, Some(change.document));
        } else if change.removed_target_ids.contains(&self.target_id) {
            self.pending.insert(key, None);
        }
    }

    fn check_existence_filter(&self, filter: ExistenceFilterChange) -> FirestoreResult<()> {
        let expected = self.pending_size();
        if i64::from(filter.count) != expected as i64 {
            return Err(inconsistency(format!(
                "Existence filter for target {} reports {} documents, client expects {expected}",
                self.target_id, filter.count
            )));
        }
        Ok(())
    }

    /// Number of documents the target would hold if pending changes were applied.
    fn pending_size(&self) -> usize {
        let mut size = self.documents.len();
        for (key, change) in &self.pending {
            match (change, self.documents.contains_key(key)) {
                (Some(_), false) => size += 1,
                (None, true) => size -= 1,
                _ => {}
            }
        }
        size
    }

    /// Forgets everything since the last snapshot: pending changes are dropped and
    /// every document of the last snapshot is marked deleted until the server
    /// sends it again.
    fn reset(&mut self) {
        log::debug!(
            "watch target {} reset with {} documents",
            self.target_id,
            self.documents.len()
        );
        self.pending = self
            .documents
            .keys()
            .map(|key| (key.clone(), None))
            .collect();
        self.current = false;
    }

    fn compute_snapshot(&mut self, read_time: Timestamp) -> FirestoreResult<Option<WatchSnapshot>> {
        let mut deletes = Vec::new();
        let mut adds = Vec::new();
        let mut updates = Vec::new();
        for (key, change) in std::mem::take(&mut self.pending) {
            match (change, self.documents.get(&key)) {
                (None, Some(old)) => deletes.push(old.clone()),
                (None, None) => {}
                (Some(document), None) => adds.push(document),
                (Some(document), Some(old)) => {
                    if document.update_time() != old.update_time() {
                        updates.push(document);
                    }
                }
            }
        }

        let order_by = &self.order_by;
        deletes.sort_by(|left, right| compare_documents(left, right, order_by));
        adds.sort_by(|left, right| compare_documents(left, right, order_by));
        updates.sort_by(|left, right| compare_documents(left, right, order_by));

        let mut changes = Vec::with_capacity(deletes.len() + adds.len() + updates.len());
        for old in deletes {
            let old_index = self.remove_ordered(&old)?;
            self.documents.remove(old.key());
            changes.push(DocumentViewChange::removed(old, old_index));
        }
        for document in adds {
            let new_index = self.insert_ordered(document.clone());
            self.documents.insert(document.key().clone(), document.clone());
            changes.push(DocumentViewChange::added(document, new_index));
        }
        for document in updates {
            let old = self.documents.get(document.key()).cloned().ok_or_else(|| {
                internal_error(format!("Modified document {} is not tracked", document.key()))
            })?;
            let old_index = self.remove_ordered(&old)?;
            let new_index = self.insert_ordered(document.clone());
            self.documents.insert(document.key().clone(), document.clone());
            changes.push(DocumentViewChange::modified(document, old_index, new_index));
        }

        self.read_time = Some(read_time);
        if self.has_emitted && changes.is_empty() {
            return Ok(None);
        }
        self.has_emitted = true;

        log::debug!(
            "watch target {} snapshot at {read_time}: {} documents, {} changes",
            self.target_id,
            self.ordered.len(),
            changes.len()
        );
        Ok(Some(WatchSnapshot {
            read_time,
            documents: self.ordered.clone(),
            changes,
        }))
    }

    fn remove_ordered(&mut self, document: &Document) -> FirestoreResult<usize> {
        let order_by = &self.order_by;
        let index = self
            .ordered
            .binary_search_by(|probe| compare_documents(probe, document, order_by))
            .map_err(|_| {
                internal_error(format!("Document {} missing from sorted view", document.key()))
            })?;
        self.ordered.remove(index);
        Ok(index)
    }

    fn insert_ordered(&mut self, document: Document) -> usize {
        let order_by = &self.order_by;
        let index = self.ordered.partition_point(|probe| {
            compare_documents(probe, &document, order_by) == std::cmp::Ordering::Less
        });
        self.ordered.insert(index, document);
        index
    }
}
