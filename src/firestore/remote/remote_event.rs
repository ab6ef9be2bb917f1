use crate::firestore::model::{Document, Timestamp};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Added,
    Removed,
    Modified,
}

/// One entry of a snapshot's change list.
///
/// Indices refer to the sorted document list: `old_index` to the list as it stood
/// just before this change was applied, `new_index` to the list just after.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentViewChange {
    pub kind: ChangeKind,
    pub document: Document,
    pub old_index: Option<usize>,
    pub new_index: Option<usize>,
}

impl DocumentViewChange {
    pub fn added(document: Document, new_index: usize) -> Self {
        Self {
            kind: ChangeKind::Added,
            document,
            old_index: None,
            new_index: Some(new_index),
        }
    }

    /// `document` is the version the listener saw last.
    pub fn removed(document: Document, old_index: usize) -> Self {
        Self {
            kind: ChangeKind::Removed,
            document,
            old_index: Some(old_index),
            new_index: None,
        }
    }

    pub fn modified(document: Document, old_index: usize, new_index: usize) -> Self {
        Self {
            kind: ChangeKind::Modified,
            document,
            old_index: Some(old_index),
            new_index: Some(new_index),
        }
    }
}

/// Consistent view of a listen target at `read_time`.
///
/// Changes are ordered removals first, then additions, then modifications.
#[derive(Debug, Clone, PartialEq)]
pub struct WatchSnapshot {
    pub read_time: Timestamp,
    pub documents: Vec<Document>,
    pub changes: Vec<DocumentViewChange>,
}

impl WatchSnapshot {
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}
