use crate::firestore::model::{DocumentKey, FieldPath, Timestamp};
use crate::firestore::value::{FirestoreValue, MapValue};

/// Write-time assertion evaluated by the backend before applying a write.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Precondition {
    Exists(bool),
    UpdateTime(Timestamp),
}

#[derive(Clone, Debug, PartialEq)]
pub enum TransformOperation {
    /// `setToServerValue: REQUEST_TIME`
    ServerTimestamp,
    /// `appendMissingElements`
    ArrayUnion(Vec<FirestoreValue>),
    /// `removeAllFromArray`
    ArrayRemove(Vec<FirestoreValue>),
}

#[derive(Clone, Debug, PartialEq)]
pub struct FieldTransform {
    field_path: FieldPath,
    operation: TransformOperation,
}

impl FieldTransform {
    pub fn new(field_path: FieldPath, operation: TransformOperation) -> Self {
        Self {
            field_path,
            operation,
        }
    }

    pub fn field_path(&self) -> &FieldPath {
        &self.field_path
    }

    pub fn operation(&self) -> &TransformOperation {
        &self.operation
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum WriteOperation {
    /// Replaces the document, or only the masked paths when `mask` is present.
    Update {
        key: DocumentKey,
        fields: MapValue,
        mask: Option<Vec<FieldPath>>,
    },
    Transform {
        key: DocumentKey,
        field_transforms: Vec<FieldTransform>,
    },
    Delete {
        key: DocumentKey,
    },
}

/// One entry of a commit request.
#[derive(Clone, Debug, PartialEq)]
pub struct Write {
    operation: WriteOperation,
    precondition: Option<Precondition>,
}

impl Write {
    pub fn new(operation: WriteOperation, precondition: Option<Precondition>) -> Self {
        Self {
            operation,
            precondition,
        }
    }

    pub fn operation(&self) -> &WriteOperation {
        &self.operation
    }

    pub fn precondition(&self) -> Option<&Precondition> {
        self.precondition.as_ref()
    }

    pub fn key(&self) -> &DocumentKey {
        match &self.operation {
            WriteOperation::Update { key, .. }
            | WriteOperation::Transform { key, .. }
            | WriteOperation::Delete { key } => key,
        }
    }
}
