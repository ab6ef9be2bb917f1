use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use serde::Deserialize;
use serde_json::Value as JsonValue;

use crate::firestore::error::{
    invalid_argument, FirestoreError, FirestoreErrorCode, FirestoreResult,
};
use crate::firestore::model::{Document, DocumentKey, Timestamp};
use crate::firestore::remote::serializer::JsonProtoSerializer;

/// One message received on a listen stream.
#[derive(Debug, Clone)]
pub enum WatchChange {
    TargetChange(WatchTargetChange),
    DocumentChange(DocumentChange),
    DocumentDelete(DocumentDelete),
    DocumentRemove(DocumentRemove),
    ExistenceFilter(ExistenceFilterChange),
}

#[derive(Debug, Clone)]
pub struct WatchTargetChange {
    pub state: TargetChangeState,
    pub target_ids: Vec<i32>,
    pub resume_token: Option<Vec<u8>>,
    pub read_time: Option<Timestamp>,
    pub cause: Option<FirestoreError>,
}

impl WatchTargetChange {
    pub fn new(state: TargetChangeState) -> Self {
        Self {
            state,
            target_ids: Vec::new(),
            resume_token: None,
            read_time: None,
            cause: None,
        }
    }

    pub fn with_target_ids(mut self, target_ids: Vec<i32>) -> Self {
        self.target_ids = target_ids;
        self
    }

    pub fn with_read_time(mut self, read_time: Timestamp) -> Self {
        self.read_time = Some(read_time);
        self
    }

    pub fn with_resume_token(mut self, token: Vec<u8>) -> Self {
        self.resume_token = Some(token);
        self
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TargetChangeState {
    #[default]
    NoChange,
    Add,
    Remove,
    Current,
    Reset,
}

#[derive(Debug, Clone)]
pub struct DocumentChange {
    pub document: Document,
    pub target_ids: Vec<i32>,
    pub removed_target_ids: Vec<i32>,
}

#[derive(Debug, Clone)]
pub struct DocumentDelete {
    pub key: DocumentKey,
    pub read_time: Option<Timestamp>,
    pub removed_target_ids: Vec<i32>,
}

#[derive(Debug, Clone)]
pub struct DocumentRemove {
    pub key: DocumentKey,
    pub read_time: Option<Timestamp>,
    pub removed_target_ids: Vec<i32>,
}

/// Server-side count of documents matching a target, used as a consistency check.
#[derive(Debug, Clone)]
pub struct ExistenceFilterChange {
    pub target_id: i32,
    pub count: i32,
}

// proto3 JSON wire shapes. Absent fields carry their zero value.

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListenResponse {
    target_change: Option<TargetChangeMessage>,
    document_change: Option<DocumentChangeMessage>,
    document_delete: Option<TombstoneMessage>,
    document_remove: Option<TombstoneMessage>,
    filter: Option<FilterMessage>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct TargetChangeMessage {
    target_change_type: TargetChangeState,
    target_ids: Vec<i32>,
    resume_token: Option<String>,
    read_time: Option<String>,
    cause: Option<StatusMessage>,
}

#[derive(Debug, Deserialize)]
struct StatusMessage {
    #[serde(default)]
    code: i32,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DocumentChangeMessage {
    document: JsonValue,
    #[serde(default)]
    target_ids: Vec<i32>,
    #[serde(default)]
    removed_target_ids: Vec<i32>,
}

/// Shared by `documentDelete` and `documentRemove`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TombstoneMessage {
    document: String,
    #[serde(default)]
    read_time: Option<String>,
    #[serde(default)]
    removed_target_ids: Vec<i32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct FilterMessage {
    target_id: i32,
    count: i32,
}

/// Decodes one `ListenResponse` JSON message. Messages of an unknown type yield `None`.
pub fn decode_watch_change(
    serializer: &JsonProtoSerializer,
    value: &JsonValue,
) -> FirestoreResult<Option<WatchChange>> {
    let response = ListenResponse::deserialize(value)
        .map_err(|err| invalid_argument(format!("Malformed ListenResponse: {err}")))?;

    if let Some(message) = response.target_change {
        return target_change(serializer, message).map(Some);
    }
    if let Some(message) = response.document_change {
        let document = serializer.decode_document(&message.document)?;
        return Ok(Some(WatchChange::DocumentChange(DocumentChange {
            document,
            target_ids: message.target_ids,
            removed_target_ids: message.removed_target_ids,
        })));
    }
    if let Some(message) = response.document_delete {
        let (key, read_time, removed_target_ids) = tombstone(serializer, message)?;
        return Ok(Some(WatchChange::DocumentDelete(DocumentDelete {
            key,
            read_time,
            removed_target_ids,
        })));
    }
    if let Some(message) = response.document_remove {
        let (key, read_time, removed_target_ids) = tombstone(serializer, message)?;
        return Ok(Some(WatchChange::DocumentRemove(DocumentRemove {
            key,
            read_time,
            removed_target_ids,
        })));
    }
    Ok(response.filter.map(|message| {
        WatchChange::ExistenceFilter(ExistenceFilterChange {
            target_id: message.target_id,
            count: message.count,
        })
    }))
}

fn target_change(
    serializer: &JsonProtoSerializer,
    message: TargetChangeMessage,
) -> FirestoreResult<WatchChange> {
    let resume_token = message
        .resume_token
        .map(|token| {
            BASE64_STANDARD
                .decode(token)
                .map_err(|err| invalid_argument(format!("Invalid resumeToken: {err}")))
        })
        .transpose()?;
    let read_time = decode_read_time(serializer, message.read_time.as_deref())?;
    let cause = message.cause.map(|status| {
        let text = status
            .message
            .unwrap_or_else(|| "watch target failed".to_string());
        FirestoreError::new(FirestoreErrorCode::from_status_code(status.code), text)
    });

    Ok(WatchChange::TargetChange(WatchTargetChange {
        state: message.target_change_type,
        target_ids: message.target_ids,
        resume_token,
        read_time,
        cause,
    }))
}

fn tombstone(
    serializer: &JsonProtoSerializer,
    message: TombstoneMessage,
) -> FirestoreResult<(DocumentKey, Option<Timestamp>, Vec<i32>)> {
    let key = serializer.document_key_from_name(&message.document)?;
    let read_time = decode_read_time(serializer, message.read_time.as_deref())?;
    Ok((key, read_time, message.removed_target_ids))
}

fn decode_read_time(
    serializer: &JsonProtoSerializer,
    value: Option<&str>,
) -> FirestoreResult<Option<Timestamp>> {
    value
        .map(|timestamp| serializer.decode_timestamp_string(timestamp))
        .transpose()
}
