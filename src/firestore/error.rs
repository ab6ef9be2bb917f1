use std::error::Error;
use std::fmt::{Display, Formatter};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FirestoreErrorCode {
    InvalidArgument,
    MalformedPath,
    SentinelMisuse,
    PreconditionConflict,
    CursorMismatch,
    ProtocolViolation,
    Inconsistency,
    Internal,
    Cancelled,
    Unknown,
    NotFound,
    PermissionDenied,
    Unauthenticated,
    Unavailable,
    DeadlineExceeded,
    ResourceExhausted,
    FailedPrecondition,
    Aborted,
}

impl FirestoreErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            FirestoreErrorCode::InvalidArgument => "firestore/invalid-argument",
            FirestoreErrorCode::MalformedPath => "firestore/malformed-path",
            FirestoreErrorCode::SentinelMisuse => "firestore/sentinel-misuse",
            FirestoreErrorCode::PreconditionConflict => "firestore/precondition-conflict",
            FirestoreErrorCode::CursorMismatch => "firestore/cursor-mismatch",
            FirestoreErrorCode::ProtocolViolation => "firestore/protocol-violation",
            FirestoreErrorCode::Inconsistency => "firestore/inconsistency",
            FirestoreErrorCode::Internal => "firestore/internal",
            FirestoreErrorCode::Cancelled => "firestore/cancelled",
            FirestoreErrorCode::Unknown => "firestore/unknown",
            FirestoreErrorCode::NotFound => "firestore/not-found",
            FirestoreErrorCode::PermissionDenied => "firestore/permission-denied",
            FirestoreErrorCode::Unauthenticated => "firestore/unauthenticated",
            FirestoreErrorCode::Unavailable => "firestore/unavailable",
            FirestoreErrorCode::DeadlineExceeded => "firestore/deadline-exceeded",
            FirestoreErrorCode::ResourceExhausted => "firestore/resource-exhausted",
            FirestoreErrorCode::FailedPrecondition => "firestore/failed-precondition",
            FirestoreErrorCode::Aborted => "firestore/aborted",
        }
    }

    /// Maps a gRPC status code (as carried by a target change cause) onto an error code.
    pub fn from_status_code(code: i32) -> Self {
        match code {
            1 => FirestoreErrorCode::Cancelled,
            3 => FirestoreErrorCode::InvalidArgument,
            4 => FirestoreErrorCode::DeadlineExceeded,
            5 => FirestoreErrorCode::NotFound,
            7 => FirestoreErrorCode::PermissionDenied,
            8 => FirestoreErrorCode::ResourceExhausted,
            9 => FirestoreErrorCode::FailedPrecondition,
            10 => FirestoreErrorCode::Aborted,
            13 => FirestoreErrorCode::Internal,
            14 => FirestoreErrorCode::Unavailable,
            16 => FirestoreErrorCode::Unauthenticated,
            _ => FirestoreErrorCode::Unknown,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FirestoreError {
    pub code: FirestoreErrorCode,
    message: String,
}

impl FirestoreError {
    pub fn new(code: FirestoreErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn code_str(&self) -> &'static str {
        self.code.as_str()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// True for errors raised while validating caller input, before anything is built.
    pub fn is_validation(&self) -> bool {
        matches!(
            self.code,
            FirestoreErrorCode::InvalidArgument
                | FirestoreErrorCode::MalformedPath
                | FirestoreErrorCode::SentinelMisuse
                | FirestoreErrorCode::PreconditionConflict
                | FirestoreErrorCode::CursorMismatch
        )
    }

    /// True when a listen subscription that produced this error must be torn down.
    pub fn is_fatal_to_stream(&self) -> bool {
        !matches!(
            self.code,
            FirestoreErrorCode::MalformedPath
                | FirestoreErrorCode::SentinelMisuse
                | FirestoreErrorCode::PreconditionConflict
                | FirestoreErrorCode::CursorMismatch
        )
    }
}

impl Display for FirestoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.code_str())
    }
}

impl Error for FirestoreError {}

pub type FirestoreResult<T> = Result<T, FirestoreError>;

pub fn invalid_argument(message: impl Into<String>) -> FirestoreError {
    FirestoreError::new(FirestoreErrorCode::InvalidArgument, message)
}

pub fn malformed_path(message: impl Into<String>) -> FirestoreError {
    FirestoreError::new(FirestoreErrorCode::MalformedPath, message)
}

pub fn sentinel_misuse(message: impl Into<String>) -> FirestoreError {
    FirestoreError::new(FirestoreErrorCode::SentinelMisuse, message)
}

pub fn precondition_conflict(message: impl Into<String>) -> FirestoreError {
    FirestoreError::new(FirestoreErrorCode::PreconditionConflict, message)
}

pub fn cursor_mismatch(message: impl Into<String>) -> FirestoreError {
    FirestoreError::new(FirestoreErrorCode::CursorMismatch, message)
}

pub fn protocol_violation(message: impl Into<String>) -> FirestoreError {
    FirestoreError::new(FirestoreErrorCode::ProtocolViolation, message)
}

pub fn inconsistency(message: impl Into<String>) -> FirestoreError {
    FirestoreError::new(FirestoreErrorCode::Inconsistency, message)
}

pub fn internal_error(message: impl Into<String>) -> FirestoreError {
    FirestoreError::new(FirestoreErrorCode::Internal, message)
}
