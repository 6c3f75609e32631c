//! Error taxonomy for datastore operations.

use confstore_path::PathError;
use thiserror::Error;

use crate::schema::SchemaError;

/// Failure of a datastore operation.
///
/// All failures are synchronous and never retried internally. A failed
/// mutation never publishes a new root.
#[derive(Debug, Error)]
pub enum DatastoreError {
    #[error("invalid path: {0}")]
    InvalidPath(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("invalid payload: {0}")]
    InvalidPayload(String),
    #[error("type mismatch: {0}")]
    TypeMismatch(String),
    #[error("duplicate entry: {0}")]
    DuplicateEntry(String),
    #[error("access denied: {0}")]
    AccessDenied(String),
    #[error("failed to acquire lock in datastore \"{datastore}\", already locked by \"{holder}\"")]
    LockBusy { datastore: String, holder: String },
    #[error("no handler for operation \"{0}\"")]
    NoHandler(String),
    #[error("no state data handler for {0}")]
    NoStateHandler(String),
    #[error("handler failed: {0}")]
    Handler(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl DatastoreError {
    /// Short stable name of the error kind, for boundary layers and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            DatastoreError::InvalidPath(_) => "invalid-path",
            DatastoreError::NotFound(_) => "not-found",
            DatastoreError::InvalidPayload(_) => "invalid-payload",
            DatastoreError::TypeMismatch(_) => "type-mismatch",
            DatastoreError::DuplicateEntry(_) => "duplicate-entry",
            DatastoreError::AccessDenied(_) => "access-denied",
            DatastoreError::LockBusy { .. } => "lock-busy",
            DatastoreError::NoHandler(_) => "no-handler",
            DatastoreError::NoStateHandler(_) => "no-state-handler",
            DatastoreError::Handler(_) => "handler",
            DatastoreError::Io(_) => "io",
            DatastoreError::Json(_) => "json",
        }
    }
}

impl From<PathError> for DatastoreError {
    fn from(e: PathError) -> Self {
        DatastoreError::InvalidPath(e.to_string())
    }
}

impl From<SchemaError> for DatastoreError {
    fn from(e: SchemaError) -> Self {
        match e {
            SchemaError::Path(_)
            | SchemaError::NonexistentSchemaNode(_)
            | SchemaError::InvalidSelector { .. } => DatastoreError::InvalidPath(e.to_string()),
            SchemaError::DuplicateKey { .. } => DatastoreError::DuplicateEntry(e.to_string()),
            _ => DatastoreError::InvalidPayload(e.to_string()),
        }
    }
}

pub type Result<T, E = DatastoreError> = std::result::Result<T, E>;
