use common::storage::StorageError;
use thiserror::Error;
use uuid::Uuid;

use crate::utils::filename::FilenameError;

/// Input rejected before any side effect was attempted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("invalid owner type {0:?} (expected employee or dependent)")]
    OwnerType(String),
    #[error("invalid document type {0:?} (expected BI, Contrato, Diploma, Foto or Outro)")]
    DocumentType(String),
    #[error("invalid owner id {0:?}")]
    OwnerId(String),
    #[error("{}", .0.message())]
    Filename(FilenameError),
    #[error("file is empty")]
    EmptyFile,
    #[error("file is {size} bytes, maximum is {max}")]
    TooLarge { size: usize, max: usize },
    #[error("extension {0:?} is not supported")]
    Extension(String),
    #[error("content type {0:?} is not supported")]
    ContentType(String),
}

impl From<FilenameError> for ValidationError {
    fn from(err: FilenameError) -> Self {
        Self::Filename(err)
    }
}

/// Failure reported by a [`DocumentRepository`](super::DocumentRepository).
#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("document {0} not found")]
    NotFound(Uuid),
    #[error("document {0} conflicts with an existing row")]
    Conflict(Uuid),
    #[error("stored row is invalid: {0}")]
    InvalidRow(String),
    #[error("database error: {0}")]
    Database(String),
}

/// Errors surfaced by the document lifecycle operations.
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("document {0} not found")]
    NotFound(Uuid),
    #[error("object storage: {0}")]
    Storage(#[from] StorageError),
    #[error("metadata store: {0}")]
    Metadata(MetadataError),
    #[error("operation timed out while {step}")]
    Timeout { step: &'static str },
}

impl From<MetadataError> for DocumentError {
    fn from(err: MetadataError) -> Self {
        match err {
            MetadataError::NotFound(id) => Self::NotFound(id),
            other => Self::Metadata(other),
        }
    }
}
