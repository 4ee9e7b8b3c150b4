//! Document attachments: value objects, metadata persistence and the
//! coordinator that keeps blobs and rows in step.

pub mod coordinator;
pub mod error;
pub mod keys;
pub mod model;
pub mod postgres;
pub mod repository;
pub mod validation;

pub use coordinator::{CoordinatorOptions, DocumentCoordinator};
pub use error::{DocumentError, MetadataError, ValidationError};
pub use model::{DocumentRecord, DocumentType, OwnerType};
pub use postgres::SeaOrmDocumentRepository;
pub use repository::DocumentRepository;
pub use validation::{CheckedFile, UploadPolicy};
