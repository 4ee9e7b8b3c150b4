use async_trait::async_trait;
use uuid::Uuid;

use super::error::MetadataError;
use super::model::DocumentRecord;

/// Persistence for document metadata rows.
#[async_trait]
pub trait DocumentRepository: Send + Sync {
    async fn create(&self, record: &DocumentRecord) -> Result<(), MetadataError>;

    /// Overwrite the row with `record.id`. Fails with `NotFound` when absent.
    async fn update(&self, record: &DocumentRecord) -> Result<(), MetadataError>;

    /// Fails with `NotFound` when absent.
    async fn delete(&self, id: Uuid) -> Result<(), MetadataError>;

    async fn find_by_id(&self, id: Uuid) -> Result<DocumentRecord, MetadataError>;
}
