use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::document::{DocumentRecord, DocumentType, OwnerType};

/// Response DTO for a single document.
#[derive(Serialize, utoipa::ToSchema)]
pub struct DocumentResponse {
    /// Document ID (UUIDv7).
    #[schema(example = "01936f0e-1234-7abc-8000-000000000001")]
    pub id: String,
    pub owner_type: OwnerType,
    /// Employee or dependent ID.
    #[schema(example = "0190f5a0-0000-7000-8000-000000000001")]
    pub owner_id: String,
    #[serde(rename = "type")]
    pub document_type: DocumentType,
    /// Sanitized filename.
    #[schema(example = "Bilhete_Identidade.pdf")]
    pub file_name: String,
    /// Locator of the stored content.
    #[schema(example = "https://files.example.com/employee/0190f5a0-0000-7000-8000-000000000001/Bilhete_Identidade_20260118T101502123Z.pdf")]
    pub file_url: String,
    #[schema(example = "pdf")]
    pub extension: String,
    pub is_active: bool,
    pub uploaded_at: DateTime<Utc>,
}

impl From<DocumentRecord> for DocumentResponse {
    fn from(record: DocumentRecord) -> Self {
        Self {
            id: record.id.to_string(),
            owner_type: record.owner_type,
            owner_id: record.owner_id.to_string(),
            document_type: record.document_type,
            file_name: record.file_name,
            file_url: record.file_url,
            extension: record.extension,
            is_active: record.is_active,
            uploaded_at: record.uploaded_at,
        }
    }
}
