use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use common::storage::ObjectKey;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::ValidationError;

/// Kind of entity a document is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum OwnerType {
    Employee,
    Dependent,
}

impl OwnerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Employee => "employee",
            Self::Dependent => "dependent",
        }
    }
}

impl FromStr for OwnerType {
    type Err = ValidationError;

    /// Case-insensitive; surrounding whitespace is ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "employee" => Ok(Self::Employee),
            "dependent" => Ok(Self::Dependent),
            _ => Err(ValidationError::OwnerType(s.to_string())),
        }
    }
}

impl fmt::Display for OwnerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Logical document category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema)]
pub enum DocumentType {
    /// National identity card.
    #[serde(rename = "BI")]
    Bi,
    Contrato,
    Diploma,
    Foto,
    Outro,
}

impl DocumentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bi => "BI",
            Self::Contrato => "Contrato",
            Self::Diploma => "Diploma",
            Self::Foto => "Foto",
            Self::Outro => "Outro",
        }
    }
}

impl FromStr for DocumentType {
    type Err = ValidationError;

    /// Exact match after trimming.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "BI" => Ok(Self::Bi),
            "Contrato" => Ok(Self::Contrato),
            "Diploma" => Ok(Self::Diploma),
            "Foto" => Ok(Self::Foto),
            "Outro" => Ok(Self::Outro),
            _ => Err(ValidationError::DocumentType(s.to_string())),
        }
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Extensions a stored document may carry, without the dot.
pub const KNOWN_EXTENSIONS: &[&str] = &["pdf", "jpg", "jpeg", "png", "docx", "doc"];

/// Metadata row describing one stored attachment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentRecord {
    pub id: Uuid,
    pub owner_type: OwnerType,
    pub owner_id: Uuid,
    pub document_type: DocumentType,
    /// Sanitized display filename.
    pub file_name: String,
    pub file_url: String,
    /// Lowercase, without the dot.
    pub extension: String,
    pub is_active: bool,
    pub uploaded_at: DateTime<Utc>,
    pub object_key: ObjectKey,
}
