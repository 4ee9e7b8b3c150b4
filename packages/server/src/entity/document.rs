use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "document")]
pub struct Model {
    /// UUIDv7 primary key.
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// "employee" or "dependent".
    pub owner_type: String,

    pub owner_id: Uuid,

    /// One of BI, Contrato, Diploma, Foto, Outro.
    pub document_type: String,

    /// Sanitized display filename.
    pub file_name: String,

    pub file_url: String,

    /// Lowercase extension without the dot.
    pub extension: String,

    #[sea_orm(default_value = true)]
    pub is_active: bool,

    pub uploaded_at: DateTimeUtc,

    /// Object-store key of the current content.
    #[sea_orm(unique)]
    pub object_key: String,
}

impl ActiveModelBehavior for ActiveModel {}
