use async_trait::async_trait;
use common::storage::ObjectKey;
use sea_orm::{
    ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, Set, SqlErr,
};
use uuid::Uuid;

use super::error::MetadataError;
use super::model::DocumentRecord;
use super::repository::DocumentRepository;
use crate::entity::document;

/// [`DocumentRepository`] backed by the `document` table.
#[derive(Clone)]
pub struct SeaOrmDocumentRepository {
    db: DatabaseConnection,
}

impl SeaOrmDocumentRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

fn database_error(err: DbErr) -> MetadataError {
    MetadataError::Database(err.to_string())
}

fn to_active_model(record: &DocumentRecord) -> document::ActiveModel {
    document::ActiveModel {
        id: Set(record.id),
        owner_type: Set(record.owner_type.as_str().to_string()),
        owner_id: Set(record.owner_id),
        document_type: Set(record.document_type.as_str().to_string()),
        file_name: Set(record.file_name.clone()),
        file_url: Set(record.file_url.clone()),
        extension: Set(record.extension.clone()),
        is_active: Set(record.is_active),
        uploaded_at: Set(record.uploaded_at),
        object_key: Set(record.object_key.as_str().to_string()),
    }
}

impl TryFrom<document::Model> for DocumentRecord {
    type Error = MetadataError;

    fn try_from(model: document::Model) -> Result<Self, Self::Error> {
        let invalid = |what: String| MetadataError::InvalidRow(format!("document {}: {what}", model.id));

        Ok(Self {
            id: model.id,
            owner_type: model.owner_type.parse().map_err(|e| invalid(format!("{e}")))?,
            owner_id: model.owner_id,
            document_type: model
                .document_type
                .parse()
                .map_err(|e| invalid(format!("{e}")))?,
            object_key: ObjectKey::parse(&model.object_key).map_err(|e| invalid(e.to_string()))?,
            file_name: model.file_name,
            file_url: model.file_url,
            extension: model.extension,
            is_active: model.is_active,
            uploaded_at: model.uploaded_at,
        })
    }
}

#[async_trait]
impl DocumentRepository for SeaOrmDocumentRepository {
    async fn create(&self, record: &DocumentRecord) -> Result<(), MetadataError> {
        match document::Entity::insert(to_active_model(record))
            .exec_without_returning(&self.db)
            .await
        {
            Ok(_) => Ok(()),
            Err(e) if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
                Err(MetadataError::Conflict(record.id))
            }
            Err(e) => Err(database_error(e)),
        }
    }

    async fn update(&self, record: &DocumentRecord) -> Result<(), MetadataError> {
        let result = document::Entity::update_many()
            .set(to_active_model(record))
            .filter(document::Column::Id.eq(record.id))
            .exec(&self.db)
            .await
            .map_err(|e| match e.sql_err() {
                Some(SqlErr::UniqueConstraintViolation(_)) => MetadataError::Conflict(record.id),
                _ => database_error(e),
            })?;

        if result.rows_affected == 0 {
            return Err(MetadataError::NotFound(record.id));
        }
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<(), MetadataError> {
        let result = document::Entity::delete_by_id(id)
            .exec(&self.db)
            .await
            .map_err(database_error)?;

        if result.rows_affected == 0 {
            return Err(MetadataError::NotFound(id));
        }
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<DocumentRecord, MetadataError> {
        document::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .map_err(database_error)?
            .ok_or(MetadataError::NotFound(id))?
            .try_into()
    }
}
