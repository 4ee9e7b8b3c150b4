use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use common::storage::{BoxReader, ObjectKey, ObjectStore, StorageError};
use common::{KeyedGuard, KeyedMutex, StorageAppConfig};
use thiserror::Error;
use tokio::time::{Instant, timeout, timeout_at};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use super::error::{DocumentError, MetadataError};
use super::keys::{id_lock_key, name_lock_key, object_key_for, trash_key, with_suffix};
use super::model::{DocumentRecord, DocumentType, OwnerType};
use super::repository::DocumentRepository;
use super::validation::UploadPolicy;
use crate::config::DocumentConfig;

/// How many suffixed variants to try before giving up on a free object key.
const MAX_KEY_ATTEMPTS: usize = 4;

/// Tunables for [`DocumentCoordinator`].
#[derive(Debug, Clone)]
pub struct CoordinatorOptions {
    /// Key prefix for temporary backup copies.
    pub trash_prefix: String,
    /// Default deadline for a whole upload, replace or delete.
    pub operation_timeout: Duration,
    /// Deadline for each individual compensation step.
    pub compensation_timeout: Duration,
}

impl Default for CoordinatorOptions {
    fn default() -> Self {
        Self {
            trash_prefix: "trash".into(),
            operation_timeout: Duration::from_secs(5),
            compensation_timeout: Duration::from_secs(5),
        }
    }
}

impl CoordinatorOptions {
    pub fn from_config(documents: &DocumentConfig, storage: &StorageAppConfig) -> Self {
        Self {
            trash_prefix: storage.trash_prefix.clone(),
            operation_timeout: documents.operation_timeout(),
            compensation_timeout: documents.compensation_timeout(),
        }
    }
}

/// Copy of a blob stashed under a trash key before a destructive step.
struct Backup {
    original: ObjectKey,
    trash: ObjectKey,
    content: Vec<u8>,
}

/// What a follow-up read says about a row after a metadata step timed out.
enum RowState {
    Present(DocumentRecord),
    Absent,
    Unknown,
}

#[derive(Debug, Error)]
enum CompensationError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("timed out after {0:?}")]
    TimedOut(Duration),
}

/// Keeps document blobs and their metadata rows consistent.
///
/// The object store and the metadata store cannot commit together, so every
/// mutation runs under a [`KeyedMutex`] lock and orders its steps so that a
/// failure at any point can be undone: new blobs are written before the row
/// points at them, old blobs are copied to a trash key before they are
/// touched, and on failure the copy is put back. Errors raised while undoing
/// are logged and never replace the error that triggered them.
pub struct DocumentCoordinator {
    store: Arc<dyn ObjectStore>,
    repository: Arc<dyn DocumentRepository>,
    locks: KeyedMutex,
    policy: UploadPolicy,
    options: CoordinatorOptions,
}

impl DocumentCoordinator {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        repository: Arc<dyn DocumentRepository>,
        locks: KeyedMutex,
        policy: UploadPolicy,
        options: CoordinatorOptions,
    ) -> Self {
        Self {
            store,
            repository,
            locks,
            policy,
            options,
        }
    }

    pub fn policy(&self) -> &UploadPolicy {
        &self.policy
    }

    /// Store new content for an owner and create its metadata row.
    pub async fn upload(
        &self,
        owner_type: OwnerType,
        owner_id: Uuid,
        document_type: DocumentType,
        file_name: &str,
        content: &[u8],
    ) -> Result<DocumentRecord, DocumentError> {
        self.upload_with_timeout(
            owner_type,
            owner_id,
            document_type,
            file_name,
            content,
            self.options.operation_timeout,
        )
        .await
    }

    #[instrument(skip(self, content), fields(size = content.len()))]
    pub async fn upload_with_timeout(
        &self,
        owner_type: OwnerType,
        owner_id: Uuid,
        document_type: DocumentType,
        file_name: &str,
        content: &[u8],
        limit: Duration,
    ) -> Result<DocumentRecord, DocumentError> {
        let deadline = Instant::now() + limit;
        let checked = self.policy.check(file_name, content)?;
        let _guard = self
            .acquire(
                name_lock_key(owner_type, owner_id, &checked.original_name),
                deadline,
            )
            .await?;
        info!(
            digest = %checked.digest,
            size = checked.size,
            content_type = checked.content_type,
            "upload accepted"
        );

        let key = self
            .fresh_key(owner_type, owner_id, &checked.original_name, None, deadline)
            .await?;
        let file_url = self.save_primary(&key, content, deadline).await?;

        let record = DocumentRecord {
            id: Uuid::now_v7(),
            owner_type,
            owner_id,
            document_type,
            file_name: checked.file_name,
            file_url,
            extension: checked.extension,
            is_active: true,
            uploaded_at: Utc::now(),
            object_key: key,
        };

        match timeout_at(deadline, self.repository.create(&record)).await {
            Ok(Ok(())) => {
                info!(document_id = %record.id, key = %record.object_key, "document uploaded");
                Ok(record)
            }
            Ok(Err(e)) => {
                warn!(key = %record.object_key, error = %e, "metadata insert failed, discarding object");
                self.discard(&record.object_key).await;
                Err(e.into())
            }
            Err(_) => {
                match self.read_back(record.id).await {
                    RowState::Present(_) => warn!(
                        document_id = %record.id,
                        key = %record.object_key,
                        "metadata insert committed after the deadline, keeping object"
                    ),
                    RowState::Absent => self.discard(&record.object_key).await,
                    RowState::Unknown => warn!(
                        document_id = %record.id,
                        key = %record.object_key,
                        "metadata insert outcome unknown, object may be orphaned"
                    ),
                }
                Err(DocumentError::Timeout {
                    step: "creating metadata",
                })
            }
        }
    }

    /// Swap the content behind an existing document.
    pub async fn replace(
        &self,
        id: Uuid,
        file_name: &str,
        content: &[u8],
    ) -> Result<DocumentRecord, DocumentError> {
        self.replace_with_timeout(id, file_name, content, self.options.operation_timeout)
            .await
    }

    #[instrument(skip(self, content), fields(size = content.len()))]
    pub async fn replace_with_timeout(
        &self,
        id: Uuid,
        file_name: &str,
        content: &[u8],
        limit: Duration,
    ) -> Result<DocumentRecord, DocumentError> {
        let deadline = Instant::now() + limit;
        let _guard = self.acquire(id_lock_key(id), deadline).await?;

        let current = self.load(id, deadline).await?;
        let checked = self.policy.check(file_name, content)?;
        info!(
            digest = %checked.digest,
            size = checked.size,
            content_type = checked.content_type,
            "replacement accepted"
        );
        // Always taken after the id lock; uploads hold only this one.
        let _name_guard = self
            .acquire(
                name_lock_key(current.owner_type, current.owner_id, &checked.original_name),
                deadline,
            )
            .await?;

        let old_key = current.object_key.clone();
        let new_key = self
            .fresh_key(
                current.owner_type,
                current.owner_id,
                &checked.original_name,
                Some(&old_key),
                deadline,
            )
            .await?;
        let file_url = self.save_primary(&new_key, content, deadline).await?;

        let backup = match self.backup(&old_key, deadline).await {
            Ok(backup) => backup,
            Err(e) => {
                self.discard(&new_key).await;
                return Err(e);
            }
        };
        if backup.is_none() {
            warn!(document_id = %id, key = %old_key, "previous object missing, nothing to back up");
        }

        let updated = DocumentRecord {
            file_name: checked.file_name,
            file_url,
            extension: checked.extension,
            uploaded_at: Utc::now(),
            object_key: new_key.clone(),
            ..current
        };

        match timeout_at(deadline, self.repository.update(&updated)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                warn!(document_id = %id, error = %e, "metadata update failed, rolling back");
                self.roll_back_replace(id, &new_key, backup.as_ref()).await;
                return Err(e.into());
            }
            Err(_) => {
                match self.read_back(id).await {
                    RowState::Present(row) if row.object_key == new_key => {
                        warn!(document_id = %id, "metadata update committed after the deadline");
                        self.finish_replace(id, &old_key, backup.as_ref()).await;
                    }
                    RowState::Present(_) | RowState::Absent => {
                        self.roll_back_replace(id, &new_key, backup.as_ref()).await;
                    }
                    RowState::Unknown => error!(
                        document_id = %id,
                        old_key = %old_key,
                        new_key = %new_key,
                        trash = ?backup.as_ref().map(|b| &b.trash),
                        "metadata update outcome unknown, keeping both objects and the backup"
                    ),
                }
                return Err(DocumentError::Timeout {
                    step: "updating metadata",
                });
            }
        }

        self.finish_replace(id, &old_key, backup.as_ref()).await;
        info!(document_id = %id, old_key = %old_key, new_key = %new_key, "document content replaced");
        Ok(updated)
    }

    /// Remove a document's content and its metadata row.
    pub async fn delete(&self, id: Uuid) -> Result<(), DocumentError> {
        self.delete_with_timeout(id, self.options.operation_timeout)
            .await
    }

    #[instrument(skip(self))]
    pub async fn delete_with_timeout(&self, id: Uuid, limit: Duration) -> Result<(), DocumentError> {
        let deadline = Instant::now() + limit;
        let _guard = self.acquire(id_lock_key(id), deadline).await?;

        let record = self.load(id, deadline).await?;
        let key = &record.object_key;

        let backup = if self.exists_within(key, deadline, "checking object").await? {
            self.backup(key, deadline).await?
        } else {
            warn!(document_id = %id, key = %key, "object already missing, removing metadata only");
            None
        };

        if let Some(backup) = &backup {
            match timeout_at(deadline, self.store.delete(key)).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    self.restore(id, backup).await;
                    return Err(e.into());
                }
                Err(_) => {
                    self.restore(id, backup).await;
                    return Err(DocumentError::Timeout {
                        step: "deleting object",
                    });
                }
            }
        }

        match timeout_at(deadline, self.repository.delete(id)).await {
            Ok(Ok(())) => {}
            Ok(Err(MetadataError::NotFound(_))) => {
                warn!(document_id = %id, "metadata row vanished during delete");
                if let Some(backup) = &backup {
                    self.discard(&backup.trash).await;
                }
                return Err(DocumentError::NotFound(id));
            }
            Ok(Err(e)) => {
                warn!(document_id = %id, error = %e, "metadata delete failed, restoring object");
                if let Some(backup) = &backup {
                    self.restore(id, backup).await;
                }
                return Err(e.into());
            }
            Err(_) => {
                match (self.read_back(id).await, &backup) {
                    (RowState::Absent, Some(backup)) => self.discard(&backup.trash).await,
                    (RowState::Unknown, Some(backup)) => {
                        warn!(
                            document_id = %id,
                            key = %key,
                            "metadata delete outcome unknown, restoring object; it may be unreferenced"
                        );
                        self.restore(id, backup).await;
                    }
                    (_, Some(backup)) => self.restore(id, backup).await,
                    (_, None) => {}
                }
                return Err(DocumentError::Timeout {
                    step: "deleting metadata",
                });
            }
        }

        if let Some(backup) = &backup {
            self.discard(&backup.trash).await;
        }
        info!(document_id = %id, key = %key, "document deleted");
        Ok(())
    }

    /// Look up a document's metadata. Takes no lock.
    pub async fn find(&self, id: Uuid) -> Result<DocumentRecord, DocumentError> {
        let deadline = Instant::now() + self.options.operation_timeout;
        self.load(id, deadline).await
    }

    /// Open a document's content for streaming. Takes no lock.
    pub async fn open(&self, id: Uuid) -> Result<(DocumentRecord, BoxReader), DocumentError> {
        let deadline = Instant::now() + self.options.operation_timeout;
        let record = self.load(id, deadline).await?;

        match timeout_at(deadline, self.store.open(&record.object_key)).await {
            Ok(Ok(reader)) => Ok((record, reader)),
            Ok(Err(e)) if e.is_not_found() => {
                warn!(document_id = %id, key = %record.object_key, "metadata points at a missing object");
                Err(DocumentError::NotFound(id))
            }
            Ok(Err(e)) => Err(e.into()),
            Err(_) => Err(DocumentError::Timeout {
                step: "opening object",
            }),
        }
    }

    async fn acquire(&self, key: String, deadline: Instant) -> Result<KeyedGuard, DocumentError> {
        timeout_at(deadline, self.locks.lock(key))
            .await
            .map_err(|_| DocumentError::Timeout {
                step: "acquiring lock",
            })
    }

    async fn load(&self, id: Uuid, deadline: Instant) -> Result<DocumentRecord, DocumentError> {
        match timeout_at(deadline, self.repository.find_by_id(id)).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(DocumentError::Timeout {
                step: "loading metadata",
            }),
        }
    }

    async fn exists_within(
        &self,
        key: &ObjectKey,
        deadline: Instant,
        step: &'static str,
    ) -> Result<bool, DocumentError> {
        match timeout_at(deadline, self.store.exists(key)).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(DocumentError::Timeout { step }),
        }
    }

    /// Derive an object key nobody else holds, appending a random suffix when
    /// the timestamped key is taken or equals `avoid`.
    async fn fresh_key(
        &self,
        owner_type: OwnerType,
        owner_id: Uuid,
        file_name: &str,
        avoid: Option<&ObjectKey>,
        deadline: Instant,
    ) -> Result<ObjectKey, DocumentError> {
        let base = object_key_for(owner_type, owner_id, file_name, Utc::now())?;
        let mut key = base.clone();

        for _ in 0..MAX_KEY_ATTEMPTS {
            let taken = avoid == Some(&key)
                || self.exists_within(&key, deadline, "deriving key").await?;
            if !taken {
                return Ok(key);
            }
            debug!(key = %key, "object key taken, adding suffix");
            key = with_suffix(&base, &format!("{:08x}", rand::random::<u32>()))?;
        }

        Err(StorageError::Backend(format!("no free object key derived from {base}")).into())
    }

    async fn save_primary(
        &self,
        key: &ObjectKey,
        content: &[u8],
        deadline: Instant,
    ) -> Result<String, DocumentError> {
        match timeout_at(deadline, self.store.save_bytes(key, content)).await {
            Ok(result) => Ok(result?),
            Err(_) => {
                // The write may still land after we stop waiting.
                self.discard(key).await;
                Err(DocumentError::Timeout {
                    step: "saving object",
                })
            }
        }
    }

    /// Copy `key` to a fresh trash key. `None` when the object is absent.
    async fn backup(&self, key: &ObjectKey, deadline: Instant) -> Result<Option<Backup>, DocumentError> {
        let content = match timeout_at(deadline, self.store.read(key)).await {
            Ok(Ok(content)) => content,
            Ok(Err(e)) if e.is_not_found() => {
                debug!(key = %key, "object vanished before backup");
                return Ok(None);
            }
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => {
                return Err(DocumentError::Timeout {
                    step: "backing up object",
                });
            }
        };

        let trash = trash_key(&self.options.trash_prefix, key)?;
        match timeout_at(deadline, self.store.save_bytes(&trash, &content)).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => {
                self.discard(&trash).await;
                return Err(DocumentError::Timeout {
                    step: "backing up object",
                });
            }
        }

        debug!(key = %key, trash = %trash, bytes = content.len(), "object backed up");
        Ok(Some(Backup {
            original: key.clone(),
            trash,
            content,
        }))
    }

    /// Write the backed-up content back to its original key. The trash copy
    /// is removed only once the restore succeeded.
    async fn restore(&self, document_id: Uuid, backup: &Backup) {
        match self
            .compensate(self.store.save_bytes(&backup.original, &backup.content))
            .await
        {
            Ok(_) => {
                info!(document_id = %document_id, key = %backup.original, "object restored from backup");
                self.discard(&backup.trash).await;
            }
            Err(e) => error!(
                document_id = %document_id,
                key = %backup.original,
                trash = %backup.trash,
                error = %e,
                "failed to restore object, trash copy kept for manual recovery"
            ),
        }
    }

    async fn roll_back_replace(&self, document_id: Uuid, new_key: &ObjectKey, backup: Option<&Backup>) {
        self.discard(new_key).await;
        if let Some(backup) = backup {
            self.restore(document_id, backup).await;
        }
    }

    async fn finish_replace(&self, document_id: Uuid, old_key: &ObjectKey, backup: Option<&Backup>) {
        if let Err(e) = self.compensate(self.store.delete(old_key)).await {
            warn!(
                document_id = %document_id,
                key = %old_key,
                error = %e,
                "failed to remove superseded object"
            );
        }
        if let Some(backup) = backup {
            self.discard(&backup.trash).await;
        }
    }

    /// Best-effort delete of an object this operation wrote.
    async fn discard(&self, key: &ObjectKey) {
        match self.compensate(self.store.delete(key)).await {
            Ok(()) => debug!(key = %key, "object discarded"),
            Err(e) => warn!(key = %key, error = %e, "failed to discard object, leaving it orphaned"),
        }
    }

    async fn read_back(&self, id: Uuid) -> RowState {
        match timeout(self.options.compensation_timeout, self.repository.find_by_id(id)).await {
            Ok(Ok(record)) => RowState::Present(record),
            Ok(Err(MetadataError::NotFound(_))) => RowState::Absent,
            Ok(Err(e)) => {
                warn!(document_id = %id, error = %e, "could not read back metadata state");
                RowState::Unknown
            }
            Err(_) => {
                warn!(document_id = %id, "timed out reading back metadata state");
                RowState::Unknown
            }
        }
    }

    async fn compensate<T>(
        &self,
        step: impl Future<Output = Result<T, StorageError>>,
    ) -> Result<T, CompensationError> {
        match timeout(self.options.compensation_timeout, step).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(CompensationError::TimedOut(self.options.compensation_timeout)),
        }
    }
}
