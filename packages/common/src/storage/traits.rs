use std::io::Cursor;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt};

use super::error::StorageError;
use super::key::ObjectKey;

/// Type alias for a boxed async reader.
pub type BoxReader = Box<dyn AsyncRead + Unpin + Send>;

/// Key-addressed object storage.
///
/// This is the whole contract the document layer relies on; adapters must not
/// expose anything beyond it.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store the reader's content under `key`, replacing any existing object,
    /// and return the object's URL.
    async fn save(&self, key: &ObjectKey, reader: BoxReader) -> Result<String, StorageError>;

    /// Store bytes under `key` and return the object's URL.
    async fn save_bytes(&self, key: &ObjectKey, data: &[u8]) -> Result<String, StorageError> {
        let reader: BoxReader = Box::new(Cursor::new(data.to_vec()));
        self.save(key, reader).await
    }

    /// Open the object as a streaming reader. Fails with `NotFound` when absent.
    async fn open(&self, key: &ObjectKey) -> Result<BoxReader, StorageError>;

    /// Read the whole object into memory.
    async fn read(&self, key: &ObjectKey) -> Result<Vec<u8>, StorageError> {
        let mut reader = self.open(key).await?;
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf).await?;
        Ok(buf)
    }

    /// Delete the object. Deleting an absent key succeeds.
    async fn delete(&self, key: &ObjectKey) -> Result<(), StorageError>;

    /// Check whether an object exists. Errors only on infrastructure failure.
    async fn exists(&self, key: &ObjectKey) -> Result<bool, StorageError>;

    /// Deterministic locator for the key. Performs no I/O.
    fn url(&self, key: &ObjectKey) -> String;
}
