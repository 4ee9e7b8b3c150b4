use std::path::PathBuf;

use async_trait::async_trait;
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader};

use super::error::StorageError;
use super::key::ObjectKey;
use super::traits::{BoxReader, ObjectStore};

const TEMP_DIR: &str = ".tmp";

/// Filesystem-backed object store.
///
/// Each key maps to `{root}/{key}`. Writes land in `{root}/.tmp` first and are
/// renamed into place, so readers never observe a half-written object.
pub struct FilesystemObjectStore {
    root: PathBuf,
    base_url: Option<String>,
}

impl FilesystemObjectStore {
    /// Create a new filesystem object store rooted at `root`.
    pub async fn new(root: PathBuf, base_url: Option<String>) -> Result<Self, StorageError> {
        fs::create_dir_all(&root).await?;
        fs::create_dir_all(root.join(TEMP_DIR)).await?;
        Ok(Self {
            root,
            base_url: base_url.map(|u| u.trim_end_matches('/').to_string()),
        })
    }

    /// Compute the filesystem path for a key.
    fn object_path(&self, key: &ObjectKey) -> Result<PathBuf, StorageError> {
        let first = key.as_str().split('/').next().unwrap_or_default();
        if first == TEMP_DIR {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(key.as_str()))
    }

    /// Path for a temporary file during writes.
    fn temp_path(&self) -> PathBuf {
        self.root
            .join(TEMP_DIR)
            .join(uuid::Uuid::new_v4().to_string())
    }
}

#[async_trait]
impl ObjectStore for FilesystemObjectStore {
    async fn save(&self, key: &ObjectKey, mut reader: BoxReader) -> Result<String, StorageError> {
        let object_path = self.object_path(key)?;
        let temp_path = self.temp_path();

        let written = async {
            let mut temp_file = fs::File::create(&temp_path).await?;
            let mut buf = vec![0u8; 64 * 1024]; // 64KB read buffer
            loop {
                let n = reader.read(&mut buf).await?;
                if n == 0 {
                    break;
                }
                temp_file.write_all(&buf[..n]).await?;
            }
            temp_file.flush().await?;
            temp_file.sync_all().await?;
            drop(temp_file);

            if let Some(parent) = object_path.parent() {
                fs::create_dir_all(parent).await?;
            }
            fs::rename(&temp_path, &object_path).await
        }
        .await;

        if let Err(e) = written {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e.into());
        }

        Ok(self.url(key))
    }

    async fn open(&self, key: &ObjectKey) -> Result<BoxReader, StorageError> {
        let object_path = self.object_path(key)?;
        match fs::File::open(&object_path).await {
            Ok(file) => Ok(Box::new(BufReader::new(file))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(key.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, key: &ObjectKey) -> Result<(), StorageError> {
        let object_path = self.object_path(key)?;
        match fs::remove_file(&object_path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn exists(&self, key: &ObjectKey) -> Result<bool, StorageError> {
        let object_path = self.object_path(key)?;
        match fs::metadata(&object_path).await {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn url(&self, key: &ObjectKey) -> String {
        match &self.base_url {
            Some(base) => format!("{base}/{key}"),
            None => format!("file://{}/{key}", self.root.display()),
        }
    }
}
