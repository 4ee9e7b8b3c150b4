mod error;
mod hash;
mod key;
mod traits;

pub mod filesystem;
#[cfg(feature = "object-storage")]
pub mod s3;

use std::path::PathBuf;
use std::sync::Arc;

pub use error::StorageError;
pub use filesystem::FilesystemObjectStore;
pub use hash::ContentDigest;
pub use key::{ObjectKey, sanitize_key};
pub use traits::{BoxReader, ObjectStore};

use crate::config::{StorageAppConfig, StorageBackend};

/// Build the object store selected by `config.backend`.
pub async fn open_object_store(
    config: &StorageAppConfig,
) -> Result<Arc<dyn ObjectStore>, StorageError> {
    match config.backend {
        StorageBackend::Filesystem => {
            let store =
                FilesystemObjectStore::new(PathBuf::from(&config.root), config.base_url.clone())
                    .await?;
            Ok(Arc::new(store))
        }
        #[cfg(feature = "object-storage")]
        StorageBackend::S3 => {
            let store = s3::S3ObjectStore::new(s3::S3Options {
                bucket: config.bucket.clone(),
                region: config.region.clone(),
                endpoint: config.endpoint.clone(),
                path_style: config.path_style,
                access_key: config.access_key.clone(),
                secret_key: config.secret_key.clone(),
                base_url: config.base_url.clone(),
            })?;
            Ok(Arc::new(store))
        }
        #[cfg(not(feature = "object-storage"))]
        StorageBackend::S3 => Err(StorageError::Backend(
            "S3 backend requires the `object-storage` feature".into(),
        )),
    }
}
