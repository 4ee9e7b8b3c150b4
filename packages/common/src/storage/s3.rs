use std::io::Cursor;

use async_trait::async_trait;
use s3::creds::Credentials;
use s3::error::S3Error;
use s3::{Bucket, Region};
use tokio::io::AsyncReadExt;
use tracing::debug;

use super::error::StorageError;
use super::key::ObjectKey;
use super::traits::{BoxReader, ObjectStore};

/// Connection settings for [`S3ObjectStore`].
#[derive(Debug, Clone, Default)]
pub struct S3Options {
    pub bucket: String,
    pub region: String,
    /// Custom endpoint (MinIO, Wasabi). When set, `region` is only a label.
    pub endpoint: Option<String>,
    pub path_style: bool,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    /// Public base URL for links; defaults to `s3://{bucket}`.
    pub base_url: Option<String>,
}

/// Object store backed by an S3-compatible bucket.
pub struct S3ObjectStore {
    bucket: Box<Bucket>,
    base_url: Option<String>,
}

impl S3ObjectStore {
    pub fn new(options: S3Options) -> Result<Self, StorageError> {
        if options.bucket.trim().is_empty() {
            return Err(StorageError::Backend("bucket is required".into()));
        }
        if options.region.trim().is_empty() {
            return Err(StorageError::Backend("region is required".into()));
        }

        let region = match &options.endpoint {
            Some(endpoint) => Region::Custom {
                region: options.region.clone(),
                endpoint: endpoint.trim_end_matches('/').to_string(),
            },
            None => options.region.parse::<Region>().map_err(backend)?,
        };

        let credentials = Credentials::new(
            options.access_key.as_deref(),
            options.secret_key.as_deref(),
            None,
            None,
            None,
        )
        .map_err(backend)?;

        let mut bucket = Bucket::new(&options.bucket, region, credentials).map_err(backend)?;
        if options.path_style {
            bucket = bucket.with_path_style();
        }

        Ok(Self {
            bucket,
            base_url: options
                .base_url
                .map(|u| u.trim_end_matches('/').to_string()),
        })
    }
}

fn backend(err: impl std::fmt::Display) -> StorageError {
    StorageError::Backend(err.to_string())
}

fn is_success(code: u16) -> bool {
    (200..300).contains(&code)
}

/// HTTP status carried by an S3 error, if the request reached the service.
fn error_status(err: &S3Error) -> Option<u16> {
    match err {
        S3Error::HttpFailWithBody(code, _) => Some(*code),
        _ => None,
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn save(&self, key: &ObjectKey, mut reader: BoxReader) -> Result<String, StorageError> {
        let mut data = Vec::new();
        reader.read_to_end(&mut data).await?;

        let response = self
            .bucket
            .put_object(key.as_str(), &data)
            .await
            .map_err(backend)?;
        let code = response.status_code();
        if !is_success(code) {
            return Err(StorageError::Backend(format!("put {key}: HTTP {code}")));
        }

        debug!(key = %key, bytes = data.len(), "object uploaded");
        Ok(self.url(key))
    }

    async fn open(&self, key: &ObjectKey) -> Result<BoxReader, StorageError> {
        let response = match self.bucket.get_object(key.as_str()).await {
            Ok(response) => response,
            Err(e) if error_status(&e) == Some(404) => {
                return Err(StorageError::NotFound(key.to_string()));
            }
            Err(e) => return Err(backend(e)),
        };

        match response.status_code() {
            404 => Err(StorageError::NotFound(key.to_string())),
            code if is_success(code) => Ok(Box::new(Cursor::new(response.bytes().to_vec()))),
            code => Err(StorageError::Backend(format!("get {key}: HTTP {code}"))),
        }
    }

    async fn delete(&self, key: &ObjectKey) -> Result<(), StorageError> {
        let code = match self.bucket.delete_object(key.as_str()).await {
            Ok(response) => response.status_code(),
            Err(e) => error_status(&e).ok_or_else(|| backend(e))?,
        };

        if is_success(code) || code == 404 {
            Ok(())
        } else {
            Err(StorageError::Backend(format!("delete {key}: HTTP {code}")))
        }
    }

    async fn exists(&self, key: &ObjectKey) -> Result<bool, StorageError> {
        let code = match self.bucket.head_object(key.as_str()).await {
            Ok((_, code)) => code,
            Err(e) => error_status(&e).ok_or_else(|| backend(e))?,
        };

        match code {
            404 => Ok(false),
            code if is_success(code) => Ok(true),
            code => Err(StorageError::Backend(format!("head {key}: HTTP {code}"))),
        }
    }

    fn url(&self, key: &ObjectKey) -> String {
        match &self.base_url {
            Some(base) => format!("{base}/{key}"),
            None => format!("s3://{}/{key}", self.bucket.name()),
        }
    }
}
