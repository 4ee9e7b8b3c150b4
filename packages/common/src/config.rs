use serde::Deserialize;

/// Which object-store adapter backs document content.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Blobs live below a local directory.
    #[default]
    Filesystem,
    /// S3-compatible bucket (AWS, MinIO, Wasabi). Requires the `object-storage` feature.
    S3,
}

/// App-level object storage configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct StorageAppConfig {
    /// Adapter to use. Default: filesystem.
    #[serde(default)]
    pub backend: StorageBackend,
    /// Root directory for the filesystem backend. Default: "./data/documents".
    #[serde(default = "default_storage_root")]
    pub root: String,
    /// Public base URL used to build document links. When unset the adapter
    /// falls back to its own scheme (`file://` or `s3://`).
    #[serde(default)]
    pub base_url: Option<String>,
    /// Bucket name (S3 only).
    #[serde(default)]
    pub bucket: String,
    /// Region (S3 only). Default: "us-east-1".
    #[serde(default = "default_storage_region")]
    pub region: String,
    /// Custom endpoint for S3-compatible services (S3 only).
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Path-style addressing, needed by MinIO. Default: false.
    #[serde(default)]
    pub path_style: bool,
    #[serde(default)]
    pub access_key: Option<String>,
    #[serde(default)]
    pub secret_key: Option<String>,
    /// Prefix under which temporary backup copies are written. Default: "trash".
    #[serde(default = "default_trash_prefix")]
    pub trash_prefix: String,
}

fn default_storage_root() -> String {
    "./data/documents".into()
}
fn default_storage_region() -> String {
    "us-east-1".into()
}
fn default_trash_prefix() -> String {
    "trash".into()
}

impl Default for StorageAppConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            root: default_storage_root(),
            base_url: None,
            bucket: String::new(),
            region: default_storage_region(),
            endpoint: None,
            path_style: false,
            access_key: None,
            secret_key: None,
            trash_prefix: default_trash_prefix(),
        }
    }
}
