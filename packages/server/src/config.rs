use std::time::Duration;

use common::StorageAppConfig;
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct CorsConfig {
    pub allow_origins: Vec<String>,
    pub max_age: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors: CorsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
}

/// Limits and allow-lists applied to uploaded document content.
#[derive(Debug, Deserialize, Clone)]
pub struct DocumentConfig {
    /// Maximum accepted file size in bytes. Default: 2 MiB.
    #[serde(default = "default_max_upload_size")]
    pub max_upload_size: usize,
    /// Accepted file extensions, with leading dot. Default: .pdf .jpg .jpeg .png
    #[serde(default = "default_allowed_extensions")]
    pub allowed_extensions: Vec<String>,
    /// Accepted sniffed content types.
    #[serde(default = "default_allowed_content_types")]
    pub allowed_content_types: Vec<String>,
    /// Deadline for one upload, replace or delete, including lock wait. Default: 5000.
    #[serde(default = "default_operation_timeout_ms")]
    pub operation_timeout_ms: u64,
    /// Grace period for each compensation step. Default: 5000.
    #[serde(default = "default_compensation_timeout_ms")]
    pub compensation_timeout_ms: u64,
}

fn default_max_upload_size() -> usize {
    2 * 1024 * 1024
}
fn default_allowed_extensions() -> Vec<String> {
    [".pdf", ".jpg", ".jpeg", ".png"]
        .into_iter()
        .map(String::from)
        .collect()
}
fn default_allowed_content_types() -> Vec<String> {
    ["application/pdf", "image/jpeg", "image/png"]
        .into_iter()
        .map(String::from)
        .collect()
}
fn default_operation_timeout_ms() -> u64 {
    5000
}
fn default_compensation_timeout_ms() -> u64 {
    5000
}

impl DocumentConfig {
    pub fn operation_timeout(&self) -> Duration {
        Duration::from_millis(self.operation_timeout_ms)
    }

    pub fn compensation_timeout(&self) -> Duration {
        Duration::from_millis(self.compensation_timeout_ms)
    }
}

impl Default for DocumentConfig {
    fn default() -> Self {
        Self {
            max_upload_size: default_max_upload_size(),
            allowed_extensions: default_allowed_extensions(),
            allowed_content_types: default_allowed_content_types(),
            operation_timeout_ms: default_operation_timeout_ms(),
            compensation_timeout_ms: default_compensation_timeout_ms(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub storage: StorageAppConfig,
    #[serde(default)]
    pub documents: DocumentConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let s = Config::builder()
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 3000)?
            .set_default("server.cors.allow_origins", Vec::<String>::new())?
            .set_default("server.cors.max_age", 3600)?
            // Load from config/config.toml
            .add_source(File::with_name("config/config").required(false))
            // Override from environment (e.g., RHAPP__STORAGE__BUCKET)
            .add_source(Environment::with_prefix("RHAPP").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
