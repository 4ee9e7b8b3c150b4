use std::collections::HashSet;

use common::storage::ContentDigest;

use super::error::ValidationError;
use super::keys::sanitize_filename;
use super::model::KNOWN_EXTENSIONS;
use crate::config::DocumentConfig;
use crate::utils::filename::{split_extension, validate_flat_filename};

/// Limits applied to uploaded content before anything is written.
#[derive(Debug, Clone)]
pub struct UploadPolicy {
    max_size: usize,
    /// Lowercase, with the leading dot.
    allowed_extensions: HashSet<String>,
    allowed_content_types: HashSet<String>,
}

/// An upload that passed [`UploadPolicy::check`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckedFile {
    /// Trimmed name as supplied by the caller; used for key derivation.
    pub original_name: String,
    /// Sanitized name stored on the record.
    pub file_name: String,
    /// Lowercase, without the dot.
    pub extension: String,
    pub content_type: &'static str,
    pub size: usize,
    pub digest: ContentDigest,
}

impl UploadPolicy {
    pub fn new<E, T>(max_size: usize, extensions: E, content_types: T) -> Self
    where
        E: IntoIterator,
        E::Item: AsRef<str>,
        T: IntoIterator,
        T::Item: AsRef<str>,
    {
        Self {
            max_size,
            allowed_extensions: extensions
                .into_iter()
                .map(|e| {
                    let e = e.as_ref().trim().to_ascii_lowercase();
                    if e.starts_with('.') { e } else { format!(".{e}") }
                })
                .collect(),
            allowed_content_types: content_types
                .into_iter()
                .map(|t| t.as_ref().trim().to_ascii_lowercase())
                .collect(),
        }
    }

    pub fn from_config(config: &DocumentConfig) -> Self {
        Self::new(
            config.max_upload_size,
            &config.allowed_extensions,
            &config.allowed_content_types,
        )
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Validate a filename and its content.
    pub fn check(&self, file_name: &str, content: &[u8]) -> Result<CheckedFile, ValidationError> {
        let name = validate_flat_filename(file_name)?;

        if content.is_empty() {
            return Err(ValidationError::EmptyFile);
        }
        if content.len() > self.max_size {
            return Err(ValidationError::TooLarge {
                size: content.len(),
                max: self.max_size,
            });
        }

        let (_, ext) = split_extension(name);
        let bare = ext.trim_start_matches('.');
        if !self.allowed_extensions.contains(&ext) || !KNOWN_EXTENSIONS.contains(&bare) {
            return Err(ValidationError::Extension(ext));
        }

        let content_type = sniff_content_type(content);
        if !self.allowed_content_types.contains(content_type) {
            return Err(ValidationError::ContentType(content_type.to_string()));
        }

        Ok(CheckedFile {
            original_name: name.to_string(),
            file_name: sanitize_filename(name),
            extension: bare.to_string(),
            content_type,
            size: content.len(),
            digest: ContentDigest::compute(content),
        })
    }
}

/// Identify content by its leading magic bytes.
pub fn sniff_content_type(content: &[u8]) -> &'static str {
    const SIGNATURES: &[(&[u8], &str)] = &[
        (b"%PDF-", "application/pdf"),
        (b"\x89PNG\r\n\x1a\n", "image/png"),
        (b"\xFF\xD8\xFF", "image/jpeg"),
        (b"GIF87a", "image/gif"),
        (b"GIF89a", "image/gif"),
        (b"PK\x03\x04", "application/zip"),
        (b"\xD0\xCF\x11\xE0\xA1\xB1\x1A\xE1", "application/msword"),
    ];

    SIGNATURES
        .iter()
        .find(|(magic, _)| content.starts_with(magic))
        .map(|(_, content_type)| *content_type)
        .unwrap_or("application/octet-stream")
}
