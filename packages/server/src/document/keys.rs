//! Object-key and lock-key derivation for documents.

use chrono::{DateTime, Utc};
use common::storage::{ObjectKey, StorageError};
use uuid::Uuid;

use super::model::OwnerType;
use crate::utils::filename::split_extension;

const MAX_SANITIZED_LEN: usize = 100;

/// Reduce a filename to `[A-Za-z0-9._-]`, at most 100 characters.
///
/// Spaces and every other character become `_`, `..` collapses to `.`, and an
/// empty result becomes `file`.
pub fn sanitize_filename(name: &str) -> String {
    let name = name.trim().replace(' ', "_").replace("..", ".");
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .take(MAX_SANITIZED_LEN)
        .collect();

    if cleaned.is_empty() {
        "file".to_string()
    } else {
        cleaned
    }
}

/// `{owner type}/{owner id}/{sanitized stem}_{UTC timestamp}{extension}`.
pub fn object_key_for(
    owner_type: OwnerType,
    owner_id: Uuid,
    file_name: &str,
    at: DateTime<Utc>,
) -> Result<ObjectKey, StorageError> {
    let (stem, ext) = split_extension(file_name.trim());
    let base = sanitize_filename(stem);
    let stamp = at.format("%Y%m%dT%H%M%S%3fZ");
    ObjectKey::parse(&format!("{owner_type}/{owner_id}/{base}_{stamp}{ext}"))
}

/// Insert `_{suffix}` before the extension of the key's last segment.
pub fn with_suffix(key: &ObjectKey, suffix: &str) -> Result<ObjectKey, StorageError> {
    let raw = key.as_str();
    let name_start = raw.len() - key.file_name().len();
    let split = match raw[name_start..].rfind('.') {
        Some(pos) if pos > 0 => name_start + pos,
        _ => raw.len(),
    };
    ObjectKey::parse(&format!("{}_{suffix}{}", &raw[..split], &raw[split..]))
}

/// `{prefix}/{random id}_{original file name}`.
pub fn trash_key(prefix: &str, original: &ObjectKey) -> Result<ObjectKey, StorageError> {
    ObjectKey::parse(&format!(
        "{}/{}_{}",
        prefix.trim_matches('/'),
        Uuid::new_v4().simple(),
        original.file_name()
    ))
}

/// Serializes every mutation of one document.
pub fn id_lock_key(id: Uuid) -> String {
    format!("doc:id:{id}")
}

/// Serializes every write that could land on the same object key for one owner.
///
/// Built from the same sanitized stem and extension as [`object_key_for`], lowercased
/// so names differing only in case also contend.
pub fn name_lock_key(owner_type: OwnerType, owner_id: Uuid, file_name: &str) -> String {
    let (stem, ext) = split_extension(file_name.trim());
    format!(
        "doc:name:{owner_type}:{owner_id}:{}{ext}",
        sanitize_filename(stem).to_lowercase()
    )
}
