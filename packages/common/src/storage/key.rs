use std::fmt;

use super::error::StorageError;

/// A sanitized, path-like object key.
///
/// Construction goes through [`ObjectKey::parse`], so every store operation
/// receives a key that is non-empty, relative and free of traversal segments.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct ObjectKey(String);

impl ObjectKey {
    pub fn parse(raw: &str) -> Result<Self, StorageError> {
        sanitize_key(raw)
            .map(Self)
            .ok_or_else(|| StorageError::InvalidKey(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Last path segment of the key.
    pub fn file_name(&self) -> &str {
        match self.0.rfind('/') {
            Some(pos) => &self.0[pos + 1..],
            None => &self.0,
        }
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectKey({})", self.0)
    }
}

impl AsRef<str> for ObjectKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Normalize a raw key into its canonical form.
///
/// Backslashes become `/`, leading slashes and surrounding whitespace are
/// dropped and the path is lexically cleaned. Returns `None` when nothing is
/// left, when `..` would climb above the root, or when the key carries control
/// characters.
pub fn sanitize_key(raw: &str) -> Option<String> {
    let normalized = raw.trim().replace('\\', "/");
    if normalized.chars().any(|c| c.is_control()) {
        return None;
    }

    let mut segments: Vec<&str> = Vec::new();
    for segment in normalized.trim_start_matches('/').split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop()?;
            }
            other => segments.push(other),
        }
    }

    if segments.is_empty() {
        return None;
    }
    Some(segments.join("/"))
}
