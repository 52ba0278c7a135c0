//! Local filesystem storage for uploaded avatars.
//!
//! The store is a single embedded process; avatars are the only upload the
//! Request Handler accepts (spec §4.5 Titan upload), so this stays a thin
//! filesystem abstraction rather than a pluggable object-storage backend.

use std::path::PathBuf;

use crate::{AppError, AppResult};

/// Local storage configuration.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Base directory avatar files are written under.
    pub base_path: PathBuf,
    /// Base URL avatars are served from.
    pub base_url: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            base_path: PathBuf::from("./data/avatars"),
            base_url: "/avatars".to_string(),
        }
    }
}

/// Metadata about a stored file.
#[derive(Debug, Clone)]
pub struct StoredFile {
    /// Storage key (relative path).
    pub key: String,
    /// Public URL to access the file.
    pub url: String,
    /// File size in bytes.
    pub size: u64,
    /// MIME content type.
    pub content_type: String,
}

/// Local filesystem storage for avatar bytes.
pub struct LocalStorage {
    base_path: PathBuf,
    base_url: String,
}

impl LocalStorage {
    /// Create a new local storage backend rooted at `config.base_path`.
    #[must_use]
    pub fn new(config: StorageConfig) -> Self {
        Self {
            base_path: config.base_path,
            base_url: config.base_url,
        }
    }

    /// Write `data` under `key`, creating parent directories as needed.
    pub async fn put(&self, key: &str, data: &[u8], content_type: &str) -> AppResult<StoredFile> {
        let path = self.base_path.join(key);

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| AppError::Internal(format!("failed to create directory: {e}")))?;
        }

        tokio::fs::write(&path, data)
            .await
            .map_err(|e| AppError::Internal(format!("failed to write file: {e}")))?;

        Ok(StoredFile {
            key: key.to_string(),
            url: self.public_url(key),
            size: data.len() as u64,
            content_type: content_type.to_string(),
        })
    }

    /// Remove the file stored under `key`, if present.
    pub async fn delete(&self, key: &str) -> AppResult<()> {
        let path = self.base_path.join(key);
        if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            tokio::fs::remove_file(&path)
                .await
                .map_err(|e| AppError::Internal(format!("failed to delete file: {e}")))?;
        }
        Ok(())
    }

    /// The public URL a stored key is served from.
    #[must_use]
    pub fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), key)
    }
}

/// Generate a storage key for one actor's avatar. Overwriting the same
/// actor's avatar reuses the same key, so old uploads don't accumulate.
#[must_use]
pub fn avatar_storage_key(actor_id: &str, extension: &str) -> String {
    format!("{actor_id}.{extension}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn avatar_key_is_stable_per_actor() {
        let a = avatar_storage_key("01H8X", "png");
        let b = avatar_storage_key("01H8X", "png");
        assert_eq!(a, b);
        assert_eq!(a, "01H8X.png");
    }
}
