// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Image object storage.

use crate::error::{AppError, Result};
use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};

/// Largest accepted upload (10 MB).
pub const MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;

/// Accepted MIME types and the extension each is stored under.
const IMAGE_TYPES: [(&str, &str); 4] = [
    ("image/jpeg", "jpg"),
    ("image/jpg", "jpg"),
    ("image/png", "png"),
    ("image/webp", "webp"),
];

/// Check an upload against the size and type limits. Returns the file
/// extension to store it under.
pub fn validate_image(content_type: &str, len: usize) -> Result<&'static str> {
    if len == 0 {
        return Err(AppError::BadRequest("image is empty".to_string()));
    }
    if len > MAX_IMAGE_BYTES {
        return Err(AppError::BadRequest(
            "image is too large. Maximum size is 10MB.".to_string(),
        ));
    }

    let mime = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    IMAGE_TYPES
        .iter()
        .find(|(t, _)| *t == mime)
        .map(|(_, ext)| *ext)
        .ok_or_else(|| {
            AppError::BadRequest(format!(
                "unsupported image type '{}'. Use JPEG, PNG, or WebP.",
                content_type
            ))
        })
}

/// Object key for a new upload: `{user_id}/{millis}-{random}.{ext}`.
pub fn object_path(user_id: &str, millis: i64, random: &str, ext: &str) -> String {
    format!("{}/{}-{}.{}", user_id, millis, random, ext)
}

/// Blob store for uploaded images.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Store `bytes` at `path` and return its public URL.
    async fn upload(&self, path: &str, bytes: &[u8]) -> Result<String>;

    async fn delete(&self, path: &str) -> Result<()>;
}

/// Stores objects as files under a root directory.
#[derive(Debug, Clone)]
pub struct LocalObjectStorage {
    root: PathBuf,
    public_base_url: String,
}

impl LocalObjectStorage {
    pub fn new(root: impl Into<PathBuf>, public_base_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Resolve `path` under the root, refusing anything that could escape it.
    fn resolve(&self, path: &str) -> Result<PathBuf> {
        let relative = Path::new(path);
        let clean = !path.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !clean {
            return Err(AppError::BadRequest(format!("invalid object path '{}'", path)));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl ObjectStorage for LocalObjectStorage {
    async fn upload(&self, path: &str, bytes: &[u8]) -> Result<String> {
        let target = self.resolve(path)?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| AppError::Internal(anyhow::anyhow!("create {}: {}", parent.display(), e)))?;
        }
        tokio::fs::write(&target, bytes)
            .await
            .map_err(|e| AppError::Internal(anyhow::anyhow!("write {}: {}", target.display(), e)))?;

        tracing::debug!(path, bytes = bytes.len(), "Image stored");
        Ok(format!("{}/{}", self.public_base_url, path))
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let target = self.resolve(path)?;
        match tokio::fs::remove_file(&target).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(AppError::NotFound(format!("image {}", path)))
            }
            Err(e) => Err(AppError::Internal(anyhow::anyhow!(
                "remove {}: {}",
                target.display(),
                e
            ))),
        }
    }
}

/// A stored upload.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct StoredImage {
    pub path: String,
    pub url: String,
}

/// Validate and store an image uploaded by `user_id`.
pub async fn store_image(
    storage: &dyn ObjectStorage,
    user_id: &str,
    content_type: &str,
    bytes: &[u8],
) -> Result<StoredImage> {
    let ext = validate_image(content_type, bytes.len())?;
    let random = uuid::Uuid::new_v4().simple().to_string();
    let path = object_path(
        user_id,
        chrono::Utc::now().timestamp_millis(),
        &random[..8],
        ext,
    );
    let url = storage.upload(&path, bytes).await?;
    Ok(StoredImage { path, url })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_image_types() {
        assert_eq!(validate_image("image/png", 10).unwrap(), "png");
        assert_eq!(validate_image("image/jpg", 10).unwrap(), "jpg");
        assert_eq!(validate_image("Image/WEBP; q=1", 10).unwrap(), "webp");
        assert!(validate_image("image/gif", 10).is_err());
        assert!(validate_image("application/pdf", 10).is_err());
    }

    #[test]
    fn test_validate_image_size() {
        assert!(validate_image("image/jpeg", MAX_IMAGE_BYTES).is_ok());
        assert!(validate_image("image/jpeg", MAX_IMAGE_BYTES + 1).is_err());
        assert!(validate_image("image/jpeg", 0).is_err());
    }

    #[test]
    fn test_object_path_layout() {
        assert_eq!(
            object_path("user-1", 1700000000000, "ab12cd34", "png"),
            "user-1/1700000000000-ab12cd34.png"
        );
    }

    #[tokio::test]
    async fn test_local_storage_round_trip() {
        let root = std::env::temp_dir().join(format!("dc-storage-{}", uuid::Uuid::new_v4()));
        let storage = LocalObjectStorage::new(&root, "http://cdn.local/images/");

        let stored = store_image(&storage, "u1", "image/jpeg", b"\xff\xd8\xff")
            .await
            .unwrap();
        assert!(stored.path.starts_with("u1/"));
        assert!(stored.path.ends_with(".jpg"));
        assert_eq!(stored.url, format!("http://cdn.local/images/{}", stored.path));
        assert_eq!(
            tokio::fs::read(root.join(&stored.path)).await.unwrap(),
            b"\xff\xd8\xff"
        );

        storage.delete(&stored.path).await.unwrap();
        assert!(matches!(
            storage.delete(&stored.path).await,
            Err(AppError::NotFound(_))
        ));

        let _ = tokio::fs::remove_dir_all(&root).await;
    }

    #[tokio::test]
    async fn test_local_storage_rejects_escaping_paths() {
        let storage = LocalObjectStorage::new(std::env::temp_dir(), "http://x");
        assert!(storage.upload("../etc/passwd", b"x").await.is_err());
        assert!(storage.upload("/abs/path.png", b"x").await.is_err());
    }
}
