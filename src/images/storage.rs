//! Storage backends for image payloads.
//!
//! A deployment picks exactly one backend at startup; payloads are never
//! split across backends. Both implementations overwrite on store, so a
//! storage key always maps to at most one payload.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use sqlx::PgPool;
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use url::Url;

use super::{ImageError, Result};
use crate::config::ImageStorageBackend;

/// Trait for image storage backends
#[async_trait]
pub trait ImageStorage: Send + Sync {
    /// Persist a payload under the given storage key, overwriting any
    /// previous payload with the same key
    async fn store(&self, storage_key: &str, payload: &[u8]) -> Result<()>;

    /// Retrieve the payload stored under a key
    async fn retrieve(&self, storage_key: &str) -> Result<Vec<u8>>;

    /// Remove the payload stored under a key, if any
    async fn delete(&self, storage_key: &str) -> Result<()>;

    /// Check whether a payload exists under a key
    async fn exists(&self, storage_key: &str) -> Result<bool>;

    /// The externally resolvable reference for a stored payload
    fn locator(&self, storage_key: &str) -> String;
}

// ============================================================================
// Filesystem Storage Implementation
// ============================================================================

/// Filesystem storage backend - one file per storage key under a base
/// directory, addressed publicly through a base URL prefix.
pub struct FilesystemImageStorage {
    base_path: PathBuf,
    public_base_url: Url,
}

impl FilesystemImageStorage {
    pub fn new(base_path: PathBuf, public_base_url: Url) -> Self {
        Self {
            base_path,
            public_base_url,
        }
    }
}

#[async_trait]
impl ImageStorage for FilesystemImageStorage {
    async fn store(&self, storage_key: &str, payload: &[u8]) -> Result<()> {
        // Idempotent - the directory may already exist or have been removed
        // out from under us between startup and now.
        fs::create_dir_all(&self.base_path).await?;

        let full_path = self.base_path.join(storage_key);
        let mut file = fs::File::create(&full_path).await?;
        file.write_all(payload).await?;
        file.sync_all().await?;

        Ok(())
    }

    async fn retrieve(&self, storage_key: &str) -> Result<Vec<u8>> {
        let full_path = self.base_path.join(storage_key);

        if !full_path.exists() {
            return Err(ImageError::NotFound(storage_key.to_string()));
        }

        let mut file = fs::File::open(&full_path).await?;
        let mut payload = Vec::new();
        file.read_to_end(&mut payload).await?;

        Ok(payload)
    }

    async fn delete(&self, storage_key: &str) -> Result<()> {
        let full_path = self.base_path.join(storage_key);

        if full_path.exists() {
            fs::remove_file(&full_path).await?;
        }

        Ok(())
    }

    async fn exists(&self, storage_key: &str) -> Result<bool> {
        Ok(self.base_path.join(storage_key).exists())
    }

    fn locator(&self, storage_key: &str) -> String {
        let base = self.public_base_url.as_str();
        if base.ends_with('/') {
            format!("{base}{storage_key}")
        } else {
            format!("{base}/{storage_key}")
        }
    }
}

// ============================================================================
// Database Storage Implementation
// ============================================================================

/// Database storage backend - payloads live in the `product_images` table
/// as plain byte columns. The locator is the bare storage key, which the
/// image endpoint resolves by lookup.
pub struct DatabaseImageStorage {
    pool: PgPool,
}

impl DatabaseImageStorage {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ImageStorage for DatabaseImageStorage {
    async fn store(&self, storage_key: &str, payload: &[u8]) -> Result<()> {
        sqlx::query(
            "INSERT INTO product_images (storage_key, data) VALUES ($1, $2)
             ON CONFLICT (storage_key) DO UPDATE SET data = EXCLUDED.data",
        )
        .bind(storage_key)
        .bind(payload)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn retrieve(&self, storage_key: &str) -> Result<Vec<u8>> {
        let payload: Option<Vec<u8>> = sqlx::query_scalar("SELECT data FROM product_images WHERE storage_key = $1")
            .bind(storage_key)
            .fetch_optional(&self.pool)
            .await?;

        payload.ok_or_else(|| ImageError::NotFound(storage_key.to_string()))
    }

    async fn delete(&self, storage_key: &str) -> Result<()> {
        sqlx::query("DELETE FROM product_images WHERE storage_key = $1")
            .bind(storage_key)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn exists(&self, storage_key: &str) -> Result<bool> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM product_images WHERE storage_key = $1)")
            .bind(storage_key)
            .fetch_one(&self.pool)
            .await?;

        Ok(exists)
    }

    fn locator(&self, storage_key: &str) -> String {
        storage_key.to_string()
    }
}

// ============================================================================
// Factory
// ============================================================================

/// Create an image storage backend based on configuration
pub async fn create_image_storage(
    backend: &ImageStorageBackend,
    public_base_url: &Url,
    pool: &PgPool,
) -> Result<Arc<dyn ImageStorage>> {
    match backend {
        ImageStorageBackend::Filesystem { path } => {
            tracing::info!("Creating filesystem image storage backend (path: {:?})", path);
            // Ensure the upload directory exists before the first store
            fs::create_dir_all(path).await?;
            Ok(Arc::new(FilesystemImageStorage::new(path.clone(), public_base_url.clone())))
        }
        ImageStorageBackend::Database => {
            tracing::info!("Creating database image storage backend");
            Ok(Arc::new(DatabaseImageStorage::new(pool.clone())))
        }
    }
}
