//! Product image pipeline.
//!
//! Uploads flow through three stages: [`naming`] derives a deterministic
//! storage key from the original file name, [`codec`] optionally deflates
//! the payload, and [`storage`] persists the bytes behind a backend chosen
//! at startup (filesystem directory or database table). The resulting
//! [`StoredImage`] metadata - key, content type, compression flag, and the
//! locator clients use to fetch the bytes back - is embedded on the owning
//! product row.

pub mod codec;
pub mod naming;
pub mod storage;

use thiserror::Error;

use crate::db::errors::DbError;

/// Errors from the image pipeline.
#[derive(Error, Debug)]
pub enum ImageError {
    /// Upload had an empty file name, so no storage key can be derived
    #[error("image file name must not be empty")]
    EmptyName,

    /// No payload stored under the given key
    #[error("no image stored under key {0}")]
    NotFound(String),

    /// Stored payload could not be decompressed
    #[error("corrupt image payload: {0}")]
    Corrupt(String),

    /// Filesystem-level failure while reading or writing a payload
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Database-level failure while reading or writing a payload
    #[error(transparent)]
    Database(#[from] DbError),
}

impl From<sqlx::Error> for ImageError {
    fn from(err: sqlx::Error) -> Self {
        ImageError::Database(DbError::from(err))
    }
}

/// Type alias for image pipeline results
pub type Result<T> = std::result::Result<T, ImageError>;

/// Metadata for a stored image, embedded by value on the owning product.
///
/// The payload bytes themselves live in the storage backend under
/// `storage_key`; this struct carries everything needed to find and decode
/// them again.
#[derive(Debug, Clone)]
pub struct StoredImage {
    /// Deterministic key derived from the original file name
    pub storage_key: String,
    /// MIME type declared by the upload
    pub content_type: String,
    /// Whether the stored payload is deflate-compressed
    pub compressed: bool,
    /// Externally resolvable reference clients use to retrieve the bytes
    pub locator: String,
}

/// An upload ready for ingestion: original name, declared content type, and
/// the raw payload.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub original_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Prepare an upload for storage: derive the storage key, apply the
/// store-wide compression policy, and resolve the locator.
///
/// Returns the metadata to record on the owning product and the payload
/// bytes to hand to the backend. Pure apart from the locator lookup.
pub fn prepare(upload: ImageUpload, compress: bool, backend: &dyn storage::ImageStorage) -> Result<(StoredImage, Vec<u8>)> {
    let storage_key = naming::storage_key(&upload.original_name)?;

    let payload = if compress {
        codec::compress(&upload.bytes)?
    } else {
        upload.bytes
    };

    let image = StoredImage {
        locator: backend.locator(&storage_key),
        storage_key,
        content_type: upload.content_type,
        compressed: compress,
    };

    Ok((image, payload))
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn filesystem_backend(dir: &std::path::Path) -> storage::FilesystemImageStorage {
        storage::FilesystemImageStorage::new(
            dir.to_path_buf(),
            Url::parse("http://localhost:2000/api/v1/images/").unwrap(),
        )
    }

    #[test]
    fn test_prepare_uncompressed_passes_bytes_through() {
        let dir = tempfile::tempdir().unwrap();
        let backend = filesystem_backend(dir.path());

        let upload = ImageUpload {
            original_name: "photo.jpg".to_string(),
            content_type: "image/jpeg".to_string(),
            bytes: b"raw image bytes".to_vec(),
        };

        let (image, payload) = prepare(upload, false, &backend).unwrap();
        assert_eq!(payload, b"raw image bytes");
        assert!(!image.compressed);
        assert!(image.storage_key.ends_with(".jpg"));
        assert_eq!(image.locator, format!("http://localhost:2000/api/v1/images/{}", image.storage_key));
    }

    #[test]
    fn test_prepare_compressed_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let backend = filesystem_backend(dir.path());

        let bytes = b"image bytes that will be deflated".repeat(32);
        let upload = ImageUpload {
            original_name: "photo.jpg".to_string(),
            content_type: "image/jpeg".to_string(),
            bytes: bytes.clone(),
        };

        let (image, payload) = prepare(upload, true, &backend).unwrap();
        assert!(image.compressed);
        assert_ne!(payload, bytes);
        assert_eq!(codec::decompress(&payload).unwrap(), bytes);
    }

    #[test]
    fn test_prepare_rejects_empty_name() {
        let dir = tempfile::tempdir().unwrap();
        let backend = filesystem_backend(dir.path());

        let upload = ImageUpload {
            original_name: String::new(),
            content_type: "image/png".to_string(),
            bytes: vec![1, 2, 3],
        };

        assert!(matches!(prepare(upload, false, &backend), Err(ImageError::EmptyName)));
    }
}
