//! Deterministic storage keys for uploaded images.
//!
//! A storage key is the lowercase hex SHA-256 digest of the original file
//! name with the name's extension (dot included) appended verbatim. The same
//! original name always maps to the same key, so re-uploads of an identically
//! named file overwrite the previous payload.

use sha2::{Digest, Sha256};

use super::ImageError;

/// Derive the storage key for an uploaded file name.
///
/// The digest covers the name's UTF-8 bytes, not the file content. Names
/// without a `.`, or whose only `.` is the leading character (dotfiles),
/// get no extension appended.
pub fn storage_key(original_name: &str) -> Result<String, ImageError> {
    if original_name.is_empty() {
        return Err(ImageError::EmptyName);
    }

    let extension = match original_name.rfind('.') {
        Some(idx) if idx > 0 => &original_name[idx..],
        _ => "",
    };

    let mut hasher = Sha256::new();
    hasher.update(original_name.as_bytes());
    let digest = hasher.finalize();

    let mut key = String::with_capacity(64 + extension.len());
    for byte in digest {
        key.push_str(&format!("{byte:02x}"));
    }
    key.push_str(extension);

    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deterministic() {
        let a = storage_key("photo.jpg").unwrap();
        let b = storage_key("photo.jpg").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_preserves_extension() {
        let key = storage_key("photo.jpg").unwrap();
        assert!(key.ends_with(".jpg"));
        assert_eq!(key.len(), 64 + ".jpg".len());
    }

    #[test]
    fn test_distinct_names_distinct_keys() {
        assert_ne!(storage_key("a.png").unwrap(), storage_key("b.png").unwrap());
    }

    #[test]
    fn test_digest_is_over_the_name_not_the_extension_alone() {
        // Same extension, different stems: keys must differ in the digest part.
        let a = storage_key("menu.jpg").unwrap();
        let b = storage_key("hero.jpg").unwrap();
        assert_ne!(a[..64], b[..64]);
    }

    #[test]
    fn test_known_vector() {
        // SHA-256 of "photo.jpg" - pins the digest algorithm and hex encoding.
        let key = storage_key("photo.jpg").unwrap();
        assert_eq!(&key[..64], "aff6100bd4df0ea66736e1d3304208069a0f24303e21b43422398c935540a236");
    }

    #[test]
    fn test_no_extension() {
        let key = storage_key("README").unwrap();
        assert_eq!(key.len(), 64);
        assert!(!key.contains('.'));
    }

    #[test]
    fn test_leading_dot_is_not_an_extension() {
        let key = storage_key(".gitignore").unwrap();
        assert_eq!(key.len(), 64);
        assert!(!key.contains('.'));
    }

    #[test]
    fn test_multiple_dots_keep_last_extension() {
        let key = storage_key("archive.tar.gz").unwrap();
        assert!(key.ends_with(".gz"));
        assert!(!key.ends_with(".tar.gz"));
    }

    #[test]
    fn test_empty_name_rejected() {
        assert!(matches!(storage_key(""), Err(ImageError::EmptyName)));
    }
}
