use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::StorageError;
use crate::storage::{ObjectStorage, StoredObject};

/// Filesystem-backed object storage. Keys are relative paths under the root
/// directory, scoped by organization: `{org}/{folder}/{uuid}_{filename}`.
pub struct FsObjectStorage {
    root: PathBuf,
}

impl FsObjectStorage {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn ensure_directory(&self, path: &Path) -> Result<(), StorageError> {
        std::fs::create_dir_all(path).map_err(|e| StorageError::CreateDirectory {
            path: path.to_path_buf(),
            source: e,
        })
    }
}

impl ObjectStorage for FsObjectStorage {
    fn upload(
        &self,
        bytes: &[u8],
        organization_id: &str,
        folder: &str,
        filename: &str,
    ) -> Result<StoredObject, StorageError> {
        let safe_name = sanitize_filename(filename);
        let key = format!(
            "{}/{}/{}_{}",
            organization_id,
            folder,
            uuid::Uuid::new_v4(),
            safe_name
        );
        let path = self.root.join(&key);

        if let Some(parent) = path.parent() {
            self.ensure_directory(parent)?;
        }

        // create_new: keys embed a uuid, so a collision means a logic error
        // rather than a caller race worth resolving.
        let mut file = std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|e| StorageError::WriteObject {
                key: key.clone(),
                source: e,
            })?;
        file.write_all(bytes).map_err(|e| StorageError::WriteObject {
            key: key.clone(),
            source: e,
        })?;

        log::debug!("Stored object '{}' ({} bytes)", key, bytes.len());

        Ok(StoredObject {
            url: format!("file://{}", path.display()),
            key,
            size: bytes.len() as u64,
        })
    }

    fn download(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.root.join(key);
        if !path.exists() {
            return Err(StorageError::NotFound(key.to_string()));
        }
        std::fs::read(&path).map_err(|e| StorageError::ReadObject {
            key: key.to_string(),
            source: e,
        })
    }

    fn delete(&self, key: &str) -> Result<(), StorageError> {
        let path = self.root.join(key);
        if !path.exists() {
            return Err(StorageError::NotFound(key.to_string()));
        }
        std::fs::remove_file(&path).map_err(|e| StorageError::WriteObject {
            key: key.to_string(),
            source: e,
        })
    }
}

/// Keeps keys path-safe: strips separators and control characters.
fn sanitize_filename(filename: &str) -> String {
    let cleaned: String = filename
        .chars()
        .map(|c| {
            if c == '/' || c == '\\' || c.is_control() {
                '_'
            } else {
                c
            }
        })
        .collect();
    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_upload_download_delete_round_trip() {
        let dir = TempDir::new().unwrap();
        let storage = FsObjectStorage::new(dir.path());

        let stored = storage
            .upload(b"receipt bytes", "org-1", "receipts", "scan.png")
            .unwrap();
        assert!(stored.key.starts_with("org-1/receipts/"));
        assert!(stored.key.ends_with("_scan.png"));
        assert_eq!(stored.size, 13);
        assert!(stored.url.starts_with("file://"));

        let bytes = storage.download(&stored.key).unwrap();
        assert_eq!(bytes, b"receipt bytes");

        storage.delete(&stored.key).unwrap();
        assert!(matches!(
            storage.download(&stored.key),
            Err(StorageError::NotFound(_))
        ));
    }

    #[test]
    fn test_download_missing_key() {
        let dir = TempDir::new().unwrap();
        let storage = FsObjectStorage::new(dir.path());
        assert!(matches!(
            storage.download("org-1/receipts/missing.png"),
            Err(StorageError::NotFound(_))
        ));
    }

    #[test]
    fn test_filename_sanitized() {
        let dir = TempDir::new().unwrap();
        let storage = FsObjectStorage::new(dir.path());
        let stored = storage
            .upload(b"x", "org-1", "receipts", "../../etc/passwd")
            .unwrap();
        assert!(!stored.key.contains(".."), "key: {}", stored.key);
        assert!(storage.download(&stored.key).is_ok());
    }

    #[test]
    fn test_keys_are_unique_per_upload() {
        let dir = TempDir::new().unwrap();
        let storage = FsObjectStorage::new(dir.path());
        let a = storage.upload(b"a", "org-1", "receipts", "same.pdf").unwrap();
        let b = storage.upload(b"b", "org-1", "receipts", "same.pdf").unwrap();
        assert_ne!(a.key, b.key);
    }
}
