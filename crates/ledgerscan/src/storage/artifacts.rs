use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::StorageError;

/// Write-once audit store for rasterized page images, keyed by job id and
/// page number. Retained pages allow diagnostic replay of the OCR input.
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn retain_page(&self, job_id: &str, page: u32, png: &[u8]) -> Result<PathBuf, StorageError> {
        let dir = self.root.join(job_id);
        std::fs::create_dir_all(&dir).map_err(|e| StorageError::CreateDirectory {
            path: dir.clone(),
            source: e,
        })?;

        let path = dir.join(format!("page-{page}.png"));
        let mut file = match std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
        {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                return Err(StorageError::ArtifactExists {
                    job_id: job_id.to_string(),
                    page,
                });
            }
            Err(e) => {
                return Err(StorageError::WriteObject {
                    key: path.display().to_string(),
                    source: e,
                });
            }
        };

        file.write_all(png).map_err(|e| StorageError::WriteObject {
            key: path.display().to_string(),
            source: e,
        })?;

        Ok(path)
    }

    pub fn page_path(&self, job_id: &str, page: u32) -> PathBuf {
        self.root.join(job_id).join(format!("page-{page}.png"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_retain_page_writes_once() {
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::new(dir.path());

        let path = store.retain_page("job-1", 1, b"png bytes").unwrap();
        assert_eq!(path, store.page_path("job-1", 1));
        assert_eq!(std::fs::read(&path).unwrap(), b"png bytes");

        // Second write for the same job/page is rejected, content untouched.
        let err = store.retain_page("job-1", 1, b"other").unwrap_err();
        assert!(matches!(err, StorageError::ArtifactExists { page: 1, .. }));
        assert_eq!(std::fs::read(&path).unwrap(), b"png bytes");
    }

    #[test]
    fn test_pages_keyed_by_job_and_number() {
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::new(dir.path());
        store.retain_page("job-1", 1, b"a").unwrap();
        store.retain_page("job-1", 2, b"b").unwrap();
        store.retain_page("job-2", 1, b"c").unwrap();
        assert_eq!(std::fs::read(store.page_path("job-2", 1)).unwrap(), b"c");
    }
}
