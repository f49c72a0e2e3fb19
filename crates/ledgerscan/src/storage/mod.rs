mod artifacts;
mod filesystem;

pub use artifacts::ArtifactStore;
pub use filesystem::FsObjectStorage;

use crate::error::StorageError;

/// Handle to an uploaded object.
#[derive(Debug, Clone)]
pub struct StoredObject {
    pub url: String,
    pub key: String,
    pub size: u64,
}

/// Durable object storage collaborator. The pipeline never assumes storage is
/// reachable; every failure surfaces as a `StorageError` and, from the worker,
/// as a job failure.
pub trait ObjectStorage: Send + Sync {
    fn upload(
        &self,
        bytes: &[u8],
        organization_id: &str,
        folder: &str,
        filename: &str,
    ) -> Result<StoredObject, StorageError>;

    fn download(&self, key: &str) -> Result<Vec<u8>, StorageError>;

    fn delete(&self, key: &str) -> Result<(), StorageError>;
}
