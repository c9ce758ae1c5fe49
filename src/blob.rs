//! Opaque blob store the pipeline reads raw source bytes from.
//!
//! The storage mechanism itself is an external concern; the pipeline only
//! holds a reference string per document. [`FsBlobStore`] is the default
//! filesystem-backed implementation; tests use [`MemoryBlobStore`].

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::RwLock;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::StoreError;

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store bytes, returning an opaque reference.
    async fn put(&self, bytes: &[u8]) -> Result<String, StoreError>;

    /// Read back the bytes for a reference.
    async fn fetch(&self, reference: &str) -> Result<Vec<u8>, StoreError>;

    /// Drop the bytes for a reference. Removing an unknown reference is not
    /// an error.
    async fn remove(&self, reference: &str) -> Result<(), StoreError>;
}

/// Blob store writing one file per reference under a configured directory.
pub struct FsBlobStore {
    dir: PathBuf,
}

impl FsBlobStore {
    pub fn new(dir: PathBuf) -> Result<Self, StoreError> {
        std::fs::create_dir_all(&dir)
            .map_err(|e| StoreError::Blob(format!("create {}: {e}", dir.display())))?;
        Ok(Self { dir })
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn put(&self, bytes: &[u8]) -> Result<String, StoreError> {
        let reference = Uuid::new_v4().to_string();
        let path = self.dir.join(&reference);
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| StoreError::Blob(format!("write {}: {e}", path.display())))?;
        Ok(reference)
    }

    async fn fetch(&self, reference: &str) -> Result<Vec<u8>, StoreError> {
        let path = self.dir.join(reference);
        tokio::fs::read(&path)
            .await
            .map_err(|e| StoreError::Blob(format!("read {}: {e}", path.display())))
    }

    async fn remove(&self, reference: &str) -> Result<(), StoreError> {
        let path = self.dir.join(reference);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::Blob(format!("remove {}: {e}", path.display()))),
        }
    }
}

/// In-memory blob store for tests.
#[derive(Default)]
pub struct MemoryBlobStore {
    blobs: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, bytes: &[u8]) -> Result<String, StoreError> {
        let reference = Uuid::new_v4().to_string();
        self.blobs
            .write()
            .unwrap()
            .insert(reference.clone(), bytes.to_vec());
        Ok(reference)
    }

    async fn fetch(&self, reference: &str) -> Result<Vec<u8>, StoreError> {
        self.blobs
            .read()
            .unwrap()
            .get(reference)
            .cloned()
            .ok_or_else(|| StoreError::Blob(format!("unknown blob reference: {reference}")))
    }

    async fn remove(&self, reference: &str) -> Result<(), StoreError> {
        self.blobs.write().unwrap().remove(reference);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fs_blob_roundtrip() {
        let tmp = tempfile::TempDir::new().unwrap();
        let store = FsBlobStore::new(tmp.path().join("blobs")).unwrap();

        let reference = store.put(b"raw bytes").await.unwrap();
        assert_eq!(store.fetch(&reference).await.unwrap(), b"raw bytes");

        store.remove(&reference).await.unwrap();
        assert!(store.fetch(&reference).await.is_err());
        // Removing again is fine.
        store.remove(&reference).await.unwrap();
    }

    #[tokio::test]
    async fn memory_blob_unknown_reference_errors() {
        let store = MemoryBlobStore::new();
        assert!(store.fetch("nope").await.is_err());
    }
}
