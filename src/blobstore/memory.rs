//! In-process blob storage

use crate::blobstore::blob_access::{BlobAccess, DigestSet};
use crate::digest::{Digest, DigestKeyFormat};
use crate::error::{ActionCacheError, ActionCacheResult};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::trace;

/// Blob storage backed by a map in memory. Contents are lost on exit.
pub struct MemoryBlobAccess {
    key_format: DigestKeyFormat,
    blobs: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryBlobAccess {
    pub fn new(key_format: DigestKeyFormat) -> Self {
        Self {
            key_format,
            blobs: RwLock::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl BlobAccess for MemoryBlobAccess {
    async fn get(&self, digest: &Digest) -> ActionCacheResult<Vec<u8>> {
        let blobs = self.blobs.read().await;
        blobs
            .get(&digest.key(self.key_format))
            .cloned()
            .ok_or_else(|| ActionCacheError::NotFound(format!("Object {} not found", digest)))
    }

    async fn put(&self, digest: &Digest, data: Vec<u8>) -> ActionCacheResult<()> {
        trace!("Storing {} bytes under {}", data.len(), digest);
        self.blobs
            .write()
            .await
            .insert(digest.key(self.key_format), data);
        Ok(())
    }

    async fn find_missing(&self, digests: &DigestSet) -> ActionCacheResult<DigestSet> {
        let blobs = self.blobs.read().await;
        Ok(digests
            .iter()
            .filter(|d| !blobs.contains_key(&d.key(self.key_format)))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Code;

    fn digest(instance: &str) -> Digest {
        Digest::new(instance, "8b1a9953c4611296a827abf8c47804d7", 5).unwrap()
    }

    #[tokio::test]
    async fn get_after_put() {
        let ba = MemoryBlobAccess::new(DigestKeyFormat::WithInstance);
        ba.put(&digest("a"), b"Hello".to_vec()).await.unwrap();
        assert_eq!(ba.get(&digest("a")).await.unwrap(), b"Hello");
        assert!(ba
            .find_missing(&DigestSet::from([digest("a")]))
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn instance_scoping_follows_key_format() {
        let scoped = MemoryBlobAccess::new(DigestKeyFormat::WithInstance);
        scoped.put(&digest("a"), b"Hello".to_vec()).await.unwrap();
        let err = scoped.get(&digest("b")).await.unwrap_err();
        assert_eq!(err.code(), Code::NotFound);

        let shared = MemoryBlobAccess::new(DigestKeyFormat::WithoutInstance);
        shared.put(&digest("a"), b"Hello".to_vec()).await.unwrap();
        assert_eq!(shared.get(&digest("b")).await.unwrap(), b"Hello");
    }

    #[tokio::test]
    async fn find_missing_reports_absent_digests() {
        let ba = MemoryBlobAccess::new(DigestKeyFormat::WithoutInstance);
        let present = digest("");
        let absent = Digest::new("", "e3b0c44298fc1c149afbf4c8996fb924", 0).unwrap();
        ba.put(&present, b"Hello".to_vec()).await.unwrap();

        let missing = ba
            .find_missing(&DigestSet::from([present, absent.clone()]))
            .await
            .unwrap();
        assert_eq!(missing, DigestSet::from([absent]));
    }
}
