//! Decorator that rejects writes

use crate::blobstore::blob_access::{BlobAccess, DigestSet};
use crate::digest::Digest;
use crate::error::{ActionCacheError, ActionCacheResult};
use async_trait::async_trait;
use std::sync::Arc;

pub struct ReadOnlyBlobAccess {
    base: Arc<dyn BlobAccess>,
}

impl ReadOnlyBlobAccess {
    pub fn new(base: Arc<dyn BlobAccess>) -> Self {
        Self { base }
    }
}

#[async_trait]
impl BlobAccess for ReadOnlyBlobAccess {
    async fn get(&self, digest: &Digest) -> ActionCacheResult<Vec<u8>> {
        self.base.get(digest).await
    }

    async fn put(&self, _digest: &Digest, _data: Vec<u8>) -> ActionCacheResult<()> {
        Err(ActionCacheError::PermissionDenied(
            "This storage backend is read-only".to_string(),
        ))
    }

    async fn find_missing(&self, digests: &DigestSet) -> ActionCacheResult<DigestSet> {
        self.base.find_missing(digests).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blobstore::MemoryBlobAccess;
    use crate::digest::DigestKeyFormat;
    use crate::error::Code;

    #[tokio::test]
    async fn rejects_writes_but_serves_reads() {
        let digest = Digest::new("", "8b1a9953c4611296a827abf8c47804d7", 5).unwrap();
        let memory = Arc::new(MemoryBlobAccess::new(DigestKeyFormat::WithoutInstance));
        memory.put(&digest, b"Hello".to_vec()).await.unwrap();

        let ba = ReadOnlyBlobAccess::new(memory.clone());
        assert_eq!(ba.get(&digest).await.unwrap(), b"Hello");

        let err = ba.put(&digest, b"World".to_vec()).await.unwrap_err();
        assert_eq!(err.code(), Code::PermissionDenied);
        assert_eq!(memory.get(&digest).await.unwrap(), b"Hello");
    }
}
