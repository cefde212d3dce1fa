//! Decorator that emits tracing events for every operation
//!
//! Applied to every resolved configuration node, labelled with the storage
//! type ("ac", "cas") and the backend type returned by the creator.

use crate::blobstore::blob_access::{BlobAccess, DigestSet};
use crate::digest::Digest;
use crate::error::ActionCacheResult;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, trace};

pub struct InstrumentedBlobAccess {
    base: Arc<dyn BlobAccess>,
    storage_type: &'static str,
    backend_type: &'static str,
}

impl InstrumentedBlobAccess {
    pub fn new(
        base: Arc<dyn BlobAccess>,
        storage_type: &'static str,
        backend_type: &'static str,
    ) -> Self {
        Self {
            base,
            storage_type,
            backend_type,
        }
    }

    fn record<T>(&self, operation: &'static str, started: Instant, result: &ActionCacheResult<T>) {
        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
        match result {
            Ok(_) => trace!(
                storage_type = self.storage_type,
                backend_type = self.backend_type,
                operation,
                elapsed_ms,
                "Blob access succeeded"
            ),
            Err(e) => debug!(
                storage_type = self.storage_type,
                backend_type = self.backend_type,
                operation,
                elapsed_ms,
                code = %e.code(),
                "Blob access failed: {}",
                e
            ),
        }
    }
}

#[async_trait]
impl BlobAccess for InstrumentedBlobAccess {
    async fn get(&self, digest: &Digest) -> ActionCacheResult<Vec<u8>> {
        let started = Instant::now();
        let result = self.base.get(digest).await;
        self.record("get", started, &result);
        result
    }

    async fn put(&self, digest: &Digest, data: Vec<u8>) -> ActionCacheResult<()> {
        let started = Instant::now();
        let result = self.base.put(digest, data).await;
        self.record("put", started, &result);
        result
    }

    async fn find_missing(&self, digests: &DigestSet) -> ActionCacheResult<DigestSet> {
        let started = Instant::now();
        let result = self.base.find_missing(digests).await;
        self.record("find_missing", started, &result);
        result
    }
}
