//! Blob access abstraction
//!
//! Every storage backend and every decorator implements [`BlobAccess`], so
//! that callers never need to know how the pipeline beneath them is built.

use crate::digest::{Digest, DigestKeyFormat};
use crate::error::ActionCacheResult;
use async_trait::async_trait;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

/// Set of digests, ordered for deterministic batching and reporting
pub type DigestSet = BTreeSet<Digest>;

/// Abstract blob storage interface
///
/// Implementations must tolerate an unbounded number of concurrent calls.
#[async_trait]
pub trait BlobAccess: Send + Sync {
    /// Fetch the contents of a blob. Absent blobs yield `NotFound`.
    async fn get(&self, digest: &Digest) -> ActionCacheResult<Vec<u8>>;

    /// Store the contents of a blob
    async fn put(&self, digest: &Digest, data: Vec<u8>) -> ActionCacheResult<()>;

    /// Return the subset of `digests` that is not present
    async fn find_missing(&self, digests: &DigestSet) -> ActionCacheResult<DigestSet>;
}

/// A resolved blob access, together with the key format it requires
#[derive(Clone)]
pub struct BlobAccessInfo {
    pub blob_access: Arc<dyn BlobAccess>,
    pub digest_key_format: DigestKeyFormat,
}

impl BlobAccessInfo {
    pub fn new(blob_access: Arc<dyn BlobAccess>, digest_key_format: DigestKeyFormat) -> Self {
        Self {
            blob_access,
            digest_key_format,
        }
    }
}

impl fmt::Debug for BlobAccessInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlobAccessInfo")
            .field("digest_key_format", &self.digest_key_format)
            .finish_non_exhaustive()
    }
}
