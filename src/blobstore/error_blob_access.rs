//! Backend that fails every operation with a fixed error

use crate::blobstore::blob_access::{BlobAccess, DigestSet};
use crate::digest::Digest;
use crate::error::{ActionCacheError, ActionCacheResult, Code};
use async_trait::async_trait;

/// Useful for disabling a storage role explicitly, or as a placeholder
/// while another backend is being migrated.
pub struct ErrorBlobAccess {
    code: Code,
    message: String,
}

impl ErrorBlobAccess {
    pub fn new(code: Code, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    fn error(&self) -> ActionCacheError {
        ActionCacheError::with_code(self.code, self.message.clone())
    }
}

#[async_trait]
impl BlobAccess for ErrorBlobAccess {
    async fn get(&self, _digest: &Digest) -> ActionCacheResult<Vec<u8>> {
        Err(self.error())
    }

    async fn put(&self, _digest: &Digest, _data: Vec<u8>) -> ActionCacheResult<()> {
        Err(self.error())
    }

    async fn find_missing(&self, _digests: &DigestSet) -> ActionCacheResult<DigestSet> {
        Err(self.error())
    }
}
