//! Adapter exposing a remote Action Cache client as a blob access

use crate::blobstore::blob_access::{BlobAccess, DigestSet};
use crate::digest::Digest;
use crate::error::{ActionCacheError, ActionCacheResult};
use crate::messages::{self, ActionResult};
use crate::remote::ActionCacheClient;
use async_trait::async_trait;
use std::sync::Arc;

/// Forwards reads and writes to a remote Action Cache. Messages in both
/// directions are bounded by the maximum message size.
pub struct RemoteActionCacheBlobAccess {
    client: Arc<dyn ActionCacheClient>,
    maximum_message_size_bytes: usize,
}

impl RemoteActionCacheBlobAccess {
    pub fn new(client: Arc<dyn ActionCacheClient>, maximum_message_size_bytes: usize) -> Self {
        Self {
            client,
            maximum_message_size_bytes,
        }
    }
}

#[async_trait]
impl BlobAccess for RemoteActionCacheBlobAccess {
    async fn get(&self, digest: &Digest) -> ActionCacheResult<Vec<u8>> {
        let action_result = self.client.get_action_result(digest).await?;
        messages::encode(&action_result, self.maximum_message_size_bytes)
    }

    async fn put(&self, digest: &Digest, data: Vec<u8>) -> ActionCacheResult<()> {
        let action_result: ActionResult = messages::decode(&data, self.maximum_message_size_bytes)?;
        self.client
            .update_action_result(digest, &action_result)
            .await
    }

    async fn find_missing(&self, _digests: &DigestSet) -> ActionCacheResult<DigestSet> {
        Err(ActionCacheError::Unimplemented(format!(
            "Action Cache at {} does not support bulk existence checking",
            self.client.target()
        )))
    }
}
