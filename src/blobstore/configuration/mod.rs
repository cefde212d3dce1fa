//! Construction of blob access pipelines from configuration
//!
//! A configuration tree is resolved once at startup. Each node yields a
//! [`BlobAccessInfo`] plus a backend label; decorators recurse into their
//! nested nodes and combine digest key format requirements on the way up.

mod ac;
mod cas;
mod common;
mod creator;

pub use ac::{new_ac_blob_access_from_configuration, AcBlobAccessCreator};
pub use cas::{new_cas_blob_access_from_configuration, CasBlobAccessCreator};
pub use common::new_common_blob_access;
pub use creator::{new_labelled_blob_access, new_nested_blob_access, BlobAccessCreator};

use crate::blobstore::blob_access::BlobAccessInfo;
use crate::config::Config;
use crate::error::{ActionCacheResult, ResultExt};
use crate::remote::ClientFactory;
use std::sync::Arc;
use tracing::info;

/// Storage pipelines of a process, built from its configuration
#[derive(Debug, Clone)]
pub struct Storage {
    pub content_addressable_storage: BlobAccessInfo,
    pub content_addressable_storage_backend: &'static str,
    pub action_cache: BlobAccessInfo,
    pub action_cache_backend: &'static str,
}

/// Build the Content Addressable Storage, then the Action Cache on top of it.
/// Any failure aborts construction of both.
pub fn build_storage(
    config: &Config,
    client_factory: Arc<dyn ClientFactory>,
) -> ActionCacheResult<Storage> {
    let (content_addressable_storage, content_addressable_storage_backend) =
        new_cas_blob_access_from_configuration(&config.content_addressable_storage)
            .context("Failed to create Content Addressable Storage")?;
    let (action_cache, action_cache_backend) = new_ac_blob_access_from_configuration(
        &config.action_cache,
        content_addressable_storage.clone(),
        client_factory,
        config.maximum_message_size_bytes,
    )
    .context("Failed to create Action Cache")?;

    info!(
        cas_backend = content_addressable_storage_backend,
        ac_backend = action_cache_backend,
        ac_digest_key_format = %action_cache.digest_key_format,
        "Storage configured"
    );
    Ok(Storage {
        content_addressable_storage,
        content_addressable_storage_backend,
        action_cache,
        action_cache_backend,
    })
}
