//! Backends shared by all storage types

use super::creator::{new_nested_blob_access, BlobAccessCreator};
use crate::blobstore::blob_access::BlobAccessInfo;
use crate::blobstore::{ErrorBlobAccess, MemoryBlobAccess, ReadOnlyBlobAccess};
use crate::config::schema::BlobAccessConfiguration;
use crate::digest::DigestKeyFormat;
use crate::error::{ActionCacheError, ActionCacheResult, ResultExt};
use std::sync::Arc;

/// Create a blob access for configuration nodes that are not specific to
/// a storage type. Nested nodes are resolved through `creator`, so that
/// storage-type specific backends may appear beneath shared ones.
pub fn new_common_blob_access(
    creator: &dyn BlobAccessCreator,
    configuration: &BlobAccessConfiguration,
) -> ActionCacheResult<(BlobAccessInfo, &'static str)> {
    match configuration {
        BlobAccessConfiguration::Memory(_) => {
            let format = creator.default_digest_key_format();
            Ok((
                BlobAccessInfo::new(Arc::new(MemoryBlobAccess::new(format)), format),
                "memory",
            ))
        }
        BlobAccessConfiguration::Error(backend) => Ok((
            BlobAccessInfo::new(
                Arc::new(ErrorBlobAccess::new(backend.code, backend.message.clone())),
                DigestKeyFormat::WithoutInstance,
            ),
            "error",
        )),
        BlobAccessConfiguration::ReadOnly(backend) => {
            let base = new_nested_blob_access(backend, creator).context("Backend of read_only")?;
            Ok((
                BlobAccessInfo::new(
                    Arc::new(ReadOnlyBlobAccess::new(base.blob_access)),
                    base.digest_key_format,
                ),
                "read_only",
            ))
        }
        other => Err(ActionCacheError::InvalidArgument(format!(
            "Configuration did not contain a supported storage backend: {} cannot be used for storage type {}",
            other.kind(),
            creator.storage_type_name()
        ))),
    }
}
