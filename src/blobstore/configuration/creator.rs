//! Recursive construction of blob accesses from configuration

use crate::blobstore::blob_access::BlobAccessInfo;
use crate::blobstore::instrumented::InstrumentedBlobAccess;
use crate::config::schema::BlobAccessConfiguration;
use crate::digest::DigestKeyFormat;
use crate::error::ActionCacheResult;
use std::sync::Arc;
use tracing::debug;

/// Storage-type specific part of blob access construction.
///
/// Each storage role (Action Cache, Content Addressable Storage) provides a
/// creator. Backends that only make sense for one role are handled by that
/// role's creator; everything else is handed to
/// [`new_common_blob_access`](super::new_common_blob_access).
pub trait BlobAccessCreator: Send + Sync {
    /// Short name of the storage type, used for instrumentation ("ac", "cas")
    fn storage_type_name(&self) -> &'static str;

    /// Key format required by backends storing data locally
    fn default_digest_key_format(&self) -> DigestKeyFormat;

    /// Create the blob access for a single configuration node, returning it
    /// together with a label describing the backend type.
    fn new_custom_blob_access(
        &self,
        configuration: &BlobAccessConfiguration,
    ) -> ActionCacheResult<(BlobAccessInfo, &'static str)>;
}

/// Create a blob access for a configuration node and return its backend
/// label. The result is instrumented with the storage type and label.
pub fn new_labelled_blob_access(
    configuration: &BlobAccessConfiguration,
    creator: &dyn BlobAccessCreator,
) -> ActionCacheResult<(BlobAccessInfo, &'static str)> {
    let (info, backend_type) = creator.new_custom_blob_access(configuration)?;
    debug!(
        storage_type = creator.storage_type_name(),
        backend_type,
        digest_key_format = %info.digest_key_format,
        "Created {} backend",
        configuration.kind()
    );
    let instrumented = InstrumentedBlobAccess::new(
        info.blob_access,
        creator.storage_type_name(),
        backend_type,
    );
    Ok((
        BlobAccessInfo::new(Arc::new(instrumented), info.digest_key_format),
        backend_type,
    ))
}

/// Create a blob access for a configuration node nested inside another one
pub fn new_nested_blob_access(
    configuration: &BlobAccessConfiguration,
    creator: &dyn BlobAccessCreator,
) -> ActionCacheResult<BlobAccessInfo> {
    new_labelled_blob_access(configuration, creator).map(|(info, _)| info)
}
