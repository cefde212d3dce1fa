//! Blob access construction for the Content Addressable Storage

use super::common::new_common_blob_access;
use super::creator::{new_labelled_blob_access, BlobAccessCreator};
use crate::blobstore::blob_access::BlobAccessInfo;
use crate::config::schema::BlobAccessConfiguration;
use crate::digest::DigestKeyFormat;
use crate::error::ActionCacheResult;

/// Creates blob accesses for the Content Addressable Storage. Objects are
/// addressed by their contents, so no instance name is needed in keys.
#[derive(Debug, Default)]
pub struct CasBlobAccessCreator;

impl BlobAccessCreator for CasBlobAccessCreator {
    fn storage_type_name(&self) -> &'static str {
        "cas"
    }

    fn default_digest_key_format(&self) -> DigestKeyFormat {
        DigestKeyFormat::WithoutInstance
    }

    fn new_custom_blob_access(
        &self,
        configuration: &BlobAccessConfiguration,
    ) -> ActionCacheResult<(BlobAccessInfo, &'static str)> {
        new_common_blob_access(self, configuration)
    }
}

/// Create the Content Addressable Storage blob access described by
/// `configuration`, together with the label of the root backend.
pub fn new_cas_blob_access_from_configuration(
    configuration: &BlobAccessConfiguration,
) -> ActionCacheResult<(BlobAccessInfo, &'static str)> {
    new_labelled_blob_access(configuration, &CasBlobAccessCreator)
}
