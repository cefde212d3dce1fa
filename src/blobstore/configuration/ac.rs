//! Blob access construction for the Action Cache

use super::common::new_common_blob_access;
use super::creator::{new_labelled_blob_access, new_nested_blob_access, BlobAccessCreator};
use crate::blobstore::blob_access::BlobAccessInfo;
use crate::blobstore::completeness_checking::RECOMMENDED_FIND_MISSING_DIGESTS_COUNT;
use crate::blobstore::{
    ActionResultExpiringBlobAccess, CompletenessCheckingBlobAccess, RemoteActionCacheBlobAccess,
};
use crate::clock::{Clock, SystemClock};
use crate::config::schema::{BlobAccessConfiguration, ConfigDuration};
use crate::digest::DigestKeyFormat;
use crate::error::{ActionCacheError, ActionCacheResult, ResultExt};
use crate::remote::ClientFactory;
use std::sync::Arc;
use std::time::Duration;

/// Creates blob accesses suitable for accessing the Action Cache.
///
/// In addition to the shared backends, supports decorators that only make
/// sense for action results: expiration, completeness checking against the
/// Content Addressable Storage, and forwarding to a remote Action Cache.
pub struct AcBlobAccessCreator {
    content_addressable_storage: BlobAccessInfo,
    client_factory: Arc<dyn ClientFactory>,
    maximum_message_size_bytes: usize,
    clock: Arc<dyn Clock>,
}

impl AcBlobAccessCreator {
    pub fn new(
        content_addressable_storage: BlobAccessInfo,
        client_factory: Arc<dyn ClientFactory>,
        maximum_message_size_bytes: usize,
    ) -> Self {
        Self {
            content_addressable_storage,
            client_factory,
            maximum_message_size_bytes,
            clock: Arc::new(SystemClock),
        }
    }

    /// Use a different clock for expiring action results
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}

impl BlobAccessCreator for AcBlobAccessCreator {
    fn storage_type_name(&self) -> &'static str {
        "ac"
    }

    fn default_digest_key_format(&self) -> DigestKeyFormat {
        DigestKeyFormat::WithInstance
    }

    fn new_custom_blob_access(
        &self,
        configuration: &BlobAccessConfiguration,
    ) -> ActionCacheResult<(BlobAccessInfo, &'static str)> {
        match configuration {
            BlobAccessConfiguration::ActionResultExpiring(backend) => {
                let minimum_validity =
                    validity_duration(&backend.minimum_validity, "minimum validity")?;
                let maximum_validity_jitter =
                    validity_duration(&backend.maximum_validity_jitter, "maximum validity jitter")?;
                let base = new_nested_blob_access(&backend.backend, self)
                    .context("Backend of action_result_expiring")?;
                Ok((
                    BlobAccessInfo::new(
                        Arc::new(ActionResultExpiringBlobAccess::new(
                            base.blob_access,
                            self.clock.clone(),
                            self.maximum_message_size_bytes,
                            minimum_validity,
                            maximum_validity_jitter,
                        )),
                        base.digest_key_format,
                    ),
                    // Shares its bucket with completeness checking
                    "completeness_checking",
                ))
            }
            BlobAccessConfiguration::CompletenessChecking(backend) => {
                let base = new_nested_blob_access(backend, self)
                    .context("Backend of completeness_checking")?;
                Ok((
                    BlobAccessInfo::new(
                        Arc::new(CompletenessCheckingBlobAccess::new(
                            base.blob_access,
                            self.content_addressable_storage.blob_access.clone(),
                            RECOMMENDED_FIND_MISSING_DIGESTS_COUNT,
                            self.maximum_message_size_bytes,
                        )),
                        base.digest_key_format
                            .combine(self.content_addressable_storage.digest_key_format),
                    ),
                    "completeness_checking",
                ))
            }
            BlobAccessConfiguration::Remote(client_configuration) => {
                let client = self
                    .client_factory
                    .new_client_from_configuration(client_configuration)
                    .context(format!("Remote Action Cache {:?}", client_configuration.address))?;
                Ok((
                    BlobAccessInfo::new(
                        Arc::new(RemoteActionCacheBlobAccess::new(
                            client,
                            self.maximum_message_size_bytes,
                        )),
                        DigestKeyFormat::WithInstance,
                    ),
                    "remote",
                ))
            }
            _ => new_common_blob_access(self, configuration),
        }
    }
}

fn validity_duration(duration: &Option<ConfigDuration>, name: &str) -> ActionCacheResult<Duration> {
    let duration = duration.as_ref().ok_or_else(|| {
        ActionCacheError::InvalidArgument(format!("Invalid {}: duration is not set", name))
    })?;
    duration
        .to_std()
        .map_err(|reason| ActionCacheError::InvalidArgument(format!("Invalid {}: {}", name, reason)))
}

/// Create the Action Cache blob access described by `configuration`.
///
/// `content_addressable_storage` is the already constructed sibling used
/// for completeness checking. Returns the blob access together with the
/// label of the root backend.
pub fn new_ac_blob_access_from_configuration(
    configuration: &BlobAccessConfiguration,
    content_addressable_storage: BlobAccessInfo,
    client_factory: Arc<dyn ClientFactory>,
    maximum_message_size_bytes: usize,
) -> ActionCacheResult<(BlobAccessInfo, &'static str)> {
    let creator = AcBlobAccessCreator::new(
        content_addressable_storage,
        client_factory,
        maximum_message_size_bytes,
    );
    new_labelled_blob_access(configuration, &creator)
}
