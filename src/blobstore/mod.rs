//! Blob storage backends and decorators
//!
//! - [`MemoryBlobAccess`], [`ErrorBlobAccess`], [`ReadOnlyBlobAccess`]: shared by all storage types
//! - [`ActionResultExpiringBlobAccess`], [`CompletenessCheckingBlobAccess`],
//!   [`RemoteActionCacheBlobAccess`]: Action Cache only
//! - [`configuration`]: builds pipelines out of the above

mod action_result_expiring;
mod blob_access;
pub mod completeness_checking;
pub mod configuration;
mod error_blob_access;
mod instrumented;
mod memory;
mod read_only;
mod remote;

pub use action_result_expiring::ActionResultExpiringBlobAccess;
pub use blob_access::{BlobAccess, BlobAccessInfo, DigestSet};
pub use completeness_checking::CompletenessCheckingBlobAccess;
pub use error_blob_access::ErrorBlobAccess;
pub use instrumented::InstrumentedBlobAccess;
pub use memory::MemoryBlobAccess;
pub use read_only::ReadOnlyBlobAccess;
pub use remote::RemoteActionCacheBlobAccess;
