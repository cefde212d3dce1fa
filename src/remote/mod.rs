//! Clients for remote Action Cache services
//!
//! The blob access layer only depends on the [`ActionCacheClient`] and
//! [`ClientFactory`] traits. [`HttpClientFactory`] provides clients using
//! the `/ac/{hash}` HTTP cache layout with JSON-encoded action results.

mod http;

pub use http::{HttpActionCacheClient, HttpClientFactory};

use crate::config::schema::ClientConfiguration;
use crate::digest::Digest;
use crate::error::ActionCacheResult;
use crate::messages::ActionResult;
use async_trait::async_trait;
use std::sync::Arc;

/// Client for a remote Action Cache service
#[async_trait]
pub trait ActionCacheClient: Send + Sync {
    /// Fetch the action result stored for an action digest
    async fn get_action_result(&self, digest: &Digest) -> ActionCacheResult<ActionResult>;

    /// Store an action result for an action digest
    async fn update_action_result(
        &self,
        digest: &Digest,
        action_result: &ActionResult,
    ) -> ActionCacheResult<()>;

    /// Address of the remote service, for display
    fn target(&self) -> &str;
}

/// Creates clients from configuration. Shared by all storage roles.
pub trait ClientFactory: Send + Sync {
    fn new_client_from_configuration(
        &self,
        configuration: &ClientConfiguration,
    ) -> ActionCacheResult<Arc<dyn ActionCacheClient>>;
}
