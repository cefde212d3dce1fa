//! Decorator that hides action results once they have become too old
//!
//! Without it, results of actions that are not hermetic (e.g. ones that
//! download artifacts) would remain cached forever. An action result
//! expires `minimum_validity + jitter` after the worker completed it. The
//! jitter is derived from the action digest, so every item receives its
//! own fixed offset in `[0, maximum_validity_jitter)` and results written
//! together do not all expire at once.

use crate::blobstore::blob_access::{BlobAccess, DigestSet};
use crate::clock::Clock;
use crate::digest::Digest;
use crate::error::{ActionCacheError, ActionCacheResult};
use crate::messages::{self, ActionResult};
use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use sha2::{Digest as _, Sha256};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

pub struct ActionResultExpiringBlobAccess {
    base: Arc<dyn BlobAccess>,
    clock: Arc<dyn Clock>,
    maximum_message_size_bytes: usize,
    minimum_validity: Duration,
    maximum_validity_jitter: Duration,
}

impl ActionResultExpiringBlobAccess {
    pub fn new(
        base: Arc<dyn BlobAccess>,
        clock: Arc<dyn Clock>,
        maximum_message_size_bytes: usize,
        minimum_validity: Duration,
        maximum_validity_jitter: Duration,
    ) -> Self {
        Self {
            base,
            clock,
            maximum_message_size_bytes,
            minimum_validity,
            maximum_validity_jitter,
        }
    }

    /// Per-item offset in `[0, maximum_validity_jitter)`
    pub fn jitter(&self, digest: &Digest) -> Duration {
        if self.maximum_validity_jitter.is_zero() {
            return Duration::ZERO;
        }
        let hash = Sha256::digest(digest.hash_bytes());
        let mut prefix = [0u8; 8];
        prefix.copy_from_slice(&hash[..8]);
        // 53 bits fit in an f64 mantissa, keeping the fraction below 1
        let fraction = (u64::from_le_bytes(prefix) >> 11) as f64 / (1u64 << 53) as f64;
        let jitter = self.maximum_validity_jitter.mul_f64(fraction);
        if jitter >= self.maximum_validity_jitter {
            self.maximum_validity_jitter - Duration::from_nanos(1)
        } else {
            jitter
        }
    }

    /// Point in time after which the action result is no longer served.
    /// Returns `None` if that point lies beyond what can be represented.
    pub fn expiration_time(
        &self,
        digest: &Digest,
        worker_completed: DateTime<Utc>,
    ) -> Option<DateTime<Utc>> {
        let validity = TimeDelta::from_std(self.minimum_validity + self.jitter(digest)).ok()?;
        worker_completed.checked_add_signed(validity)
    }
}

#[async_trait]
impl BlobAccess for ActionResultExpiringBlobAccess {
    async fn get(&self, digest: &Digest) -> ActionCacheResult<Vec<u8>> {
        let data = self.base.get(digest).await?;
        let action_result: ActionResult = messages::decode(&data, self.maximum_message_size_bytes)?;

        let worker_completed = action_result
            .execution_metadata
            .as_ref()
            .and_then(|m| m.worker_completed_timestamp);
        if let Some(expiration) = worker_completed.and_then(|t| self.expiration_time(digest, t)) {
            if self.clock.now() > expiration {
                debug!("Action result {} expired at {}", digest, expiration);
                return Err(ActionCacheError::NotFound(format!(
                    "Action result expired at {}",
                    expiration.to_rfc3339()
                )));
            }
        }
        Ok(data)
    }

    async fn put(&self, digest: &Digest, data: Vec<u8>) -> ActionCacheResult<()> {
        self.base.put(digest, data).await
    }

    async fn find_missing(&self, digests: &DigestSet) -> ActionCacheResult<DigestSet> {
        self.base.find_missing(digests).await
    }
}
