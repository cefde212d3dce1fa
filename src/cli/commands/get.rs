//! Get command - fetch an action result through the pipeline

use crate::blobstore::configuration::build_storage;
use crate::cli::args::GetArgs;
use crate::config::Config;
use crate::digest::Digest;
use crate::error::ActionCacheResult;
use crate::messages::{self, ActionResult};
use crate::remote::HttpClientFactory;
use std::sync::Arc;
use tracing::debug;

/// Execute the get command
pub async fn execute(args: GetArgs, config: &Config) -> ActionCacheResult<()> {
    let digest = Digest::new(args.instance, args.hash, args.size_bytes)?;
    let client_factory = Arc::new(HttpClientFactory::new(config.maximum_message_size_bytes));
    let storage = build_storage(config, client_factory)?;

    debug!(
        "Fetching {} using key {}",
        digest,
        digest.key(storage.action_cache.digest_key_format)
    );
    let data = storage.action_cache.blob_access.get(&digest).await?;
    let action_result: ActionResult = messages::decode(&data, config.maximum_message_size_bytes)?;

    println!("{}", serde_json::to_string_pretty(&action_result)?);
    Ok(())
}
