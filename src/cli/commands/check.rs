//! Check command - build the configured pipelines and report on them

use crate::blobstore::configuration::{build_storage, Storage};
use crate::blobstore::BlobAccessInfo;
use crate::cli::args::{CheckArgs, OutputFormat};
use crate::config::{Config, ConfigManager};
use crate::error::ActionCacheResult;
use crate::remote::HttpClientFactory;
use crate::ui::{self, UiContext};
use std::sync::Arc;

/// Execute the check command
pub async fn execute(args: CheckArgs, manager: &ConfigManager, config: &Config) -> ActionCacheResult<()> {
    let client_factory = Arc::new(HttpClientFactory::new(config.maximum_message_size_bytes));
    let storage = build_storage(config, client_factory)?;

    match args.format {
        OutputFormat::Text => print_text(manager, &storage),
        OutputFormat::Json => print_json(&storage)?,
    }
    Ok(())
}

fn print_text(manager: &ConfigManager, storage: &Storage) {
    let ctx = UiContext::detect();
    ui::intro(&ctx, "Storage configuration");
    ui::key_value(&ctx, "config", &manager.path().display().to_string());
    if !manager.path().exists() {
        ui::step_info(&ctx, "No configuration file found, using defaults");
    }

    ui::section(&ctx, "Content Addressable Storage");
    print_pipeline(
        &ctx,
        storage.content_addressable_storage_backend,
        &storage.content_addressable_storage,
    );

    ui::section(&ctx, "Action Cache");
    print_pipeline(&ctx, storage.action_cache_backend, &storage.action_cache);

    println!();
    ui::step_ok(&ctx, "Configuration is valid");
}

fn print_pipeline(ctx: &UiContext, backend: &str, info: &BlobAccessInfo) {
    ui::key_value(ctx, "backend", backend);
    ui::key_value(ctx, "digest key format", info.digest_key_format.name());
}

fn print_json(storage: &Storage) -> ActionCacheResult<()> {
    let report = serde_json::json!({
        "content_addressable_storage": {
            "backend": storage.content_addressable_storage_backend,
            "digest_key_format": storage.content_addressable_storage.digest_key_format,
        },
        "action_cache": {
            "backend": storage.action_cache_backend,
            "digest_key_format": storage.action_cache.digest_key_format,
        },
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
