//! actioncache - Action Cache access pipelines
//!
//! Builds layered blob access pipelines for a build Action Cache out of a
//! declarative configuration tree: expiration of stale results,
//! completeness checking against the Content Addressable Storage, and
//! remote cache clients.

pub mod blobstore;
pub mod cli;
pub mod clock;
pub mod config;
pub mod digest;
pub mod error;
pub mod messages;
pub mod remote;
pub mod ui;

pub use error::{ActionCacheError, ActionCacheResult};
