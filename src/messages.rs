//! Messages stored in the Action Cache and Content Addressable Storage
//!
//! Blobs are JSON documents. Decoding is always bounded by a maximum
//! message size, so that a corrupted or hostile backend cannot make us
//! allocate arbitrary amounts of memory.

use crate::digest::DigestRef;
use crate::error::{ActionCacheError, ActionCacheResult};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Result of executing an action
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionResult {
    pub output_files: Vec<OutputFile>,
    pub output_directories: Vec<OutputDirectory>,
    pub exit_code: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stdout_digest: Option<DigestRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stderr_digest: Option<DigestRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_metadata: Option<ExecutedActionMetadata>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputFile {
    pub path: String,
    pub digest: DigestRef,
    #[serde(default)]
    pub is_executable: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputDirectory {
    pub path: String,
    /// Digest of a [`Tree`] stored in the Content Addressable Storage
    pub tree_digest: DigestRef,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutedActionMetadata {
    pub worker: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub worker_completed_timestamp: Option<DateTime<Utc>>,
}

/// Directory hierarchy produced as an output directory
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tree {
    pub root: Directory,
    pub children: Vec<Directory>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Directory {
    pub files: Vec<FileNode>,
    pub directories: Vec<DirectoryNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileNode {
    pub name: String,
    pub digest: DigestRef,
    #[serde(default)]
    pub is_executable: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectoryNode {
    pub name: String,
    pub digest: DigestRef,
}

impl Tree {
    /// All directories contained in the tree, root first
    pub fn directories(&self) -> impl Iterator<Item = &Directory> {
        std::iter::once(&self.root).chain(self.children.iter())
    }
}

/// Decode a message, refusing buffers larger than `maximum_size_bytes`
pub fn decode<T: DeserializeOwned>(data: &[u8], maximum_size_bytes: usize) -> ActionCacheResult<T> {
    check_size(data.len(), maximum_size_bytes)?;
    serde_json::from_slice(data).map_err(|e| {
        ActionCacheError::InvalidArgument(format!("Failed to unmarshal message: {}", e))
    })
}

/// Encode a message, refusing results larger than `maximum_size_bytes`
pub fn encode<T: Serialize>(message: &T, maximum_size_bytes: usize) -> ActionCacheResult<Vec<u8>> {
    let data = serde_json::to_vec(message)?;
    check_size(data.len(), maximum_size_bytes)?;
    Ok(data)
}

fn check_size(size: usize, maximum_size_bytes: usize) -> ActionCacheResult<()> {
    if size > maximum_size_bytes {
        return Err(ActionCacheError::InvalidArgument(format!(
            "Buffer is {} bytes in size, while a maximum of {} bytes is permitted",
            size, maximum_size_bytes
        )));
    }
    Ok(())
}
