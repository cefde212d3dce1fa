//! Content digests and the digest key format lattice

use crate::error::{ActionCacheError, ActionCacheResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Whether an item can be addressed by its digest alone, or whether the
/// instance name needs to be part of the key as well.
///
/// The variants are ordered: `WithInstance` is the stricter requirement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DigestKeyFormat {
    /// Keys only contain the hash and size
    WithoutInstance,
    /// Keys contain the hash, size and instance name
    WithInstance,
}

impl DigestKeyFormat {
    /// Combine the requirements of two backends into the stricter one.
    ///
    /// Commutative and associative, with `WithoutInstance` as identity.
    pub fn combine(self, other: Self) -> Self {
        self.max(other)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::WithoutInstance => "without_instance",
            Self::WithInstance => "with_instance",
        }
    }
}

impl fmt::Display for DigestKeyFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Digest of an object, scoped to an instance name
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Digest {
    instance_name: String,
    hash: String,
    size_bytes: i64,
}

/// Digest as it appears inside messages, without an instance name
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DigestRef {
    pub hash: String,
    pub size_bytes: i64,
}

impl Digest {
    /// Create a digest, validating its hash and size
    pub fn new(
        instance_name: impl Into<String>,
        hash: impl Into<String>,
        size_bytes: i64,
    ) -> ActionCacheResult<Self> {
        let instance_name = instance_name.into();
        let hash = hash.into();
        validate_hash(&hash)?;
        if size_bytes < 0 {
            return Err(ActionCacheError::InvalidArgument(format!(
                "Invalid digest size: {} bytes",
                size_bytes
            )));
        }
        if instance_name.split('/').any(|c| c == ".." || c == ".") {
            return Err(ActionCacheError::InvalidArgument(format!(
                "Invalid instance name {:?}: must not contain '.' or '..' components",
                instance_name
            )));
        }
        Ok(Self {
            instance_name,
            hash,
            size_bytes,
        })
    }

    /// Create a digest in the same instance from a digest embedded in a message
    pub fn derive(&self, digest: &DigestRef) -> ActionCacheResult<Self> {
        Self::new(self.instance_name.clone(), digest.hash.clone(), digest.size_bytes)
    }

    pub fn instance_name(&self) -> &str {
        &self.instance_name
    }

    pub fn hash(&self) -> &str {
        &self.hash
    }

    pub fn size_bytes(&self) -> i64 {
        self.size_bytes
    }

    /// Form a lookup key for this digest in the requested format
    pub fn key(&self, format: DigestKeyFormat) -> String {
        match format {
            DigestKeyFormat::WithoutInstance => format!("{}-{}", self.hash, self.size_bytes),
            DigestKeyFormat::WithInstance => {
                format!("{}-{}-{}", self.hash, self.size_bytes, self.instance_name)
            }
        }
    }

    /// Hash bytes of the digest
    pub fn hash_bytes(&self) -> Vec<u8> {
        // Validated on construction
        hex::decode(&self.hash).unwrap_or_default()
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}", self.hash, self.size_bytes, self.instance_name)
    }
}

fn validate_hash(hash: &str) -> ActionCacheResult<()> {
    // MD5 through SHA-512
    if hash.len() < 32 || hash.len() > 128 || hash.len() % 2 != 0 {
        return Err(ActionCacheError::InvalidArgument(format!(
            "Invalid digest hash {:?}: unsupported length of {} characters",
            hash,
            hash.len()
        )));
    }
    if !hash
        .chars()
        .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
    {
        return Err(ActionCacheError::InvalidArgument(format!(
            "Invalid digest hash {:?}: must be lowercase hexadecimal",
            hash
        )));
    }
    Ok(())
}
