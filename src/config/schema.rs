//! Configuration schema for actioncache
//!
//! Configuration is stored at `~/.config/actioncache/config.toml`

use crate::error::Code;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// Largest message accepted from or sent to any backend (16 MiB)
pub const DEFAULT_MAXIMUM_MESSAGE_SIZE_BYTES: usize = 16 * 1024 * 1024;

/// Root configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Upper bound for decoded and encoded messages
    pub maximum_message_size_bytes: usize,

    /// General settings
    pub general: GeneralConfig,

    /// Storage holding output files and trees
    pub content_addressable_storage: BlobAccessConfiguration,

    /// Storage holding action results
    pub action_cache: BlobAccessConfiguration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            maximum_message_size_bytes: DEFAULT_MAXIMUM_MESSAGE_SIZE_BYTES,
            general: GeneralConfig::default(),
            content_addressable_storage: BlobAccessConfiguration::default(),
            action_cache: BlobAccessConfiguration::default(),
        }
    }
}

/// General application settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log format: "text" or "json"
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_format: "text".to_string(),
        }
    }
}

/// A node in the storage backend tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlobAccessConfiguration {
    /// Hide action results older than a validity window (Action Cache only)
    ActionResultExpiring(ActionResultExpiringConfiguration),

    /// Hide action results whose outputs are missing (Action Cache only)
    CompletenessChecking(Box<BlobAccessConfiguration>),

    /// Forward to a remote Action Cache service (Action Cache only)
    Remote(ClientConfiguration),

    /// Keep blobs in process memory
    Memory(MemoryConfiguration),

    /// Fail every request
    Error(ErrorConfiguration),

    /// Reject writes to the nested backend
    ReadOnly(Box<BlobAccessConfiguration>),
}

impl BlobAccessConfiguration {
    /// Name of the variant, as it appears in configuration files
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ActionResultExpiring(_) => "action_result_expiring",
            Self::CompletenessChecking(_) => "completeness_checking",
            Self::Remote(_) => "remote",
            Self::Memory(_) => "memory",
            Self::Error(_) => "error",
            Self::ReadOnly(_) => "read_only",
        }
    }
}

impl Default for BlobAccessConfiguration {
    fn default() -> Self {
        Self::Memory(MemoryConfiguration::default())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionResultExpiringConfiguration {
    /// Backend from which action results are read
    pub backend: Box<BlobAccessConfiguration>,

    /// How long action results remain valid after the worker completed them
    #[serde(default)]
    pub minimum_validity: Option<ConfigDuration>,

    /// Upper bound of the random extension added to the validity
    #[serde(default)]
    pub maximum_validity_jitter: Option<ConfigDuration>,
}

/// Connection parameters of a remote service
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClientConfiguration {
    /// Base URL, e.g. "http://cache.example.com:8080"
    pub address: String,

    /// Extra headers sent with every request
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub add_headers: BTreeMap<String, String>,

    /// Per-request timeout
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<ConfigDuration>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryConfiguration {}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorConfiguration {
    pub code: Code,
    pub message: String,
}

/// Largest magnitude of a duration: 10,000 years
const MAXIMUM_DURATION_SECONDS: i64 = 315_576_000_000;
const NANOS_PER_SECOND: i32 = 1_000_000_000;

/// Duration as written in configuration files.
///
/// Accepts the JSON form of a protobuf duration (`"60s"`, `"0.5s"`) or a
/// table with `seconds` and `nanos`. Values are validated when used, not
/// when parsed, so that the resolver can report which field is wrong.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConfigDuration {
    Text(String),
    Parts {
        seconds: i64,
        #[serde(default)]
        nanos: i32,
    },
}

impl ConfigDuration {
    pub fn from_secs(seconds: u64) -> Self {
        Self::Text(format!("{}s", seconds))
    }

    /// Seconds and nanoseconds, without range checks
    fn parts(&self) -> Result<(i64, i32), String> {
        match self {
            Self::Parts { seconds, nanos } => Ok((*seconds, *nanos)),
            Self::Text(text) => parse_duration(text),
        }
    }

    /// Check that the duration is well-formed, in range and not negative
    pub fn check_valid(&self) -> Result<(), String> {
        let (seconds, nanos) = self.parts()?;
        if !(-MAXIMUM_DURATION_SECONDS..=MAXIMUM_DURATION_SECONDS).contains(&seconds) {
            return Err(format!("duration {} exceeds 10000 years", self));
        }
        if nanos <= -NANOS_PER_SECOND || nanos >= NANOS_PER_SECOND {
            return Err(format!("duration {} has out-of-range nanos", self));
        }
        if (seconds > 0 && nanos < 0) || (seconds < 0 && nanos > 0) {
            return Err(format!("duration {} has seconds and nanos with different signs", self));
        }
        if seconds < 0 || nanos < 0 {
            return Err(format!("duration {} is negative", self));
        }
        Ok(())
    }

    /// Convert to a standard library duration, validating it first
    pub fn to_std(&self) -> Result<Duration, String> {
        self.check_valid()?;
        let (seconds, nanos) = self.parts()?;
        Ok(Duration::new(seconds as u64, nanos as u32))
    }
}

impl fmt::Display for ConfigDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(text) => write!(f, "{:?}", text),
            Self::Parts { seconds, nanos } => {
                write!(f, "{{seconds: {}, nanos: {}}}", seconds, nanos)
            }
        }
    }
}

fn parse_duration(text: &str) -> Result<(i64, i32), String> {
    let malformed = || format!("malformed duration {:?}", text);
    let body = text.strip_suffix('s').ok_or_else(malformed)?;
    let (negative, body) = match body.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, body),
    };
    let (whole, fraction) = match body.split_once('.') {
        Some((whole, fraction)) => (whole, Some(fraction)),
        None => (body, None),
    };
    if whole.is_empty() || !whole.chars().all(|c| c.is_ascii_digit()) {
        return Err(malformed());
    }
    let seconds: i64 = whole.parse().map_err(|_| malformed())?;
    let nanos: i32 = match fraction {
        None => 0,
        Some(f) if !f.is_empty() && f.len() <= 9 && f.chars().all(|c| c.is_ascii_digit()) => {
            format!("{:0<9}", f).parse().map_err(|_| malformed())?
        }
        Some(_) => return Err(malformed()),
    };
    if negative {
        Ok((-seconds, -nanos))
    } else {
        Ok((seconds, nanos))
    }
}
