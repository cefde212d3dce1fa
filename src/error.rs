//! Error types for actioncache
//!
//! All modules use `ActionCacheResult<T>` as their return type. Every error
//! maps onto a status [`Code`], which is what callers branch on: a cache miss
//! is `NotFound`, a bad configuration is `InvalidArgument`, and so on.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for actioncache operations
pub type ActionCacheResult<T> = Result<T, ActionCacheError>;

/// Status code classifying an error
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Code {
    InvalidArgument,
    NotFound,
    PermissionDenied,
    Internal,
    Unavailable,
    Unimplemented,
    Unknown,
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::InvalidArgument => "invalid_argument",
            Self::NotFound => "not_found",
            Self::PermissionDenied => "permission_denied",
            Self::Internal => "internal",
            Self::Unavailable => "unavailable",
            Self::Unimplemented => "unimplemented",
            Self::Unknown => "unknown",
        };
        write!(f, "{}", name)
    }
}

/// All errors that can occur in actioncache
#[derive(Error, Debug)]
pub enum ActionCacheError {
    // Status errors
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Unavailable: {0}")]
    Unavailable(String),

    #[error("Unimplemented: {0}")]
    Unimplemented(String),

    #[error("Unknown error: {0}")]
    Unknown(String),

    /// Positional context around another error; keeps the inner code
    #[error("{context}: {source}")]
    Context {
        context: String,
        #[source]
        source: Box<ActionCacheError>,
    },

    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl ActionCacheError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create an error carrying the given status code
    pub fn with_code(code: Code, message: impl Into<String>) -> Self {
        let message = message.into();
        match code {
            Code::InvalidArgument => Self::InvalidArgument(message),
            Code::NotFound => Self::NotFound(message),
            Code::PermissionDenied => Self::PermissionDenied(message),
            Code::Unavailable => Self::Unavailable(message),
            Code::Unimplemented => Self::Unimplemented(message),
            Code::Internal => Self::Internal(message),
            Code::Unknown => Self::Unknown(message),
        }
    }

    /// Prefix the error with positional context, preserving its code
    pub fn context(self, context: impl Into<String>) -> Self {
        Self::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Status code of the error, looking through any context wrappers
    pub fn code(&self) -> Code {
        match self {
            Self::InvalidArgument(_) | Self::ConfigInvalid { .. } => Code::InvalidArgument,
            Self::NotFound(_) => Code::NotFound,
            Self::PermissionDenied(_) => Code::PermissionDenied,
            Self::Internal(_) => Code::Internal,
            Self::Unavailable(_) => Code::Unavailable,
            Self::Unimplemented(_) => Code::Unimplemented,
            Self::Context { source, .. } => source.code(),
            Self::Json(_) => Code::InvalidArgument,
            Self::Unknown(_) | Self::Io { .. } | Self::TomlSerialize(_) => Code::Unknown,
        }
    }

    /// Whether the error denotes an absent or unusable cache entry
    pub fn is_not_found(&self) -> bool {
        self.code() == Code::NotFound
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::ConfigInvalid { .. } => Some("Run: actioncache config show"),
            Self::Unavailable(_) => Some("Check that the remote cache address is reachable"),
            Self::Context { source, .. } => source.hint(),
            _ => None,
        }
    }
}

/// Extension for adding positional context to results
pub trait ResultExt<T> {
    fn context(self, context: impl Into<String>) -> ActionCacheResult<T>;
}

impl<T> ResultExt<T> for ActionCacheResult<T> {
    fn context(self, context: impl Into<String>) -> ActionCacheResult<T> {
        self.map_err(|e| e.context(context))
    }
}
