//! Error types for the lirc-client crate.
//!
//! Every synchronous failure of the session API is reported through
//! [`Error`]. Failures that only surface inside the event loop (the daemon
//! going away) are delivered as a `closed` event instead.

use std::path::PathBuf;

use crate::lircrc::ParseError;
use crate::transport::CodecError;

/// Unified error type for session, registry and channel operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The daemon channel could not be opened or read
    #[error("Connection error: {0}")]
    Connection(String),

    /// A mapping table failed to load
    #[error("Error loading config file '{}': {reason}", path.display())]
    ConfigLoad { path: PathBuf, reason: String },

    /// Every registry slot is occupied
    #[error("Config registry is full, cannot load '{path}'")]
    RegistryFull { path: String },

    /// Malformed call
    #[error("Invalid argument: {0}")]
    Argument(String),

    /// An operation needed a loaded table and none was present
    #[error("Cannot set mode on empty config")]
    NoConfigLoaded,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection(message.into())
    }

    pub fn config_load(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::ConfigLoad {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Whether this error left the session disconnected because the daemon
    /// could not be reached.
    #[must_use]
    pub fn is_connection(&self) -> bool {
        matches!(self, Self::Connection(_))
    }
}

impl From<ParseError> for Error {
    fn from(e: ParseError) -> Self {
        Self::ConfigLoad {
            path: e.file.clone(),
            reason: e.to_string(),
        }
    }
}

impl From<CodecError> for Error {
    fn from(e: CodecError) -> Self {
        match e {
            CodecError::Io(e) => Self::Io(e),
            other => Self::Connection(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
