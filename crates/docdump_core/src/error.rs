//! Error types for docdump core.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in docdump core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Store boundary error.
    #[error("store error: {0}")]
    Store(#[from] docdump_store::StoreError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A document could not be decoded from a dump file.
    #[error("decode error: {0}")]
    Decode(#[from] bson::de::Error),

    /// A document could not be encoded into a dump file.
    #[error("encode error: {0}")]
    Encode(#[from] bson::ser::Error),

    /// An archive could not be read or written.
    #[error("archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    /// The node's role does not expose a replication log.
    #[error("log capture is unsupported on this node role")]
    UnsupportedNodeRole,

    /// The persisted incremental checkpoint could not be parsed.
    #[error("corrupt checkpoint {path}: {message}")]
    CheckpointCorrupt {
        /// Path of the checkpoint file.
        path: PathBuf,
        /// Description of the problem.
        message: String,
    },

    /// A database named in the run is not registered.
    #[error("database not registered: {name}")]
    MissingDatabase {
        /// Name of the database.
        name: String,
    },

    /// A dump tree or dump file has an invalid shape.
    #[error("invalid dump: {message}")]
    InvalidDump {
        /// Description of the problem.
        message: String,
    },

    /// A replication log entry is missing a required field.
    #[error("malformed log entry: {message}")]
    MalformedLogEntry {
        /// Description of the problem.
        message: String,
    },

    /// The run was cancelled from outside before it completed.
    #[error("operation interrupted")]
    Interrupted,
}

impl CoreError {
    /// Creates a corrupt checkpoint error.
    pub fn checkpoint_corrupt(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::CheckpointCorrupt {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates a missing database error.
    pub fn missing_database(name: impl Into<String>) -> Self {
        Self::MissingDatabase { name: name.into() }
    }

    /// Creates an invalid dump error.
    pub fn invalid_dump(message: impl Into<String>) -> Self {
        Self::InvalidDump {
            message: message.into(),
        }
    }

    /// Creates a malformed log entry error.
    pub fn malformed_log_entry(message: impl Into<String>) -> Self {
        Self::MalformedLogEntry {
            message: message.into(),
        }
    }
}
