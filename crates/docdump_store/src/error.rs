//! Error types for store operations.

use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur while talking to a deployment.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The named database is not registered with the deployment.
    #[error("database not found: {0}")]
    DatabaseNotFound(String),

    /// The named collection does not exist in its database.
    #[error("collection not found: {0}")]
    CollectionNotFound(String),

    /// An administrative command was rejected by the deployment.
    #[error("command {command} failed: {message}")]
    CommandFailed {
        /// The command name as submitted.
        command: String,
        /// The deployment's failure message.
        message: String,
    },

    /// A query filter used an operator or shape the deployment cannot evaluate.
    #[error("invalid filter: {0}")]
    InvalidFilter(String),
}

impl StoreError {
    /// Creates a [`StoreError::CommandFailed`] with the given command and message.
    pub fn command_failed(command: impl Into<String>, message: impl Into<String>) -> Self {
        StoreError::CommandFailed {
            command: command.into(),
            message: message.into(),
        }
    }

    /// Creates a [`StoreError::InvalidFilter`] with the given message.
    pub fn invalid_filter(message: impl Into<String>) -> Self {
        StoreError::InvalidFilter(message.into())
    }
}
