//! Error types for desk-core

use thiserror::Error;

use crate::gateway::GatewayError;

/// Result type alias using desk-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in desk-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// SQLite error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Meeting not found
    #[error("Meeting not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The command is not valid for the record's current state
    #[error("Precondition failed: {0}")]
    Precondition(String),

    /// Remote gateway error surfaced outside of the sync queue
    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),
}

/// Coarse classification of [`Error`] used by callers that branch on the
/// failure category rather than the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Durable storage failed; the calling operation did not take effect.
    Storage,
    /// The record is not in a state that allows the command.
    Precondition,
    /// The referenced record does not exist.
    NotFound,
    /// Caller supplied malformed input or configuration.
    InvalidInput,
    /// The remote backend could not be used.
    Remote,
}

impl Error {
    /// Returns the category this error belongs to.
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Database(_) | Self::Io(_) | Self::Serialization(_) => ErrorKind::Storage,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::InvalidInput(_) => ErrorKind::InvalidInput,
            Self::Precondition(_) => ErrorKind::Precondition,
            Self::Gateway(_) => ErrorKind::Remote,
        }
    }
}
