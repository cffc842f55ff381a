//! Unified error type for the archiver
//!
//! Collaborator failures (directory, session, database) propagate through
//! this type unmodified; the evaluator never retries and never substitutes
//! defaults for a failed lookup.

use thiserror::Error;

/// Archiver error type for the query engine and its collaborators
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Directory error: {0}")]
    Directory(String),

    #[error("No directory entry found for account: {0}")]
    AccountNotFound(String),

    #[error("Quota error: {0}")]
    Quota(String),

    #[error("Session error: {0}")]
    Session(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Invalid date: {0}")]
    InvalidDate(String),

    #[error("Credential error: {0}")]
    Credential(String),

    #[error("IO error: {0}")]
    Io(String),
}

impl From<std::io::Error> for ArchiveError {
    fn from(err: std::io::Error) -> Self {
        ArchiveError::Io(err.to_string())
    }
}

impl From<toml::de::Error> for ArchiveError {
    fn from(err: toml::de::Error) -> Self {
        ArchiveError::Config(err.to_string())
    }
}

impl From<rusqlite::Error> for ArchiveError {
    fn from(err: rusqlite::Error) -> Self {
        ArchiveError::Database(err.to_string())
    }
}

/// Result type alias using ArchiveError
pub type Result<T> = std::result::Result<T, ArchiveError>;
