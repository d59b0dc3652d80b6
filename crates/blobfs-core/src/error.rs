//! Error types for the blob-storage filesystem adapter

use thiserror::Error;

/// Result type alias using the adapter Error
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the adapter and its storage clients
#[derive(Error, Debug)]
pub enum Error {
    // Remote store errors
    #[error("Blob not found: {path}")]
    NotFound { path: String },

    #[error("Container already exists: {container}")]
    ContainerExists { container: String },

    #[error("Transient storage failure: {message}")]
    Transient { message: String },

    // Contract errors
    #[error("Operation not supported by blob storage: {operation}")]
    Unsupported { operation: String },

    #[error("Invalid path {path:?}: {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("Unable to delete file at {path}: {reason}")]
    UnableToDelete { path: String, reason: String },

    #[error("Unable to delete directory {path}: {failed} of {total} blobs could not be deleted")]
    UnableToDeleteDirectory {
        path: String,
        failed: usize,
        total: usize,
    },

    #[error("Unable to copy {source_path} to {destination}: {reason}")]
    UnableToCopy {
        source_path: String,
        destination: String,
        reason: String,
    },

    #[error("Unable to move {source_path} to {destination}: {reason}")]
    UnableToMove {
        source_path: String,
        destination: String,
        reason: String,
    },

    #[error("Unable to retrieve {attribute} for {path}")]
    UnableToRetrieveMetadata { path: String, attribute: String },

    // Configuration errors
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    // Internal errors
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl Error {
    /// Returns true if this error is retryable
    ///
    /// Only transient remote failures qualify. A missing blob is an
    /// answer, not a failure, and is never retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Transient { .. })
    }

    /// Returns true if the remote store reported the object as absent
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }

    /// Shorthand for an unsupported operation
    pub fn unsupported(operation: impl Into<String>) -> Self {
        Error::Unsupported {
            operation: operation.into(),
        }
    }

    /// Shorthand for a transient failure
    pub fn transient(message: impl Into<String>) -> Self {
        Error::Transient {
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
