//! Error and result types shared across the crate.

use std::fmt;
use std::io;

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// The error taxonomy surfaced by every public operation.
#[derive(Debug)]
pub enum Error {
    /// Operation attempted on a database that has already been closed.
    Closed,
    /// A triple (or pattern) had a missing or empty component.
    InvalidTriple(&'static str),
    /// A vector id had no record.
    NotFound,
    /// A vector's dimension did not match the configured/persisted dimension.
    DimensionMismatch { expected: usize, actual: usize },
    /// A text query was given but no `Embedder` is configured.
    EmbedderRequired,
    /// A vector call was made but no vector index is configured.
    VectorsDisabled,
    /// A stored key or value was corrupt.
    DecodeError(String),
    /// Propagated from the underlying key-value store.
    IoError(String),
    /// The operation's context was cancelled or its deadline expired.
    Cancelled,
    /// The configured `Embedder` returned a failure.
    EmbedderError(String),
    /// Miscellaneous error message, for conditions not covered above.
    Other(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Closed => write!(f, "database is closed"),
            Error::InvalidTriple(msg) => write!(f, "invalid triple: {msg}"),
            Error::NotFound => write!(f, "not found"),
            Error::DimensionMismatch { expected, actual } => write!(
                f,
                "dimension mismatch: expected {expected}, got {actual}"
            ),
            Error::EmbedderRequired => write!(f, "query requires a configured embedder"),
            Error::VectorsDisabled => write!(f, "no vector index is configured"),
            Error::DecodeError(msg) => write!(f, "decode error: {msg}"),
            Error::IoError(msg) => write!(f, "I/O error: {msg}"),
            Error::Cancelled => write!(f, "operation cancelled"),
            Error::EmbedderError(msg) => write!(f, "embedder error: {msg}"),
            Error::Other(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::IoError(err.to_string())
    }
}

impl From<redb::DatabaseError> for Error {
    fn from(err: redb::DatabaseError) -> Self {
        Error::IoError(err.to_string())
    }
}

impl From<redb::TransactionError> for Error {
    fn from(err: redb::TransactionError) -> Self {
        Error::IoError(err.to_string())
    }
}

impl From<redb::TableError> for Error {
    fn from(err: redb::TableError) -> Self {
        Error::IoError(err.to_string())
    }
}

impl From<redb::StorageError> for Error {
    fn from(err: redb::StorageError) -> Self {
        Error::IoError(err.to_string())
    }
}

impl From<redb::CommitError> for Error {
    fn from(err: redb::CommitError) -> Self {
        Error::IoError(err.to_string())
    }
}
