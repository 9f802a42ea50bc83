//! UDIF error types

use thiserror::Error;

/// The main error type for UDIF operations
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error during pipeline operations
    #[error("Pipeline I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid container format or corrupted data
    #[error("Invalid vault format: {0}")]
    InvalidVault(String),

    /// Invalid zone table or partition structure
    #[error("Invalid zone table: {0}")]
    InvalidZoneTable(String),

    /// Neither the metadata nor any recognized partition scheme produced partitions
    #[error("Unsupported partition scheme: {0}")]
    UnsupportedScheme(String),

    /// Checksum verification failed
    #[error("Checksum verification failed: {0}")]
    ChecksumVerification(String),

    /// Unsupported format or feature
    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// Requested item does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Encoding error
    #[error("Encoding error: {0}")]
    Encoding(String),
}

/// Result type alias for UDIF operations
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create an invalid vault error
    pub fn invalid_vault(msg: impl Into<String>) -> Self {
        Error::InvalidVault(msg.into())
    }

    /// Create an invalid zone table error
    pub fn invalid_zone_table(msg: impl Into<String>) -> Self {
        Error::InvalidZoneTable(msg.into())
    }

    /// Create an unsupported partition scheme error
    pub fn unsupported_scheme(msg: impl Into<String>) -> Self {
        Error::UnsupportedScheme(msg.into())
    }

    /// Create a not found error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Error::NotFound(msg.into())
    }

    /// Create an unsupported error
    pub fn unsupported(msg: impl Into<String>) -> Self {
        Error::Unsupported(msg.into())
    }

    /// Create an encoding error
    pub fn encoding(msg: impl Into<String>) -> Self {
        Error::Encoding(msg.into())
    }

    /// Convert into an `std::io::Error` for use inside `Read`/`Seek` implementations
    pub fn into_io(self) -> std::io::Error {
        match self {
            Error::Io(e) => e,
            Error::Unsupported(msg) => std::io::Error::new(std::io::ErrorKind::Unsupported, msg),
            other => std::io::Error::new(std::io::ErrorKind::InvalidData, other.to_string()),
        }
    }
}
