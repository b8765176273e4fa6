//! Error types for the commit log.

use std::fmt;
use std::io;

/// The result type used throughout the commit log.
pub type Result<T> = std::result::Result<T, Error>;

/// The error type for commit log operations.
#[derive(Debug)]
pub enum Error {
    /// An I/O error occurred.
    Io(io::Error),

    /// The requested offset is not covered by the log.
    OffsetOutOfRange(u64),

    /// The index has reached its configured capacity.
    IndexFull,

    /// A record could not be encoded or decoded.
    Codec(String),

    /// On-disk data or directory contents are corrupt.
    Corruption(String),

    /// An invalid argument was provided.
    InvalidArgument(String),

    /// The component is in an invalid state for the operation.
    InvalidState(String),
}

impl Error {
    /// Creates a new codec error.
    pub fn codec(msg: impl Into<String>) -> Self {
        Error::Codec(msg.into())
    }

    /// Creates a new corruption error.
    pub fn corruption(msg: impl Into<String>) -> Self {
        Error::Corruption(msg.into())
    }

    /// Creates a new invalid argument error.
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Error::InvalidArgument(msg.into())
    }

    /// Creates a new invalid state error.
    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Error::InvalidState(msg.into())
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "IO error: {}", e),
            Error::OffsetOutOfRange(offset) => write!(f, "offset out of range: {}", offset),
            Error::IndexFull => write!(f, "index is full"),
            Error::Codec(msg) => write!(f, "Codec error: {}", msg),
            Error::Corruption(msg) => write!(f, "Data corruption: {}", msg),
            Error::InvalidArgument(msg) => write!(f, "Invalid argument: {}", msg),
            Error::InvalidState(msg) => write!(f, "Invalid state: {}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Io(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::OffsetOutOfRange(42);
        assert_eq!(err.to_string(), "offset out of range: 42");

        let err = Error::IndexFull;
        assert_eq!(err.to_string(), "index is full");

        let err = Error::corruption("torn frame");
        assert_eq!(err.to_string(), "Data corruption: torn frame");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }
}
