//! Error types
//!
//! Errors are classified by how the connection loop reacts to them:
//! transient failures (network, timeouts, bad HTTP status) trigger a short
//! backoff and reconnect, everything else triggers a long backoff. No error
//! from inside a connection ever propagates past its run loop.

use std::fmt;

/// Result type used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type
#[derive(Debug)]
pub enum Error {
    /// HTTP client error (connect failure, timeout, broken stream)
    Http(reqwest::Error),
    /// I/O error (read timeout on the chunk stream)
    Io(std::io::Error),
    /// Protocol-level error
    Protocol(ProtocolError),
}

/// Protocol-level errors from the event stream
#[derive(Debug)]
pub enum ProtocolError {
    /// Response carried no boundary token in its content type
    MissingBoundary,
    /// Endpoint answered with a non-success status
    BadStatus(u16),
    /// Unclassified internal fault inside the connection loop
    Internal(String),
}

impl Error {
    /// Whether the connection loop should treat this as a transient network
    /// failure (short backoff) rather than an unclassified fault (long
    /// backoff).
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Http(_) | Error::Io(_) => true,
            Error::Protocol(ProtocolError::MissingBoundary) => true,
            Error::Protocol(ProtocolError::BadStatus(_)) => true,
            Error::Protocol(ProtocolError::Internal(_)) => false,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Http(e) => write!(f, "HTTP error: {}", e),
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::Protocol(e) => write!(f, "Protocol error: {}", e),
        }
    }
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolError::MissingBoundary => {
                write!(f, "no boundary token in response content type")
            }
            ProtocolError::BadStatus(code) => write!(f, "unexpected HTTP status {}", code),
            ProtocolError::Internal(msg) => write!(f, "internal fault: {}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Http(e) => Some(e),
            Error::Io(e) => Some(e),
            Error::Protocol(_) => None,
        }
    }
}

impl std::error::Error for ProtocolError {}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Http(e)
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<ProtocolError> for Error {
    fn from(e: ProtocolError) -> Self {
        Error::Protocol(e)
    }
}
