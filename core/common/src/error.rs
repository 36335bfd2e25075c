//! Common error types for AuthBackup.

use thiserror::Error;

/// Top-level error type for AuthBackup operations.
///
/// Authentication failures (HTTP 401, `invalid_grant`) are deliberately not
/// represented here: they change credential state and are reported to the
/// caller as `false` or a descriptive string.
#[derive(Debug, Error)]
pub enum Error {
    /// Remote endpoint unreachable or returned a body that is not JSON.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Well-formed response that lacks a field the caller relies on.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// A settings partition could not be read or written.
    #[error("Storage error: {0}")]
    Storage(String),

    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Invalid input provided.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Configuration missing or malformed.
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

/// Result type alias using the common Error.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::Transport("connection refused".to_string());
        assert_eq!(err.to_string(), "Transport error: connection refused");

        let err = Error::Protocol("missing access_token".to_string());
        assert_eq!(err.to_string(), "Protocol error: missing access_token");
    }

    #[test]
    fn test_serde_json_error_conversion() {
        let parse: std::result::Result<serde_json::Value, _> = serde_json::from_str("{");
        let err: Error = parse.unwrap_err().into();
        assert!(matches!(err, Error::Serialization(_)));
    }
}
