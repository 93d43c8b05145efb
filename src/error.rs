//! Error types for peercache

use std::time::Duration;

use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while serving cache lookups.
///
/// The type is `Clone` because a single load result is handed to every
/// caller coalesced onto the same in-flight fetch.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Caller supplied an invalid argument (e.g. an empty key)
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The data source has no value for the key
    #[error("Key not found: {0}")]
    NotFound(String),

    /// The loader failed for a reason other than a missing key
    #[error("Loader failed: {0}")]
    Loader(String),

    // =========================================================================
    // Peer Errors
    // =========================================================================
    /// A peer was unreachable or answered with an error
    #[error("Remote fetch from {peer} failed: {reason}")]
    RemoteFetch { peer: String, reason: String },

    // =========================================================================
    // Coordination Errors
    // =========================================================================
    /// The operation did not finish before its deadline
    #[error("Operation on key {key} timed out after {after:?}")]
    Timeout { key: String, after: Duration },

    /// The caller that owned an in-flight load was cancelled before finishing
    #[error("In-flight load for key {0} was abandoned by its owner")]
    FlightAbandoned(String),

    /// API misuse (programming error)
    #[error("Misuse: {0}")]
    Misuse(String),

    // =========================================================================
    // Registry Errors
    // =========================================================================
    /// A group with the same name is already registered
    #[error("Group already exists: {0}")]
    GroupExists(String),

    /// No group with this name is registered
    #[error("Group not found: {0}")]
    GroupNotFound(String),

    // =========================================================================
    // Node Errors
    // =========================================================================
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Returns true if the error means the key does not exist at the source.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Internal(format!("I/O error: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::RemoteFetch {
            peer: "http://10.0.0.2:8001".to_string(),
            reason: "connection refused".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Remote fetch from http://10.0.0.2:8001 failed: connection refused"
        );
        assert_eq!(
            Error::InvalidArgument("key is required".into()).to_string(),
            "Invalid argument: key is required"
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::AddrInUse, "taken");
        let err: Error = io.into();
        assert!(matches!(err, Error::Internal(msg) if msg.contains("taken")));
    }

    #[test]
    fn test_is_not_found() {
        assert!(Error::NotFound("k".into()).is_not_found());
        assert!(!Error::Loader("boom".into()).is_not_found());
    }
}
