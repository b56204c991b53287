//! Error types for audit persistence.

use serde_json::Error as SerdeError;
use thiserror::Error;

/// Errors emitted by audit logs.
#[derive(Debug, Error)]
pub enum AuditError {
    /// The provided configuration was invalid.
    #[error("invalid audit configuration: {0}")]
    InvalidConfig(&'static str),
    /// Underlying I/O failure while reading or writing log files.
    #[error("i/o error: {source}")]
    Io {
        /// Source [`std::io::Error`].
        #[from]
        source: std::io::Error,
    },
    /// Serialization or deserialization error.
    #[error("serialization error: {source}")]
    Serialization {
        /// Source [`serde_json::Error`].
        #[from]
        source: SerdeError,
    },
    /// A record could not be brought into canonical form for hashing.
    #[error("canonicalization failed: {reason}")]
    Canonicalization {
        /// Human-readable reason describing the failure.
        reason: String,
    },
    /// A stored entry does not match its digest or its predecessor.
    #[error("audit entry {sequence} failed verification: {reason}")]
    Tampered {
        /// Position of the offending entry.
        sequence: u64,
        /// Human-readable reason describing the failure.
        reason: String,
    },
}

/// Convenience result alias for audit operations.
pub type AuditResult<T> = Result<T, AuditError>;
