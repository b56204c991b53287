//! Shared error definitions for Covenant primitives.

use thiserror::Error;
use uuid::Error as UuidError;

/// Result alias used throughout the primitives crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while constructing primitive types.
#[derive(Debug, Error)]
pub enum Error {
    /// The provided audit identifier could not be parsed.
    #[error("invalid audit id: {source}")]
    InvalidAuditId {
        /// Source parsing error from the UUID library.
        #[from]
        source: UuidError,
    },

    /// Identifier failed validation.
    #[error("invalid identifier `{id}`: {reason}")]
    InvalidIdentifier {
        /// The offending identifier string.
        id: String,
        /// Human-readable reason for rejection.
        reason: String,
    },

    /// Action definition failed validation.
    #[error("invalid action: {reason}")]
    InvalidAction {
        /// Human-readable reason for rejection.
        reason: String,
    },

    /// Constraint definition failed validation.
    #[error("invalid constraint: {reason}")]
    InvalidConstraint {
        /// Human-readable reason for rejection.
        reason: String,
    },

    /// Layer definition failed validation.
    #[error("invalid layer: {reason}")]
    InvalidLayer {
        /// Human-readable reason for rejection.
        reason: String,
    },
}
