//! Core shared types for the Covenant constraint evaluation engine.

#![warn(missing_docs, clippy::pedantic)]

mod action;
mod constraint;
mod error;
mod finding;
mod ids;
mod layer;

/// Actions submitted for evaluation and their builder.
pub use action::{Action, ActionBuilder};
/// Constraint descriptors, verification method tags, and domains.
pub use constraint::{Constraint, ConstraintBuilder, ConstraintDomain, VerificationMethod};
/// Error type and result alias shared across the workspace.
pub use error::{Error, Result};
/// Violations, warnings, and severities emitted by evaluations.
pub use finding::{Severity, Violation, Warning};
/// Identifiers for actions, constraints, and audit records.
pub use ids::{ActionId, AuditId, ConstraintId};
/// Priority-ordered groups of constraints.
pub use layer::Layer;
