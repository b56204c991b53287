//! Error taxonomy for configuration and evaluation.

use covenant_primitives::ConstraintId;
use covenant_verifiers::VerifierError;
use covenant_verifiers::expr::ExprError;
use thiserror::Error;

use crate::state::{EvaluationEvent, EvaluationState};

/// Result alias for registry mutations.
pub type ConfigurationResult<T> = Result<T, ConfigurationError>;

/// Result alias for orchestration internals.
pub type EngineResult<T> = Result<T, EvaluationError>;

/// Configuration change rejected before any state was mutated.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    /// A constraint with the same id is already registered.
    #[error("constraint `{id}` is already registered")]
    DuplicateConstraint {
        /// Offending identifier.
        id: ConstraintId,
    },

    /// A layer with the same name is already registered.
    #[error("layer `{name}` is already registered")]
    DuplicateLayer {
        /// Offending name.
        name: String,
    },

    /// No layer has the given name.
    #[error("unknown layer `{name}`")]
    UnknownLayer {
        /// Requested name.
        name: String,
    },

    /// No constraint has the given id.
    #[error("unknown constraint `{id}`")]
    UnknownConstraint {
        /// Requested identifier.
        id: ConstraintId,
    },

    /// A constraint depends on an id that is not registered.
    #[error("constraint `{constraint}` depends on unregistered constraint `{dependency}`")]
    UnknownDependency {
        /// Constraint declaring the dependency.
        constraint: ConstraintId,
        /// Missing dependency.
        dependency: ConstraintId,
    },

    /// A constraint cannot be removed while others depend on it.
    #[error("constraint `{id}` is still required by {dependents:?}")]
    DependencyInUse {
        /// Constraint being removed.
        id: ConstraintId,
        /// Constraints that depend on it.
        dependents: Vec<ConstraintId>,
    },

    /// Priority outside the accepted range.
    #[error("priority {priority} of {subject} is outside 0..=10000")]
    InvalidPriority {
        /// Layer or constraint carrying the priority.
        subject: String,
        /// Offending value.
        priority: i32,
    },

    /// A formal or exemption expression does not parse.
    #[error("constraint `{constraint}` carries an invalid expression: {source}")]
    InvalidExpression {
        /// Constraint carrying the expression.
        constraint: ConstraintId,
        /// Parse failure.
        #[source]
        source: ExprError,
    },

    /// A primitive failed validation.
    #[error(transparent)]
    Primitive(#[from] covenant_primitives::Error),

    /// Verifier settings failed validation.
    #[error("invalid verifier configuration: {0}")]
    Verifier(#[from] VerifierError),

    /// Engine settings failed validation.
    #[error("invalid engine settings: {reason}")]
    InvalidSettings {
        /// Description of the offending setting.
        reason: String,
    },

    /// A writer panicked while holding the configuration lock.
    #[error("constraint configuration lock poisoned")]
    Poisoned,
}

/// Unexpected fault during orchestration.
///
/// Never returned to callers of `evaluate`: the engine turns it into a
/// fail-closed result carrying a synthetic critical violation.
#[derive(Debug, Error)]
pub enum EvaluationError {
    /// The orchestrator attempted a transition its state machine forbids.
    #[error("invalid evaluation transition from {from:?} via {event:?}")]
    InvalidTransition {
        /// State before the attempted transition.
        from: EvaluationState,
        /// Event that was rejected.
        event: EvaluationEvent,
    },

    /// An action or layer result could not be canonicalised for hashing.
    #[error("failed to canonicalise {subject}: {reason}")]
    Canonicalization {
        /// What was being canonicalised.
        subject: String,
        /// Serializer message.
        reason: String,
    },

    /// A writer panicked while holding the configuration lock.
    #[error("constraint configuration lock poisoned")]
    ConfigurationPoisoned,

    /// A panic escaped per-constraint recovery.
    #[error("evaluation panicked: {reason}")]
    Panicked {
        /// Panic payload, when it was a string.
        reason: String,
    },
}
