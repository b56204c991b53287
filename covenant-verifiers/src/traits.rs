//! Shared verifier trait and data structures.

use std::time::Duration;

use async_trait::async_trait;
use covenant_primitives::{Action, Constraint, VerificationMethod};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::expr::ExprError;

/// Result alias used by verifiers.
pub type VerifierResult<T> = Result<T, VerifierError>;

/// Error type shared by verifier implementations.
///
/// The layer evaluator never propagates these: each one is recovered as a
/// "not satisfied, confidence 0.0" outcome for the constraint at hand.
#[derive(Debug, Error)]
pub enum VerifierError {
    /// No verifier is registered for the requested method.
    #[error("no verifier registered for method `{method}`")]
    Unavailable {
        /// Method tag that could not be resolved.
        method: VerificationMethod,
    },

    /// The action lacks an input the verifier requires.
    #[error("missing verifier input: {reason}")]
    MissingInput {
        /// Description of the missing input.
        reason: String,
    },

    /// A declarative expression could not be parsed.
    #[error(transparent)]
    Expression(#[from] ExprError),

    /// The verifier did not answer within its time budget.
    #[error("verifier timed out after {elapsed:?}")]
    Timeout {
        /// Budget that elapsed.
        elapsed: Duration,
    },

    /// An external verification backend failed.
    #[error("verification backend failure: {reason}")]
    Backend {
        /// Human-readable explanation for logging and operators.
        reason: String,
    },

    /// The verifier produced a score or confidence outside `[0, 1]`.
    #[error("invalid assessment: {reason}")]
    InvalidAssessment {
        /// Description of the offending value.
        reason: String,
    },

    /// Verifier settings failed validation.
    #[error("invalid verifier settings: {reason}")]
    InvalidSettings {
        /// Description of the offending setting.
        reason: String,
    },
}

impl VerifierError {
    /// Convenience constructor for missing inputs.
    #[must_use]
    pub fn missing_input(reason: impl Into<String>) -> Self {
        Self::MissingInput {
            reason: reason.into(),
        }
    }

    /// Convenience constructor for backend failures.
    #[must_use]
    pub fn backend(reason: impl Into<String>) -> Self {
        Self::Backend {
            reason: reason.into(),
        }
    }
}

/// Answer produced by a verifier for one constraint and one action.
///
/// A verifier exposes either the binary form or the scoring form.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "form", rename_all = "snake_case")]
pub enum Assessment {
    /// Satisfied or not, with a confidence in `[0, 1]`.
    Binary {
        /// Whether the constraint holds.
        satisfied: bool,
        /// Confidence in the verdict.
        confidence: f64,
    },
    /// A score in `[0, 1]` with a structured explanation.
    Scored {
        /// Degree to which the constraint holds.
        score: f64,
        /// Structured explanation of how the score was reached.
        #[serde(default)]
        explanation: Map<String, Value>,
    },
}

impl Assessment {
    /// Shorthand for a binary verdict.
    #[must_use]
    pub const fn binary(satisfied: bool, confidence: f64) -> Self {
        Self::Binary {
            satisfied,
            confidence,
        }
    }

    /// Shorthand for a scored verdict.
    #[must_use]
    pub fn scored(score: f64, explanation: Map<String, Value>) -> Self {
        Self::Scored { score, explanation }
    }

    /// Rejects NaN and out-of-range numbers.
    ///
    /// # Errors
    ///
    /// Returns [`VerifierError::InvalidAssessment`] when the confidence or
    /// score does not lie in `[0, 1]`.
    pub fn validated(self) -> VerifierResult<Self> {
        let (label, value) = match &self {
            Self::Binary { confidence, .. } => ("confidence", *confidence),
            Self::Scored { score, .. } => ("score", *score),
        };
        if value.is_nan() || !(0.0..=1.0).contains(&value) {
            return Err(VerifierError::InvalidAssessment {
                reason: format!("{label} must lie in [0, 1], got {value}"),
            });
        }
        Ok(self)
    }
}

/// Capability implemented by every verification strategy.
#[async_trait]
pub trait Verifier: Send + Sync {
    /// Returns the method tag this verifier answers for.
    fn method(&self) -> VerificationMethod;

    /// Assesses `constraint` against `action`.
    async fn assess(&self, constraint: &Constraint, action: &Action) -> VerifierResult<Assessment>;
}

/// Clamps a value into `[0, 1]`, mapping NaN to `0.0`.
#[must_use]
pub fn unit_interval(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}
