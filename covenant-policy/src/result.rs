//! Immutable outcome of one evaluation.

use chrono::{DateTime, Utc};
use covenant_primitives::{ActionId, AuditId, Violation, Warning};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::layer::LayerResult;

/// Whether every enabled layer was evaluated.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Completion {
    /// The layer loop ran to its natural end or to a hard block.
    Complete,
    /// The deadline expired; the listed layers were never evaluated.
    Incomplete {
        /// Enabled layers left unevaluated, in priority order.
        skipped_layers: Vec<String>,
    },
}

impl Completion {
    /// Returns `true` for [`Completion::Incomplete`].
    #[must_use]
    pub const fn is_incomplete(&self) -> bool {
        matches!(self, Self::Incomplete { .. })
    }
}

/// Result returned for every evaluated action.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub(crate) action_id: ActionId,
    pub(crate) is_allowed: bool,
    pub(crate) overall_score: f64,
    pub(crate) violations: Vec<Violation>,
    pub(crate) warnings: Vec<Warning>,
    pub(crate) layer_results: Vec<LayerResult>,
    pub(crate) evaluation_time_ms: f64,
    pub(crate) completion: Completion,
    pub(crate) proof_chain: Vec<String>,
    pub(crate) audit_id: AuditId,
    pub(crate) metadata: Map<String, Value>,
    pub(crate) timestamp: DateTime<Utc>,
}

impl EvaluationResult {
    /// Returns the evaluated action's identifier.
    #[must_use]
    pub fn action_id(&self) -> &ActionId {
        &self.action_id
    }

    /// Returns `true` when the action may proceed.
    #[must_use]
    pub const fn is_allowed(&self) -> bool {
        self.is_allowed
    }

    /// Returns the product of soft-layer scores, in `[0, 1]`.
    #[must_use]
    pub const fn overall_score(&self) -> f64 {
        self.overall_score
    }

    /// Returns every violation, in evaluation order.
    #[must_use]
    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    /// Returns every warning, in evaluation order.
    #[must_use]
    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    /// Returns the results of the layers that were evaluated.
    #[must_use]
    pub fn layer_results(&self) -> &[LayerResult] {
        &self.layer_results
    }

    /// Returns the wall-clock latency in milliseconds.
    #[must_use]
    pub const fn evaluation_time_ms(&self) -> f64 {
        self.evaluation_time_ms
    }

    /// Returns whether every enabled layer was evaluated.
    #[must_use]
    pub const fn completion(&self) -> &Completion {
        &self.completion
    }

    /// Returns the proof chain; empty for results produced by a fault.
    #[must_use]
    pub fn proof_chain(&self) -> &[String] {
        &self.proof_chain
    }

    /// Returns the identifier under which the result may be audited.
    #[must_use]
    pub const fn audit_id(&self) -> AuditId {
        self.audit_id
    }

    /// Returns evaluation metadata (`layers_evaluated`, `hard_layer_count`,
    /// `soft_layer_count`, `final_state`).
    #[must_use]
    pub fn metadata(&self) -> &Map<String, Value> {
        &self.metadata
    }

    /// Returns when the evaluation finished.
    #[must_use]
    pub const fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}
