//! Evaluation of one layer's constraints.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use covenant_primitives::{
    Action, Constraint, ConstraintId, Layer, Severity, VerificationMethod, Violation, Warning,
};
use covenant_verifiers::expr::{Expr, Truth};
use covenant_verifiers::{Assessment, VerifierError, VerifierRegistry, VerifierResult};
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::time::Instant;
use tracing::{debug, warn};

/// Normalised answer for one constraint.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConstraintOutcome {
    /// Constraint that was assessed.
    pub constraint_id: ConstraintId,
    /// Method tag that was dispatched.
    pub method: VerificationMethod,
    /// Whether the constraint holds.
    pub satisfied: bool,
    /// Score in `[0, 1]`.
    pub score: f64,
    /// Confidence in `[0, 1]`.
    pub confidence: f64,
    /// Whether an exemption applied.
    #[serde(default)]
    pub exempted: bool,
    /// Explanation returned by scoring verifiers.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub explanation: Map<String, Value>,
    /// Verifier failure that was recovered as unsatisfied.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ConstraintOutcome {
    fn exempt(constraint: &Constraint) -> Self {
        Self {
            constraint_id: constraint.id().clone(),
            method: constraint.method(),
            satisfied: true,
            score: 1.0,
            confidence: 1.0,
            exempted: true,
            explanation: Map::new(),
            error: None,
        }
    }

    fn failed(constraint: &Constraint, error: &VerifierError) -> Self {
        Self {
            constraint_id: constraint.id().clone(),
            method: constraint.method(),
            satisfied: false,
            score: 0.0,
            confidence: 0.0,
            exempted: false,
            explanation: Map::new(),
            error: Some(error.to_string()),
        }
    }

    fn from_assessment(constraint: &Constraint, assessment: Assessment) -> Self {
        let (satisfied, score, confidence, explanation) = match assessment {
            Assessment::Binary {
                satisfied,
                confidence,
            } => (satisfied, if satisfied { 1.0 } else { 0.0 }, confidence, Map::new()),
            Assessment::Scored { score, explanation } => {
                let confidence = explanation
                    .get("confidence")
                    .and_then(Value::as_f64)
                    .map_or(score, covenant_verifiers::traits::unit_interval);
                (score >= constraint.threshold(), score, confidence, explanation)
            }
        };
        Self {
            constraint_id: constraint.id().clone(),
            method: constraint.method(),
            satisfied,
            score,
            confidence,
            exempted: false,
            explanation,
            error: None,
        }
    }
}

/// Outcome of evaluating one layer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LayerResult {
    layer: String,
    is_hard: bool,
    priority: i32,
    passed: bool,
    score: f64,
    violations: Vec<Violation>,
    warnings: Vec<Warning>,
    outcomes: Vec<ConstraintOutcome>,
    exempted: Vec<ConstraintId>,
}

impl LayerResult {
    /// Returns the layer name.
    #[must_use]
    pub fn layer(&self) -> &str {
        &self.layer
    }

    /// Returns `true` when the layer is hard.
    #[must_use]
    pub const fn is_hard(&self) -> bool {
        self.is_hard
    }

    /// Returns the layer priority.
    #[must_use]
    pub const fn priority(&self) -> i32 {
        self.priority
    }

    /// Returns `true` when the layer does not gate the decision. Soft layers
    /// always pass.
    #[must_use]
    pub const fn passed(&self) -> bool {
        self.passed
    }

    /// Returns the mean weighted contribution, clamped into `[0, 1]`.
    #[must_use]
    pub const fn score(&self) -> f64 {
        self.score
    }

    /// Returns violations of hard constraints.
    #[must_use]
    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    /// Returns below-threshold soft constraints.
    #[must_use]
    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    /// Returns the per-constraint outcomes in evaluation order.
    #[must_use]
    pub fn outcomes(&self) -> &[ConstraintOutcome] {
        &self.outcomes
    }

    /// Returns constraints skipped because an exemption applied.
    #[must_use]
    pub fn exempted(&self) -> &[ConstraintId] {
        &self.exempted
    }

    /// Returns the number of constraints evaluated.
    #[must_use]
    pub fn constraint_count(&self) -> usize {
        self.outcomes.len()
    }
}

/// The evaluation deadline expired before the layer finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeadlineExceeded;

/// Dispatches each constraint of a layer to its verifier and aggregates the
/// answers.
#[derive(Debug, Clone)]
pub struct LayerEvaluator {
    verifiers: Arc<VerifierRegistry>,
    verifier_timeout: Duration,
}

impl LayerEvaluator {
    /// Creates an evaluator bounding each verifier call by `verifier_timeout`.
    #[must_use]
    pub fn new(verifiers: Arc<VerifierRegistry>, verifier_timeout: Duration) -> Self {
        Self {
            verifiers,
            verifier_timeout,
        }
    }

    /// Evaluates every constraint of `layer` against `action`.
    ///
    /// Verifier failures never escape: each becomes an unsatisfied outcome
    /// with confidence `0.0`.
    ///
    /// # Errors
    ///
    /// Returns [`DeadlineExceeded`] when `deadline` expires before every
    /// constraint was assessed; the partial layer is discarded.
    pub async fn evaluate(
        &self,
        layer: &Layer,
        action: &Action,
        deadline: Option<Instant>,
    ) -> Result<LayerResult, DeadlineExceeded> {
        let mut outcomes = Vec::with_capacity(layer.constraints().len());
        let mut violations = Vec::new();
        let mut warnings = Vec::new();
        let mut exempted = Vec::new();
        let mut contributions = 0.0;

        for constraint in layer.constraints() {
            let outcome = if is_exempt(constraint, action) {
                exempted.push(constraint.id().clone());
                ConstraintOutcome::exempt(constraint)
            } else {
                self.assess(constraint, action, deadline).await?
            };

            contributions += outcome.score * constraint.weight();

            if constraint.is_hard() && !outcome.satisfied {
                violations.push(violation(layer, constraint, &outcome));
            } else if !constraint.is_hard() && outcome.score < constraint.threshold() {
                warnings.push(Warning::new(
                    constraint.id().clone(),
                    constraint.description(),
                    outcome.score,
                    constraint.threshold(),
                ));
            }
            outcomes.push(outcome);
        }

        let score = if outcomes.is_empty() {
            0.0
        } else {
            #[allow(clippy::cast_precision_loss)]
            let count = outcomes.len() as f64;
            covenant_verifiers::traits::unit_interval(contributions / count)
        };
        let passed = violations.is_empty() || !layer.is_hard();

        debug!(
            layer = layer.name(),
            hard = layer.is_hard(),
            passed,
            score,
            violations = violations.len(),
            warnings = warnings.len(),
            "layer evaluated"
        );

        Ok(LayerResult {
            layer: layer.name().to_owned(),
            is_hard: layer.is_hard(),
            priority: layer.priority(),
            passed,
            score,
            violations,
            warnings,
            outcomes,
            exempted,
        })
    }

    async fn assess(
        &self,
        constraint: &Constraint,
        action: &Action,
        deadline: Option<Instant>,
    ) -> Result<ConstraintOutcome, DeadlineExceeded> {
        let (budget, deadline_bound) = match deadline {
            Some(deadline) => {
                let remaining = deadline.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    return Err(DeadlineExceeded);
                }
                (
                    remaining.min(self.verifier_timeout),
                    remaining < self.verifier_timeout,
                )
            }
            None => (self.verifier_timeout, false),
        };

        let answer = match tokio::time::timeout(budget, self.dispatch(constraint, action)).await {
            Ok(answer) => answer,
            Err(_) if deadline_bound => return Err(DeadlineExceeded),
            Err(_) => Err(VerifierError::Timeout { elapsed: budget }),
        };

        Ok(match answer.and_then(Assessment::validated) {
            Ok(assessment) => ConstraintOutcome::from_assessment(constraint, assessment),
            Err(err) => {
                warn!(
                    constraint = %constraint.id(),
                    method = %constraint.method(),
                    error = %err,
                    "verifier failed; constraint treated as unsatisfied"
                );
                ConstraintOutcome::failed(constraint, &err)
            }
        })
    }

    async fn dispatch(&self, constraint: &Constraint, action: &Action) -> VerifierResult<Assessment> {
        let verifier = self.verifiers.get(constraint.method())?;
        AssertUnwindSafe(verifier.assess(constraint, action))
            .catch_unwind()
            .await
            .unwrap_or_else(|payload| {
                Err(VerifierError::backend(format!(
                    "verifier panicked: {}",
                    panic_message(payload.as_ref())
                )))
            })
    }
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_owned())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic payload".to_owned())
}

fn is_exempt(constraint: &Constraint, action: &Action) -> bool {
    constraint.exemptions().iter().any(|source| {
        Expr::parse(source).is_ok_and(|expr| expr.evaluate(action) == Truth::True)
    })
}

fn violation(layer: &Layer, constraint: &Constraint, outcome: &ConstraintOutcome) -> Violation {
    let severity = if layer.is_hard() {
        Severity::Critical
    } else {
        Severity::High
    };
    let mut violation = Violation::new(
        constraint.id(),
        constraint.description(),
        severity,
        outcome.confidence,
    )
    .with_evidence("method", constraint.method().as_str())
    .with_evidence("score", outcome.score)
    .with_evidence("confidence", outcome.confidence);
    if let Some(error) = &outcome.error {
        violation = violation.with_evidence("error", error.as_str());
    }
    if let Some(remediation) = constraint.metadata_str("remediation") {
        violation = violation.with_remediation(remediation);
    }
    violation
}
