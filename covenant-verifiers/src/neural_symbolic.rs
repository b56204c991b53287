//! Weighted blend of a learned score and the symbolic rules.

use std::sync::Arc;

use async_trait::async_trait;
use covenant_primitives::{Action, Constraint, VerificationMethod};
use serde_json::{Map, Value, json};

use crate::symbolic::{Features, apply_rules};
use crate::traits::{Assessment, Verifier, VerifierError, VerifierResult, unit_interval};

/// Source of the learned half of the blend.
pub trait ScoreModel: Send + Sync {
    /// Scores the extracted features in `[0, 1]`.
    fn score(&self, features: &Features) -> f64;
}

/// Feature heuristic used when no trained model is plugged in.
#[derive(Clone, Copy, Debug, Default)]
pub struct FeatureHeuristicModel;

impl ScoreModel for FeatureHeuristicModel {
    fn score(&self, features: &Features) -> f64 {
        let mut score = 0.8;
        if features.has_consent {
            score += 0.1;
        }
        if features.is_highly_sensitive() {
            score -= 0.2;
        }
        if features.risk_level > 0.7 {
            score -= 0.3;
        }
        unit_interval(score)
    }
}

/// Verifier blending [`ScoreModel`] output with [`apply_rules`].
pub struct NeuralSymbolicVerifier {
    model: Arc<dyn ScoreModel>,
    neural_weight: f64,
    symbolic_weight: f64,
}

impl NeuralSymbolicVerifier {
    /// Creates a verifier with explicit blend weights.
    ///
    /// # Errors
    ///
    /// Returns [`VerifierError::InvalidSettings`] unless both weights are
    /// finite, non-negative, and sum to one.
    pub fn new(
        model: Arc<dyn ScoreModel>,
        neural_weight: f64,
        symbolic_weight: f64,
    ) -> VerifierResult<Self> {
        let valid = |w: f64| w.is_finite() && w >= 0.0;
        if !valid(neural_weight)
            || !valid(symbolic_weight)
            || (neural_weight + symbolic_weight - 1.0).abs() > 1e-9
        {
            return Err(VerifierError::InvalidSettings {
                reason: format!(
                    "blend weights must be non-negative and sum to 1, got {neural_weight} + {symbolic_weight}"
                ),
            });
        }
        Ok(Self {
            model,
            neural_weight,
            symbolic_weight,
        })
    }
}

impl Default for NeuralSymbolicVerifier {
    fn default() -> Self {
        Self {
            model: Arc::new(FeatureHeuristicModel),
            neural_weight: 0.6,
            symbolic_weight: 0.4,
        }
    }
}

impl std::fmt::Debug for NeuralSymbolicVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NeuralSymbolicVerifier")
            .field("neural_weight", &self.neural_weight)
            .field("symbolic_weight", &self.symbolic_weight)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Verifier for NeuralSymbolicVerifier {
    fn method(&self) -> VerificationMethod {
        VerificationMethod::NeuralSymbolic
    }

    async fn assess(&self, constraint: &Constraint, action: &Action) -> VerifierResult<Assessment> {
        let features = Features::extract(action);
        let learned = unit_interval(self.model.score(&features));
        let rules = apply_rules(constraint, action, &features)?;
        let combined =
            unit_interval(self.neural_weight * learned + self.symbolic_weight * rules.score);
        let confidence = if rules.undetermined {
            combined * 0.5
        } else {
            combined
        };

        let mut explanation = Map::new();
        explanation.insert("neural_score".into(), json!(learned));
        explanation.insert("symbolic_score".into(), json!(rules.score));
        explanation.insert("combined_score".into(), json!(combined));
        explanation.insert("confidence".into(), json!(confidence));
        explanation.insert(
            "features".into(),
            serde_json::to_value(&features).unwrap_or(Value::Null),
        );
        explanation.insert("reasoning_path".into(), json!(rules.reasoning_path));

        Ok(Assessment::scored(combined, explanation))
    }
}

#[cfg(test)]
mod tests {
    use covenant_primitives::{ConstraintDomain, ConstraintId};

    use super::*;

    fn constraint(domain: ConstraintDomain) -> Constraint {
        Constraint::builder(ConstraintId::new("user_consent").unwrap(), domain)
            .description("consent")
            .unwrap()
            .build()
            .unwrap()
    }

    fn score(assessment: &Assessment) -> f64 {
        match assessment {
            Assessment::Scored { score, .. } => *score,
            Assessment::Binary { .. } => panic!("expected scored form"),
        }
    }

    #[tokio::test]
    async fn benign_action_scores_high() {
        let verifier = NeuralSymbolicVerifier::default();
        let action = Action::builder("read").build().unwrap();
        let result = verifier
            .assess(&constraint(ConstraintDomain::Privacy), &action)
            .await
            .unwrap();
        // 0.6 * 0.8 + 0.4 * 1.0
        assert!((score(&result) - 0.88).abs() < 1e-9);
    }

    #[tokio::test]
    async fn sensitive_without_consent_scores_low() {
        let verifier = NeuralSymbolicVerifier::default();
        let action = Action::builder("read")
            .parameter("sensitivity", "high")
            .build()
            .unwrap();
        let result = verifier
            .assess(&constraint(ConstraintDomain::Privacy), &action)
            .await
            .unwrap();
        // 0.6 * 0.6 + 0.4 * 0.0
        assert!((score(&result) - 0.36).abs() < 1e-9);
        let Assessment::Scored { explanation, .. } = result else {
            unreachable!()
        };
        assert_eq!(explanation["features"]["data_sensitivity"], "high");
    }

    #[test]
    fn rejects_weights_not_summing_to_one() {
        let model: Arc<dyn ScoreModel> = Arc::new(FeatureHeuristicModel);
        assert!(NeuralSymbolicVerifier::new(model.clone(), 0.5, 0.4).is_err());
        assert!(NeuralSymbolicVerifier::new(model.clone(), -0.2, 1.2).is_err());
        assert!(NeuralSymbolicVerifier::new(model, 0.7, 0.3).is_ok());
    }
}
