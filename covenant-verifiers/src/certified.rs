//! Robustness of an expression under bounded parameter perturbation.

use async_trait::async_trait;
use covenant_primitives::{Action, Constraint, VerificationMethod};
use serde_json::{Map, Value};

use crate::expr::{Bindings, Expr, Truth};
use crate::traits::{Assessment, Verifier, VerifierError, VerifierResult};

/// Perturbation radius used when neither the constraint nor the settings
/// provide one.
pub const DEFAULT_EPSILON: f64 = 0.1;

/// Checks that the constraint's expression holds at the nominal inputs and
/// at `value ± epsilon` for every numeric parameter it references.
///
/// The verdict is satisfied only if every point holds; confidence is the
/// fraction of points that hold.
#[derive(Clone, Copy, Debug)]
pub struct CertifiedVerifier {
    epsilon: f64,
}

impl CertifiedVerifier {
    /// Creates a verifier with the given default radius.
    ///
    /// # Errors
    ///
    /// Returns [`VerifierError::InvalidSettings`] when `epsilon` is negative
    /// or not finite.
    pub fn new(epsilon: f64) -> VerifierResult<Self> {
        if !epsilon.is_finite() || epsilon < 0.0 {
            return Err(VerifierError::InvalidSettings {
                reason: format!("certified epsilon must be finite and >= 0, got {epsilon}"),
            });
        }
        Ok(Self { epsilon })
    }

    fn perturbations(&self, constraint: &Constraint, expr: &Expr, action: &Action) -> Vec<Map<String, Value>> {
        let epsilon = constraint
            .metadata_f64("epsilon")
            .filter(|e| e.is_finite() && *e >= 0.0)
            .unwrap_or(self.epsilon);
        let mut points = Vec::new();
        for name in expr.parameter_names() {
            let Some(value) = action.parameter(&name).and_then(Value::as_f64) else {
                continue;
            };
            for shifted in [value - epsilon, value + epsilon] {
                let Some(number) = serde_json::Number::from_f64(shifted) else {
                    continue;
                };
                let mut parameters = action.parameters().clone();
                parameters.insert(name.clone(), Value::Number(number));
                points.push(parameters);
            }
        }
        points
    }
}

impl Default for CertifiedVerifier {
    fn default() -> Self {
        Self {
            epsilon: DEFAULT_EPSILON,
        }
    }
}

#[async_trait]
impl Verifier for CertifiedVerifier {
    fn method(&self) -> VerificationMethod {
        VerificationMethod::Certified
    }

    async fn assess(&self, constraint: &Constraint, action: &Action) -> VerifierResult<Assessment> {
        let spec = constraint.formal_spec().ok_or_else(|| {
            VerifierError::missing_input(format!(
                "constraint `{}` has no expression to certify",
                constraint.id()
            ))
        })?;
        let expr = Expr::parse(spec)?;

        let mut total = 1_u32;
        let mut holding = u32::from(expr.evaluate(action) == Truth::True);
        for parameters in self.perturbations(constraint, &expr, action) {
            total += 1;
            let bindings = Bindings::with_parameters(action, &parameters);
            if expr.evaluate_with(&bindings) == Truth::True {
                holding += 1;
            }
        }

        let confidence = f64::from(holding) / f64::from(total);
        Ok(Assessment::binary(holding == total, confidence))
    }
}

#[cfg(test)]
mod tests {
    use covenant_primitives::{ConstraintDomain, ConstraintId};

    use super::*;

    fn constraint(spec: &str, epsilon: Option<f64>) -> Constraint {
        let mut builder =
            Constraint::builder(ConstraintId::new("robust").unwrap(), ConstraintDomain::Robustness)
                .description("robust bound")
                .unwrap()
                .method(VerificationMethod::Certified)
                .formal_spec(spec);
        if let Some(epsilon) = epsilon {
            builder = builder.metadata("epsilon", epsilon);
        }
        builder.build().unwrap()
    }

    #[tokio::test]
    async fn far_from_boundary_is_certified() {
        let action = Action::builder("set").parameter("x", 0.5).build().unwrap();
        let result = CertifiedVerifier::default()
            .assess(&constraint("x < 1", None), &action)
            .await
            .unwrap();
        assert_eq!(result, Assessment::binary(true, 1.0));
    }

    #[tokio::test]
    async fn near_boundary_fails_certification() {
        let action = Action::builder("set").parameter("x", 0.95).build().unwrap();
        let result = CertifiedVerifier::default()
            .assess(&constraint("x < 1", None), &action)
            .await
            .unwrap();
        let Assessment::Binary { satisfied, confidence } = result else {
            panic!("expected binary form")
        };
        assert!(!satisfied);
        assert!((confidence - 2.0 / 3.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn metadata_epsilon_overrides_default() {
        let action = Action::builder("set").parameter("x", 0.95).build().unwrap();
        let result = CertifiedVerifier::default()
            .assess(&constraint("x < 1", Some(0.01)), &action)
            .await
            .unwrap();
        assert_eq!(result, Assessment::binary(true, 1.0));
    }

    #[tokio::test]
    async fn missing_expression_is_an_error() {
        let c = Constraint::builder(ConstraintId::new("c").unwrap(), ConstraintDomain::Robustness)
            .description("d")
            .unwrap()
            .build()
            .unwrap();
        let action = Action::builder("set").build().unwrap();
        assert!(matches!(
            CertifiedVerifier::default().assess(&c, &action).await,
            Err(VerifierError::MissingInput { .. })
        ));
        assert!(CertifiedVerifier::new(-1.0).is_err());
    }
}
