//! Deterministic checking of declarative expressions.

use async_trait::async_trait;
use covenant_primitives::{Action, Constraint, VerificationMethod};

use crate::expr::{Expr, Truth};
use crate::traits::{Assessment, Verifier, VerifierResult};

/// Evaluates the constraint's `formal_spec` against the action.
///
/// A constraint without an expression has nothing to prove and is reported
/// satisfied. An undecidable expression is reported unsatisfied with
/// confidence `0.5`.
#[derive(Clone, Copy, Debug, Default)]
pub struct FormalVerifier;

#[async_trait]
impl Verifier for FormalVerifier {
    fn method(&self) -> VerificationMethod {
        VerificationMethod::Formal
    }

    async fn assess(&self, constraint: &Constraint, action: &Action) -> VerifierResult<Assessment> {
        let Some(spec) = constraint.formal_spec() else {
            return Ok(Assessment::binary(true, 1.0));
        };
        Ok(match Expr::parse(spec)?.evaluate(action) {
            Truth::True => Assessment::binary(true, 1.0),
            Truth::False => Assessment::binary(false, 1.0),
            Truth::Unknown => Assessment::binary(false, 0.5),
        })
    }
}

#[cfg(test)]
mod tests {
    use covenant_primitives::{ConstraintDomain, ConstraintId};

    use super::*;
    use crate::VerifierError;

    fn constraint(spec: Option<&str>) -> Constraint {
        let mut builder =
            Constraint::builder(ConstraintId::new("bounds").unwrap(), ConstraintDomain::Safety)
                .description("value in bounds")
                .unwrap()
                .method(VerificationMethod::Formal);
        if let Some(spec) = spec {
            builder = builder.formal_spec(spec);
        }
        builder.build().unwrap()
    }

    #[tokio::test]
    async fn three_outcomes() {
        let c = constraint(Some("value >= 0 && value <= 100"));
        let inside = Action::builder("set").parameter("value", 50).build().unwrap();
        let outside = Action::builder("set").parameter("value", 150).build().unwrap();
        let missing = Action::builder("set").build().unwrap();

        assert_eq!(
            FormalVerifier.assess(&c, &inside).await.unwrap(),
            Assessment::binary(true, 1.0)
        );
        assert_eq!(
            FormalVerifier.assess(&c, &outside).await.unwrap(),
            Assessment::binary(false, 1.0)
        );
        assert_eq!(
            FormalVerifier.assess(&c, &missing).await.unwrap(),
            Assessment::binary(false, 0.5)
        );
    }

    #[tokio::test]
    async fn no_expression_is_satisfied() {
        let action = Action::builder("noop").build().unwrap();
        assert_eq!(
            FormalVerifier.assess(&constraint(None), &action).await.unwrap(),
            Assessment::binary(true, 1.0)
        );
    }

    #[tokio::test]
    async fn malformed_expression_errors() {
        let action = Action::builder("noop").build().unwrap();
        let err = FormalVerifier
            .assess(&constraint(Some("value >=")), &action)
            .await
            .unwrap_err();
        assert!(matches!(err, VerifierError::Expression(_)));
    }
}
