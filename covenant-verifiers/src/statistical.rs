//! Sample-based bound checking.

use async_trait::async_trait;
use covenant_primitives::{Action, Constraint, VerificationMethod};
use serde_json::Value;

use crate::traits::{Assessment, Verifier, VerifierError, VerifierResult};

const DEFAULT_SAMPLE_PARAMETER: &str = "samples";

/// Counts how many samples fall inside `[lower, upper]`.
///
/// The samples come from the parameter named by the constraint's `sample`
/// metadata entry (default `samples`); the bounds from `lower` and `upper`,
/// each unbounded when absent. The constraint holds when the in-bounds
/// fraction reaches its threshold.
#[derive(Clone, Copy, Debug, Default)]
pub struct StatisticalVerifier;

#[async_trait]
impl Verifier for StatisticalVerifier {
    fn method(&self) -> VerificationMethod {
        VerificationMethod::Statistical
    }

    async fn assess(&self, constraint: &Constraint, action: &Action) -> VerifierResult<Assessment> {
        let name = constraint
            .metadata_str("sample")
            .unwrap_or(DEFAULT_SAMPLE_PARAMETER);
        let samples = action
            .parameter(name)
            .and_then(Value::as_array)
            .ok_or_else(|| VerifierError::missing_input(format!("parameter `{name}` is not a sample array")))?;
        if samples.is_empty() {
            return Err(VerifierError::missing_input(format!(
                "parameter `{name}` holds no samples"
            )));
        }

        let lower = constraint.metadata_f64("lower").unwrap_or(f64::NEG_INFINITY);
        let upper = constraint.metadata_f64("upper").unwrap_or(f64::INFINITY);

        let mut inside = 0_u32;
        let mut total = 0_u32;
        for sample in samples {
            let value = sample.as_f64().ok_or_else(|| {
                VerifierError::missing_input(format!("parameter `{name}` holds a non-numeric sample"))
            })?;
            total += 1;
            if (lower..=upper).contains(&value) {
                inside += 1;
            }
        }

        let fraction = f64::from(inside) / f64::from(total);
        Ok(Assessment::binary(fraction >= constraint.threshold(), fraction))
    }
}

#[cfg(test)]
mod tests {
    use covenant_primitives::{ConstraintDomain, ConstraintId};
    use serde_json::json;

    use super::*;

    fn constraint() -> Constraint {
        Constraint::builder(ConstraintId::new("latency").unwrap(), ConstraintDomain::Operational)
            .description("latency within bounds")
            .unwrap()
            .method(VerificationMethod::Statistical)
            .threshold(0.75)
            .unwrap()
            .metadata("sample", "latencies")
            .metadata("lower", 0)
            .metadata("upper", 100)
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn fraction_against_threshold() {
        let ok = Action::builder("probe")
            .parameter("latencies", json!([10, 20, 30, 400]))
            .build()
            .unwrap();
        assert_eq!(
            StatisticalVerifier.assess(&constraint(), &ok).await.unwrap(),
            Assessment::binary(true, 0.75)
        );

        let bad = Action::builder("probe")
            .parameter("latencies", json!([10, 200, 300, 400]))
            .build()
            .unwrap();
        assert_eq!(
            StatisticalVerifier.assess(&constraint(), &bad).await.unwrap(),
            Assessment::binary(false, 0.25)
        );
    }

    #[tokio::test]
    async fn missing_or_malformed_samples() {
        for params in [json!({}), json!({ "latencies": [] }), json!({ "latencies": ["x"] })] {
            let Value::Object(map) = params else { unreachable!() };
            let action = Action::builder("probe").parameters(map).build().unwrap();
            assert!(matches!(
                StatisticalVerifier.assess(&constraint(), &action).await,
                Err(VerifierError::MissingInput { .. })
            ));
        }
    }
}
