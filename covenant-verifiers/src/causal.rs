//! Informational counterfactual estimates.
//!
//! The causal verifier never gates an evaluation: it always scores `1.0`
//! and carries its analysis in the explanation.

use async_trait::async_trait;
use covenant_primitives::{Action, Constraint, VerificationMethod};
use serde_json::{Map, Value, json};

use crate::traits::{Assessment, Verifier, VerifierResult};

const MAX_COUNTERFACTUALS: usize = 3;
const CONFIDENCE: f64 = 0.85;

/// Estimates how strongly the action's parameters drive its outcome.
#[derive(Clone, Copy, Debug, Default)]
pub struct CausalVerifier;

fn magnitude(value: &Value) -> Option<f64> {
    match value {
        Value::Bool(true) => Some(1.0),
        Value::Bool(false) => Some(0.0),
        Value::Number(n) => n.as_f64().map(|v| v.abs() / (1.0 + v.abs())),
        Value::String(_) => Some(0.5),
        _ => None,
    }
}

fn alternative(value: &Value) -> Value {
    match value {
        Value::Bool(b) => Value::Bool(!b),
        Value::Number(n) => n.as_f64().map_or(Value::Null, |v| json!(v * 0.5)),
        Value::String(s) => Value::String(format!("not_{s}")),
        other => Value::String(format!("not_{other}")),
    }
}

/// Mean parameter magnitude, `0.0` when nothing is measurable.
fn effect_estimate(parameters: &Map<String, Value>) -> f64 {
    let magnitudes: Vec<f64> = parameters.values().filter_map(magnitude).collect();
    if magnitudes.is_empty() {
        return 0.0;
    }
    #[allow(clippy::cast_precision_loss)]
    let count = magnitudes.len() as f64;
    magnitudes.iter().sum::<f64>() / count
}

#[async_trait]
impl Verifier for CausalVerifier {
    fn method(&self) -> VerificationMethod {
        VerificationMethod::Causal
    }

    async fn assess(&self, constraint: &Constraint, action: &Action) -> VerifierResult<Assessment> {
        let parameters = action.parameters();
        let outcome = constraint
            .metadata_str("outcome")
            .unwrap_or_else(|| constraint.id().as_str());

        let direct_causes: Vec<&str> = std::iter::once(action.kind())
            .chain(parameters.keys().map(String::as_str))
            .collect();
        let predicted_effects = [
            outcome.to_owned(),
            format!("{outcome}_secondary"),
            format!("{outcome}_tertiary"),
        ];
        let counterfactuals: Vec<Value> = parameters
            .iter()
            .take(MAX_COUNTERFACTUALS)
            .map(|(name, value)| {
                json!({
                    "parameter": name,
                    "original": value,
                    "alternative": alternative(value),
                    "predicted_outcome": "different",
                })
            })
            .collect();

        let mut explanation = Map::new();
        explanation.insert("causal_effect".into(), json!(effect_estimate(parameters)));
        explanation.insert("direct_causes".into(), json!(direct_causes));
        explanation.insert("predicted_effects".into(), json!(predicted_effects));
        explanation.insert("counterfactuals".into(), Value::Array(counterfactuals));
        explanation.insert("confidence".into(), json!(CONFIDENCE));
        explanation.insert("informational".into(), Value::Bool(true));

        Ok(Assessment::scored(1.0, explanation))
    }
}

#[cfg(test)]
mod tests {
    use covenant_primitives::{ConstraintDomain, ConstraintId};

    use super::*;

    #[tokio::test]
    async fn always_scores_one_with_analysis() {
        let constraint =
            Constraint::builder(ConstraintId::new("impact").unwrap(), ConstraintDomain::Social)
                .description("impact analysis")
                .unwrap()
                .method(VerificationMethod::Causal)
                .build()
                .unwrap();
        let action = Action::builder("publish")
            .parameter("a", true)
            .parameter("b", 3)
            .parameter("c", "x")
            .parameter("d", false)
            .build()
            .unwrap();

        let Assessment::Scored { score, explanation } =
            CausalVerifier.assess(&constraint, &action).await.unwrap()
        else {
            panic!("expected scored form")
        };
        assert!((score - 1.0).abs() < f64::EPSILON);
        assert_eq!(explanation["counterfactuals"].as_array().unwrap().len(), 3);
        assert_eq!(explanation["direct_causes"][0], "publish");
        assert_eq!(explanation["predicted_effects"][1], "impact_secondary");
        // (1 + 0.75 + 0.5 + 0) / 4
        assert!((explanation["causal_effect"].as_f64().unwrap() - 0.5625).abs() < 1e-9);
    }

    #[test]
    fn alternatives() {
        assert_eq!(alternative(&json!(true)), json!(false));
        assert_eq!(alternative(&json!(4)), json!(2.0));
        assert_eq!(alternative(&json!("open")), json!("not_open"));
    }
}
