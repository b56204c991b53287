//! Rule-based symbolic reasoning over extracted action features.

use async_trait::async_trait;
use covenant_primitives::{Action, Constraint, ConstraintDomain, VerificationMethod};
use serde::Serialize;
use serde_json::Value;

use crate::expr::{Expr, Truth};
use crate::traits::{Assessment, Verifier, VerifierResult};

/// Risk above which a safety constraint is considered breached.
pub const SAFETY_RISK_LIMIT: f64 = 0.8;

/// Symbolic features read from an action.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Features {
    /// Action type.
    pub action_type: String,
    /// `context.consent`, `false` when absent or not a boolean.
    pub has_consent: bool,
    /// `parameters.sensitivity`, `"low"` when absent.
    pub data_sensitivity: String,
    /// `context.role`, `"user"` when absent.
    pub user_role: String,
    /// `parameters.risk`, `0.0` when absent or not numeric.
    pub risk_level: f64,
}

impl Features {
    /// Extracts the features of `action`.
    #[must_use]
    pub fn extract(action: &Action) -> Self {
        let text = |value: Option<&Value>, default: &str| {
            value
                .and_then(Value::as_str)
                .unwrap_or(default)
                .to_owned()
        };
        Self {
            action_type: action.kind().to_owned(),
            has_consent: action
                .context()
                .get("consent")
                .and_then(Value::as_bool)
                .unwrap_or(false),
            data_sensitivity: text(action.parameter("sensitivity"), "low"),
            user_role: text(action.context().get("role"), "user"),
            risk_level: action
                .parameter("risk")
                .and_then(Value::as_f64)
                .unwrap_or(0.0),
        }
    }

    /// Returns `true` when the data is marked highly sensitive.
    #[must_use]
    pub fn is_highly_sensitive(&self) -> bool {
        self.data_sensitivity == "high"
    }
}

/// Outcome of applying the symbolic rules to one constraint.
#[derive(Clone, Debug, PartialEq)]
pub struct RuleOutcome {
    /// `1.0` when no rule fired, `0.0` otherwise.
    pub score: f64,
    /// `true` when the constraint's expression could not be decided.
    pub undetermined: bool,
    /// Human-readable trace of the rules consulted.
    pub reasoning_path: Vec<String>,
}

/// Applies the domain rules and the constraint's expression, if any.
///
/// # Errors
///
/// Returns an expression error when the constraint's `formal_spec` does not
/// parse.
pub fn apply_rules(
    constraint: &Constraint,
    action: &Action,
    features: &Features,
) -> VerifierResult<RuleOutcome> {
    let mut score = 1.0;
    let mut undetermined = false;
    let mut path = vec![
        format!("evaluating {} constraint", constraint.domain()),
        format!("action type: {}", features.action_type),
        if features.has_consent {
            "user consent obtained".to_owned()
        } else {
            "no user consent".to_owned()
        },
    ];

    match constraint.domain() {
        ConstraintDomain::Privacy if !features.has_consent && features.is_highly_sensitive() => {
            score = 0.0;
            path.push("highly sensitive data accessed without consent".into());
        }
        ConstraintDomain::Safety if features.risk_level > SAFETY_RISK_LIMIT => {
            score = 0.0;
            path.push(format!(
                "risk {} exceeds safety limit {SAFETY_RISK_LIMIT}",
                features.risk_level
            ));
        }
        _ => {}
    }

    if let Some(spec) = constraint.formal_spec() {
        match Expr::parse(spec)?.evaluate(action) {
            Truth::True => path.push(format!("`{spec}` holds")),
            Truth::False => {
                score = 0.0;
                path.push(format!("`{spec}` does not hold"));
            }
            Truth::Unknown => {
                undetermined = true;
                path.push(format!("`{spec}` is undetermined"));
            }
        }
    }

    Ok(RuleOutcome {
        score,
        undetermined,
        reasoning_path: path,
    })
}

/// Verifier answering with the symbolic rule score alone.
#[derive(Clone, Copy, Debug, Default)]
pub struct SymbolicVerifier;

#[async_trait]
impl Verifier for SymbolicVerifier {
    fn method(&self) -> VerificationMethod {
        VerificationMethod::Symbolic
    }

    async fn assess(&self, constraint: &Constraint, action: &Action) -> VerifierResult<Assessment> {
        let features = Features::extract(action);
        let outcome = apply_rules(constraint, action, &features)?;
        let satisfied = outcome.score >= constraint.threshold();
        let confidence = if outcome.undetermined { 0.5 } else { 1.0 };
        Ok(Assessment::binary(satisfied, confidence))
    }
}
