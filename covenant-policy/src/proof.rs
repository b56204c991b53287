//! Deterministic hash chain over an action and its evaluated layers.
//!
//! Preimages are RFC 8785 canonical JSON. Chain entries are
//! `action:<h0>`, one `<layer>:<hi>` per evaluated layer, and finally
//! `proof:<sha256(h0 || h1 || ... || hn)>` over the hex digests. Violation
//! timestamps are excluded so the chain depends only on the action and the
//! verdicts.

use covenant_primitives::{Action, ConstraintId, Severity, Violation, Warning};
use serde::Serialize;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::error::{EngineResult, EvaluationError};
use crate::layer::{ConstraintOutcome, LayerResult};

/// Prefix of the first chain entry.
pub const ACTION_PREFIX: &str = "action";
/// Prefix of the final chain entry.
pub const PROOF_PREFIX: &str = "proof";

#[derive(Serialize)]
struct CanonicalViolation<'a> {
    constraint_id: &'a str,
    description: &'a str,
    severity: Severity,
    confidence: f64,
    evidence: &'a Map<String, Value>,
    remediation: Option<&'a str>,
}

impl<'a> From<&'a Violation> for CanonicalViolation<'a> {
    fn from(v: &'a Violation) -> Self {
        Self {
            constraint_id: v.constraint_id(),
            description: v.description(),
            severity: v.severity(),
            confidence: v.confidence(),
            evidence: v.evidence(),
            remediation: v.remediation(),
        }
    }
}

#[derive(Serialize)]
struct CanonicalLayer<'a> {
    layer: &'a str,
    is_hard: bool,
    priority: i32,
    passed: bool,
    score: f64,
    violations: Vec<CanonicalViolation<'a>>,
    warnings: &'a [Warning],
    outcomes: &'a [ConstraintOutcome],
    exempted: &'a [ConstraintId],
}

impl<'a> From<&'a LayerResult> for CanonicalLayer<'a> {
    fn from(result: &'a LayerResult) -> Self {
        Self {
            layer: result.layer(),
            is_hard: result.is_hard(),
            priority: result.priority(),
            passed: result.passed(),
            score: result.score(),
            violations: result.violations().iter().map(CanonicalViolation::from).collect(),
            warnings: result.warnings(),
            outcomes: result.outcomes(),
            exempted: result.exempted(),
        }
    }
}

fn digest(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

fn canonical_digest<T: Serialize>(subject: &str, value: &T) -> EngineResult<String> {
    let canonical =
        serde_jcs::to_vec(value).map_err(|err| EvaluationError::Canonicalization {
            subject: subject.to_owned(),
            reason: err.to_string(),
        })?;
    Ok(digest(&canonical))
}

/// Builds the proof chain for an action and the layers evaluated for it.
///
/// # Errors
///
/// Returns [`EvaluationError::Canonicalization`] when a preimage cannot be
/// serialised, for instance because it contains a non-finite number.
pub fn generate_proof_chain(action: &Action, layers: &[LayerResult]) -> EngineResult<Vec<String>> {
    let mut digests = Vec::with_capacity(layers.len() + 1);
    let mut chain = Vec::with_capacity(layers.len() + 2);

    let h0 = canonical_digest("action", action)?;
    chain.push(format!("{ACTION_PREFIX}:{h0}"));
    digests.push(h0);

    for result in layers {
        let hi = canonical_digest(
            &format!("layer `{}`", result.layer()),
            &CanonicalLayer::from(result),
        )?;
        chain.push(format!("{}:{hi}", result.layer()));
        digests.push(hi);
    }

    chain.push(format!("{PROOF_PREFIX}:{}", digest(digests.concat().as_bytes())));
    Ok(chain)
}

/// Recomputes the chain and compares it with `chain`.
///
/// # Errors
///
/// Returns [`EvaluationError::Canonicalization`] when the inputs cannot be
/// serialised.
pub fn verify_proof_chain(
    action: &Action,
    layers: &[LayerResult],
    chain: &[String],
) -> EngineResult<bool> {
    Ok(generate_proof_chain(action, layers)? == chain)
}
