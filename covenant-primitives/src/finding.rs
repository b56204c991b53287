//! Violations and warnings recorded while evaluating constraints.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::ConstraintId;

/// Ordinal severity of a violation, from most to least severe.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    /// Informational only.
    Info = 1,
    /// Minor breach.
    Low = 2,
    /// Notable breach.
    Medium = 3,
    /// Breach of a hard constraint inside a soft layer.
    High = 4,
    /// Breach of a hard constraint inside a hard layer.
    Critical = 5,
}

/// Detected breach of a hard constraint.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    constraint_id: String,
    description: String,
    severity: Severity,
    confidence: f64,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    evidence: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    remediation: Option<String>,
    timestamp: DateTime<Utc>,
}

impl Violation {
    /// Creates a violation for the given constraint.
    ///
    /// `confidence` is clamped into `[0, 1]`; NaN becomes `0.0`.
    #[must_use]
    pub fn new(
        constraint_id: &ConstraintId,
        description: impl Into<String>,
        severity: Severity,
        confidence: f64,
    ) -> Self {
        Self::synthetic(constraint_id.as_str(), description, severity, confidence)
    }

    /// Creates a violation that is not tied to a registered constraint, such
    /// as an internal fault or an expired deadline.
    #[must_use]
    pub fn synthetic(
        source: impl Into<String>,
        description: impl Into<String>,
        severity: Severity,
        confidence: f64,
    ) -> Self {
        let confidence = if confidence.is_nan() {
            0.0
        } else {
            confidence.clamp(0.0, 1.0)
        };
        Self {
            constraint_id: source.into(),
            description: description.into(),
            severity,
            confidence,
            evidence: Map::new(),
            remediation: None,
            timestamp: Utc::now(),
        }
    }

    /// Attaches an evidence entry.
    #[must_use]
    pub fn with_evidence(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.evidence.insert(key.into(), value.into());
        self
    }

    /// Attaches remediation guidance.
    #[must_use]
    pub fn with_remediation(mut self, remediation: impl Into<String>) -> Self {
        self.remediation = Some(remediation.into());
        self
    }

    /// Returns the identifier of the violated constraint.
    #[must_use]
    pub fn constraint_id(&self) -> &str {
        &self.constraint_id
    }

    /// Returns the violation description.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Returns the severity.
    #[must_use]
    pub const fn severity(&self) -> Severity {
        self.severity
    }

    /// Returns the verifier confidence in `[0, 1]`.
    #[must_use]
    pub const fn confidence(&self) -> f64 {
        self.confidence
    }

    /// Returns the evidence map.
    #[must_use]
    pub fn evidence(&self) -> &Map<String, Value> {
        &self.evidence
    }

    /// Returns the optional remediation text.
    #[must_use]
    pub fn remediation(&self) -> Option<&str> {
        self.remediation.as_deref()
    }

    /// Returns when the violation was recorded.
    #[must_use]
    pub const fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// Below-threshold score of a soft constraint.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Warning {
    constraint_id: ConstraintId,
    description: String,
    score: f64,
    threshold: f64,
}

impl Warning {
    /// Creates a warning.
    #[must_use]
    pub fn new(
        constraint_id: ConstraintId,
        description: impl Into<String>,
        score: f64,
        threshold: f64,
    ) -> Self {
        Self {
            constraint_id,
            description: description.into(),
            score,
            threshold,
        }
    }

    /// Returns the identifier of the constraint that scored low.
    #[must_use]
    pub fn constraint_id(&self) -> &ConstraintId {
        &self.constraint_id
    }

    /// Returns the constraint description.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Returns the observed score.
    #[must_use]
    pub const fn score(&self) -> f64 {
        self.score
    }

    /// Returns the threshold the score fell below.
    #[must_use]
    pub const fn threshold(&self) -> f64 {
        self.threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_is_ordinal() {
        assert!(Severity::Critical > Severity::High);
        assert!(Severity::High > Severity::Medium);
        assert!(Severity::Medium > Severity::Low);
        assert!(Severity::Low > Severity::Info);
        assert_eq!(serde_json::to_string(&Severity::Critical).unwrap(), "\"CRITICAL\"");
    }

    #[test]
    fn violation_clamps_confidence() {
        let id = ConstraintId::new("c").unwrap();
        assert!((Violation::new(&id, "d", Severity::High, 3.0).confidence() - 1.0).abs() < 1e-12);
        assert!(Violation::new(&id, "d", Severity::High, f64::NAN).confidence().abs() < 1e-12);
    }
}
