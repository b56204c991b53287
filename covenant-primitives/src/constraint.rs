//! Constraint descriptors evaluated by verifiers.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::ConstraintId;

const MAX_DESCRIPTION_LEN: usize = 512;
const DEFAULT_THRESHOLD: f64 = 0.7;

/// Domain a constraint protects.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintDomain {
    /// Physical or psychological harm.
    Safety,
    /// Ethical norms.
    Ethical,
    /// Statutory obligations.
    Legal,
    /// Personal data handling.
    Privacy,
    /// Equal treatment across groups.
    Fairness,
    /// Explainability of outcomes.
    Transparency,
    /// Traceable responsibility.
    Accountability,
    /// Behaviour under perturbation.
    Robustness,
    /// Access control and integrity.
    Security,
    /// Business rules.
    Business,
    /// Regulatory compliance.
    Compliance,
    /// Operational limits.
    Operational,
    /// Monetary limits.
    Financial,
    /// Environmental impact.
    Environmental,
    /// Social impact.
    Social,
}

impl ConstraintDomain {
    /// Returns the canonical tag string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Safety => "safety",
            Self::Ethical => "ethical",
            Self::Legal => "legal",
            Self::Privacy => "privacy",
            Self::Fairness => "fairness",
            Self::Transparency => "transparency",
            Self::Accountability => "accountability",
            Self::Robustness => "robustness",
            Self::Security => "security",
            Self::Business => "business",
            Self::Compliance => "compliance",
            Self::Operational => "operational",
            Self::Financial => "financial",
            Self::Environmental => "environmental",
            Self::Social => "social",
        }
    }
}

impl fmt::Display for ConstraintDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tag selecting which verifier evaluates a constraint.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationMethod {
    /// Deterministic check of a declarative boolean expression.
    Formal,
    /// Blend of a learned score and rule-based reasoning.
    #[serde(alias = "hybrid", alias = "neural")]
    NeuralSymbolic,
    /// Informational counterfactual estimate; never gates.
    Causal,
    /// Seeded bounded local search over weight/threshold configurations.
    #[serde(alias = "quantum")]
    HeuristicOptimizer,
    /// Sample-based bound checking.
    Statistical,
    /// Rule-based reasoning alone.
    Symbolic,
    /// Expression robustness under bounded perturbation.
    Certified,
}

impl VerificationMethod {
    /// Every method tag in lookup-table order.
    pub const ALL: [Self; 7] = [
        Self::Formal,
        Self::NeuralSymbolic,
        Self::Causal,
        Self::HeuristicOptimizer,
        Self::Statistical,
        Self::Symbolic,
        Self::Certified,
    ];

    /// Returns the canonical tag string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Formal => "formal",
            Self::NeuralSymbolic => "neural_symbolic",
            Self::Causal => "causal",
            Self::HeuristicOptimizer => "heuristic_optimizer",
            Self::Statistical => "statistical",
            Self::Symbolic => "symbolic",
            Self::Certified => "certified",
        }
    }
}

impl fmt::Display for VerificationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named rule, either hard (blocking) or soft (scored).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Constraint {
    id: ConstraintId,
    domain: ConstraintDomain,
    description: String,
    is_hard: bool,
    priority: i32,
    method: VerificationMethod,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    formal_spec: Option<String>,
    threshold: f64,
    weight: f64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    dependencies: Vec<ConstraintId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    exemptions: Vec<String>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    metadata: Map<String, Value>,
}

impl Constraint {
    /// Starts building a constraint descriptor.
    #[must_use]
    pub fn builder(id: ConstraintId, domain: ConstraintDomain) -> ConstraintBuilder {
        ConstraintBuilder {
            id,
            domain,
            description: None,
            is_hard: true,
            priority: 1,
            method: VerificationMethod::NeuralSymbolic,
            formal_spec: None,
            threshold: DEFAULT_THRESHOLD,
            weight: 1.0,
            dependencies: Vec::new(),
            exemptions: Vec::new(),
            metadata: Map::new(),
        }
    }

    /// Returns the unique constraint identifier.
    #[must_use]
    pub fn id(&self) -> &ConstraintId {
        &self.id
    }

    /// Returns the protected domain.
    #[must_use]
    pub const fn domain(&self) -> ConstraintDomain {
        self.domain
    }

    /// Returns the human-readable description.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Returns `true` when an unsatisfied evaluation records a violation.
    #[must_use]
    pub const fn is_hard(&self) -> bool {
        self.is_hard
    }

    /// Returns the ordering priority (higher first).
    #[must_use]
    pub const fn priority(&self) -> i32 {
        self.priority
    }

    /// Returns the verification method tag.
    #[must_use]
    pub const fn method(&self) -> VerificationMethod {
        self.method
    }

    /// Returns the optional declarative expression.
    #[must_use]
    pub fn formal_spec(&self) -> Option<&str> {
        self.formal_spec.as_deref()
    }

    /// Returns the satisfaction threshold in `[0, 1]`.
    #[must_use]
    pub const fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Returns the aggregation weight (always positive).
    #[must_use]
    pub const fn weight(&self) -> f64 {
        self.weight
    }

    /// Returns identifiers of constraints this one depends on.
    #[must_use]
    pub fn dependencies(&self) -> &[ConstraintId] {
        &self.dependencies
    }

    /// Returns exemption expressions.
    #[must_use]
    pub fn exemptions(&self) -> &[String] {
        &self.exemptions
    }

    /// Returns free-form metadata.
    #[must_use]
    pub fn metadata(&self) -> &Map<String, Value> {
        &self.metadata
    }

    /// Returns a metadata entry as a float, if present and numeric.
    #[must_use]
    pub fn metadata_f64(&self, key: &str) -> Option<f64> {
        self.metadata.get(key).and_then(Value::as_f64)
    }

    /// Returns a metadata entry as a string, if present.
    #[must_use]
    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(Value::as_str)
    }
}

/// Builder for [`Constraint`].
#[derive(Debug)]
pub struct ConstraintBuilder {
    id: ConstraintId,
    domain: ConstraintDomain,
    description: Option<String>,
    is_hard: bool,
    priority: i32,
    method: VerificationMethod,
    formal_spec: Option<String>,
    threshold: f64,
    weight: f64,
    dependencies: Vec<ConstraintId>,
    exemptions: Vec<String>,
    metadata: Map<String, Value>,
}

impl ConstraintBuilder {
    /// Sets the description.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConstraint`] if the description is empty or
    /// exceeds the maximum supported length.
    pub fn description(mut self, description: impl Into<String>) -> Result<Self> {
        let description = description.into();
        if description.trim().is_empty() {
            return Err(Error::InvalidConstraint {
                reason: "description cannot be empty".into(),
            });
        }
        if description.len() > MAX_DESCRIPTION_LEN {
            return Err(Error::InvalidConstraint {
                reason: format!("description length must be <= {MAX_DESCRIPTION_LEN}"),
            });
        }
        self.description = Some(description);
        Ok(self)
    }

    /// Marks the constraint hard (`true`) or soft (`false`).
    #[must_use]
    pub fn hard(mut self, is_hard: bool) -> Self {
        self.is_hard = is_hard;
        self
    }

    /// Sets the ordering priority.
    #[must_use]
    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Sets the verification method.
    #[must_use]
    pub fn method(mut self, method: VerificationMethod) -> Self {
        self.method = method;
        self
    }

    /// Sets the declarative expression.
    #[must_use]
    pub fn formal_spec(mut self, spec: impl Into<String>) -> Self {
        self.formal_spec = Some(spec.into());
        self
    }

    /// Sets the satisfaction threshold.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConstraint`] if the threshold is not finite or
    /// falls outside `[0, 1]`.
    pub fn threshold(mut self, threshold: f64) -> Result<Self> {
        if !threshold.is_finite() || !(0.0..=1.0).contains(&threshold) {
            return Err(Error::InvalidConstraint {
                reason: format!("threshold must lie in [0, 1], got {threshold}"),
            });
        }
        self.threshold = threshold;
        Ok(self)
    }

    /// Sets the aggregation weight.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConstraint`] if the weight is not a finite
    /// positive number.
    pub fn weight(mut self, weight: f64) -> Result<Self> {
        if !weight.is_finite() || weight <= 0.0 {
            return Err(Error::InvalidConstraint {
                reason: format!("weight must be positive, got {weight}"),
            });
        }
        self.weight = weight;
        Ok(self)
    }

    /// Adds a dependency on another constraint.
    #[must_use]
    pub fn depends_on(mut self, id: ConstraintId) -> Self {
        if !self.dependencies.contains(&id) {
            self.dependencies.push(id);
        }
        self
    }

    /// Adds an exemption expression.
    #[must_use]
    pub fn exemption(mut self, condition: impl Into<String>) -> Self {
        self.exemptions.push(condition.into());
        self
    }

    /// Adds a metadata entry.
    #[must_use]
    pub fn metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Finalises the constraint descriptor.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConstraint`] if the description is missing or
    /// the constraint depends on itself.
    pub fn build(self) -> Result<Constraint> {
        let description = self.description.ok_or_else(|| Error::InvalidConstraint {
            reason: "description must be provided".into(),
        })?;

        if self.dependencies.contains(&self.id) {
            return Err(Error::InvalidConstraint {
                reason: format!("constraint `{}` cannot depend on itself", self.id),
            });
        }

        Ok(Constraint {
            id: self.id,
            domain: self.domain,
            description,
            is_hard: self.is_hard,
            priority: self.priority,
            method: self.method,
            formal_spec: self.formal_spec,
            threshold: self.threshold,
            weight: self.weight,
            dependencies: self.dependencies,
            exemptions: self.exemptions,
            metadata: self.metadata,
        })
    }
}
