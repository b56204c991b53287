//! Strongly typed configuration schema.
//!
//! Every section is optional and falls back to the engine defaults, so an
//! empty document describes an engine with no layers.

use std::num::NonZeroUsize;
use std::time::Duration;

use covenant_policy::EngineSettings;
use covenant_primitives::{
    Constraint, ConstraintDomain, ConstraintId, Layer, VerificationMethod,
};
use covenant_telemetry::AlertPolicy;
use covenant_telemetry::tracing_support::TracingSettings;
use covenant_verifiers::{OptimizerSettings, VerifierSettings};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{ConfigError, ConfigResult};

/// Root configuration document.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CovenantConfig {
    /// Built-in layer set registered before `layers`.
    pub preset: Option<String>,
    /// Orchestrator settings.
    pub engine: EngineSection,
    /// Built-in verifier settings.
    pub verifiers: VerifierSection,
    /// Tracing subscriber settings.
    pub telemetry: TracingSettings,
    /// Alert thresholds.
    pub alerts: AlertPolicy,
    /// Layers to register, in any order.
    pub layers: Vec<LayerSection>,
}

/// `[engine]` section.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineSection {
    /// Default evaluation deadline; unbounded when absent.
    pub deadline_ms: Option<u64>,
    /// Upper bound on a single verifier call.
    pub verifier_timeout_ms: u64,
    /// Concurrent evaluations allowed in a batch.
    pub max_concurrency: usize,
}

impl Default for EngineSection {
    fn default() -> Self {
        let defaults = EngineSettings::default();
        Self {
            deadline_ms: None,
            verifier_timeout_ms: u64::try_from(defaults.verifier_timeout.as_millis()).unwrap_or(u64::MAX),
            max_concurrency: defaults.max_concurrency.get(),
        }
    }
}

impl EngineSection {
    /// Converts the section into engine settings.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when a duration or the concurrency
    /// limit is zero.
    pub fn settings(&self) -> ConfigResult<EngineSettings> {
        if self.verifier_timeout_ms == 0 {
            return Err(ConfigError::Invalid("engine.verifier_timeout_ms must be non-zero".into()));
        }
        if self.deadline_ms == Some(0) {
            return Err(ConfigError::Invalid("engine.deadline_ms must be non-zero".into()));
        }
        let max_concurrency = NonZeroUsize::new(self.max_concurrency)
            .ok_or_else(|| ConfigError::Invalid("engine.max_concurrency must be non-zero".into()))?;
        Ok(EngineSettings {
            default_deadline: self.deadline_ms.map(Duration::from_millis),
            verifier_timeout: Duration::from_millis(self.verifier_timeout_ms),
            max_concurrency,
        })
    }
}

/// `[verifiers]` section.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VerifierSection {
    /// Weight of the learned score in the neural-symbolic blend.
    pub neural_weight: f64,
    /// Weight of the rule score in the neural-symbolic blend.
    pub symbolic_weight: f64,
    /// Base seed of the heuristic optimizer.
    pub optimizer_seed: u64,
    /// Generations run by the heuristic optimizer.
    pub optimizer_iterations: usize,
    /// Candidates per generation.
    pub optimizer_population: usize,
    /// Default perturbation radius for certified checks.
    pub certified_epsilon: f64,
    /// Cached assessments kept per verifier.
    pub cache_capacity: usize,
}

impl Default for VerifierSection {
    fn default() -> Self {
        let defaults = VerifierSettings::default();
        Self {
            neural_weight: defaults.neural_weight,
            symbolic_weight: defaults.symbolic_weight,
            optimizer_seed: defaults.optimizer.seed,
            optimizer_iterations: defaults.optimizer.iterations,
            optimizer_population: defaults.optimizer.population,
            certified_epsilon: defaults.certified_epsilon,
            cache_capacity: defaults.cache_capacity,
        }
    }
}

impl VerifierSection {
    /// Converts the section into verifier settings.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the weights do not sum to one or
    /// a bound is out of range.
    pub fn settings(&self) -> ConfigResult<VerifierSettings> {
        let settings = VerifierSettings {
            neural_weight: self.neural_weight,
            symbolic_weight: self.symbolic_weight,
            optimizer: OptimizerSettings {
                seed: self.optimizer_seed,
                iterations: self.optimizer_iterations,
                population: self.optimizer_population,
            },
            certified_epsilon: self.certified_epsilon,
            cache_capacity: self.cache_capacity,
        };
        settings
            .validate()
            .map_err(|err| ConfigError::Invalid(format!("verifiers: {err}")))?;
        Ok(settings)
    }
}

/// One `[[layers]]` entry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LayerSection {
    /// Unique layer name.
    pub name: String,
    /// Whether a failure blocks the action.
    #[serde(default)]
    pub is_hard: bool,
    /// Evaluation priority; higher runs first.
    #[serde(default = "default_priority")]
    pub priority: i32,
    /// Whether the layer takes part in evaluations.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Free-form layer metadata.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
    /// Constraints carried by the layer.
    #[serde(default)]
    pub constraints: Vec<ConstraintSection>,
}

impl LayerSection {
    /// Builds the layer and its constraints.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Primitive`] when the layer or one of its
    /// constraints fails validation.
    pub fn to_layer(&self) -> ConfigResult<Layer> {
        let mut layer = Layer::new(self.name.clone(), self.is_hard, self.priority)?
            .with_enabled(self.enabled);
        for (key, value) in &self.metadata {
            layer = layer.with_metadata(key.clone(), value.clone());
        }
        for constraint in &self.constraints {
            layer.add_constraint(constraint.to_constraint()?);
        }
        Ok(layer)
    }
}

/// One `[[layers.constraints]]` entry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConstraintSection {
    /// Unique constraint id.
    pub id: ConstraintId,
    /// Protected domain.
    pub domain: ConstraintDomain,
    /// Human-readable statement of the rule.
    pub description: String,
    /// Whether an unsatisfied verdict is a violation.
    #[serde(default = "default_true")]
    pub is_hard: bool,
    /// Ordering within the layer; higher runs first.
    #[serde(default = "default_priority")]
    pub priority: i32,
    /// Verifier selecting tag. Accepts `hybrid`, `neural` and `quantum`.
    #[serde(default = "default_method")]
    pub method: VerificationMethod,
    /// Boolean expression checked by expression-based verifiers.
    #[serde(default)]
    pub formal_spec: Option<String>,
    /// Minimum passing score for scored verdicts.
    #[serde(default)]
    pub threshold: Option<f64>,
    /// Contribution weight within the layer score.
    #[serde(default)]
    pub weight: Option<f64>,
    /// Constraints that must be registered first.
    #[serde(default)]
    pub dependencies: Vec<ConstraintId>,
    /// Expressions that exempt the constraint when true.
    #[serde(default)]
    pub exemptions: Vec<String>,
    /// Verifier-specific metadata.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

impl ConstraintSection {
    /// Builds the constraint.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Primitive`] when the description, threshold or
    /// weight is rejected.
    pub fn to_constraint(&self) -> ConfigResult<Constraint> {
        let mut builder = Constraint::builder(self.id.clone(), self.domain)
            .description(self.description.clone())?
            .hard(self.is_hard)
            .priority(self.priority)
            .method(self.method);
        if let Some(spec) = &self.formal_spec {
            builder = builder.formal_spec(spec.clone());
        }
        if let Some(threshold) = self.threshold {
            builder = builder.threshold(threshold)?;
        }
        if let Some(weight) = self.weight {
            builder = builder.weight(weight)?;
        }
        for dependency in &self.dependencies {
            builder = builder.depends_on(dependency.clone());
        }
        for exemption in &self.exemptions {
            builder = builder.exemption(exemption.clone());
        }
        for (key, value) in &self.metadata {
            builder = builder.metadata(key.clone(), value.clone());
        }
        Ok(builder.build()?)
    }
}

const fn default_true() -> bool {
    true
}

const fn default_priority() -> i32 {
    1
}

const fn default_method() -> VerificationMethod {
    VerificationMethod::NeuralSymbolic
}
