//! Orchestrating engine: runs layers in priority order and aggregates the
//! outcome.

use std::num::NonZeroUsize;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use covenant_primitives::{Action, AuditId, Constraint, ConstraintId, Layer, Severity, Violation};
use covenant_telemetry::{ComplianceReport, EvaluationSample, MetricsAggregator, MetricsSnapshot};
use covenant_verifiers::traits::unit_interval;
use covenant_verifiers::{VerifierRegistry, VerifierSettings};
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use serde_json::{Map, json};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::error::{ConfigurationError, ConfigurationResult, EngineResult};
use crate::fanout::{FanOut, FanOutResult};
use crate::layer::{LayerEvaluator, LayerResult, panic_message};
use crate::proof::generate_proof_chain;
use crate::registry::ConstraintRegistry;
use crate::result::{Completion, EvaluationResult};
use crate::state::{EvaluationEvent, EvaluationState, Orchestration};

/// Identifier of the synthetic violation attached to incomplete results.
pub const DEADLINE_EXCEEDED: &str = "deadline_exceeded";
/// Identifier of the synthetic violation attached to faulted results.
pub const SYSTEM_ERROR: &str = "system_error";

/// Engine-wide settings.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Deadline applied when the caller supplies none.
    pub default_deadline: Option<Duration>,
    /// Upper bound on any single verifier call.
    pub verifier_timeout: Duration,
    /// Maximum concurrent evaluations in a batch.
    pub max_concurrency: NonZeroUsize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            default_deadline: None,
            verifier_timeout: Duration::from_millis(100),
            max_concurrency: NonZeroUsize::MIN.saturating_add(31),
        }
    }
}

impl EngineSettings {
    /// Validates the settings.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::InvalidSettings`] when a duration is
    /// zero.
    pub fn validate(&self) -> ConfigurationResult<()> {
        if self.verifier_timeout.is_zero() {
            return Err(ConfigurationError::InvalidSettings {
                reason: "verifier timeout must be non-zero".into(),
            });
        }
        if self.default_deadline.is_some_and(|d| d.is_zero()) {
            return Err(ConfigurationError::InvalidSettings {
                reason: "default deadline must be non-zero".into(),
            });
        }
        Ok(())
    }
}

/// Per-call evaluation options.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EvaluationOptions {
    deadline: Option<Duration>,
}

impl EvaluationOptions {
    /// Bounds the evaluation by `deadline`, measured from the call.
    #[must_use]
    pub const fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Returns the requested deadline.
    #[must_use]
    pub const fn deadline(&self) -> Option<Duration> {
        self.deadline
    }
}

/// Builder for [`ConstitutionalEngine`].
#[derive(Debug, Default)]
pub struct EngineBuilder {
    settings: EngineSettings,
    verifier_settings: VerifierSettings,
    verifiers: Option<VerifierRegistry>,
    layers: Vec<Layer>,
}

impl EngineBuilder {
    /// Sets the engine settings.
    #[must_use]
    pub fn settings(mut self, settings: EngineSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Sets the settings of the built-in verifiers.
    #[must_use]
    pub fn verifier_settings(mut self, settings: VerifierSettings) -> Self {
        self.verifier_settings = settings;
        self
    }

    /// Replaces the built-in verifiers with a custom registry.
    #[must_use]
    pub fn verifiers(mut self, verifiers: VerifierRegistry) -> Self {
        self.verifiers = Some(verifiers);
        self
    }

    /// Adds a layer registered when the engine is built.
    #[must_use]
    pub fn layer(mut self, layer: Layer) -> Self {
        self.layers.push(layer);
        self
    }

    /// Builds the engine.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigurationError`] when the settings are invalid or a
    /// layer is rejected by the registry.
    pub fn build(self) -> ConfigurationResult<ConstitutionalEngine> {
        self.settings.validate()?;
        let verifiers = match self.verifiers {
            Some(verifiers) => verifiers,
            None => VerifierRegistry::with_defaults(&self.verifier_settings)?,
        };

        let engine = ConstitutionalEngine {
            registry: ConstraintRegistry::new(),
            evaluator: LayerEvaluator::new(Arc::new(verifiers), self.settings.verifier_timeout),
            metrics: MetricsAggregator::new(),
            fanout: FanOut::new(self.settings.max_concurrency),
            settings: self.settings,
        };
        for layer in self.layers {
            engine.add_layer(layer)?;
        }
        Ok(engine)
    }
}

/// Layered policy engine.
///
/// Evaluations run concurrently against a snapshot of the configuration
/// taken when they start; configuration changes apply to evaluations that
/// start afterwards.
#[derive(Debug)]
pub struct ConstitutionalEngine {
    registry: ConstraintRegistry,
    evaluator: LayerEvaluator,
    metrics: MetricsAggregator,
    fanout: FanOut,
    settings: EngineSettings,
}

struct Accumulated {
    results: Vec<LayerResult>,
    is_allowed: bool,
    overall_score: f64,
    skipped: Vec<String>,
    machine: Orchestration,
}

impl ConstitutionalEngine {
    /// Starts building an engine.
    #[must_use]
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    /// Returns the engine settings.
    #[must_use]
    pub const fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Returns the constraint registry.
    #[must_use]
    pub const fn registry(&self) -> &ConstraintRegistry {
        &self.registry
    }

    /// Registers a layer.
    ///
    /// # Errors
    ///
    /// See [`ConstraintRegistry::add_layer`].
    pub fn add_layer(&self, layer: Layer) -> ConfigurationResult<()> {
        let name = layer.name().to_owned();
        self.registry.add_layer(layer)?;
        self.metrics.register_layer(&name);
        Ok(())
    }

    /// Registers a constraint in the named layer, creating a soft layer when
    /// it does not exist.
    ///
    /// # Errors
    ///
    /// See [`ConstraintRegistry::add_constraint`].
    pub fn add_constraint(&self, constraint: Constraint, layer_name: &str) -> ConfigurationResult<()> {
        self.registry.add_constraint(constraint, layer_name)?;
        self.metrics.register_layer(layer_name);
        Ok(())
    }

    /// Removes a constraint.
    ///
    /// # Errors
    ///
    /// See [`ConstraintRegistry::remove_constraint`].
    pub fn remove_constraint(&self, id: &ConstraintId) -> ConfigurationResult<Constraint> {
        self.registry.remove_constraint(id)
    }

    /// Enables or disables a layer.
    ///
    /// # Errors
    ///
    /// See [`ConstraintRegistry::set_layer_enabled`].
    pub fn set_layer_enabled(&self, name: &str, enabled: bool) -> ConfigurationResult<()> {
        self.registry.set_layer_enabled(name, enabled)
    }

    /// Returns a snapshot of the rolling metrics.
    #[must_use]
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Builds a compliance report from the current metrics.
    #[must_use]
    pub fn compliance_report(&self, bundle: Option<&str>) -> ComplianceReport {
        ComplianceReport::from_snapshot(&self.metrics.snapshot(), bundle)
    }

    /// Evaluates an action under the default deadline.
    pub async fn evaluate(&self, action: &Action) -> EvaluationResult {
        self.evaluate_with(action, EvaluationOptions::default()).await
    }

    /// Evaluates an action.
    ///
    /// Never fails: internal faults are returned as a denial carrying a
    /// single critical `system_error` violation and an empty proof chain.
    pub async fn evaluate_with(&self, action: &Action, options: EvaluationOptions) -> EvaluationResult {
        let started = Instant::now();
        let deadline = options
            .deadline
            .or(self.settings.default_deadline)
            .map(|budget| started + budget);

        let outcome = AssertUnwindSafe(self.run(action, deadline))
            .catch_unwind()
            .await
            .unwrap_or_else(|payload| {
                Err(crate::error::EvaluationError::Panicked {
                    reason: panic_message(payload.as_ref()),
                })
            });

        let (result, faulted) = match outcome {
            Ok(result) => (result, false),
            Err(err) => {
                error!(action_id = %action.id(), error = %err, "evaluation fault; denying action");
                (fail_closed(action, &err.to_string(), started), true)
            }
        };

        self.metrics.record(sample(&result, faulted));
        info!(
            action_id = %result.action_id(),
            allowed = result.is_allowed(),
            score = result.overall_score(),
            latency_ms = result.evaluation_time_ms(),
            "evaluation finished"
        );
        result
    }

    /// Evaluates every action concurrently, bounded by
    /// [`EngineSettings::max_concurrency`].
    ///
    /// The output has one slot per input, in input order; a failed task
    /// occupies its own slot without affecting the others.
    pub async fn evaluate_batch(
        self: &Arc<Self>,
        actions: Vec<Action>,
    ) -> Vec<FanOutResult<EvaluationResult>> {
        debug!(batch = actions.len(), "evaluating batch");
        let tasks = actions.into_iter().map(|action| {
            let engine = Arc::clone(self);
            async move { engine.evaluate(&action).await }
        });
        self.fanout.join_all(tasks).await
    }

    async fn run(&self, action: &Action, deadline: Option<Instant>) -> EngineResult<EvaluationResult> {
        let started = Instant::now();
        let snapshot = self.registry.snapshot()?;
        let enabled: Vec<&Layer> = snapshot.iter().filter(|l| l.is_enabled()).collect();

        let mut acc = Accumulated {
            results: Vec::new(),
            is_allowed: true,
            overall_score: 1.0,
            skipped: Vec::new(),
            machine: Orchestration::new(),
        };

        self.run_layers(&enabled, action, deadline, &mut acc).await?;

        let mut violations: Vec<Violation> = acc
            .results
            .iter()
            .flat_map(|r| r.violations().iter().cloned())
            .collect();
        let warnings = acc
            .results
            .iter()
            .flat_map(|r| r.warnings().iter().cloned())
            .collect();

        let outcome = acc.machine.state();
        let completion = if outcome == EvaluationState::Incomplete {
            warn!(
                action_id = %action.id(),
                skipped = ?acc.skipped,
                "evaluation deadline exceeded"
            );
            acc.is_allowed = false;
            violations.push(
                Violation::synthetic(
                    DEADLINE_EXCEEDED,
                    "evaluation deadline expired before every layer was evaluated",
                    Severity::High,
                    1.0,
                )
                .with_evidence("skipped_layers", json!(acc.skipped)),
            );
            Completion::Incomplete {
                skipped_layers: acc.skipped,
            }
        } else {
            Completion::Complete
        };
        acc.machine.transition(EvaluationEvent::Seal)?;

        let proof_chain = generate_proof_chain(action, &acc.results)?;
        let hard_layers = acc.results.iter().filter(|r| r.is_hard()).count();

        let mut metadata = Map::new();
        metadata.insert("layers_evaluated".into(), json!(acc.results.len()));
        metadata.insert("hard_layer_count".into(), json!(hard_layers));
        metadata.insert("soft_layer_count".into(), json!(acc.results.len() - hard_layers));
        metadata.insert("final_state".into(), json!(outcome.label()));

        Ok(EvaluationResult {
            action_id: action.id().clone(),
            is_allowed: acc.is_allowed,
            overall_score: unit_interval(acc.overall_score),
            violations,
            warnings,
            layer_results: acc.results,
            evaluation_time_ms: elapsed_ms(started),
            completion,
            proof_chain,
            audit_id: AuditId::random(),
            metadata,
            timestamp: Utc::now(),
        })
    }

    async fn run_layers(
        &self,
        enabled: &[&Layer],
        action: &Action,
        deadline: Option<Instant>,
        acc: &mut Accumulated,
    ) -> EngineResult<()> {
        for (index, layer) in enabled.iter().enumerate() {
            if deadline.is_some_and(|d| Instant::now() >= d) {
                acc.skipped = enabled[index..].iter().map(|l| l.name().to_owned()).collect();
                acc.machine.transition(EvaluationEvent::DeadlineExceeded)?;
                return Ok(());
            }

            acc.machine.transition(EvaluationEvent::Enter(index))?;
            let Ok(result) = self.evaluator.evaluate(layer, action, deadline).await else {
                acc.skipped = enabled[index..].iter().map(|l| l.name().to_owned()).collect();
                acc.machine.transition(EvaluationEvent::DeadlineExceeded)?;
                return Ok(());
            };
            self.metrics.record_layer_invocation(layer.name());

            let blocked = result.is_hard() && !result.passed();
            if !result.is_hard() {
                acc.overall_score *= result.score();
            }
            acc.results.push(result);

            if blocked {
                acc.is_allowed = false;
                debug!(layer = layer.name(), "hard layer failed; short-circuiting");
                acc.machine.transition(EvaluationEvent::Blocked)?;
                return Ok(());
            }
            acc.machine.transition(EvaluationEvent::Passed)?;
        }
        acc.machine.transition(EvaluationEvent::Exhausted)?;
        Ok(())
    }
}

fn elapsed_ms(started: Instant) -> f64 {
    started.elapsed().as_secs_f64() * 1000.0
}

fn fail_closed(action: &Action, reason: &str, started: Instant) -> EvaluationResult {
    let final_state = Orchestration::new()
        .transition(EvaluationEvent::Fault)
        .unwrap_or(EvaluationState::Error);

    let mut metadata = Map::new();
    metadata.insert("layers_evaluated".into(), json!(0));
    metadata.insert("hard_layer_count".into(), json!(0));
    metadata.insert("soft_layer_count".into(), json!(0));
    metadata.insert("final_state".into(), json!(final_state.label()));
    metadata.insert("error".into(), json!(reason));

    EvaluationResult {
        action_id: action.id().clone(),
        is_allowed: false,
        overall_score: 0.0,
        violations: vec![Violation::synthetic(
            SYSTEM_ERROR,
            format!("internal evaluation fault: {reason}"),
            Severity::Critical,
            1.0,
        )],
        warnings: Vec::new(),
        layer_results: Vec::new(),
        evaluation_time_ms: elapsed_ms(started),
        completion: Completion::Complete,
        proof_chain: Vec::new(),
        audit_id: AuditId::random(),
        metadata,
        timestamp: Utc::now(),
    }
}

fn sample(result: &EvaluationResult, faulted: bool) -> EvaluationSample {
    let soft_violations: usize = result
        .layer_results()
        .iter()
        .filter(|r| !r.is_hard())
        .map(|r| r.violations().len())
        .sum();
    EvaluationSample {
        allowed: result.is_allowed(),
        score: result.overall_score(),
        latency_ms: result.evaluation_time_ms(),
        hard_blocked: result
            .layer_results()
            .last()
            .is_some_and(|r| r.is_hard() && !r.passed()),
        soft_violations: soft_violations as u64,
        warnings: result.warnings().len() as u64,
        incomplete: result.completion().is_incomplete(),
        error: faulted,
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use covenant_primitives::{ConstraintBuilder, ConstraintDomain, VerificationMethod};
    use covenant_verifiers::{Assessment, Verifier, VerifierResult};
    use serde_json::Map as JsonMap;

    use super::*;
    use crate::proof::verify_proof_chain;

    fn builder(id: &str) -> ConstraintBuilder {
        Constraint::builder(ConstraintId::new(id).unwrap(), ConstraintDomain::Safety)
            .description(format!("{id} holds"))
            .unwrap()
    }

    fn no_harm() -> Constraint {
        builder("no_harm")
            .method(VerificationMethod::Formal)
            .formal_spec("harm == 0")
            .build()
            .unwrap()
    }

    /// Scores every constraint with the number stored under its `score`
    /// metadata key.
    struct Fixed;

    #[async_trait]
    impl Verifier for Fixed {
        fn method(&self) -> VerificationMethod {
            VerificationMethod::Statistical
        }

        async fn assess(&self, constraint: &Constraint, _: &Action) -> VerifierResult<Assessment> {
            let score = constraint.metadata_f64("score").unwrap_or(1.0);
            Ok(Assessment::scored(score, JsonMap::new()))
        }
    }

    struct Stalling;

    #[async_trait]
    impl Verifier for Stalling {
        fn method(&self) -> VerificationMethod {
            VerificationMethod::Causal
        }

        async fn assess(&self, _: &Constraint, _: &Action) -> VerifierResult<Assessment> {
            tokio::time::sleep(Duration::from_secs(1)).await;
            Ok(Assessment::binary(true, 1.0))
        }
    }

    fn scored(id: &str, score: f64) -> Constraint {
        builder(id)
            .hard(false)
            .method(VerificationMethod::Statistical)
            .threshold(0.0)
            .unwrap()
            .metadata("score", score)
            .build()
            .unwrap()
    }

    fn custom_engine() -> ConstitutionalEngine {
        let mut verifiers = VerifierRegistry::with_defaults(&VerifierSettings::default()).unwrap();
        verifiers.register(Arc::new(Fixed));
        verifiers.register(Arc::new(Stalling));
        ConstitutionalEngine::builder()
            .settings(EngineSettings {
                verifier_timeout: Duration::from_secs(5),
                ..EngineSettings::default()
            })
            .verifiers(verifiers)
            .build()
            .unwrap()
    }

    fn harm(value: i64) -> Action {
        Action::builder("operate").parameter("harm", value).build().unwrap()
    }

    #[tokio::test]
    async fn empty_engine_allows_everything() {
        let engine = ConstitutionalEngine::builder().build().unwrap();
        let result = engine.evaluate(&harm(5)).await;
        assert!(result.is_allowed());
        assert!((result.overall_score() - 1.0).abs() < f64::EPSILON);
        assert!(result.violations().is_empty());
        assert_eq!(result.proof_chain().len(), 2);
        assert_eq!(result.metadata()["final_state"], "complete");
    }

    #[tokio::test]
    async fn hard_failure_short_circuits() {
        let engine = custom_engine();
        engine
            .add_layer(Layer::new("SafetyLayer", true, 10).unwrap().with_constraint(no_harm()))
            .unwrap();
        engine.add_constraint(scored("later", 0.5), "Business").unwrap();

        let action = harm(1);
        let result = engine.evaluate(&action).await;
        assert!(!result.is_allowed());
        assert_eq!(result.violations().len(), 1);
        assert_eq!(result.layer_results().len(), 1);
        assert_eq!(result.metadata()["final_state"], "hard_block");
        assert!((result.overall_score() - 1.0).abs() < f64::EPSILON);
        assert_eq!(result.proof_chain().len(), 3);
        assert!(verify_proof_chain(&action, result.layer_results(), result.proof_chain()).unwrap());

        let metrics = engine.metrics();
        assert_eq!(metrics.hard_violations, 1);
        assert_eq!(metrics.layer_invocations["SafetyLayer"], 1);
        assert_eq!(metrics.layer_invocations["Business"], 0);
    }

    #[tokio::test]
    async fn soft_layers_multiply_score() {
        let engine = custom_engine();
        engine.add_constraint(scored("a", 0.8), "Ethics").unwrap();
        engine.add_constraint(scored("b", 0.5), "Business").unwrap();

        let result = engine.evaluate(&harm(0)).await;
        assert!(result.is_allowed());
        assert!((result.overall_score() - 0.4).abs() < 1e-12);
        assert_eq!(result.metadata()["soft_layer_count"], 2);
    }

    #[tokio::test]
    async fn disabled_layers_are_skipped() {
        let engine = custom_engine();
        engine
            .add_layer(Layer::new("SafetyLayer", true, 10).unwrap().with_constraint(no_harm()))
            .unwrap();
        engine.set_layer_enabled("SafetyLayer", false).unwrap();
        let result = engine.evaluate(&harm(1)).await;
        assert!(result.is_allowed());
        assert!(result.layer_results().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_produces_incomplete_denial() {
        let engine = custom_engine();
        engine
            .add_constraint(
                builder("slow").method(VerificationMethod::Causal).build().unwrap(),
                "Slow",
            )
            .unwrap();
        engine.add_constraint(scored("after", 1.0), "After").unwrap();

        let options = EvaluationOptions::default().with_deadline(Duration::from_millis(20));
        let result = engine.evaluate_with(&harm(0), options).await;

        assert!(!result.is_allowed());
        assert_eq!(
            result.completion(),
            &Completion::Incomplete {
                skipped_layers: vec!["Slow".into(), "After".into()]
            }
        );
        assert_eq!(result.violations().len(), 1);
        assert_eq!(result.violations()[0].constraint_id(), DEADLINE_EXCEEDED);
        assert_eq!(result.violations()[0].severity(), Severity::High);
        assert_eq!(result.proof_chain().len(), 2);
        assert_eq!(engine.metrics().incomplete, 1);
    }

    #[tokio::test]
    async fn rolling_average_over_evaluations() {
        let engine = custom_engine();
        engine.add_constraint(scored("s", 1.0), "Soft").unwrap();
        engine.evaluate(&harm(0)).await;

        engine.remove_constraint(&ConstraintId::new("s").unwrap()).unwrap();
        engine.add_constraint(scored("s", 0.5), "Soft").unwrap();
        engine.evaluate(&harm(0)).await;

        engine.remove_constraint(&ConstraintId::new("s").unwrap()).unwrap();
        engine.add_constraint(scored("s", 0.75), "Soft").unwrap();
        engine.evaluate(&harm(0)).await;

        let metrics = engine.metrics();
        assert_eq!(metrics.total_evaluations, 3);
        assert!((metrics.average_score - 0.75).abs() < 1e-12);
        assert!((engine.compliance_report(None).compliance_score - 100.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn updated_constraint_is_not_answered_from_cache() {
        let engine = ConstitutionalEngine::builder().build().unwrap();
        let strict = builder("bound")
            .method(VerificationMethod::Formal)
            .formal_spec("harm == 0")
            .build()
            .unwrap();
        engine
            .add_layer(Layer::new("SafetyLayer", true, 10).unwrap().with_constraint(strict))
            .unwrap();
        assert!(!engine.evaluate(&harm(1)).await.is_allowed());

        engine.remove_constraint(&ConstraintId::new("bound").unwrap()).unwrap();
        let relaxed = builder("bound")
            .method(VerificationMethod::Formal)
            .formal_spec("harm <= 5")
            .build()
            .unwrap();
        engine.add_constraint(relaxed, "SafetyLayer").unwrap();

        let result = engine.evaluate(&harm(1)).await;
        assert!(result.is_allowed(), "{:?}", result.violations());
        assert!(!engine.evaluate(&harm(6)).await.is_allowed());
    }

    #[test]
    fn fault_result_reports_the_machine_state() {
        let result = fail_closed(&harm(0), "registry poisoned", Instant::now());
        assert!(!result.is_allowed());
        assert_eq!(result.metadata()["final_state"], EvaluationState::Error.label());
        assert_eq!(result.violations()[0].constraint_id(), SYSTEM_ERROR);
        assert!(result.proof_chain().is_empty());
    }

    #[tokio::test]
    async fn batch_preserves_order() {
        let engine = Arc::new(custom_engine());
        engine
            .add_layer(Layer::new("SafetyLayer", true, 10).unwrap().with_constraint(no_harm()))
            .unwrap();
        let actions: Vec<Action> = (0..6).map(|i| harm(i % 2)).collect();
        let ids: Vec<_> = actions.iter().map(|a| a.id().clone()).collect();

        let results = engine.evaluate_batch(actions).await;
        assert_eq!(results.len(), 6);
        for (i, (result, id)) in results.into_iter().zip(ids).enumerate() {
            let result = result.unwrap();
            assert_eq!(result.action_id(), &id);
            assert_eq!(result.is_allowed(), i % 2 == 0);
        }
        assert_eq!(engine.metrics().total_evaluations, 6);
    }

    #[test]
    fn settings_validation() {
        let settings = EngineSettings {
            verifier_timeout: Duration::ZERO,
            ..EngineSettings::default()
        };
        assert!(ConstitutionalEngine::builder().settings(settings).build().is_err());
        assert_eq!(EngineSettings::default().max_concurrency.get(), 32);
    }
}
