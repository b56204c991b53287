use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use covenant::policy::{Completion, ConfigurationError, ConstitutionalEngine, EngineSettings, EvaluationOptions};
use covenant::primitives::{
    Action, Constraint, ConstraintDomain, ConstraintId, Layer, Severity, VerificationMethod,
};
use covenant::verifiers::{Assessment, Verifier, VerifierRegistry, VerifierResult, VerifierSettings};
use serde_json::Map;

/// Scores with the action's `score` parameter.
struct ParameterScore;

#[async_trait]
impl Verifier for ParameterScore {
    fn method(&self) -> VerificationMethod {
        VerificationMethod::Statistical
    }

    async fn assess(&self, _: &Constraint, action: &Action) -> VerifierResult<Assessment> {
        let score = action.parameter("score").and_then(serde_json::Value::as_f64).unwrap_or(1.0);
        Ok(Assessment::scored(score, Map::new()))
    }
}

/// Scores with the constraint's `score` metadata after an optional delay.
struct MetadataScore;

#[async_trait]
impl Verifier for MetadataScore {
    fn method(&self) -> VerificationMethod {
        VerificationMethod::Causal
    }

    async fn assess(&self, constraint: &Constraint, _: &Action) -> VerifierResult<Assessment> {
        if let Some(ms) = constraint.metadata_f64("delay_ms") {
            tokio::time::sleep(Duration::from_millis(ms as u64)).await;
        }
        Ok(Assessment::scored(
            constraint.metadata_f64("score").unwrap_or(1.0),
            Map::new(),
        ))
    }
}

fn engine() -> ConstitutionalEngine {
    let mut verifiers = VerifierRegistry::with_defaults(&VerifierSettings::default()).unwrap();
    verifiers.register(Arc::new(ParameterScore));
    verifiers.register(Arc::new(MetadataScore));
    ConstitutionalEngine::builder()
        .settings(EngineSettings {
            verifier_timeout: Duration::from_secs(5),
            ..EngineSettings::default()
        })
        .verifiers(verifiers)
        .build()
        .unwrap()
}

fn id(value: &str) -> ConstraintId {
    ConstraintId::new(value).unwrap()
}

fn no_harm() -> Constraint {
    Constraint::builder(id("no_harm"), ConstraintDomain::Safety)
        .description("Must not cause harm")
        .unwrap()
        .priority(10)
        .method(VerificationMethod::Formal)
        .formal_spec("parameters.harm == 0")
        .build()
        .unwrap()
}

fn soft(name: &str, score: f64) -> Constraint {
    Constraint::builder(id(name), ConstraintDomain::Business)
        .description(format!("{name} scores {score}"))
        .unwrap()
        .hard(false)
        .method(VerificationMethod::Causal)
        .threshold(0.0)
        .unwrap()
        .metadata("score", score)
        .build()
        .unwrap()
}

fn action(harm: i64) -> Action {
    Action::builder("operate")
        .actor("agent-7")
        .parameter("harm", harm)
        .build()
        .unwrap()
}

#[tokio::test]
async fn empty_configuration_allows_any_action() {
    let engine = engine();
    let result = engine.evaluate(&action(99)).await;
    assert!(result.is_allowed());
    assert!((result.overall_score() - 1.0).abs() < f64::EPSILON);
    assert!(result.violations().is_empty());
    assert_eq!(result.completion(), &Completion::Complete);
}

#[tokio::test]
async fn hard_safety_layer_short_circuits() {
    let engine = engine();
    engine
        .add_layer(Layer::new("SafetyLayer", true, 10).unwrap().with_constraint(no_harm()))
        .unwrap();
    engine
        .add_layer(Layer::new("EthicsLayer", false, 5).unwrap().with_constraint(soft("ethics", 0.2)))
        .unwrap();

    let result = engine.evaluate(&action(1)).await;
    assert!(!result.is_allowed());
    assert_eq!(result.violations().len(), 1);
    assert_eq!(result.violations()[0].constraint_id(), "no_harm");
    assert_eq!(result.violations()[0].severity(), Severity::Critical);
    assert_eq!(result.layer_results().len(), 1);
    assert_eq!(result.layer_results()[0].layer(), "SafetyLayer");
    assert!((result.overall_score() - 1.0).abs() < f64::EPSILON);

    let allowed = engine.evaluate(&action(0)).await;
    assert!(allowed.is_allowed());
    assert_eq!(allowed.layer_results().len(), 2);
}

#[tokio::test]
async fn soft_layers_multiply_into_overall_score() {
    let engine = engine();
    engine
        .add_layer(Layer::new("EthicsLayer", false, 7).unwrap().with_constraint(soft("ethics", 0.8)))
        .unwrap();
    engine
        .add_layer(Layer::new("BusinessLayer", false, 5).unwrap().with_constraint(soft("business", 0.5)))
        .unwrap();

    let result = engine.evaluate(&action(0)).await;
    assert!(result.is_allowed());
    assert!((result.overall_score() - 0.4).abs() < 1e-12);
}

#[tokio::test]
async fn rolling_average_score() {
    let engine = engine();
    let constraint = Constraint::builder(id("scored"), ConstraintDomain::Business)
        .description("score passes through")
        .unwrap()
        .hard(false)
        .method(VerificationMethod::Statistical)
        .threshold(0.0)
        .unwrap()
        .build()
        .unwrap();
    engine.add_constraint(constraint, "BusinessLayer").unwrap();

    for score in [1.0, 0.5, 0.75] {
        let action = Action::builder("score").parameter("score", score).build().unwrap();
        engine.evaluate(&action).await;
    }

    let metrics = engine.metrics();
    assert_eq!(metrics.total_evaluations, 3);
    assert!((metrics.average_score - 0.75).abs() < 1e-12);
    assert_eq!(metrics.layer_invocations["BusinessLayer"], 3);
}

#[tokio::test]
async fn duplicate_constraint_is_rejected_without_mutation() {
    let engine = engine();
    engine.add_constraint(no_harm(), "SafetyLayer").unwrap();
    let err = engine.add_constraint(no_harm(), "OtherLayer").unwrap_err();
    assert!(matches!(err, ConfigurationError::DuplicateConstraint { .. }));
    assert!(engine.registry().layer("OtherLayer").is_none());
}

#[tokio::test]
async fn in_flight_evaluation_keeps_its_snapshot() {
    let engine = Arc::new(engine());
    let slow = Constraint::builder(id("slow"), ConstraintDomain::Operational)
        .description("takes a while")
        .unwrap()
        .hard(false)
        .method(VerificationMethod::Causal)
        .metadata("delay_ms", 50)
        .build()
        .unwrap();
    engine.add_constraint(slow, "Slow").unwrap();

    let running = {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move { engine.evaluate(&action(1)).await })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;
    engine
        .add_layer(Layer::new("SafetyLayer", true, 10).unwrap().with_constraint(no_harm()))
        .unwrap();

    let before = running.await.unwrap();
    assert!(before.is_allowed());
    assert_eq!(before.layer_results().len(), 1);

    let after = engine.evaluate(&action(1)).await;
    assert!(!after.is_allowed());
}

#[tokio::test(start_paused = true)]
async fn deadline_yields_incomplete_denial() {
    let engine = engine();
    engine
        .add_layer(Layer::new("SafetyLayer", true, 10).unwrap().with_constraint(no_harm()))
        .unwrap();
    let slow = Constraint::builder(id("slow"), ConstraintDomain::Operational)
        .description("takes a while")
        .unwrap()
        .method(VerificationMethod::Causal)
        .metadata("delay_ms", 500)
        .build()
        .unwrap();
    engine.add_layer(Layer::new("Slow", true, 5).unwrap().with_constraint(slow)).unwrap();
    engine.add_constraint(soft("tail", 0.9), "Tail").unwrap();

    let options = EvaluationOptions::default().with_deadline(Duration::from_millis(100));
    let result = engine.evaluate_with(&action(0), options).await;

    assert!(!result.is_allowed());
    assert_eq!(
        result.completion(),
        &Completion::Incomplete {
            skipped_layers: vec!["Slow".to_owned(), "Tail".to_owned()],
        }
    );
    assert_eq!(result.layer_results().len(), 1);
    assert_eq!(result.proof_chain().len(), 3);
    assert_eq!(result.metadata()["final_state"], "incomplete");
}

#[tokio::test]
async fn batch_collects_every_slot_in_order() {
    let engine = Arc::new(engine());
    engine
        .add_layer(Layer::new("SafetyLayer", true, 10).unwrap().with_constraint(no_harm()))
        .unwrap();
    let actions: Vec<Action> = [0, 1, 1, 0].into_iter().map(action).collect();

    let results = engine.evaluate_batch(actions).await;
    let verdicts: Vec<bool> = results.into_iter().map(|r| r.unwrap().is_allowed()).collect();
    assert_eq!(verdicts, [true, false, false, true]);
    let report = engine.compliance_report(Some("safety"));
    assert_eq!(report.total_evaluations, 4);
    assert!((report.compliance_score - 50.0).abs() < 1e-9);
}
