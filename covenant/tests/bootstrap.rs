use std::io::Write;

use covenant::audit::{AuditLog, AuditRecord, FileAuditLog, MemoryAuditLog, verify_entries};
use covenant::bootstrap::{BootstrapError, Covenant, build_engine};
use covenant::config::CovenantConfig;
use covenant::policy::ConfigurationError;
use covenant::primitives::Action;
use covenant::telemetry::AlertSeverity;

const CONSTITUTION: &str = r#"
preset = "default-constitution"

[engine]
verifier_timeout_ms = 500

[alerts]
max_hard_violation_rate = 0.25

[[layers]]
name = "Spending"
is_hard = true
priority = 6

[[layers.constraints]]
id = "spend_cap"
domain = "financial"
description = "Spend stays under the cap"
method = "formal"
formal_spec = "amount <= 1000"
"#;

fn action(harm_level: i64, amount: i64) -> Action {
    Action::builder("purchase")
        .actor("procurement-agent")
        .parameter("harm_level", harm_level)
        .parameter("amount", amount)
        .build()
        .unwrap()
}

#[tokio::test]
async fn default_constitution_end_to_end() {
    let config = CovenantConfig::from_toml_str(CONSTITUTION).unwrap();
    let covenant = Covenant::from_config(&config).unwrap();
    let engine = covenant.engine();

    let safe = engine.evaluate(&action(0, 10)).await;
    assert!(safe.is_allowed(), "{:?}", safe.violations());
    assert_eq!(safe.layer_results().len(), 6);
    assert!(safe.overall_score() < 1.0);

    let harmful = engine.evaluate(&action(1, 10)).await;
    assert!(!harmful.is_allowed());
    assert_eq!(harmful.layer_results().len(), 1);
    assert_eq!(harmful.violations()[0].constraint_id(), "no_harm");

    let overspend = engine.evaluate(&action(0, 5000)).await;
    assert!(!overspend.is_allowed());
    assert_eq!(
        overspend.layer_results().last().map(|l| l.layer()),
        Some("Spending")
    );

    let alerts = covenant.alerts();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].severity, AlertSeverity::Critical);
}

#[tokio::test]
async fn registry_rejections_surface_as_engine_errors() {
    let doc = r#"
[[layers]]
name = "L"
[[layers.constraints]]
id = "dependent"
domain = "safety"
description = "needs a missing constraint"
dependencies = ["missing"]
"#;
    let config = CovenantConfig::from_toml_str(doc).unwrap();
    assert!(matches!(
        build_engine(&config),
        Err(BootstrapError::Engine(ConfigurationError::UnknownDependency { .. }))
    ));
}

#[tokio::test]
async fn audited_results_verify_after_persistence() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(CONSTITUTION.as_bytes()).unwrap();
    let config = CovenantConfig::load(file.path()).unwrap();
    let engine = build_engine(&config).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let log = FileAuditLog::open(dir.path().join("audit.ndjson")).await.unwrap();
    let memory = MemoryAuditLog::default();

    for (harm, amount) in [(0, 10), (1, 10), (0, 5000)] {
        let action = action(harm, amount);
        let result = engine.evaluate(&action).await;
        let record = AuditRecord::new(action, result);
        memory.append(record.clone()).await.unwrap();
        log.append(record).await.unwrap();
    }

    let persisted = log.tail(10).await.unwrap();
    assert_eq!(persisted.len(), 3);
    verify_entries(&persisted).unwrap();
    for entry in &persisted {
        assert!(entry.record().verify().unwrap());
    }

    let id = persisted[1].record().audit_id();
    let found = memory.find(id).await.unwrap().unwrap();
    assert!(!found.record().result().is_allowed());
    assert_eq!(found.digest(), persisted[1].digest());
}
