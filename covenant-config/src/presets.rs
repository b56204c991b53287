//! Built-in layer sets.

use covenant_primitives::{
    Constraint, ConstraintDomain, ConstraintId, Layer, VerificationMethod,
};

use crate::error::{ConfigError, ConfigResult};

/// Name of the default constitution preset.
pub const DEFAULT_CONSTITUTION: &str = "default-constitution";

/// Names of every built-in preset.
pub const PRESETS: [&str; 1] = [DEFAULT_CONSTITUTION];

/// Returns the layers of the named preset.
///
/// # Errors
///
/// Returns [`ConfigError::UnknownPreset`] for an unrecognised name.
pub fn preset(name: &str) -> ConfigResult<Vec<Layer>> {
    match name {
        DEFAULT_CONSTITUTION => default_constitution(),
        other => Err(ConfigError::UnknownPreset { name: other.to_owned() }),
    }
}

/// Five layers covering safety, legal, privacy, ethics and business rules.
///
/// The first three layers are hard; ethics and business only score.
///
/// # Errors
///
/// Propagates primitive validation failures.
pub fn default_constitution() -> ConfigResult<Vec<Layer>> {
    let no_harm = constraint("no_harm", ConstraintDomain::Safety, "Must not cause physical harm to humans")?
        .priority(10)
        .method(VerificationMethod::NeuralSymbolic)
        .formal_spec("harm_level == 0")
        .build()?;

    let gdpr = constraint(
        "gdpr_compliance",
        ConstraintDomain::Legal,
        "Must comply with GDPR data protection requirements",
    )?
    .priority(9)
    .method(VerificationMethod::Formal)
    .build()?;

    let consent = constraint(
        "user_consent",
        ConstraintDomain::Privacy,
        "Must obtain user consent for data processing",
    )?
    .priority(8)
    .method(VerificationMethod::NeuralSymbolic)
    .build()?;

    let fairness = constraint(
        "fairness",
        ConstraintDomain::Fairness,
        "Should ensure fair treatment across demographic groups",
    )?
    .hard(false)
    .priority(7)
    .method(VerificationMethod::NeuralSymbolic)
    .threshold(0.8)?
    .build()?;

    let cost = constraint("cost_efficiency", ConstraintDomain::Business, "Should optimize for cost efficiency")?
        .hard(false)
        .priority(5)
        .method(VerificationMethod::HeuristicOptimizer)
        .weight(0.7)?
        .build()?;

    Ok(vec![
        Layer::new("SafetyLayer", true, 10)?.with_constraint(no_harm),
        Layer::new("LegalLayer", true, 9)?.with_constraint(gdpr),
        Layer::new("PrivacyLayer", true, 8)?.with_constraint(consent),
        Layer::new("EthicsLayer", false, 7)?.with_constraint(fairness),
        Layer::new("BusinessLayer", false, 5)?.with_constraint(cost),
    ])
}

fn constraint(
    id: &str,
    domain: ConstraintDomain,
    description: &str,
) -> ConfigResult<covenant_primitives::ConstraintBuilder> {
    Ok(Constraint::builder(ConstraintId::new(id)?, domain).description(description)?)
}
