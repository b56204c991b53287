//! Building a ready engine from configuration.

use std::path::Path;
use std::sync::Arc;

use covenant_config::{ConfigError, CovenantConfig};
use covenant_policy::{ConfigurationError, ConstitutionalEngine};
use covenant_telemetry::tracing_support::init_tracing;
use covenant_telemetry::{Alert, AlertPolicy, TelemetryError};
use thiserror::Error;
use tracing::info;

/// Errors raised while bootstrapping an engine.
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// The configuration failed to load or validate.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// The engine rejected a configured layer or setting.
    #[error(transparent)]
    Engine(#[from] ConfigurationError),
    /// The tracing subscriber could not be installed.
    #[error(transparent)]
    Telemetry(#[from] TelemetryError),
}

/// Result alias for bootstrap operations.
pub type BootstrapResult<T> = Result<T, BootstrapError>;

/// Builds an engine with the configured settings, preset and layers.
///
/// # Errors
///
/// Returns [`BootstrapError::Config`] when the configuration is invalid and
/// [`BootstrapError::Engine`] when the registry rejects a layer, for
/// instance because of an unknown dependency.
pub fn build_engine(config: &CovenantConfig) -> BootstrapResult<ConstitutionalEngine> {
    config.validate()?;
    let mut builder = ConstitutionalEngine::builder()
        .settings(config.engine.settings()?)
        .verifier_settings(config.verifiers.settings()?);
    for layer in config.resolved_layers()? {
        builder = builder.layer(layer);
    }
    let engine = builder.build()?;
    info!(
        layers = engine.registry().snapshot().map_or(0, |layers| layers.len()),
        preset = config.preset.as_deref().unwrap_or("none"),
        "engine bootstrapped"
    );
    Ok(engine)
}

/// An engine paired with the alert thresholds it was configured with.
#[derive(Debug, Clone)]
pub struct Covenant {
    engine: Arc<ConstitutionalEngine>,
    alerts: AlertPolicy,
}

impl Covenant {
    /// Builds the engine described by `config`.
    ///
    /// # Errors
    ///
    /// See [`build_engine`].
    pub fn from_config(config: &CovenantConfig) -> BootstrapResult<Self> {
        Ok(Self {
            engine: Arc::new(build_engine(config)?),
            alerts: config.alerts.clone(),
        })
    }

    /// Loads `path`, installs the configured tracing subscriber, and builds
    /// the engine.
    ///
    /// # Errors
    ///
    /// Returns [`BootstrapError::Telemetry`] when a subscriber is already
    /// installed, otherwise see [`build_engine`].
    pub fn start(path: &Path) -> BootstrapResult<Self> {
        let config = CovenantConfig::load(path)?;
        init_tracing(&config.telemetry)?;
        Self::from_config(&config)
    }

    /// Returns the shared engine.
    #[must_use]
    pub const fn engine(&self) -> &Arc<ConstitutionalEngine> {
        &self.engine
    }

    /// Returns the configured alert thresholds.
    #[must_use]
    pub const fn alert_policy(&self) -> &AlertPolicy {
        &self.alerts
    }

    /// Checks the current metrics against the alert thresholds.
    #[must_use]
    pub fn alerts(&self) -> Vec<Alert> {
        self.alerts.evaluate(&self.engine.metrics())
    }
}
