//! Structured tracing bootstrap.

use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::{TelemetryError, TelemetryResult};

/// Settings for the process-wide `fmt` subscriber.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TracingSettings {
    /// Filter directive used when `RUST_LOG` is unset.
    pub log_filter: String,
    /// Include event targets in the output.
    pub with_target: bool,
}

impl Default for TracingSettings {
    fn default() -> Self {
        Self {
            log_filter: "info".into(),
            with_target: false,
        }
    }
}

impl TracingSettings {
    /// Builds the filter, preferring `RUST_LOG` over the configured directive.
    ///
    /// # Errors
    ///
    /// Returns [`TelemetryError::InvalidFilter`] when the configured
    /// directive does not parse.
    pub fn filter(&self) -> TelemetryResult<EnvFilter> {
        if let Ok(filter) = EnvFilter::try_from_default_env() {
            return Ok(filter);
        }
        EnvFilter::try_new(&self.log_filter).map_err(|err| TelemetryError::InvalidFilter {
            directive: self.log_filter.clone(),
            reason: err.to_string(),
        })
    }
}

/// Installs the global subscriber.
///
/// # Errors
///
/// Returns [`TelemetryError::InvalidFilter`] for a bad directive and
/// [`TelemetryError::SubscriberInstall`] when a global subscriber is already
/// set.
pub fn init_tracing(settings: &TracingSettings) -> TelemetryResult<()> {
    let filter = settings.filter()?;
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(settings.with_target))
        .try_init()
        .map_err(|err| TelemetryError::SubscriberInstall {
            reason: err.to_string(),
        })
}
