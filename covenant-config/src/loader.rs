//! Reading and validating configuration documents.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use covenant_policy::PRIORITY_RANGE;
use covenant_primitives::Layer;
use tracing::debug;

use crate::error::{ConfigError, ConfigResult};
use crate::presets;
use crate::schema::CovenantConfig;

const MAX_CONFIG_FILE_SIZE: u64 = 1024 * 1024;

impl CovenantConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed TOML or unknown fields,
    /// otherwise any error raised by [`validate`](Self::validate).
    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        let config: Self = toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads and validates a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] when the file cannot be read or exceeds
    /// the size limit, otherwise see [`from_toml_str`](Self::from_toml_str).
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let io = |reason: String| ConfigError::Io {
            path: path.to_path_buf(),
            reason,
        };
        let size = fs::metadata(path).map_err(|err| io(err.to_string()))?.len();
        if size > MAX_CONFIG_FILE_SIZE {
            return Err(io(format!("file exceeds {MAX_CONFIG_FILE_SIZE} bytes")));
        }
        let content = fs::read_to_string(path).map_err(|err| io(err.to_string()))?;
        debug!(path = %path.display(), bytes = size, "loaded configuration");
        Self::from_toml_str(&content)
    }

    /// Checks the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] describing the first problem found,
    /// [`ConfigError::UnknownPreset`], or [`ConfigError::Primitive`] for a
    /// layer or constraint rejected by validation.
    pub fn validate(&self) -> ConfigResult<()> {
        self.engine.settings()?;
        self.verifiers.settings()?;
        self.telemetry
            .filter()
            .map_err(|err| ConfigError::Invalid(format!("telemetry: {err}")))?;
        validate_alerts(self)?;

        let layers = self.resolved_layers()?;
        let mut names = HashSet::new();
        let mut ids = HashSet::new();
        for layer in &layers {
            if !names.insert(layer.name()) {
                return Err(ConfigError::Invalid(format!("duplicate layer `{}`", layer.name())));
            }
            check_priority(&format!("layer `{}`", layer.name()), layer.priority())?;
            for constraint in layer.constraints() {
                if !ids.insert(constraint.id()) {
                    return Err(ConfigError::Invalid(format!(
                        "duplicate constraint `{}`",
                        constraint.id()
                    )));
                }
                check_priority(&format!("constraint `{}`", constraint.id()), constraint.priority())?;
            }
        }
        Ok(())
    }

    /// Returns the preset layers followed by the configured layers.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownPreset`] or [`ConfigError::Primitive`].
    pub fn resolved_layers(&self) -> ConfigResult<Vec<Layer>> {
        let mut layers = match &self.preset {
            Some(name) => presets::preset(name)?,
            None => Vec::new(),
        };
        for section in &self.layers {
            layers.push(section.to_layer()?);
        }
        Ok(layers)
    }
}

fn check_priority(subject: &str, priority: i32) -> ConfigResult<()> {
    if PRIORITY_RANGE.contains(&priority) {
        Ok(())
    } else {
        Err(ConfigError::Invalid(format!(
            "{subject} priority {priority} outside {}..={}",
            PRIORITY_RANGE.start(),
            PRIORITY_RANGE.end()
        )))
    }
}

fn validate_alerts(config: &CovenantConfig) -> ConfigResult<()> {
    let alerts = &config.alerts;
    let unit = [
        ("alerts.max_hard_violation_rate", alerts.max_hard_violation_rate),
        ("alerts.min_average_score", alerts.min_average_score),
    ];
    for (field, value) in unit {
        if value.is_some_and(|v| !(0.0..=1.0).contains(&v)) {
            return Err(ConfigError::Invalid(format!("{field} must be within [0, 1]")));
        }
    }
    if alerts.max_average_latency_ms.is_some_and(|v| !v.is_finite() || v <= 0.0) {
        return Err(ConfigError::Invalid(
            "alerts.max_average_latency_ms must be positive".into(),
        ));
    }
    Ok(())
}
