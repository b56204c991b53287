use std::path::PathBuf;

use thiserror::Error;

/// Result alias for configuration loading.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read config `{}`: {reason}", path.display())]
    Io {
        /// File that failed to load.
        path: PathBuf,
        /// Underlying I/O failure.
        reason: String,
    },
    /// The TOML document did not match the schema.
    #[error("config parse error: {0}")]
    Parse(String),
    /// A value is out of range or inconsistent.
    #[error("invalid config: {0}")]
    Invalid(String),
    /// The named preset does not exist.
    #[error("unknown preset `{name}`")]
    UnknownPreset {
        /// Requested preset name.
        name: String,
    },
    /// A layer or constraint failed primitive validation.
    #[error(transparent)]
    Primitive(#[from] covenant_primitives::Error),
}
