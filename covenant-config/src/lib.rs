//! Configuration for the Covenant constraint engine.
//!
//! Documents are TOML. Unknown fields are rejected, every section is
//! optional, and [`CovenantConfig::validate`] checks cross-field consistency
//! before any engine is built.

#![warn(missing_docs, clippy::pedantic)]

mod error;
mod loader;
pub mod presets;
pub mod schema;

pub use error::{ConfigError, ConfigResult};
pub use presets::{DEFAULT_CONSTITUTION, default_constitution};
pub use schema::{ConstraintSection, CovenantConfig, EngineSection, LayerSection, VerifierSection};
