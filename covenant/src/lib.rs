//! Layered constraint evaluation engine with verifiable decisions.
//!
//! This facade bundles the workspace crates behind feature flags. With the
//! `config` feature, [`bootstrap`] turns a TOML document into a ready
//! engine.

#![warn(missing_docs, clippy::pedantic)]

/// Re-export shared primitives for convenience.
pub use covenant_primitives as primitives;

/// Verification strategies (enabled by `verifiers` feature).
#[cfg(feature = "verifiers")]
pub use covenant_verifiers as verifiers;

/// Metrics, reports, alerts and tracing (enabled by `telemetry` feature).
#[cfg(feature = "telemetry")]
pub use covenant_telemetry as telemetry;

/// Registry, evaluator and engine (enabled by `policy` feature).
#[cfg(feature = "policy")]
pub use covenant_policy as policy;

/// Configuration loading (enabled by `config` feature).
#[cfg(feature = "config")]
pub use covenant_config as config;

/// Audit persistence (enabled by `audit` feature).
#[cfg(feature = "audit")]
pub use covenant_audit as audit;

#[cfg(feature = "config")]
pub mod bootstrap;
