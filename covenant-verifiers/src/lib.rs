//! Verification strategies used to assess constraints against actions.
//!
//! Every strategy implements the [`Verifier`] capability defined in
//! [`traits`]; the engine selects one per constraint through the
//! [`VerifierRegistry`] lookup table keyed by
//! [`VerificationMethod`](covenant_primitives::VerificationMethod).

#![warn(missing_docs, clippy::pedantic)]

pub mod cache;
pub mod causal;
pub mod certified;
pub mod expr;
pub mod formal;
pub mod neural_symbolic;
pub mod optimizer;
pub mod registry;
pub mod remote;
pub mod statistical;
pub mod symbolic;
pub mod traits;

pub use registry::{OptimizerSettings, VerifierRegistry, VerifierSettings};
pub use traits::{Assessment, Verifier, VerifierError, VerifierResult};
