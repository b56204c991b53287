//! Layered constraint evaluation for proposed actions.
//!
//! A [`ConstitutionalEngine`] holds named [`Layer`](covenant_primitives::Layer)s
//! of constraints, evaluates them from highest to lowest priority, and returns an
//! [`EvaluationResult`] carrying the verdict, the violations and warnings
//! found, per-layer results, and a tamper-evident proof chain.
//!
//! Hard layers short-circuit on failure; soft layers only reduce the overall
//! score. Evaluation never returns an error: internal faults become a denial.

#![warn(missing_docs, clippy::pedantic)]

mod engine;
mod error;
mod fanout;
mod layer;
mod proof;
mod registry;
mod result;
mod state;

pub use engine::{
    ConstitutionalEngine, DEADLINE_EXCEEDED, EngineBuilder, EngineSettings, EvaluationOptions,
    SYSTEM_ERROR,
};
pub use error::{ConfigurationError, ConfigurationResult, EngineResult, EvaluationError};
pub use fanout::{FanOut, FanOutError, FanOutResult};
pub use layer::{ConstraintOutcome, DeadlineExceeded, LayerEvaluator, LayerResult};
pub use proof::{ACTION_PREFIX, PROOF_PREFIX, generate_proof_chain, verify_proof_chain};
pub use registry::{ConstraintRegistry, PRIORITY_RANGE};
pub use result::{Completion, EvaluationResult};
pub use state::{EvaluationEvent, EvaluationState, Orchestration};
