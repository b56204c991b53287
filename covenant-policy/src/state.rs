//! Orchestration state machine for a single evaluation.

use std::fmt;

use tracing::debug;

use crate::error::{EngineResult, EvaluationError};

/// States an evaluation can occupy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvaluationState {
    /// Nothing evaluated yet.
    Init,
    /// The layer at this position is being evaluated.
    Evaluating {
        /// Position among the enabled layers.
        layer: usize,
    },
    /// The previous layer passed; `next` is the position to enter.
    Continue {
        /// Position of the next layer.
        next: usize,
    },
    /// A hard layer failed; no further layers run.
    HardBlock,
    /// Every enabled layer ran.
    Complete,
    /// The deadline expired before every layer ran.
    Incomplete,
    /// The result has been sealed.
    Done,
    /// An unexpected fault occurred.
    Error,
}

impl EvaluationState {
    /// Returns `true` for states that end the layer loop.
    #[must_use]
    pub const fn is_outcome(self) -> bool {
        matches!(self, Self::HardBlock | Self::Complete | Self::Incomplete)
    }

    /// Returns `true` once nothing more can happen.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Error)
    }

    /// Short label recorded in result metadata.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Evaluating { .. } => "evaluating",
            Self::Continue { .. } => "continue",
            Self::HardBlock => "hard_block",
            Self::Complete => "complete",
            Self::Incomplete => "incomplete",
            Self::Done => "done",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for EvaluationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Events that drive the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvaluationEvent {
    /// Start evaluating the layer at this position.
    Enter(usize),
    /// The current layer passed.
    Passed,
    /// The current layer is hard and failed.
    Blocked,
    /// No layers remain.
    Exhausted,
    /// The deadline expired.
    DeadlineExceeded,
    /// Seal the result.
    Seal,
    /// An unexpected fault occurred.
    Fault,
}

/// State machine driving one evaluation.
#[derive(Debug, Clone, Copy)]
pub struct Orchestration {
    state: EvaluationState,
    outcome: Option<EvaluationState>,
}

impl Default for Orchestration {
    fn default() -> Self {
        Self::new()
    }
}

impl Orchestration {
    /// Creates a machine in [`EvaluationState::Init`].
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: EvaluationState::Init,
            outcome: None,
        }
    }

    /// Returns the current state.
    #[must_use]
    pub const fn state(&self) -> EvaluationState {
        self.state
    }

    /// Returns the outcome state the machine passed through, once reached.
    #[must_use]
    pub const fn outcome(&self) -> Option<EvaluationState> {
        self.outcome
    }

    /// Applies an event, returning the resulting state.
    ///
    /// # Errors
    ///
    /// Returns [`EvaluationError::InvalidTransition`] when the event is not
    /// allowed from the current state.
    pub fn transition(&mut self, event: EvaluationEvent) -> EngineResult<EvaluationState> {
        use EvaluationEvent as Ev;
        use EvaluationState as St;

        let next = match (self.state, event) {
            (St::Init, Ev::Enter(0)) => Some(St::Evaluating { layer: 0 }),
            (St::Continue { next }, Ev::Enter(layer)) if layer == next => {
                Some(St::Evaluating { layer })
            }
            (St::Evaluating { layer }, Ev::Passed) => Some(St::Continue { next: layer + 1 }),
            (St::Evaluating { .. }, Ev::Blocked) => Some(St::HardBlock),
            (St::Init | St::Continue { .. }, Ev::Exhausted) => Some(St::Complete),
            (St::Init | St::Continue { .. } | St::Evaluating { .. }, Ev::DeadlineExceeded) => {
                Some(St::Incomplete)
            }
            (St::HardBlock | St::Complete | St::Incomplete, Ev::Seal) => Some(St::Done),
            (state, Ev::Fault) if !state.is_terminal() => Some(St::Error),
            _ => None,
        };

        let Some(next) = next else {
            return Err(EvaluationError::InvalidTransition {
                from: self.state,
                event,
            });
        };

        debug!(from = %self.state, to = %next, ?event, "evaluation transition");
        if next.is_outcome() || next == St::Error {
            self.outcome = Some(next);
        }
        self.state = next;
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn walks_layers_to_completion() {
        let mut machine = Orchestration::new();
        machine.transition(EvaluationEvent::Enter(0)).unwrap();
        machine.transition(EvaluationEvent::Passed).unwrap();
        assert_eq!(machine.state(), EvaluationState::Continue { next: 1 });
        machine.transition(EvaluationEvent::Enter(1)).unwrap();
        machine.transition(EvaluationEvent::Passed).unwrap();
        machine.transition(EvaluationEvent::Exhausted).unwrap();
        machine.transition(EvaluationEvent::Seal).unwrap();
        assert_eq!(machine.state(), EvaluationState::Done);
        assert_eq!(machine.outcome(), Some(EvaluationState::Complete));
    }

    #[test]
    fn empty_configuration_completes_immediately() {
        let mut machine = Orchestration::new();
        assert_eq!(
            machine.transition(EvaluationEvent::Exhausted).unwrap(),
            EvaluationState::Complete
        );
    }

    #[test]
    fn hard_block_and_deadline_paths() {
        let mut machine = Orchestration::new();
        machine.transition(EvaluationEvent::Enter(0)).unwrap();
        machine.transition(EvaluationEvent::Blocked).unwrap();
        assert_eq!(machine.outcome(), Some(EvaluationState::HardBlock));

        let mut machine = Orchestration::new();
        machine.transition(EvaluationEvent::Enter(0)).unwrap();
        machine.transition(EvaluationEvent::DeadlineExceeded).unwrap();
        machine.transition(EvaluationEvent::Seal).unwrap();
        assert_eq!(machine.outcome(), Some(EvaluationState::Incomplete));
    }

    #[test]
    fn rejects_skipped_layers_and_double_seal() {
        let mut machine = Orchestration::new();
        assert!(machine.transition(EvaluationEvent::Enter(1)).is_err());
        machine.transition(EvaluationEvent::Enter(0)).unwrap();
        machine.transition(EvaluationEvent::Passed).unwrap();
        assert!(matches!(
            machine.transition(EvaluationEvent::Enter(3)),
            Err(EvaluationError::InvalidTransition { .. })
        ));
        machine.transition(EvaluationEvent::Exhausted).unwrap();
        machine.transition(EvaluationEvent::Seal).unwrap();
        assert!(machine.transition(EvaluationEvent::Seal).is_err());
        assert!(machine.transition(EvaluationEvent::Fault).is_err());
    }

    #[test]
    fn fault_is_reachable_until_terminal() {
        let mut machine = Orchestration::new();
        machine.transition(EvaluationEvent::Enter(0)).unwrap();
        machine.transition(EvaluationEvent::Fault).unwrap();
        assert!(machine.state().is_terminal());
    }
}
