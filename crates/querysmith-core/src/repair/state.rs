//! Repair loop states and the legal transitions between them.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopState {
    Generated,
    Validating,
    Executing,
    Repairing,
    Succeeded,
    Exhausted,
}

impl LoopState {
    pub fn is_terminal(self) -> bool {
        matches!(self, LoopState::Succeeded | LoopState::Exhausted)
    }

    /// Whether the loop may move from `self` to `next`.
    pub fn can_transition_to(self, next: LoopState) -> bool {
        use LoopState::*;
        matches!(
            (self, next),
            (Generated, Validating)
                | (Validating, Executing)
                | (Validating, Repairing)
                | (Validating, Exhausted)
                | (Executing, Succeeded)
                | (Executing, Repairing)
                | (Executing, Exhausted)
                | (Repairing, Generated)
                | (Repairing, Exhausted)
        )
    }
}

impl std::fmt::Display for LoopState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            LoopState::Generated => "generated",
            LoopState::Validating => "validating",
            LoopState::Executing => "executing",
            LoopState::Repairing => "repairing",
            LoopState::Succeeded => "succeeded",
            LoopState::Exhausted => "exhausted",
        };
        f.write_str(s)
    }
}

/// Ordered record of every state the loop entered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateTrace {
    states: Vec<LoopState>,
}

impl StateTrace {
    pub fn start() -> Self {
        Self {
            states: vec![LoopState::Generated],
        }
    }

    pub fn current(&self) -> LoopState {
        *self.states.last().unwrap_or(&LoopState::Generated)
    }

    /// Enter `next`. Illegal moves are a bug in the loop, not in the input.
    pub fn enter(&mut self, next: LoopState) {
        let current = self.current();
        debug_assert!(
            current.can_transition_to(next),
            "illegal repair loop transition {current} -> {next}"
        );
        self.states.push(next);
    }

    pub fn states(&self) -> &[LoopState] {
        &self.states
    }
}
