//! Attempt records and terminal results of the repair loop.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::collaborator::GenerationError;
use crate::domain::{CandidateProgram, ExecutionFailure, FailureKind, ValidationVerdict};

use super::state::LoopState;

/// Why one candidate did not produce an answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum AttemptFailure {
    Validation(ValidationVerdict),
    Execution(ExecutionFailure),
}

impl AttemptFailure {
    pub fn kind(&self) -> FailureKind {
        match self {
            AttemptFailure::Validation(v) => v.failure_kind.unwrap_or(FailureKind::SyntaxError),
            AttemptFailure::Execution(f) => f.kind,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            AttemptFailure::Validation(v) => &v.message,
            AttemptFailure::Execution(f) => &f.message,
        }
    }

    pub fn detail(&self) -> Option<&str> {
        match self {
            AttemptFailure::Validation(_) => None,
            AttemptFailure::Execution(f) => f.detail.as_deref(),
        }
    }

    /// Text handed to the repair collaborator: kind, message, and detail.
    pub fn repair_message(&self) -> String {
        let mut text = format!("{}: {}", self.kind(), self.message());
        if let Some(detail) = self.detail() {
            text.push('\n');
            text.push_str(detail);
        }
        text
    }
}

/// One round of the loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepairAttempt {
    /// 0 for the first candidate, then one per repair.
    pub attempt_index: u32,
    pub input_program: CandidateProgram,
    pub failure: AttemptFailure,
    /// `None` when the loop stopped here or the repair call failed.
    pub produced_program: Option<CandidateProgram>,
}

/// The failure a question ended on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminalFailure {
    pub kind: FailureKind,
    pub message: String,
    /// Internal diagnostics. Never user-facing.
    pub detail: Option<String>,
}

impl TerminalFailure {
    pub fn generation(err: &GenerationError) -> Self {
        Self {
            kind: FailureKind::GenerationError,
            message: err.to_string(),
            detail: None,
        }
    }
}

impl From<&AttemptFailure> for TerminalFailure {
    fn from(failure: &AttemptFailure) -> Self {
        Self {
            kind: failure.kind(),
            message: failure.message().to_string(),
            detail: failure.detail().map(str::to_string),
        }
    }
}

/// Terminal value of the loop for one question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FinalResult {
    Executed {
        data: Value,
        program: CandidateProgram,
        repair_rounds: u32,
    },
    Exhausted {
        last_failure: TerminalFailure,
        repair_rounds: u32,
    },
}

impl FinalResult {
    pub fn is_executed(&self) -> bool {
        matches!(self, FinalResult::Executed { .. })
    }

    pub fn repair_rounds(&self) -> u32 {
        match self {
            FinalResult::Executed { repair_rounds, .. }
            | FinalResult::Exhausted { repair_rounds, .. } => *repair_rounds,
        }
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            FinalResult::Executed { .. } => None,
            FinalResult::Exhausted { last_failure, .. } => Some(last_failure.kind),
        }
    }
}

/// Full history of one loop run, for the caller to keep or drop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepairLog {
    pub question_id: String,
    pub result: FinalResult,
    pub attempts: Vec<RepairAttempt>,
    pub transitions: Vec<LoopState>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}
