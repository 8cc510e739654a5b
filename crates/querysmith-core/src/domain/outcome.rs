//! Execution outcomes of one sandboxed run.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::failure::FailureKind;

/// A classified execution failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionFailure {
    pub kind: FailureKind,
    pub message: String,
    /// Internal diagnostics (redacted trace, fault type). Never user-facing.
    pub detail: Option<String>,
}

impl ExecutionFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// Immutable result of one execution attempt.
///
/// Data exists only on success, so a failed run cannot be read as an answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ExecutionOutcome {
    Success { data: Value },
    Failure(ExecutionFailure),
}

impl ExecutionOutcome {
    pub fn success(data: Value) -> Self {
        ExecutionOutcome::Success { data }
    }

    pub fn failure(kind: FailureKind, message: impl Into<String>) -> Self {
        ExecutionOutcome::Failure(ExecutionFailure::new(kind, message))
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ExecutionOutcome::Success { .. })
    }

    pub fn error_kind(&self) -> Option<FailureKind> {
        match self {
            ExecutionOutcome::Success { .. } => None,
            ExecutionOutcome::Failure(f) => Some(f.kind),
        }
    }

    pub fn data(&self) -> Option<&Value> {
        match self {
            ExecutionOutcome::Success { data } => Some(data),
            ExecutionOutcome::Failure(_) => None,
        }
    }

    pub fn as_failure(&self) -> Option<&ExecutionFailure> {
        match self {
            ExecutionOutcome::Success { .. } => None,
            ExecutionOutcome::Failure(f) => Some(f),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_success_accessors() {
        let outcome = ExecutionOutcome::success(json!([1, 2]));
        assert!(outcome.is_success());
        assert_eq!(outcome.error_kind(), None);
        assert_eq!(outcome.data(), Some(&json!([1, 2])));
        assert!(outcome.as_failure().is_none());
    }

    #[test]
    fn test_failure_accessors() {
        let outcome = ExecutionOutcome::Failure(
            ExecutionFailure::new(FailureKind::MissingField, "property 'x' not found")
                .with_detail("MissingField"),
        );
        assert!(!outcome.is_success());
        assert_eq!(outcome.error_kind(), Some(FailureKind::MissingField));
        assert!(outcome.data().is_none());
        assert_eq!(
            outcome.as_failure().unwrap().detail.as_deref(),
            Some("MissingField")
        );
    }

    #[test]
    fn test_serde_tagging() {
        let json = serde_json::to_value(ExecutionOutcome::success(json!(1))).unwrap();
        assert_eq!(json["status"], "success");
        let json = serde_json::to_value(ExecutionOutcome::failure(FailureKind::Timeout, "slow")).unwrap();
        assert_eq!(json["status"], "failure");
        assert_eq!(json["kind"], "timeout");
    }
}
