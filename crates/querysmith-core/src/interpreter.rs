//! Maps a terminal loop result to a response-ready payload.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::FailureKind;
use crate::repair::FinalResult;

const NO_DATA_TEXT: &str = "No data was returned from the query.";

/// What the caller hands to the rendering collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponsePayload {
    /// Data from a successful run, unchanged.
    Answer { data: Value, trusted: bool },
    /// Category and a fixed user-safe summary. Carries no trace or code.
    Failure {
        category: FailureKind,
        summary: String,
    },
}

impl ResponsePayload {
    pub fn is_answer(&self) -> bool {
        matches!(self, ResponsePayload::Answer { .. })
    }

    /// Answer data as text for rendering.
    pub fn data_text(&self) -> String {
        match self {
            ResponsePayload::Answer { data, .. } => match data {
                Value::String(s) => s.clone(),
                Value::Null => NO_DATA_TEXT.to_string(),
                Value::Array(_) | Value::Object(_) => {
                    serde_json::to_string_pretty(data).unwrap_or_else(|_| data.to_string())
                }
                other => other.to_string(),
            },
            ResponsePayload::Failure { summary, .. } => summary.clone(),
        }
    }
}

/// Interpret a final result. Pure: no I/O, `result` is not modified.
pub fn interpret(result: &FinalResult) -> ResponsePayload {
    match result {
        FinalResult::Executed { data, .. } => ResponsePayload::Answer {
            data: data.clone(),
            trusted: true,
        },
        FinalResult::Exhausted { last_failure, .. } => ResponsePayload::Failure {
            category: last_failure.kind,
            summary: last_failure.kind.user_summary().to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::CandidateProgram;
    use crate::repair::TerminalFailure;
    use serde_json::json;

    fn executed(data: Value) -> FinalResult {
        FinalResult::Executed {
            data,
            program: CandidateProgram::new("fn run() { 1 }"),
            repair_rounds: 0,
        }
    }

    #[test]
    fn test_success_data_passes_through_unchanged() {
        for data in [json!([1, 2, 3]), json!({"a": {"b": null}}), json!("text"), json!(null), json!(2.5)] {
            match interpret(&executed(data.clone())) {
                ResponsePayload::Answer { data: out, trusted } => {
                    assert_eq!(out, data);
                    assert!(trusted);
                }
                other => panic!("expected answer, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_failure_hides_message_and_detail() {
        let result = FinalResult::Exhausted {
            last_failure: TerminalFailure {
                kind: FailureKind::ResourceNotFound,
                message: "record 'alice' not found".into(),
                detail: Some("in call to function 'run' at <records>/alice.json".into()),
            },
            repair_rounds: 2,
        };
        let payload = interpret(&result);
        assert_eq!(
            payload,
            ResponsePayload::Failure {
                category: FailureKind::ResourceNotFound,
                summary: "a required record could not be found".into(),
            }
        );
        let text = serde_json::to_string(&payload).unwrap();
        assert!(!text.contains("alice"));
        assert!(!text.contains("<records>"));
    }

    #[test]
    fn test_data_text_rendering() {
        let text = |data: Value| interpret(&executed(data)).data_text();
        assert_eq!(text(json!("plain")), "plain");
        assert_eq!(text(json!(null)), NO_DATA_TEXT);
        assert_eq!(text(json!(42)), "42");
        assert_eq!(text(json!(true)), "true");
        assert_eq!(text(json!([1])), "[\n  1\n]");
    }
}
