//! Validation verdicts.

use serde::{Deserialize, Serialize};

use super::failure::FailureKind;

/// Line/column of a parse failure (1-based).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineInfo {
    pub line: usize,
    pub column: Option<usize>,
}

/// Result of validating one candidate program.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationVerdict {
    pub valid: bool,
    /// Present iff `valid` is false.
    pub failure_kind: Option<FailureKind>,
    pub message: String,
    pub line_info: Option<LineInfo>,
}

impl ValidationVerdict {
    pub fn valid() -> Self {
        Self {
            valid: true,
            failure_kind: None,
            message: "program is syntactically valid".to_string(),
            line_info: None,
        }
    }

    pub fn syntax_error(message: impl Into<String>, line_info: Option<LineInfo>) -> Self {
        Self {
            valid: false,
            failure_kind: Some(FailureKind::SyntaxError),
            message: message.into(),
            line_info,
        }
    }

    pub fn advisory(message: impl Into<String>) -> Self {
        Self {
            valid: false,
            failure_kind: Some(FailureKind::SemanticAdvisory),
            message: message.into(),
            line_info: None,
        }
    }
}
