//! Failure taxonomy shared by the validator, the sandbox, and the repair loop.

use serde::{Deserialize, Serialize};

/// Category of a failed validation, execution, or generation step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    SyntaxError,
    SemanticAdvisory,
    MissingEntryPoint,
    ResourceNotFound,
    MalformedData,
    MissingField,
    EmptyInput,
    Timeout,
    UnexpectedError,
    GenerationError,
}

impl FailureKind {
    /// Every kind, in taxonomy order.
    pub const ALL: [FailureKind; 10] = [
        FailureKind::SyntaxError,
        FailureKind::SemanticAdvisory,
        FailureKind::MissingEntryPoint,
        FailureKind::ResourceNotFound,
        FailureKind::MalformedData,
        FailureKind::MissingField,
        FailureKind::EmptyInput,
        FailureKind::Timeout,
        FailureKind::UnexpectedError,
        FailureKind::GenerationError,
    ];

    /// Short explanation that is safe to show to an end user.
    pub fn user_summary(self) -> &'static str {
        match self {
            FailureKind::SyntaxError | FailureKind::SemanticAdvisory => {
                "a technical issue prevented building a valid query for this question"
            }
            FailureKind::MissingEntryPoint => {
                "the generated query was incomplete and could not be run"
            }
            FailureKind::ResourceNotFound => "a required record could not be found",
            FailureKind::MalformedData => "a required record could not be read because it is malformed",
            FailureKind::MissingField => {
                "the expected information is not present in the available records"
            }
            FailureKind::EmptyInput => "a required lookup table is empty or improperly formatted",
            FailureKind::Timeout => "the query took too long or used too many resources",
            FailureKind::UnexpectedError => "an unexpected error occurred while running the query",
            FailureKind::GenerationError => "a query could not be generated for this question",
        }
    }

    /// Whether this kind is produced by the validator rather than the sandbox.
    pub fn is_validation(self) -> bool {
        matches!(self, FailureKind::SyntaxError | FailureKind::SemanticAdvisory)
    }

    fn as_str(self) -> &'static str {
        match self {
            FailureKind::SyntaxError => "syntax_error",
            FailureKind::SemanticAdvisory => "semantic_advisory",
            FailureKind::MissingEntryPoint => "missing_entry_point",
            FailureKind::ResourceNotFound => "resource_not_found",
            FailureKind::MalformedData => "malformed_data",
            FailureKind::MissingField => "missing_field",
            FailureKind::EmptyInput => "empty_input",
            FailureKind::Timeout => "timeout",
            FailureKind::UnexpectedError => "unexpected_error",
            FailureKind::GenerationError => "generation_error",
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
