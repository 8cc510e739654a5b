//! Advisory review layered over the authoritative syntax check.

use tracing::warn;

use crate::collaborator::AdvisoryReviewer;
use crate::domain::{CandidateProgram, ValidationVerdict};

use super::SyntaxValidator;

/// Validate, then ask `reviewer` for a second opinion.
///
/// The reviewer is only consulted when the syntax check passed, and can
/// only downgrade a passing verdict to `SemanticAdvisory`. A reviewer
/// error leaves the authoritative verdict in place.
pub async fn validate_with_advisory(
    validator: &SyntaxValidator,
    question: &str,
    program: &CandidateProgram,
    reviewer: Option<&dyn AdvisoryReviewer>,
) -> ValidationVerdict {
    let verdict = validator.validate(program);
    let Some(reviewer) = reviewer else {
        return verdict;
    };
    if !verdict.valid {
        return verdict;
    }

    match reviewer.review(question, program).await {
        Ok(advisory) if advisory.flagged => ValidationVerdict::advisory(advisory.reason),
        Ok(_) => verdict,
        Err(e) => {
            warn!(event = "validator.advisory_failed", error = %e);
            verdict
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborator::{Advisory, GenerationError, ScriptedGenerator};
    use crate::domain::FailureKind;

    #[tokio::test]
    async fn test_flag_downgrades_valid_verdict() {
        let reviewer = ScriptedGenerator::new().on_review(Ok(Advisory::flagged("reads nothing")));
        let v = validate_with_advisory(
            &SyntaxValidator::default(),
            "q",
            &CandidateProgram::new("fn run() { 1 }"),
            Some(&reviewer),
        )
        .await;
        assert!(!v.valid);
        assert_eq!(v.failure_kind, Some(FailureKind::SemanticAdvisory));
        assert_eq!(v.message, "reads nothing");
    }

    #[tokio::test]
    async fn test_reviewer_skipped_after_syntax_error() {
        let reviewer = ScriptedGenerator::new();
        let v = validate_with_advisory(
            &SyntaxValidator::default(),
            "q",
            &CandidateProgram::new("fn run( {"),
            Some(&reviewer),
        )
        .await;
        assert_eq!(v.failure_kind, Some(FailureKind::SyntaxError));
        assert_eq!(reviewer.review_count(), 0);
    }

    #[tokio::test]
    async fn test_reviewer_error_keeps_verdict() {
        let reviewer = ScriptedGenerator::new()
            .on_review(Err(GenerationError::Unavailable("down".into())));
        let v = validate_with_advisory(
            &SyntaxValidator::default(),
            "q",
            &CandidateProgram::new("fn run() { 1 }"),
            Some(&reviewer),
        )
        .await;
        assert!(v.valid);
    }
}
