//! Collaborator boundary: code generation, repair, review, and rendering.
//!
//! The core never talks to a model directly. It holds trait objects and
//! treats every call as an untrusted, possibly slow suspension point.

pub mod http;
pub mod prompt;
pub mod scripted;

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::domain::CandidateProgram;
use crate::interpreter::ResponsePayload;

pub use http::ChatCompletionsClient;
pub use scripted::{RepairCall, ScriptedGenerator, ScriptedReply};

/// Errors from a collaborator call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GenerationError {
    #[error("collaborator unavailable: {0}")]
    Unavailable(String),

    #[error("malformed collaborator response: {0}")]
    MalformedResponse(String),

    #[error("collaborator did not answer within {ms}ms")]
    Timeout { ms: u64 },

    #[error("collaborator returned an empty program")]
    EmptyProgram,

    #[error("collaborator judged the question unrelated to the available data")]
    Unrelated,
}

/// Result type for collaborator calls.
pub type GenerationResult<T> = std::result::Result<T, GenerationError>;

/// Produces and repairs candidate programs.
#[async_trait]
pub trait CodeGenerator: Send + Sync {
    async fn generate_code(
        &self,
        question: &str,
        schema_context: &str,
    ) -> GenerationResult<CandidateProgram>;

    async fn repair_code(
        &self,
        question: &str,
        failing_program: &CandidateProgram,
        failure_message: &str,
    ) -> GenerationResult<CandidateProgram>;
}

/// Second opinion on a syntactically valid program.
#[async_trait]
pub trait AdvisoryReviewer: Send + Sync {
    async fn review(
        &self,
        question: &str,
        program: &CandidateProgram,
    ) -> GenerationResult<Advisory>;
}

/// Turns an interpreted result into natural-language text.
#[async_trait]
pub trait AnswerRenderer: Send + Sync {
    async fn render_answer(
        &self,
        question: &str,
        payload: &ResponsePayload,
    ) -> GenerationResult<String>;
}

/// Reviewer opinion on one program.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Advisory {
    pub flagged: bool,
    pub reason: String,
}

impl Advisory {
    pub fn clear() -> Self {
        Self {
            flagged: false,
            reason: String::new(),
        }
    }

    pub fn flagged(reason: impl Into<String>) -> Self {
        Self {
            flagged: true,
            reason: reason.into(),
        }
    }

    /// Parse a reviewer reply. Anything starting with `INVALID` is a flag.
    pub fn from_reply(reply: &str) -> Self {
        const MARKER: &str = "INVALID";
        let reply = reply.trim();
        let flagged = reply
            .get(..MARKER.len())
            .is_some_and(|head| head.eq_ignore_ascii_case(MARKER));
        if flagged {
            let reason = reply[MARKER.len()..]
                .trim_start_matches(|c: char| c == '-' || c == ':' || c.is_whitespace())
                .to_string();
            Self::flagged(if reason.is_empty() {
                "flagged by reviewer".to_string()
            } else {
                reason
            })
        } else {
            Self::clear()
        }
    }
}

/// Reject replies that are not programs: blank text or the unrelated marker.
pub fn require_program(program: CandidateProgram) -> GenerationResult<CandidateProgram> {
    if program.is_blank() {
        Err(GenerationError::EmptyProgram)
    } else if program.is_unrelated_marker() {
        Err(GenerationError::Unrelated)
    } else {
        Ok(program)
    }
}

/// Await a collaborator call under a timeout, racing cancellation.
///
/// Returns `None` when `cancel` fired first; the call is dropped.
pub async fn bounded<T, F>(
    call: F,
    timeout_ms: u64,
    cancel: &CancellationToken,
) -> Option<GenerationResult<T>>
where
    F: Future<Output = GenerationResult<T>>,
{
    tokio::select! {
        _ = cancel.cancelled() => None,
        res = tokio::time::timeout(Duration::from_millis(timeout_ms), call) => Some(
            res.unwrap_or(Err(GenerationError::Timeout { ms: timeout_ms }))
        ),
    }
}
