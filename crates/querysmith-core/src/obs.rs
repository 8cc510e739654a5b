//! Structured observability hooks for question lifecycle events.
//!
//! Every event carries an `event` field (`question.started`,
//! `loop.transition`, ...) and the `question_id`, so one question can be
//! followed through JSON logs.

use tracing::{info, warn};

use crate::collaborator::GenerationError;
use crate::domain::{CandidateProgram, FailureKind};
use crate::repair::{FinalResult, LoopState};

/// Characters of a failure message kept in log lines.
const MESSAGE_PREVIEW: usize = 160;
/// Characters of the failing program kept in log lines.
const PROGRAM_PREVIEW: usize = 80;

/// Span tagging everything inside it with `question_id`.
///
/// Async callers attach it with `tracing::Instrument`.
pub fn question_span(question_id: &str) -> tracing::Span {
    tracing::info_span!("querysmith.question", question_id = %question_id)
}

pub fn emit_question_started(question_id: &str, question: &str) {
    info!(
        event = "question.started",
        question_id = %question_id,
        question_chars = question.chars().count(),
    );
}

pub fn emit_generation_failed(question_id: &str, error: &GenerationError) {
    warn!(event = "generation.failed", question_id = %question_id, error = %error);
}

pub fn emit_transition(question_id: &str, round: u32, from: LoopState, to: LoopState) {
    info!(
        event = "loop.transition",
        question_id = %question_id,
        round = round,
        from = %from,
        to = %to,
    );
}

pub fn emit_attempt_failed(
    question_id: &str,
    round: u32,
    program: &CandidateProgram,
    kind: FailureKind,
    message: &str,
) {
    let preview: String = message.chars().take(MESSAGE_PREVIEW).collect();
    let stage = if kind.is_validation() {
        "validation"
    } else {
        "execution"
    };
    info!(
        event = "loop.attempt_failed",
        question_id = %question_id,
        round = round,
        stage = stage,
        kind = %kind,
        message = %preview,
        program = %program.preview(PROGRAM_PREVIEW),
    );
}

pub fn emit_repair_failed(question_id: &str, round: u32, error: &GenerationError) {
    warn!(event = "loop.repair_failed", question_id = %question_id, round = round, error = %error);
}

pub fn emit_loop_finished(question_id: &str, result: &FinalResult) {
    let kind = result
        .failure_kind()
        .map(|k| k.to_string())
        .unwrap_or_default();
    info!(
        event = "loop.finished",
        question_id = %question_id,
        executed = result.is_executed(),
        repair_rounds = result.repair_rounds(),
        kind = %kind,
    );
}

pub fn emit_question_finished(question_id: &str, duration_ms: u64, answered: bool) {
    info!(
        event = "question.finished",
        question_id = %question_id,
        duration_ms = duration_ms,
        answered = answered,
    );
}

/// Non-fatal problems after the loop (rendering, audit).
pub fn emit_postprocess_error(question_id: &str, stage: &str, error: &dyn std::fmt::Display) {
    warn!(event = "question.postprocess_error", question_id = %question_id, stage = %stage, error = %error);
}
