//! End-to-end handling of one question.
//!
//! generate → repair loop → interpret → optional render → optional audit.
//! Each question owns its own loop state; nothing mutable is shared
//! between concurrent questions.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use futures::future::join_all;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

use crate::audit::{write_audit_record, AuditRecord};
use crate::collaborator::{
    bounded, require_program, AdvisoryReviewer, AnswerRenderer, CodeGenerator,
};
use crate::config::QuerysmithConfig;
use crate::domain::{ExecutionContext, QsError};
use crate::interpreter::{interpret, ResponsePayload};
use crate::obs;
use crate::repair::{FinalResult, RepairLog, RepairLoop, RepairPolicy, TerminalFailure};
use crate::sandbox::{CapabilityTable, SandboxError, SandboxExecutor};
use crate::validator::SyntaxValidator;

/// Errors that stop a question without a terminal result.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("request cancelled")]
    Cancelled,

    #[error(transparent)]
    Sandbox(SandboxError),

    #[error(transparent)]
    Context(#[from] QsError),
}

impl From<SandboxError> for PipelineError {
    fn from(err: SandboxError) -> Self {
        match err {
            SandboxError::Cancelled => PipelineError::Cancelled,
            other => PipelineError::Sandbox(other),
        }
    }
}

/// Result type for pipeline operations.
pub type PipelineResult<T> = std::result::Result<T, PipelineError>;

/// Everything produced for one question.
#[derive(Debug, Clone)]
pub struct Answer {
    pub question_id: String,
    pub payload: ResponsePayload,
    /// Natural-language text, when a renderer is configured and answered.
    pub rendered: Option<String>,
    pub log: RepairLog,
    pub audit_path: Option<PathBuf>,
}

pub struct Pipeline {
    generator: Arc<dyn CodeGenerator>,
    reviewer: Option<Arc<dyn AdvisoryReviewer>>,
    renderer: Option<Arc<dyn AnswerRenderer>>,
    validator: SyntaxValidator,
    executor: SandboxExecutor,
    policy: RepairPolicy,
    audit_dir: Option<PathBuf>,
}

impl Pipeline {
    pub fn new(generator: Arc<dyn CodeGenerator>, config: &QuerysmithConfig) -> Self {
        Self {
            generator,
            reviewer: None,
            renderer: None,
            validator: SyntaxValidator::new(config.sandbox.clone()),
            executor: SandboxExecutor::new(config.sandbox.clone())
                .with_entry_point(config.entry_point.clone()),
            policy: config.repair.clone(),
            audit_dir: config.audit_dir.clone(),
        }
    }

    pub fn with_reviewer(mut self, reviewer: Arc<dyn AdvisoryReviewer>) -> Self {
        self.reviewer = Some(reviewer);
        self
    }

    pub fn with_renderer(mut self, renderer: Arc<dyn AnswerRenderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    pub fn with_capabilities(mut self, capabilities: CapabilityTable) -> Self {
        self.executor = self.executor.with_capabilities(capabilities);
        self
    }

    pub fn validator(&self) -> &SyntaxValidator {
        &self.validator
    }

    pub fn executor(&self) -> &SandboxExecutor {
        &self.executor
    }

    /// Answer one question against `ctx`.
    ///
    /// `ctx` is checked first (absolute, existing paths). Cancellation
    /// aborts any in-flight collaborator call or sandbox run.
    pub async fn answer(
        &self,
        question: &str,
        schema_context: &str,
        ctx: &ExecutionContext,
        cancel: &CancellationToken,
    ) -> PipelineResult<Answer> {
        ctx.validate()?;
        let question_id = Uuid::new_v4().to_string();
        let span = obs::question_span(&question_id);
        self.answer_inner(question_id, question, schema_context, ctx, cancel)
            .instrument(span)
            .await
    }

    /// Answer independent questions concurrently, results in input order.
    pub async fn answer_many(
        &self,
        questions: &[String],
        schema_context: &str,
        ctx: &ExecutionContext,
        cancel: &CancellationToken,
    ) -> Vec<PipelineResult<Answer>> {
        join_all(
            questions
                .iter()
                .map(|q| self.answer(q, schema_context, ctx, cancel)),
        )
        .await
    }

    async fn answer_inner(
        &self,
        question_id: String,
        question: &str,
        schema_context: &str,
        ctx: &ExecutionContext,
        cancel: &CancellationToken,
    ) -> PipelineResult<Answer> {
        let started = Instant::now();
        obs::emit_question_started(&question_id, question);

        let generated = bounded(
            self.generator.generate_code(question, schema_context),
            self.policy.collaborator_timeout_ms,
            cancel,
        )
        .await
        .ok_or(PipelineError::Cancelled)?
        .and_then(require_program);

        let log = match generated {
            Ok(program) => {
                RepairLoop::new(
                    self.generator.as_ref(),
                    &self.validator,
                    &self.executor,
                    &self.policy,
                )
                .with_reviewer(self.reviewer.as_deref())
                .run(&question_id, question, program, ctx, cancel)
                .await?
            }
            Err(err) => {
                obs::emit_generation_failed(&question_id, &err);
                let now = Utc::now();
                RepairLog {
                    question_id: question_id.clone(),
                    result: FinalResult::Exhausted {
                        last_failure: TerminalFailure::generation(&err),
                        repair_rounds: 0,
                    },
                    attempts: Vec::new(),
                    transitions: Vec::new(),
                    started_at: now,
                    finished_at: now,
                }
            }
        };

        let payload = interpret(&log.result);
        let rendered = self.render(&question_id, question, &payload, cancel).await?;
        let audit_path = self.audit(question, &log, &payload);

        obs::emit_question_finished(
            &question_id,
            started.elapsed().as_millis() as u64,
            payload.is_answer(),
        );
        Ok(Answer {
            question_id,
            payload,
            rendered,
            log,
            audit_path,
        })
    }

    async fn render(
        &self,
        question_id: &str,
        question: &str,
        payload: &ResponsePayload,
        cancel: &CancellationToken,
    ) -> PipelineResult<Option<String>> {
        let Some(renderer) = &self.renderer else {
            return Ok(None);
        };
        let rendered = bounded(
            renderer.render_answer(question, payload),
            self.policy.collaborator_timeout_ms,
            cancel,
        )
        .await
        .ok_or(PipelineError::Cancelled)?;
        match rendered {
            Ok(text) => Ok(Some(text)),
            Err(e) => {
                obs::emit_postprocess_error(question_id, "render", &e);
                Ok(None)
            }
        }
    }

    fn audit(&self, question: &str, log: &RepairLog, payload: &ResponsePayload) -> Option<PathBuf> {
        let dir = self.audit_dir.as_ref()?;
        let record = AuditRecord::new(question, log, payload);
        match write_audit_record(&record, dir) {
            Ok(path) => Some(path),
            Err(e) => {
                obs::emit_postprocess_error(&log.question_id, "audit", &e);
                None
            }
        }
    }
}
