//! In-memory scripted collaborator (testing and offline runs).
//!
//! Replies are consumed in order. When a queue runs dry the configured
//! fallback is repeated, or the call fails as `Unavailable`.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::domain::CandidateProgram;
use crate::interpreter::ResponsePayload;

use super::{
    Advisory, AdvisoryReviewer, AnswerRenderer, CodeGenerator, GenerationError,
    GenerationResult,
};

/// One scripted collaborator reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptedReply {
    Program(CandidateProgram),
    Fail(GenerationError),
    /// Never answers; exercises timeouts and cancellation.
    Hang,
}

impl ScriptedReply {
    pub fn program(source: impl Into<String>) -> Self {
        ScriptedReply::Program(CandidateProgram::new(source))
    }

    async fn resolve(self) -> GenerationResult<CandidateProgram> {
        match self {
            ScriptedReply::Program(p) => Ok(p),
            ScriptedReply::Fail(e) => Err(e),
            ScriptedReply::Hang => std::future::pending().await,
        }
    }
}

/// A repair request as the collaborator received it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepairCall {
    pub question: String,
    pub failing_program: CandidateProgram,
    pub failure_message: String,
}

#[derive(Debug, Default)]
pub struct ScriptedGenerator {
    generate: Mutex<VecDeque<ScriptedReply>>,
    repair: Mutex<VecDeque<ScriptedReply>>,
    repair_fallback: Option<ScriptedReply>,
    advisories: Mutex<VecDeque<GenerationResult<Advisory>>>,
    generate_calls: Mutex<Vec<String>>,
    repair_calls: Mutex<Vec<RepairCall>>,
    review_calls: Mutex<usize>,
}

impl ScriptedGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_generate(self, reply: ScriptedReply) -> Self {
        self.generate.lock().unwrap().push_back(reply);
        self
    }

    pub fn on_repair(self, reply: ScriptedReply) -> Self {
        self.repair.lock().unwrap().push_back(reply);
        self
    }

    /// Reply used for every repair once the queue is empty.
    pub fn repair_always(mut self, reply: ScriptedReply) -> Self {
        self.repair_fallback = Some(reply);
        self
    }

    pub fn on_review(self, advisory: GenerationResult<Advisory>) -> Self {
        self.advisories.lock().unwrap().push_back(advisory);
        self
    }

    pub fn generate_calls(&self) -> Vec<String> {
        self.generate_calls.lock().unwrap().clone()
    }

    pub fn repair_calls(&self) -> Vec<RepairCall> {
        self.repair_calls.lock().unwrap().clone()
    }

    pub fn review_count(&self) -> usize {
        *self.review_calls.lock().unwrap()
    }

    fn exhausted() -> ScriptedReply {
        ScriptedReply::Fail(GenerationError::Unavailable("no scripted reply".into()))
    }
}

#[async_trait]
impl CodeGenerator for ScriptedGenerator {
    async fn generate_code(
        &self,
        question: &str,
        _schema_context: &str,
    ) -> GenerationResult<CandidateProgram> {
        self.generate_calls.lock().unwrap().push(question.to_string());
        let reply = self
            .generate
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(Self::exhausted);
        reply.resolve().await
    }

    async fn repair_code(
        &self,
        question: &str,
        failing_program: &CandidateProgram,
        failure_message: &str,
    ) -> GenerationResult<CandidateProgram> {
        self.repair_calls.lock().unwrap().push(RepairCall {
            question: question.to_string(),
            failing_program: failing_program.clone(),
            failure_message: failure_message.to_string(),
        });
        let reply = self
            .repair
            .lock()
            .unwrap()
            .pop_front()
            .or_else(|| self.repair_fallback.clone())
            .unwrap_or_else(Self::exhausted);
        reply.resolve().await
    }
}

#[async_trait]
impl AdvisoryReviewer for ScriptedGenerator {
    async fn review(
        &self,
        _question: &str,
        _program: &CandidateProgram,
    ) -> GenerationResult<Advisory> {
        *self.review_calls.lock().unwrap() += 1;
        self.advisories
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(Advisory::clear()))
    }
}

#[async_trait]
impl AnswerRenderer for ScriptedGenerator {
    async fn render_answer(
        &self,
        _question: &str,
        payload: &ResponsePayload,
    ) -> GenerationResult<String> {
        Ok(match payload {
            ResponsePayload::Answer { .. } => payload.data_text(),
            ResponsePayload::Failure { summary, .. } => {
                format!("Sorry, the question could not be answered: {summary}.")
            }
        })
    }
}
