//! The bounded validate → execute → repair loop.

use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::collaborator::{bounded, require_program, AdvisoryReviewer, CodeGenerator};
use crate::domain::{CandidateProgram, ExecutionContext, ExecutionOutcome, ValidationVerdict};
use crate::obs;
use crate::pipeline::PipelineError;
use crate::sandbox::SandboxExecutor;
use crate::validator::{validate_with_advisory, SyntaxValidator};

use super::attempt::{AttemptFailure, FinalResult, RepairAttempt, RepairLog, TerminalFailure};
use super::state::{LoopState, StateTrace};

/// Bounds on the repair loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepairPolicy {
    /// Repair invocations allowed per question. The first candidate is free.
    pub max_rounds: u32,
    /// Timeout for each collaborator call (milliseconds).
    pub collaborator_timeout_ms: u64,
    /// Ask the reviewer for an advisory opinion after each passing parse.
    pub advisory_review: bool,
}

impl Default for RepairPolicy {
    fn default() -> Self {
        Self {
            max_rounds: 2,
            collaborator_timeout_ms: 60_000,
            advisory_review: false,
        }
    }
}

/// One question's loop over a validator, an executor, and a generator.
///
/// Holds no state between runs; the round counter and attempt list live
/// inside [`RepairLoop::run`].
pub struct RepairLoop<'a> {
    generator: &'a dyn CodeGenerator,
    reviewer: Option<&'a dyn AdvisoryReviewer>,
    validator: &'a SyntaxValidator,
    executor: &'a SandboxExecutor,
    policy: &'a RepairPolicy,
}

impl<'a> RepairLoop<'a> {
    pub fn new(
        generator: &'a dyn CodeGenerator,
        validator: &'a SyntaxValidator,
        executor: &'a SandboxExecutor,
        policy: &'a RepairPolicy,
    ) -> Self {
        Self {
            generator,
            reviewer: None,
            validator,
            executor,
            policy,
        }
    }

    pub fn with_reviewer(mut self, reviewer: Option<&'a dyn AdvisoryReviewer>) -> Self {
        self.reviewer = reviewer;
        self
    }

    /// Drive `initial` to a terminal result.
    ///
    /// Every candidate, first or repaired, is validated before it runs.
    /// Cancellation is the only error; every other failure ends in
    /// [`FinalResult::Exhausted`].
    pub async fn run(
        &self,
        question_id: &str,
        question: &str,
        initial: CandidateProgram,
        ctx: &ExecutionContext,
        cancel: &CancellationToken,
    ) -> Result<RepairLog, PipelineError> {
        let started_at = Utc::now();
        let mut trace = StateTrace::start();
        let mut attempts = Vec::new();
        let mut rounds = 0u32;
        let mut current = initial;

        let result = loop {
            self.enter(&mut trace, question_id, rounds, LoopState::Validating);
            let verdict = self.check(question, &current, cancel).await?;

            let failure = if verdict.valid {
                self.enter(&mut trace, question_id, rounds, LoopState::Executing);
                let outcome = self
                    .executor
                    .execute_cancellable(&current, ctx, cancel)
                    .await?;
                match outcome {
                    ExecutionOutcome::Success { data } => {
                        self.enter(&mut trace, question_id, rounds, LoopState::Succeeded);
                        break FinalResult::Executed {
                            data,
                            program: current,
                            repair_rounds: rounds,
                        };
                    }
                    ExecutionOutcome::Failure(failure) => AttemptFailure::Execution(failure),
                }
            } else {
                AttemptFailure::Validation(verdict)
            };
            obs::emit_attempt_failed(
                question_id,
                rounds,
                &current,
                failure.kind(),
                failure.message(),
            );

            if rounds >= self.policy.max_rounds {
                self.enter(&mut trace, question_id, rounds, LoopState::Exhausted);
                let last_failure = TerminalFailure::from(&failure);
                attempts.push(RepairAttempt {
                    attempt_index: rounds,
                    input_program: current,
                    failure,
                    produced_program: None,
                });
                break FinalResult::Exhausted {
                    last_failure,
                    repair_rounds: rounds,
                };
            }

            self.enter(&mut trace, question_id, rounds, LoopState::Repairing);
            let repaired = bounded(
                self.generator
                    .repair_code(question, &current, &failure.repair_message()),
                self.policy.collaborator_timeout_ms,
                cancel,
            )
            .await
            .ok_or(PipelineError::Cancelled)?
            .and_then(require_program);

            match repaired {
                Ok(next) => {
                    attempts.push(RepairAttempt {
                        attempt_index: rounds,
                        input_program: current,
                        failure,
                        produced_program: Some(next.clone()),
                    });
                    rounds += 1;
                    self.enter(&mut trace, question_id, rounds, LoopState::Generated);
                    current = next;
                }
                Err(err) => {
                    obs::emit_repair_failed(question_id, rounds, &err);
                    self.enter(&mut trace, question_id, rounds, LoopState::Exhausted);
                    attempts.push(RepairAttempt {
                        attempt_index: rounds,
                        input_program: current,
                        failure,
                        produced_program: None,
                    });
                    break FinalResult::Exhausted {
                        last_failure: TerminalFailure::generation(&err),
                        repair_rounds: rounds,
                    };
                }
            }
        };

        obs::emit_loop_finished(question_id, &result);
        Ok(RepairLog {
            question_id: question_id.to_string(),
            result,
            attempts,
            transitions: trace.states().to_vec(),
            started_at,
            finished_at: Utc::now(),
        })
    }

    fn enter(&self, trace: &mut StateTrace, question_id: &str, round: u32, next: LoopState) {
        let from = trace.current();
        trace.enter(next);
        obs::emit_transition(question_id, round, from, next);
    }

    async fn check(
        &self,
        question: &str,
        program: &CandidateProgram,
        cancel: &CancellationToken,
    ) -> Result<ValidationVerdict, PipelineError> {
        let reviewer = self.reviewer.filter(|_| self.policy.advisory_review);
        if reviewer.is_none() {
            return Ok(self.validator.validate(program));
        }

        let timeout = Duration::from_millis(self.policy.collaborator_timeout_ms);
        let review = validate_with_advisory(self.validator, question, program, reviewer);
        tokio::select! {
            _ = cancel.cancelled() => Err(PipelineError::Cancelled),
            res = tokio::time::timeout(timeout, review) => Ok(res.unwrap_or_else(|_| {
                warn!(event = "validator.advisory_timeout", timeout_ms = self.policy.collaborator_timeout_ms);
                self.validator.validate(program)
            })),
        }
    }
}
