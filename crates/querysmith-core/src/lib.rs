//! querysmith core library
//!
//! Turns a candidate query program from a code-generating collaborator into
//! a trusted result or a classified failure: validate, run in a
//! capability-restricted sandbox, repair within a bounded number of rounds,
//! and interpret the terminal result.

pub mod audit;
pub mod collaborator;
pub mod config;
pub mod domain;
pub mod interpreter;
pub mod obs;
pub mod pipeline;
pub mod repair;
pub mod sandbox;
pub mod telemetry;
pub mod validator;

pub use audit::{read_audit_record, write_audit_record, AuditRecord};

pub use collaborator::{
    Advisory, AdvisoryReviewer, AnswerRenderer, ChatCompletionsClient, CodeGenerator,
    GenerationError, GenerationResult, ScriptedGenerator, ScriptedReply,
};

pub use config::{ModelConfig, QuerysmithConfig};

pub use domain::{
    CandidateProgram, ExecutionContext, ExecutionFailure, ExecutionOutcome, FailureKind,
    LineInfo, QsError, Result, ValidationVerdict,
};

pub use interpreter::{interpret, ResponsePayload};

pub use pipeline::{Answer, Pipeline, PipelineError, PipelineResult};

pub use repair::{
    AttemptFailure, FinalResult, LoopState, RepairAttempt, RepairLog, RepairLoop, RepairPolicy,
    TerminalFailure,
};

pub use sandbox::{
    Capability, CapabilityTable, SandboxError, SandboxExecutor, SandboxLimits,
};

pub use validator::SyntaxValidator;

/// Crate version, exposed for CLI `--version` output.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
