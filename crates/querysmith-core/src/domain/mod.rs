//! Domain models for querysmith.
//!
//! Canonical definitions for the values that flow through the pipeline:
//! - `CandidateProgram`: source text from the code generator
//! - `ExecutionContext`: data-source bindings visible to a run
//! - `ValidationVerdict` / `ExecutionOutcome`: per-attempt results
//! - `FailureKind`: the shared failure taxonomy

pub mod context;
pub mod error;
pub mod failure;
pub mod outcome;
pub mod program;
pub mod verdict;

pub use context::ExecutionContext;
pub use error::{QsError, Result};
pub use failure::FailureKind;
pub use outcome::{ExecutionFailure, ExecutionOutcome};
pub use program::{CandidateProgram, UNRELATED_MARKER};
pub use verdict::{LineInfo, ValidationVerdict};
