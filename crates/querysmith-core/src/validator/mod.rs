//! Static validation of candidate programs.
//!
//! The authoritative check parses with the same language configuration the
//! sandbox uses and never evaluates anything. An optional reviewer may add
//! an advisory flag on top of a passing verdict (see [`advisory`]).

pub mod advisory;

use rhai::ParseError;

use crate::domain::{CandidateProgram, LineInfo, ValidationVerdict};
use crate::sandbox::engine::parse_engine;
use crate::sandbox::SandboxLimits;

pub use advisory::validate_with_advisory;

/// Purely syntactic validator.
#[derive(Debug, Clone, Default)]
pub struct SyntaxValidator {
    limits: SandboxLimits,
}

impl SyntaxValidator {
    /// Nesting ceilings in `limits` apply to parsing as well as running.
    pub fn new(limits: SandboxLimits) -> Self {
        Self { limits }
    }

    pub fn validate(&self, program: &CandidateProgram) -> ValidationVerdict {
        let engine = parse_engine(&self.limits);
        match engine.compile(program.source()) {
            Ok(_) => ValidationVerdict::valid(),
            Err(err) => verdict_from_parse_error(&err),
        }
    }
}

fn verdict_from_parse_error(err: &ParseError) -> ValidationVerdict {
    let pos = err.position();
    let line_info = pos.line().map(|line| LineInfo {
        line,
        column: pos.position(),
    });
    let message = match line_info {
        Some(LineInfo {
            line,
            column: Some(column),
        }) => format!("{} (line {line}, column {column})", err.err_type()),
        Some(LineInfo { line, column: None }) => format!("{} (line {line})", err.err_type()),
        None => err.err_type().to_string(),
    };
    ValidationVerdict::syntax_error(message, line_info)
}
