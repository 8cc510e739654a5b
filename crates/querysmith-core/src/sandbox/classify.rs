//! Mapping of Rhai runtime faults onto the failure taxonomy.

use rhai::EvalAltResult;

use crate::domain::{ExecutionContext, ExecutionFailure, FailureKind};

use super::bindings::BindingFault;
use super::engine::TERMINATED_CANCELLED;

/// Classify a runtime fault raised while running the entry point.
///
/// Specific kinds are matched first; anything else becomes
/// `UnexpectedError` with the fault's type name and a redacted trace
/// in `detail`.
pub(crate) fn classify(err: &EvalAltResult, ctx: &ExecutionContext) -> ExecutionFailure {
    let trace = ctx.redact(&err.to_string());
    let root = innermost(err);

    let failure = match root {
        EvalAltResult::ErrorRuntime(value, _) => match value.clone().try_cast::<BindingFault>() {
            Some(fault) => ExecutionFailure::new(fault.kind, ctx.redact(&fault.message)),
            None => unexpected("RuntimeError", format!("script raised: {value}"), ctx),
        },
        EvalAltResult::ErrorPropertyNotFound(name, _) => ExecutionFailure::new(
            FailureKind::MissingField,
            format!("field '{name}' does not exist"),
        ),
        EvalAltResult::ErrorIndexNotFound(key, _) => ExecutionFailure::new(
            FailureKind::MissingField,
            format!("key '{key}' does not exist"),
        ),
        EvalAltResult::ErrorTerminated(reason, _) => {
            if reason.clone().into_string().ok().as_deref() == Some(TERMINATED_CANCELLED) {
                ExecutionFailure::new(FailureKind::Timeout, "execution was cancelled")
            } else {
                ExecutionFailure::new(FailureKind::Timeout, "execution exceeded its time limit")
            }
        }
        EvalAltResult::ErrorTooManyOperations(_) => ExecutionFailure::new(
            FailureKind::Timeout,
            "execution exceeded its operation budget",
        ),
        EvalAltResult::ErrorStackOverflow(_) => ExecutionFailure::new(
            FailureKind::Timeout,
            "execution exceeded its call depth",
        ),
        EvalAltResult::ErrorDataTooLarge(what, _) => ExecutionFailure::new(
            FailureKind::Timeout,
            format!("execution exceeded its size limit: {what}"),
        ),
        other => unexpected(type_name(other), ctx.redact(&other.to_string()), ctx),
    };

    if failure.kind == FailureKind::UnexpectedError {
        let type_name = failure.detail.clone().unwrap_or_default();
        failure.with_detail(format!("{type_name}\n{trace}"))
    } else {
        failure.with_detail(trace)
    }
}

fn unexpected(type_name: &str, message: String, ctx: &ExecutionContext) -> ExecutionFailure {
    ExecutionFailure::new(FailureKind::UnexpectedError, ctx.redact(&message)).with_detail(type_name)
}

/// Unwrap function-call and module frames down to the originating fault.
fn innermost(err: &EvalAltResult) -> &EvalAltResult {
    match err {
        EvalAltResult::ErrorInFunctionCall(_, _, inner, _) => innermost(inner),
        EvalAltResult::ErrorInModule(_, inner, _) => innermost(inner),
        other => other,
    }
}

fn type_name(err: &EvalAltResult) -> &'static str {
    match err {
        EvalAltResult::ErrorArithmetic(..) => "ArithmeticError",
        EvalAltResult::ErrorFunctionNotFound(..) => "FunctionNotFound",
        EvalAltResult::ErrorVariableNotFound(..) => "VariableNotFound",
        EvalAltResult::ErrorMismatchDataType(..) => "TypeMismatch",
        EvalAltResult::ErrorMismatchOutputType(..) => "OutputTypeMismatch",
        EvalAltResult::ErrorIndexingType(..) => "IndexingTypeError",
        EvalAltResult::ErrorArrayBounds(..) => "IndexOutOfBounds",
        EvalAltResult::ErrorStringBounds(..) => "IndexOutOfBounds",
        EvalAltResult::ErrorFor(..) => "NotIterable",
        EvalAltResult::ErrorDotExpr(..) => "DotExpressionError",
        EvalAltResult::ErrorAssignmentToConstant(..) => "AssignmentToConstant",
        EvalAltResult::ErrorModuleNotFound(..) => "ModuleNotFound",
        EvalAltResult::ErrorParsing(..) => "ParseError",
        _ => "RuntimeError",
    }
}
