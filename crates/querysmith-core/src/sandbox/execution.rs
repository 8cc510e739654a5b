//! Execution controls: resource limits, the blocking worker, and cancellation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use rhai::{CallFnOptions, Dynamic, Scope};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::domain::{
    CandidateProgram, ExecutionContext, ExecutionFailure, ExecutionOutcome, FailureKind,
};

use super::bindings::DataSources;
use super::capability::{Capability, CapabilityTable};
use super::classify::classify;
use super::engine::{self, RunGuard};
use super::error::{SandboxError, SandboxResult};

/// Default name of the entry-point function.
pub const DEFAULT_ENTRY_POINT: &str = "run";

/// Extra wall-clock time granted before the watchdog gives up on a worker
/// that stopped reaching the progress hook.
const WATCHDOG_GRACE: Duration = Duration::from_millis(250);

/// How long a signalled worker may take to stop before it is detached.
const WORKER_SETTLE: Duration = Duration::from_secs(1);

/// Resource ceilings for a single sandboxed run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SandboxLimits {
    /// Maximum wall-clock time for one run (milliseconds).
    pub timeout_ms: u64,
    /// Maximum number of engine operations.
    pub max_operations: u64,
    pub max_call_levels: usize,
    pub max_expr_depth: usize,
    /// Maximum length of any string value (bytes).
    pub max_string_size: usize,
    pub max_array_size: usize,
    pub max_map_size: usize,
}

impl Default for SandboxLimits {
    fn default() -> Self {
        Self {
            timeout_ms: 5_000,
            max_operations: 5_000_000,
            max_call_levels: 32,
            max_expr_depth: 64,
            max_string_size: 1024 * 1024,
            max_array_size: 100_000,
            max_map_size: 100_000,
        }
    }
}

impl SandboxLimits {
    /// Zero disables a ceiling in the engine, so zero is rejected everywhere.
    pub fn validate(&self) -> SandboxResult<()> {
        let checks = [
            ("timeout_ms", self.timeout_ms == 0),
            ("max_operations", self.max_operations == 0),
            ("max_call_levels", self.max_call_levels == 0),
            ("max_expr_depth", self.max_expr_depth == 0),
            ("max_string_size", self.max_string_size == 0),
            ("max_array_size", self.max_array_size == 0),
            ("max_map_size", self.max_map_size == 0),
        ];
        match checks.iter().find(|(_, zero)| *zero) {
            Some((name, _)) => Err(SandboxError::InvalidLimits(format!(
                "{name} must be greater than zero"
            ))),
            None => Ok(()),
        }
    }
}

/// Runs candidate programs inside the restricted engine.
///
/// Each call builds a fresh engine on a blocking worker; nothing is shared
/// between runs except the immutable configuration held here.
#[derive(Debug, Clone)]
pub struct SandboxExecutor {
    limits: SandboxLimits,
    capabilities: CapabilityTable,
    entry_point: String,
}

impl SandboxExecutor {
    pub fn new(limits: SandboxLimits) -> Self {
        Self {
            limits,
            capabilities: CapabilityTable::standard(),
            entry_point: DEFAULT_ENTRY_POINT.to_string(),
        }
    }

    pub fn with_capabilities(mut self, capabilities: CapabilityTable) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn with_entry_point(mut self, entry_point: impl Into<String>) -> Self {
        self.entry_point = entry_point.into();
        self
    }

    pub fn limits(&self) -> &SandboxLimits {
        &self.limits
    }

    pub fn entry_point(&self) -> &str {
        &self.entry_point
    }

    /// Run `program` to completion or until a limit is hit.
    pub async fn execute(
        &self,
        program: &CandidateProgram,
        ctx: &ExecutionContext,
    ) -> SandboxResult<ExecutionOutcome> {
        self.execute_cancellable(program, ctx, &CancellationToken::new())
            .await
    }

    /// Run `program`, aborting when `cancel` fires.
    ///
    /// On cancellation the worker is signalled and awaited before
    /// returning [`SandboxError::Cancelled`], so no thread outlives the call.
    pub async fn execute_cancellable(
        &self,
        program: &CandidateProgram,
        ctx: &ExecutionContext,
        cancel: &CancellationToken,
    ) -> SandboxResult<ExecutionOutcome> {
        self.limits.validate()?;
        if cancel.is_cancelled() {
            return Err(SandboxError::Cancelled);
        }

        let timeout = Duration::from_millis(self.limits.timeout_ms);
        let abort = Arc::new(AtomicBool::new(false));
        let guard = RunGuard::new(Instant::now() + timeout, abort.clone());
        let job = RunJob {
            source: program.source().to_string(),
            ctx: ctx.clone(),
            capabilities: self.capabilities.clone(),
            limits: self.limits.clone(),
            entry_point: self.entry_point.clone(),
        };

        let started = Instant::now();
        let mut handle = tokio::task::spawn_blocking(move || job.run(guard));

        let outcome = tokio::select! {
            joined = &mut handle => match joined {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!(event = "sandbox.worker_failed", error = %e);
                    ExecutionOutcome::Failure(
                        ExecutionFailure::new(
                            FailureKind::UnexpectedError,
                            "execution worker stopped unexpectedly",
                        )
                        .with_detail(format!("WorkerPanic\n{e}")),
                    )
                }
            },
            _ = cancel.cancelled() => {
                abort.store(true, Ordering::Relaxed);
                settle(handle, WORKER_SETTLE).await;
                debug!(event = "sandbox.cancelled", elapsed_ms = started.elapsed().as_millis() as u64);
                return Err(SandboxError::Cancelled);
            }
            _ = tokio::time::sleep(timeout + WATCHDOG_GRACE) => {
                abort.store(true, Ordering::Relaxed);
                settle(handle, WORKER_SETTLE).await;
                ExecutionOutcome::failure(FailureKind::Timeout, "execution exceeded its time limit")
            }
        };

        debug!(
            event = "sandbox.executed",
            success = outcome.is_success(),
            data_access = self.capabilities.iter().any(Capability::is_data_access),
            kind = outcome.error_kind().map(|k| k.to_string()).unwrap_or_default(),
            elapsed_ms = started.elapsed().as_millis() as u64,
        );
        Ok(outcome)
    }
}

impl Default for SandboxExecutor {
    fn default() -> Self {
        Self::new(SandboxLimits::default())
    }
}

/// Wait for a signalled worker to stop, giving up after `grace`.
///
/// A worker blocked inside a native call never reaches the progress hook,
/// so it is detached instead of awaited without bound. Returns whether the
/// worker stopped in time.
async fn settle<T>(handle: JoinHandle<T>, grace: Duration) -> bool {
    match tokio::time::timeout(grace, handle).await {
        Ok(_) => true,
        Err(_) => {
            warn!(
                event = "sandbox.worker_detached",
                grace_ms = grace.as_millis() as u64
            );
            false
        }
    }
}

/// Everything a worker thread needs, owned.
struct RunJob {
    source: String,
    ctx: ExecutionContext,
    capabilities: CapabilityTable,
    limits: SandboxLimits,
    entry_point: String,
}

impl RunJob {
    fn run(self, guard: RunGuard) -> ExecutionOutcome {
        let sources = Arc::new(DataSources::new(self.ctx.clone()));
        let engine = engine::run_engine(&self.capabilities, &self.limits, sources, guard);

        let ast = match engine.compile(&self.source) {
            Ok(ast) => ast,
            Err(e) => {
                return ExecutionOutcome::failure(FailureKind::SyntaxError, e.to_string());
            }
        };

        let has_entry = ast
            .iter_functions()
            .any(|f| f.name == self.entry_point && f.params.is_empty());
        if !has_entry {
            return ExecutionOutcome::failure(
                FailureKind::MissingEntryPoint,
                format!(
                    "no function '{}' taking no arguments is defined",
                    self.entry_point
                ),
            );
        }

        // Only the entry point runs; top-level statements are never evaluated.
        let options = CallFnOptions::new().eval_ast(false);
        let result = engine.call_fn_with_options::<Dynamic>(
            options,
            &mut Scope::new(),
            &ast,
            &self.entry_point,
            (),
        );

        match result {
            Ok(value) => match serde_json::to_value(&value) {
                Ok(data) => ExecutionOutcome::success(data),
                Err(e) => ExecutionOutcome::Failure(
                    ExecutionFailure::new(
                        FailureKind::UnexpectedError,
                        format!("returned a value of type '{}' that is not data", value.type_name()),
                    )
                    .with_detail(format!("UnserializableResult\n{e}")),
                ),
            },
            Err(err) => ExecutionOutcome::Failure(classify(&err, &self.ctx)),
        }
    }
}
