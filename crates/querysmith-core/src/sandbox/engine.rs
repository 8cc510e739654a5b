//! Construction of the restricted Rhai engines.
//!
//! The parse engine and the run engine share one language configuration,
//! so a program that validates is parsed identically when it runs.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use rhai::packages::{
    ArithmeticPackage, BasicArrayPackage, BasicIteratorPackage, BasicMapPackage,
    BasicMathPackage, BasicStringPackage, LogicPackage, MoreStringPackage, Package,
};
use rhai::{Dynamic, Engine, OptimizationLevel};

use super::bindings::{self, DataSources};
use super::capability::{Capability, CapabilityTable};
use super::execution::SandboxLimits;

/// Value carried by `ErrorTerminated` when the caller cancelled the run.
pub(crate) const TERMINATED_CANCELLED: &str = "cancelled";
/// Value carried by `ErrorTerminated` when the deadline passed.
pub(crate) const TERMINATED_DEADLINE: &str = "deadline";

/// Operations between two checks of the deadline and abort flag.
const PROGRESS_CHECK_INTERVAL: u64 = 128;

/// Deadline and abort flag observed by a running script.
#[derive(Debug, Clone)]
pub(crate) struct RunGuard {
    deadline: Instant,
    abort: Arc<AtomicBool>,
}

impl RunGuard {
    pub(crate) fn new(deadline: Instant, abort: Arc<AtomicBool>) -> Self {
        Self { deadline, abort }
    }

    fn check(&self) -> Option<&'static str> {
        if self.abort.load(Ordering::Relaxed) {
            Some(TERMINATED_CANCELLED)
        } else if Instant::now() >= self.deadline {
            Some(TERMINATED_DEADLINE)
        } else {
            None
        }
    }
}

/// Syntax rules shared by every engine.
fn configure_language(engine: &mut Engine, limits: &SandboxLimits) {
    engine.set_optimization_level(OptimizationLevel::None);
    engine.disable_symbol("eval");
    engine.set_fail_on_invalid_map_property(true);

    engine.set_max_call_levels(limits.max_call_levels);
    engine.set_max_expr_depths(limits.max_expr_depth, limits.max_expr_depth);
    engine.set_max_string_size(limits.max_string_size);
    engine.set_max_array_size(limits.max_array_size);
    engine.set_max_map_size(limits.max_map_size);
}

/// An engine that can only parse. No functions are registered.
pub(crate) fn parse_engine(limits: &SandboxLimits) -> Engine {
    let mut engine = Engine::new_raw();
    configure_language(&mut engine, limits);
    engine
}

/// An engine for one run: packages and bindings chosen by `table`.
pub(crate) fn run_engine(
    table: &CapabilityTable,
    limits: &SandboxLimits,
    sources: Arc<DataSources>,
    guard: RunGuard,
) -> Engine {
    let mut engine = Engine::new_raw();
    configure_language(&mut engine, limits);
    engine.set_max_operations(limits.max_operations);

    // `LanguageCorePackage` is never registered: it carries `sleep`, `exit`,
    // and function-metadata reflection, none of which the capability table
    // can gate.
    for capability in table.iter() {
        match capability {
            Capability::Arithmetic => {
                engine.register_global_module(ArithmeticPackage::new().as_shared_module());
            }
            Capability::Logic => {
                engine.register_global_module(LogicPackage::new().as_shared_module());
            }
            Capability::Strings => {
                engine.register_global_module(BasicStringPackage::new().as_shared_module());
                engine.register_global_module(MoreStringPackage::new().as_shared_module());
            }
            Capability::Arrays => {
                engine.register_global_module(BasicArrayPackage::new().as_shared_module());
            }
            Capability::Maps => {
                engine.register_global_module(BasicMapPackage::new().as_shared_module());
            }
            Capability::Iteration => {
                engine.register_global_module(BasicIteratorPackage::new().as_shared_module());
            }
            Capability::Math => {
                engine.register_global_module(BasicMathPackage::new().as_shared_module());
            }
            // Registered as bindings below.
            Capability::Dates | Capability::Records | Capability::Tables => {}
        }
    }
    bindings::register(&mut engine, table, sources);

    engine.on_progress(move |ops| {
        if ops % PROGRESS_CHECK_INTERVAL != 0 {
            return None;
        }
        guard.check().map(|reason| Dynamic::from(reason.to_string()))
    });
    engine.on_print(|text| tracing::debug!(event = "sandbox.print", text));
    engine.on_debug(|text, _source, pos| {
        tracing::debug!(event = "sandbox.debug", text, line = pos.line());
    });

    engine
}
