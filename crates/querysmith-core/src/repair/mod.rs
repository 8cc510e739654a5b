//! Bounded self-repair of candidate programs.
//!
//! `Generated → Validating → {Executing | Repairing} → {Succeeded | Exhausted}`.
//! `max_rounds` counts repair invocations; the first candidate is round 0
//! and costs nothing.

pub mod attempt;
pub mod runner;
pub mod state;

pub use attempt::{AttemptFailure, FinalResult, RepairAttempt, RepairLog, TerminalFailure};
pub use runner::{RepairLoop, RepairPolicy};
pub use state::{LoopState, StateTrace};
