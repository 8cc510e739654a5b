//! Sandbox: capability-restricted execution of candidate programs.
//!
//! A candidate program runs inside an embedded Rhai engine that exposes
//! only the groups named in a per-run [`CapabilityTable`]. Data access goes
//! through read-only bindings confined to the
//! [`ExecutionContext`](crate::domain::ExecutionContext). Every run is
//! bounded by [`SandboxLimits`] and can be cancelled.
//!
//! # Modules
//!
//! - [`capability`]: `Capability` groups and `CapabilityTable`
//! - [`bindings`]  : record, table, JSON, and date bindings
//! - [`engine`]    : parse and run engine construction, progress guard
//! - [`classify`]  : runtime fault → `FailureKind`
//! - [`execution`] : `SandboxLimits`, `SandboxExecutor`
//! - [`error`]     : `SandboxError` / `SandboxResult`

pub mod bindings;
pub mod capability;
mod classify;
pub(crate) mod engine;
pub mod error;
pub mod execution;

pub use bindings::{BindingFault, DataSources, TableData};
pub use capability::{Capability, CapabilityTable};
pub use error::{SandboxError, SandboxResult};
pub use execution::{SandboxExecutor, SandboxLimits, DEFAULT_ENTRY_POINT};
