//! # folio-sandbox
//!
//! Isolated execution of user-authored script modules.
//!
//! The engine only ever talks to the [`Sandbox`] trait: run the default export
//! of a module with some arguments, synchronously, and get back a value or an
//! [`ExecutionFailed`]. Two runtimes are provided:
//!
//! - [`FunctionSandbox`]: native functions registered in-process under a
//!   module source, each call on its own thread with a time budget
//! - [`ProcessSandbox`]: one interpreter child process per call, spoken to
//!   over a JSON stdin/stdout protocol and killed when the budget elapses
//!
//! Whatever the runtime, no failure of user code may take the host down.

mod function;
mod invariance;
mod process;

pub use folio_core::script::{ExecutionFailed, ScriptModule};
pub use function::{FunctionSandbox, ModuleFn};
pub use invariance::ensure_round_trip_invariant;
pub use process::ProcessSandbox;

/// Runs pure, synchronous functions exported by user modules.
pub trait Sandbox: Send + Sync {
    /// Whether `module`'s default export is a callable function.
    ///
    /// Used to reject a module before any work depends on it.
    fn module_default_exports_function(&self, module: &ScriptModule) -> bool;

    /// Call `module`'s default export with `args` and wait for the result.
    ///
    /// # Errors
    ///
    /// Returns `ExecutionFailed` for compile errors, thrown exceptions,
    /// results that are not round-trip invariant, timeouts, and internal
    /// sandbox faults.
    fn execute_sync_function(
        &self,
        module: &ScriptModule,
        args: &[serde_json::Value],
    ) -> Result<serde_json::Value, ExecutionFailed>;
}
