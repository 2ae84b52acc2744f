//! In-process sandbox backed by registered native functions.
//!
//! A module's source text is its lookup key. Each call runs on a dedicated
//! thread so a panic is contained and an overrunning call can be abandoned
//! once its budget elapses. An abandoned thread is detached and left to
//! finish on its own; its result is discarded.

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, mpsc};
use std::thread;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::invariance::ensure_round_trip_invariant;
use crate::{ExecutionFailed, Sandbox, ScriptModule};

/// A registered module body: takes the call arguments, returns a value or a
/// thrown error message.
pub type ModuleFn = dyn Fn(&[Value]) -> Result<Value, String> + Send + Sync;

/// Sandbox whose modules are native closures.
#[derive(Clone)]
pub struct FunctionSandbox {
    modules: HashMap<String, Arc<ModuleFn>>,
    budget: Duration,
}

impl std::fmt::Debug for FunctionSandbox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<_> = self.modules.keys().collect();
        names.sort();
        f.debug_struct("FunctionSandbox")
            .field("modules", &names)
            .field("budget", &self.budget)
            .finish()
    }
}

impl FunctionSandbox {
    #[must_use]
    pub fn new(budget: Duration) -> Self {
        Self {
            modules: HashMap::new(),
            budget,
        }
    }

    /// Register `f` as the default export of the module whose source is `source`.
    pub fn register<F>(&mut self, source: impl Into<String>, f: F)
    where
        F: Fn(&[Value]) -> Result<Value, String> + Send + Sync + 'static,
    {
        self.modules.insert(source.into(), Arc::new(f));
    }

    /// Builder form of [`register`](Self::register).
    #[must_use]
    pub fn with_module<F>(mut self, source: impl Into<String>, f: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, String> + Send + Sync + 'static,
    {
        self.register(source, f);
        self
    }

    /// Register a single-argument module with typed input and output.
    ///
    /// An argument that does not decode as `I` is reported as a thrown error,
    /// the same as user code rejecting its input.
    #[must_use]
    pub fn with_typed_module<I, O, F>(self, source: impl Into<String>, f: F) -> Self
    where
        I: DeserializeOwned,
        O: Serialize,
        F: Fn(I) -> Result<O, String> + Send + Sync + 'static,
    {
        self.with_module(source, move |args| {
            let arg = args.first().cloned().unwrap_or(Value::Null);
            let input: I = serde_json::from_value(arg).map_err(|e| e.to_string())?;
            let output = f(input)?;
            serde_json::to_value(output).map_err(|e| format!("result is not serializable: {e}"))
        })
    }
}

impl Sandbox for FunctionSandbox {
    fn module_default_exports_function(&self, module: &ScriptModule) -> bool {
        self.modules.contains_key(module.source())
    }

    fn execute_sync_function(
        &self,
        module: &ScriptModule,
        args: &[Value],
    ) -> Result<Value, ExecutionFailed> {
        let f = self
            .modules
            .get(module.source())
            .cloned()
            .ok_or_else(|| {
                ExecutionFailed::compile(format!("module '{module}' has no default export"))
            })?;

        let (tx, rx) = mpsc::channel();
        let args = args.to_vec();
        thread::Builder::new()
            .name("folio-sandbox-call".into())
            .spawn(move || {
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| f(&args)));
                // The receiver is gone if the call already timed out.
                let _ = tx.send(outcome);
            })
            .map_err(|e| ExecutionFailed::internal(format!("failed to start call: {e}")))?;

        match rx.recv_timeout(self.budget) {
            Ok(Ok(Ok(value))) => ensure_round_trip_invariant(value),
            Ok(Ok(Err(message))) => Err(ExecutionFailed::runtime(message)),
            Ok(Err(payload)) => Err(ExecutionFailed::runtime(panic_message(payload.as_ref()))),
            Err(mpsc::RecvTimeoutError::Timeout) => {
                tracing::warn!(module = %module, budget_ms = self.budget.as_millis(), "sandbox call timed out");
                Err(ExecutionFailed::timeout(self.budget))
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => Err(ExecutionFailed::internal(
                "call thread exited without a result",
            )),
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "module panicked".to_string())
}
