//! Bridge from async engine code to the blocking sandbox.

use std::sync::Arc;

use folio_sandbox::{ExecutionFailed, Sandbox, ScriptModule};
use serde_json::Value;

/// Run a module's default export on the blocking pool.
pub(crate) async fn execute(
    sandbox: &Arc<dyn Sandbox>,
    module: &ScriptModule,
    args: Vec<Value>,
) -> Result<Value, ExecutionFailed> {
    let sandbox = Arc::clone(sandbox);
    let call_module = module.clone();
    let result = tokio::task::spawn_blocking(move || sandbox.execute_sync_function(&call_module, &args))
        .await
        .unwrap_or_else(|e| Err(ExecutionFailed::internal(format!("sandbox task failed: {e}"))));
    if let Err(failure) = &result {
        tracing::debug!(module = %module, %failure, "sandbox call failed");
    }
    result
}

/// Pre-flight check that a module default-exports a function.
pub(crate) async fn exports_function(sandbox: &Arc<dyn Sandbox>, module: &ScriptModule) -> bool {
    let sandbox = Arc::clone(sandbox);
    let module = module.clone();
    tokio::task::spawn_blocking(move || sandbox.module_default_exports_function(&module))
        .await
        .unwrap_or(false)
}
