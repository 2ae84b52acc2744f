//! User-authored script modules.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

use crate::enums::ExecutionFailureKind;

/// Source of a user-authored module whose default export is a pure function.
///
/// The engine never interprets the source itself; it is handed verbatim to a
/// `Sandbox` implementation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct ScriptModule(String);

impl ScriptModule {
    #[must_use]
    pub fn new(source: impl Into<String>) -> Self {
        Self(source.into())
    }

    #[must_use]
    pub fn source(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_source(self) -> String {
        self.0
    }
}

impl From<&str> for ScriptModule {
    fn from(source: &str) -> Self {
        Self::new(source)
    }
}

impl From<String> for ScriptModule {
    fn from(source: String) -> Self {
        Self(source)
    }
}

impl fmt::Display for ScriptModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Module sources can be long; show the first line only.
        let first = self.0.lines().next().unwrap_or_default();
        if first.len() < self.0.len() {
            write!(f, "{first}…")
        } else {
            f.write_str(first)
        }
    }
}

/// The single tagged failure a sandbox reports for any unusable call.
///
/// Compile errors, thrown exceptions, non-invariant results, timeouts, and
/// internal sandbox faults all collapse into this type so callers handle one
/// shape. `cause` is meant for humans.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize, JsonSchema)]
#[error("{kind} failure: {cause}")]
pub struct ExecutionFailed {
    pub kind: ExecutionFailureKind,
    pub cause: String,
}

impl ExecutionFailed {
    #[must_use]
    pub fn new(kind: ExecutionFailureKind, cause: impl Into<String>) -> Self {
        Self {
            kind,
            cause: cause.into(),
        }
    }

    #[must_use]
    pub fn compile(cause: impl Into<String>) -> Self {
        Self::new(ExecutionFailureKind::Compile, cause)
    }

    #[must_use]
    pub fn runtime(cause: impl Into<String>) -> Self {
        Self::new(ExecutionFailureKind::Runtime, cause)
    }

    #[must_use]
    pub fn non_invariant(cause: impl Into<String>) -> Self {
        Self::new(ExecutionFailureKind::NonInvariantResult, cause)
    }

    #[must_use]
    pub fn timeout(budget: Duration) -> Self {
        Self::new(
            ExecutionFailureKind::Timeout,
            format!("execution exceeded budget of {}ms", budget.as_millis()),
        )
    }

    #[must_use]
    pub fn internal(cause: impl Into<String>) -> Self {
        Self::new(ExecutionFailureKind::Internal, cause)
    }
}
