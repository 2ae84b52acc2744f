//! Content derivation: summary, fingerprint, and blocking keys.
//!
//! The three getters of a collection version run concurrently, each through
//! the sandbox, and each result is checked against its fixed shape. A getter
//! that fails yields a failed artifact; it never prevents the other two from
//! being computed or stored.

use std::sync::Arc;

use folio_core::derived::{Derived, DerivedArtifacts, GetterFailure, ValidationIssue};
use folio_core::entities::Getters;
use folio_sandbox::{ExecutionFailed, Sandbox};
use folio_schema::ArtifactShapes;
use serde_json::Value;

use crate::execution::execute;

/// Compute all three artifacts of `content` with the given getters.
pub async fn derive_artifacts(
    sandbox: &Arc<dyn Sandbox>,
    shapes: &ArtifactShapes,
    getters: &Getters,
    content: &Value,
) -> DerivedArtifacts {
    let (summary, fingerprint, blocking_keys) = tokio::join!(
        execute(sandbox, &getters.summary, vec![content.clone()]),
        execute(sandbox, &getters.fingerprint, vec![content.clone()]),
        execute(sandbox, &getters.blocking_keys, vec![content.clone()]),
    );

    let artifacts = DerivedArtifacts {
        summary: check_shape(summary, |v| shapes.summary(v)),
        fingerprint: check_shape(fingerprint, |v| shapes.fingerprint(v)),
        blocking_keys: check_shape(blocking_keys, |v| shapes.blocking_keys(v)),
    };
    let failed = artifacts.failed_kinds();
    if !failed.is_empty() {
        tracing::debug!(?failed, "some artifacts could not be derived");
    }
    artifacts
}

fn check_shape<T>(
    result: Result<Value, ExecutionFailed>,
    shape: impl FnOnce(&Value) -> Result<T, Vec<ValidationIssue>>,
) -> Derived<T> {
    match result {
        Err(failure) => Derived::failed(GetterFailure::ExecutionFailed { failure }),
        Ok(value) => shape(&value)
            .map_err(|issues| GetterFailure::ResultNotValid { issues })
            .into(),
    }
}
