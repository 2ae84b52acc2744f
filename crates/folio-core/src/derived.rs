//! Derived artifacts computed from document content by user getters.
//!
//! Each artifact is cached on its `DocumentVersion` as either a value or a
//! structured failure. The failure keeps the two tiers apart: the getter did
//! not run to completion (`ExecutionFailed`), or it ran and returned a value of
//! the wrong shape (`ResultNotValid`).

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::enums::ArtifactKind;
use crate::script::ExecutionFailed;

/// Flat mapping of string keys to string, number, boolean, or null.
///
/// Flatness is guaranteed by shape validation before a summary is accepted.
pub type Summary = serde_json::Map<String, serde_json::Value>;

/// One schema violation, located by JSON pointer into the checked value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ValidationIssue {
    /// JSON pointer to the offending location (`""` for the root).
    pub path: String,
    pub message: String,
}

impl ValidationIssue {
    #[must_use]
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "(root): {}", self.message)
        } else {
            write!(f, "{}: {}", self.path, self.message)
        }
    }
}

/// Why a getter did not yield an artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum GetterFailure {
    /// The sandbox could not run the getter to completion.
    ExecutionFailed { failure: ExecutionFailed },
    /// The getter ran but its result does not have the expected shape.
    ResultNotValid { issues: Vec<ValidationIssue> },
}

impl fmt::Display for GetterFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ExecutionFailed { failure } => write!(f, "getter execution failed: {failure}"),
            Self::ResultNotValid { issues } => {
                write!(f, "getter result not valid: ")?;
                for (i, issue) in issues.iter().enumerate() {
                    if i > 0 {
                        f.write_str("; ")?;
                    }
                    write!(f, "{issue}")?;
                }
                Ok(())
            }
        }
    }
}

/// A cached artifact: either the computed value or the failure that prevented it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Derived<T> {
    Computed { value: T },
    Failed { failure: GetterFailure },
}

impl<T> Derived<T> {
    #[must_use]
    pub const fn computed(value: T) -> Self {
        Self::Computed { value }
    }

    #[must_use]
    pub const fn failed(failure: GetterFailure) -> Self {
        Self::Failed { failure }
    }

    #[must_use]
    pub const fn value(&self) -> Option<&T> {
        match self {
            Self::Computed { value } => Some(value),
            Self::Failed { .. } => None,
        }
    }

    #[must_use]
    pub const fn failure(&self) -> Option<&GetterFailure> {
        match self {
            Self::Computed { .. } => None,
            Self::Failed { failure } => Some(failure),
        }
    }

    #[must_use]
    pub const fn is_computed(&self) -> bool {
        matches!(self, Self::Computed { .. })
    }
}

impl<T> From<Result<T, GetterFailure>> for Derived<T> {
    fn from(result: Result<T, GetterFailure>) -> Self {
        match result {
            Ok(value) => Self::Computed { value },
            Err(failure) => Self::Failed { failure },
        }
    }
}

/// The three artifacts cached on every `DocumentVersion`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct DerivedArtifacts {
    pub summary: Derived<Summary>,
    pub fingerprint: Derived<String>,
    pub blocking_keys: Derived<Vec<String>>,
}

impl DerivedArtifacts {
    /// Kinds of the artifacts that failed, in declaration order.
    #[must_use]
    pub fn failed_kinds(&self) -> Vec<ArtifactKind> {
        let mut failed = Vec::new();
        if !self.summary.is_computed() {
            failed.push(ArtifactKind::Summary);
        }
        if !self.fingerprint.is_computed() {
            failed.push(ArtifactKind::Fingerprint);
        }
        if !self.blocking_keys.is_computed() {
            failed.push(ArtifactKind::BlockingKeys);
        }
        failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn derived_serializes_with_status_tag() {
        let ok: Derived<String> = Derived::computed("fp-1".into());
        assert_eq!(
            serde_json::to_value(&ok).unwrap(),
            json!({"status": "computed", "value": "fp-1"})
        );

        let bad: Derived<String> = Derived::failed(GetterFailure::ResultNotValid {
            issues: vec![ValidationIssue::new("", "42 is not of type \"string\"")],
        });
        assert_eq!(
            serde_json::to_value(&bad).unwrap(),
            json!({
                "status": "failed",
                "failure": {
                    "reason": "result_not_valid",
                    "issues": [{"path": "", "message": "42 is not of type \"string\""}]
                }
            })
        );
    }

    #[test]
    fn failed_kinds_lists_only_failures() {
        let artifacts = DerivedArtifacts {
            summary: Derived::failed(GetterFailure::ExecutionFailed {
                failure: ExecutionFailed::runtime("boom"),
            }),
            fingerprint: Derived::computed("abc".into()),
            blocking_keys: Derived::computed(vec!["k".into()]),
        };
        assert_eq!(artifacts.failed_kinds(), vec![ArtifactKind::Summary]);
    }

    #[test]
    fn from_result_maps_both_arms() {
        let ok: Derived<u8> = Ok(1).into();
        assert_eq!(ok.value(), Some(&1));
        let err: Derived<u8> = Err(GetterFailure::ResultNotValid { issues: vec![] }).into();
        assert!(err.failure().is_some());
    }

    #[test]
    fn getter_failure_display_joins_issues() {
        let failure = GetterFailure::ResultNotValid {
            issues: vec![
                ValidationIssue::new("/address", "not flat"),
                ValidationIssue::new("", "too many keys"),
            ],
        };
        assert_eq!(
            failure.to_string(),
            "getter result not valid: /address: not flat; (root): too many keys"
        );
    }
}
