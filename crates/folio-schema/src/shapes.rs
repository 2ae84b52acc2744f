//! Fixed shapes that getter results must satisfy.
//!
//! - summary: flat object of string, number, boolean, or null values
//! - fingerprint: a single string
//! - blocking keys: an array of strings

use folio_core::derived::{Summary, ValidationIssue};
use serde_json::json;

use crate::validator::CompiledSchema;

/// Shape of a summary getter result.
#[must_use]
pub fn summary_shape() -> serde_json::Value {
    json!({
        "type": "object",
        "additionalProperties": {"type": ["string", "number", "boolean", "null"]}
    })
}

/// Shape of a fingerprint getter result.
#[must_use]
pub fn fingerprint_shape() -> serde_json::Value {
    json!({"type": "string"})
}

/// Shape of a blocking-keys getter result.
#[must_use]
pub fn blocking_keys_shape() -> serde_json::Value {
    json!({"type": "array", "items": {"type": "string"}})
}

/// The three artifact shapes, compiled once.
#[derive(Debug)]
pub struct ArtifactShapes {
    summary: CompiledSchema,
    fingerprint: CompiledSchema,
    blocking_keys: CompiledSchema,
}

impl ArtifactShapes {
    /// Compile the artifact shapes.
    ///
    /// # Panics
    ///
    /// Panics if one of the built-in shape documents fails to compile, which
    /// would be a bug in this module.
    #[must_use]
    pub fn new() -> Self {
        let compile = |schema: serde_json::Value| {
            CompiledSchema::compile(&schema).expect("built-in artifact shape compiles")
        };
        Self {
            summary: compile(summary_shape()),
            fingerprint: compile(fingerprint_shape()),
            blocking_keys: compile(blocking_keys_shape()),
        }
    }

    /// Check a summary getter result.
    ///
    /// # Errors
    ///
    /// Returns the issues, each pointing at the offending key.
    pub fn summary(&self, value: &serde_json::Value) -> Result<Summary, Vec<ValidationIssue>> {
        self.summary.validate_as(value)
    }

    /// Check a fingerprint getter result.
    ///
    /// # Errors
    ///
    /// Returns the issues if the value is not a string.
    pub fn fingerprint(&self, value: &serde_json::Value) -> Result<String, Vec<ValidationIssue>> {
        self.fingerprint.validate_as(value)
    }

    /// Check a blocking-keys getter result.
    ///
    /// # Errors
    ///
    /// Returns the issues, each pointing at the offending array element.
    pub fn blocking_keys(
        &self,
        value: &serde_json::Value,
    ) -> Result<Vec<String>, Vec<ValidationIssue>> {
        self.blocking_keys.validate_as(value)
    }
}

impl Default for ArtifactShapes {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn flat_summary_accepted() {
        let shapes = ArtifactShapes::new();
        let summary = shapes
            .summary(&json!({"name": "Ada", "age": 36, "active": true, "nickname": null}))
            .unwrap();
        assert_eq!(summary.len(), 4);
        assert_eq!(summary["age"], json!(36));
    }

    #[test]
    fn nested_summary_points_at_key() {
        let shapes = ArtifactShapes::new();
        let issues = shapes
            .summary(&json!({"name": "Ada", "address": {"city": "London"}}))
            .unwrap_err();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].path, "/address");
    }

    #[test]
    fn array_in_summary_rejected() {
        let shapes = ArtifactShapes::new();
        let issues = shapes.summary(&json!({"tags": ["a", "b"]})).unwrap_err();
        assert_eq!(issues[0].path, "/tags");
    }

    #[test]
    fn summary_must_be_object() {
        let shapes = ArtifactShapes::new();
        let issues = shapes.summary(&json!("Ada")).unwrap_err();
        assert_eq!(issues[0].path, "");
    }

    #[test]
    fn fingerprint_must_be_string() {
        let shapes = ArtifactShapes::new();
        assert_eq!(shapes.fingerprint(&json!("ada|1990")).unwrap(), "ada|1990");
        assert!(shapes.fingerprint(&json!(42)).is_err());
        assert!(shapes.fingerprint(&json!(null)).is_err());
    }

    #[test]
    fn blocking_keys_must_be_strings() {
        let shapes = ArtifactShapes::new();
        assert_eq!(
            shapes.blocking_keys(&json!(["ada", "lovelace"])).unwrap(),
            vec!["ada".to_string(), "lovelace".to_string()]
        );
        assert!(shapes.blocking_keys(&json!([])).unwrap().is_empty());

        let issues = shapes.blocking_keys(&json!(["ada", 7])).unwrap_err();
        assert_eq!(issues[0].path, "/1");
    }
}
