//! Compiled JSON Schemas and value validation.

use folio_core::derived::ValidationIssue;
use serde::de::DeserializeOwned;

use crate::error::SchemaError;

/// A JSON Schema compiled once, applied to many values.
pub struct CompiledSchema {
    source: serde_json::Value,
    validator: jsonschema::Validator,
}

impl CompiledSchema {
    /// Compile a schema document.
    ///
    /// # Errors
    ///
    /// Returns `SchemaError::InvalidSchema` if `schema` is not a valid JSON Schema.
    pub fn compile(schema: &serde_json::Value) -> Result<Self, SchemaError> {
        let validator = jsonschema::validator_for(schema)
            .map_err(|e| SchemaError::InvalidSchema(e.to_string()))?;
        Ok(Self {
            source: schema.clone(),
            validator,
        })
    }

    #[must_use]
    pub fn is_valid(&self, value: &serde_json::Value) -> bool {
        self.validator.is_valid(value)
    }

    /// Check `value`, collecting every violation.
    ///
    /// # Errors
    ///
    /// Returns the list of issues, each located by JSON pointer.
    pub fn validate(&self, value: &serde_json::Value) -> Result<(), Vec<ValidationIssue>> {
        let issues: Vec<ValidationIssue> = self
            .validator
            .iter_errors(value)
            .map(|e| ValidationIssue::new(e.instance_path.to_string(), e.to_string()))
            .collect();
        if issues.is_empty() {
            Ok(())
        } else {
            Err(issues)
        }
    }

    /// Check `value` and convert it into `T`.
    ///
    /// # Errors
    ///
    /// Returns the schema issues, or a single root issue if the value is
    /// schema-valid but does not deserialize into `T`.
    pub fn validate_as<T: DeserializeOwned>(
        &self,
        value: &serde_json::Value,
    ) -> Result<T, Vec<ValidationIssue>> {
        self.validate(value)?;
        serde_json::from_value(value.clone()).map_err(|e| vec![ValidationIssue::new("", e.to_string())])
    }
}

impl std::fmt::Debug for CompiledSchema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledSchema")
            .field("source", &self.source)
            .finish_non_exhaustive()
    }
}
