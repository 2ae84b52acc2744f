//! Published JSON Schemas for Folio's exchanged types.
//!
//! Job inputs, job errors, and migration outcomes are stored as JSON that
//! outside tooling reads and writes. The registry generates their schemas
//! from the folio-core types with [`schemars::schema_for!`] so the published
//! contract cannot drift from the Rust definitions.

use std::collections::BTreeMap;

use schemars::schema_for;

use crate::error::SchemaError;
use crate::shapes;

/// Named JSON Schemas of the exchanged types, plus the artifact shapes.
pub struct SchemaRegistry {
    schemas: BTreeMap<&'static str, serde_json::Value>,
}

/// Insert a schema into the map, converting the `schemars` output to a
/// `serde_json::Value`. Panics if `serde_json::to_value` fails (should be
/// infallible for valid `schemars` output).
macro_rules! register {
    ($map:expr, $name:expr, $ty:ty) => {
        $map.insert($name, serde_json::to_value(schema_for!($ty)).unwrap());
    };
}

impl SchemaRegistry {
    /// # Panics
    ///
    /// Panics if `serde_json::to_value` fails on a `schemars`-generated
    /// schema, which it does not for derived schemas.
    #[must_use]
    pub fn new() -> Self {
        let mut schemas = BTreeMap::new();

        register!(schemas, "background_job", folio_core::entities::BackgroundJob);
        register!(schemas, "job_payload", folio_core::jobs::JobPayload);
        register!(schemas, "job_error", folio_core::jobs::JobError);
        register!(schemas, "job_progress", folio_core::jobs::JobProgress);
        register!(schemas, "migration_report", folio_core::migration::MigrationReport);
        register!(schemas, "migration_failure", folio_core::migration::MigrationFailure);

        schemas.insert("summary_shape", shapes::summary_shape());
        schemas.insert("fingerprint_shape", shapes::fingerprint_shape());
        schemas.insert("blocking_keys_shape", shapes::blocking_keys_shape());

        Self { schemas }
    }

    /// Look up a schema by name.
    ///
    /// # Errors
    ///
    /// Returns `SchemaError::NotFound` if no schema has that name.
    pub fn get(&self, name: &str) -> Result<&serde_json::Value, SchemaError> {
        self.schemas
            .get(name)
            .ok_or_else(|| SchemaError::NotFound(name.to_string()))
    }

    /// Registered names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.schemas.keys().copied()
    }
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::new()
    }
}
