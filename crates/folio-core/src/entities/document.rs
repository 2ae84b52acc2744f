use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::derived::{Derived, DerivedArtifacts, Summary};

/// Stable record inside one collection, represented by a chain of versions.
///
/// `latest_version_id` advances only in the transaction that inserts the
/// version it points to.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct Document {
    pub id: String,
    pub collection_id: String,
    pub latest_version_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One immutable revision of a document's content plus its cached artifacts.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct DocumentVersion {
    pub id: String,
    pub document_id: String,
    /// The collection version whose schema `content` satisfies.
    pub collection_version_id: String,
    pub content: serde_json::Value,
    pub summary: Derived<Summary>,
    pub fingerprint: Derived<String>,
    pub blocking_keys: Derived<Vec<String>>,
    pub created_at: DateTime<Utc>,
}

impl DocumentVersion {
    #[must_use]
    pub fn artifacts(&self) -> DerivedArtifacts {
        DerivedArtifacts {
            summary: self.summary.clone(),
            fingerprint: self.fingerprint.clone(),
            blocking_keys: self.blocking_keys.clone(),
        }
    }
}
