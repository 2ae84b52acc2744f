use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::enums::ArtifactKind;
use crate::script::ScriptModule;

/// Stable identity owning a non-branching chain of `CollectionVersion`s.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct Collection {
    pub id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// The three getter modules of a collection version.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct Getters {
    pub summary: ScriptModule,
    pub fingerprint: ScriptModule,
    pub blocking_keys: ScriptModule,
}

impl Getters {
    #[must_use]
    pub const fn module(&self, kind: ArtifactKind) -> &ScriptModule {
        match kind {
            ArtifactKind::Summary => &self.summary,
            ArtifactKind::Fingerprint => &self.fingerprint,
            ArtifactKind::BlockingKeys => &self.blocking_keys,
        }
    }
}

/// One immutable schema revision of a collection.
///
/// `migration` is `None` exactly when `previous_version_id` is `None`: the
/// root version has nothing to migrate from, every later one must say how.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct CollectionVersion {
    pub id: String,
    pub collection_id: String,
    pub previous_version_id: Option<String>,
    /// JSON Schema that every document version at this revision satisfies.
    pub schema: serde_json::Value,
    pub getters: Getters,
    pub migration: Option<ScriptModule>,
    pub created_at: DateTime<Utc>,
}

impl CollectionVersion {
    #[must_use]
    pub const fn is_root(&self) -> bool {
        self.previous_version_id.is_none()
    }
}
