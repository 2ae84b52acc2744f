//! Shared fixtures for folio-engine integration tests.

#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use folio_config::FolioConfig;
use folio_core::entities::Getters;
use folio_core::script::ScriptModule;
use folio_db::FolioDb;
use folio_engine::{FolioService, NewCollectionVersion};
use folio_sandbox::FunctionSandbox;
use serde_json::{Value, json};

fn name_of(doc: &Value) -> String {
    doc.get("name").and_then(Value::as_str).unwrap_or_default().to_string()
}

/// Getters and migrations over `{name, age?}` people documents.
pub fn sandbox() -> FunctionSandbox {
    FunctionSandbox::new(Duration::from_secs(2))
        .with_module("summary", |args| Ok(json!({ "name": name_of(&args[0]) })))
        .with_module("summary-with-address", |args| Ok(args[0].clone()))
        .with_module("fingerprint", |args| Ok(json!(name_of(&args[0]).to_lowercase())))
        .with_module("blocking_keys", |args| {
            let name = name_of(&args[0]).to_lowercase();
            Ok(json!(name.split_whitespace().collect::<Vec<_>>()))
        })
        .with_module("add-age", |args| {
            let mut doc = args[0].clone();
            doc["age"] = json!(0);
            Ok(doc)
        })
        // Throws for anyone whose name starts with "Bad".
        .with_module("add-age-picky", |args| {
            let name = name_of(&args[0]);
            if name.starts_with("Bad") {
                return Err(format!("cannot migrate {name}"));
            }
            let mut doc = args[0].clone();
            doc["age"] = json!(0);
            Ok(doc)
        })
}

pub fn getters() -> Getters {
    Getters {
        summary: ScriptModule::new("summary"),
        fingerprint: ScriptModule::new("fingerprint"),
        blocking_keys: ScriptModule::new("blocking_keys"),
    }
}

pub fn people_v1() -> NewCollectionVersion {
    NewCollectionVersion {
        schema: json!({
            "type": "object",
            "properties": {"name": {"type": "string"}},
            "required": ["name"]
        }),
        getters: getters(),
        migration: None,
    }
}

pub fn people_v2(migration: &str) -> NewCollectionVersion {
    NewCollectionVersion {
        schema: json!({
            "type": "object",
            "properties": {"name": {"type": "string"}, "age": {"type": "integer"}},
            "required": ["name", "age"]
        }),
        getters: getters(),
        migration: Some(ScriptModule::new(migration)),
    }
}

pub async fn memory_service() -> FolioService {
    let db = FolioDb::open_local(":memory:").await.unwrap();
    FolioService::from_db(db, Arc::new(sandbox()), FolioConfig::default())
}

/// A service over an on-disk database, for tests that need several
/// connections.
pub async fn file_service(dir: &Path) -> FolioService {
    let path = dir.join("folio.db");
    let db = FolioDb::open_local(&path.to_string_lossy()).await.unwrap();
    FolioService::from_db(db, Arc::new(sandbox()), FolioConfig::default())
}

/// A `people` collection holding one document per name. Returns the
/// collection id and the document ids in creation order.
pub async fn people(svc: &FolioService, names: &[&str]) -> (String, Vec<String>) {
    let (collection, _) = svc.create_collection("people", people_v1()).await.unwrap();
    let mut ids = Vec::new();
    for name in names {
        let (document, _) = svc
            .create_document(&collection.id, json!({ "name": name }))
            .await
            .unwrap();
        ids.push(document.id);
    }
    (collection.id, ids)
}
