//! Shared test utilities for folio-engine unit tests.

#[cfg(test)]
pub(crate) mod helpers {
    use std::sync::Arc;
    use std::time::Duration;

    use folio_config::FolioConfig;
    use folio_core::entities::Getters;
    use folio_core::script::ScriptModule;
    use folio_db::FolioDb;
    use folio_sandbox::FunctionSandbox;
    use serde_json::{Value, json};

    use crate::ops::collections::NewCollectionVersion;
    use crate::service::FolioService;

    fn name_of(args: &[Value]) -> String {
        args.first()
            .and_then(|doc| doc.get("name"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    }

    /// Getters and migrations over `{name, age?}` people documents.
    pub fn people_sandbox() -> FunctionSandbox {
        FunctionSandbox::new(Duration::from_secs(2))
            .with_module("summary", |args| {
                let mut summary = serde_json::Map::new();
                summary.insert("name".into(), json!(name_of(args)));
                if let Some(age) = args[0].get("age") {
                    summary.insert("age".into(), age.clone());
                }
                Ok(Value::Object(summary))
            })
            .with_module("summary-with-address", |args| Ok(args[0].clone()))
            .with_module("fingerprint", |args| Ok(json!(name_of(args).to_lowercase())))
            .with_module("blocking_keys", |args| {
                let keys: Vec<String> = name_of(args)
                    .to_lowercase()
                    .split_whitespace()
                    .map(String::from)
                    .collect();
                Ok(json!(keys))
            })
            .with_module("throws", |_| Err("getter threw".into()))
            .with_module("returns-number", |_| Ok(json!(42)))
            .with_module("add-age", |args| {
                let mut doc = args[0].clone();
                doc["age"] = json!(0);
                Ok(doc)
            })
            .with_module("drop-name", |args| {
                let mut doc = args[0].clone();
                if let Some(obj) = doc.as_object_mut() {
                    obj.remove("name");
                }
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

    /// In-memory service over [`people_sandbox`] with default config.
    pub async fn test_service() -> FolioService {
        let db = FolioDb::open_local(":memory:").await.unwrap();
        FolioService::from_db(db, Arc::new(people_sandbox()), FolioConfig::default())
    }
}
