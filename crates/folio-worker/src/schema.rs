//! `folio-worker --schema NAME`: print a published JSON Schema.

use anyhow::Context;
use folio_schema::SchemaRegistry;

pub fn render(name: &str) -> anyhow::Result<String> {
    let registry = SchemaRegistry::new();
    let schema = registry.get(name).with_context(|| {
        let known: Vec<_> = registry.names().collect();
        format!("known schemas: {}", known.join(", "))
    })?;
    Ok(serde_json::to_string_pretty(schema)?)
}
