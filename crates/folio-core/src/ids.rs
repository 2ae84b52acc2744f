//! ID prefix constants.
//!
//! Every entity ID is `{prefix}-{8 hex chars}`, e.g. `doc-a3f8b2c1`. The random
//! part is generated by the storage engine (see `folio-db`).

pub const PREFIX_COLLECTION: &str = "col";
pub const PREFIX_COLLECTION_VERSION: &str = "cov";
pub const PREFIX_DOCUMENT: &str = "doc";
pub const PREFIX_DOCUMENT_VERSION: &str = "dov";
pub const PREFIX_JOB: &str = "job";

/// All prefixes, in entity ownership order.
pub const ALL_PREFIXES: &[&str] = &[
    PREFIX_COLLECTION,
    PREFIX_COLLECTION_VERSION,
    PREFIX_DOCUMENT,
    PREFIX_DOCUMENT_VERSION,
    PREFIX_JOB,
];
