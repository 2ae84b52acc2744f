//! Entity structs for all Folio domain objects.
//!
//! Each entity maps to a table in the libSQL database (see `folio-db`'s
//! migrations). All structs derive `Serialize`, `Deserialize`, and
//! `JsonSchema` for JSON roundtrip and schema export.

mod collection;
mod document;
mod job;

pub use collection::{Collection, CollectionVersion, Getters};
pub use document::{Document, DocumentVersion};
pub use job::BackgroundJob;
