//! # folio-engine
//!
//! The Folio document engine: collections whose documents carry artifacts
//! derived by user-authored getters, schema migrations applied to every
//! document of a collection, and the background job queue that runs them.
//!
//! [`FolioService`] is the entry point. Long operations are enqueued as jobs
//! and executed by a [`Worker`], one at a time.

pub mod derivation;
pub mod error;
mod execution;
pub mod jobs;
pub mod migration;
pub mod ops;
pub mod service;

#[cfg(test)]
mod test_support;

pub use error::{EngineError, MigrationError};
pub use jobs::recovery::RecoveryReport;
pub use jobs::worker::Worker;
pub use ops::collections::NewCollectionVersion;
pub use service::FolioService;
