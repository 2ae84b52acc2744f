//! # folio-schema
//!
//! JSON Schema validation for Folio.
//!
//! This crate provides:
//! - `CompiledSchema`: a user-declared collection schema compiled once and
//!   applied to many values, reporting every violation as a `ValidationIssue`
//! - `ArtifactShapes`: the fixed shapes that getter results must satisfy
//! - `SchemaRegistry`: published schemas of the job and migration types,
//!   generated with schemars, plus the artifact shapes
//!
//! Entity and contract types are defined in `folio-core` with
//! `#[derive(JsonSchema)]`; this crate imports them and provides the registry
//! and validation layer.

pub mod error;
pub mod registry;
pub mod shapes;
pub mod validator;

pub use error::SchemaError;
pub use registry::SchemaRegistry;
pub use shapes::ArtifactShapes;
pub use validator::CompiledSchema;
