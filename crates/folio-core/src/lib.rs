//! # folio-core
//!
//! Core types, ID prefixes, and error types for Folio.
//!
//! This crate provides the foundational types shared across all Folio crates:
//! - Entity structs for collections, documents, their versions, and background jobs
//! - The background job state machine and the closed set of job payloads
//! - Derived artifact types (summary, fingerprint, blocking keys) and their failures
//! - Migration reports and per-document migration failures
//! - Cross-cutting error types

pub mod derived;
pub mod entities;
pub mod enums;
pub mod errors;
pub mod ids;
pub mod jobs;
pub mod migration;
pub mod script;
