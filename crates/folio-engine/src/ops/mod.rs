//! Service operations, one file per area.

pub mod collections;
pub mod documents;
pub mod jobs;
pub mod migration;
