//! The Folio service: database, sandbox, artifact shapes, and configuration.
//!
//! Operations are added to `FolioService` by `impl` blocks in [`crate::ops`],
//! one file per area. The service is cheap to clone; clones share
//! everything.

use std::sync::Arc;

use folio_config::FolioConfig;
use folio_db::FolioDb;
use folio_sandbox::Sandbox;
use folio_schema::ArtifactShapes;

use crate::error::EngineError;

#[derive(Clone)]
pub struct FolioService {
    db: Arc<FolioDb>,
    sandbox: Arc<dyn Sandbox>,
    shapes: Arc<ArtifactShapes>,
    config: Arc<FolioConfig>,
}

impl FolioService {
    /// Open the configured database and build a service around it.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Database` if the database cannot be opened.
    pub async fn open(config: FolioConfig, sandbox: Arc<dyn Sandbox>) -> Result<Self, EngineError> {
        let db = FolioDb::open(&config.database).await?;
        Ok(Self::from_db(db, sandbox, config))
    }

    /// Create from an already opened database.
    #[must_use]
    pub fn from_db(db: FolioDb, sandbox: Arc<dyn Sandbox>, config: FolioConfig) -> Self {
        Self {
            db: Arc::new(db),
            sandbox,
            shapes: Arc::new(ArtifactShapes::new()),
            config: Arc::new(config),
        }
    }

    #[must_use]
    pub fn db(&self) -> &FolioDb {
        &self.db
    }

    #[must_use]
    pub const fn sandbox(&self) -> &Arc<dyn Sandbox> {
        &self.sandbox
    }

    /// The shapes getter results are checked against.
    #[must_use]
    pub fn shapes(&self) -> &ArtifactShapes {
        &self.shapes
    }

    #[must_use]
    pub fn config(&self) -> &FolioConfig {
        &self.config
    }
}

impl std::fmt::Debug for FolioService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FolioService")
            .field("db", &self.db)
            .finish_non_exhaustive()
    }
}
