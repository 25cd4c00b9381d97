//! # Backend Selection

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::ReplayStoreError;
use crate::memory::MemoryReplayStore;
use crate::postgres::PgReplayStore;
use crate::store::ReplayStore;

/// Which [`ReplayStore`] implementation to construct.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ReplayBackend {
    /// Process-local map. Only safe with a single instance.
    Memory,
    /// Shared PostgreSQL table.
    Postgres {
        /// Connection string.
        database_url: String,
    },
}

impl std::fmt::Debug for ReplayBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Memory => f.write_str("Memory"),
            Self::Postgres { .. } => f
                .debug_struct("Postgres")
                .field("database_url", &"[REDACTED]")
                .finish(),
        }
    }
}

impl ReplayBackend {
    /// Short label, matching [`ReplayStore::backend`].
    pub fn name(&self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::Postgres { .. } => "postgres",
        }
    }

    /// Construct the store. Postgres connects and migrates eagerly so a bad
    /// URL fails at startup rather than on the first request.
    pub async fn build(&self) -> Result<Arc<dyn ReplayStore>, ReplayStoreError> {
        match self {
            Self::Memory => {
                tracing::warn!(
                    "Using in-memory replay store; consumption is not shared across instances"
                );
                Ok(Arc::new(MemoryReplayStore::new()))
            }
            Self::Postgres { database_url } => {
                Ok(Arc::new(PgReplayStore::connect(database_url).await?))
            }
        }
    }
}
