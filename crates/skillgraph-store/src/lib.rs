//! Graph store backends.
//!
//! `SqliteGraph` persists to a single SQLite file; `MemoryGraph` (from core) keeps
//! everything in process. Both implement `GraphStore`.

mod sqlite;

use std::sync::Arc;

use skillgraph_core::config::{StoreBackend, StoreConfig};
use skillgraph_core::graph::{GraphStore, MemoryGraph};
use skillgraph_core::Result;

pub use sqlite::SqliteGraph;

/// Open the backend selected by configuration.
pub fn open_graph_store(cfg: &StoreConfig) -> Result<Arc<dyn GraphStore>> {
    match cfg.backend {
        StoreBackend::Sqlite => {
            tracing::debug!(path = %cfg.db_path.display(), "opening sqlite graph store");
            Ok(Arc::new(SqliteGraph::open(&cfg.db_path)?))
        }
        StoreBackend::Memory => {
            tracing::debug!("using in-memory graph store");
            Ok(Arc::new(MemoryGraph::new()))
        }
    }
}
