//! Trail Graph - Browsing graph storage and services
//!
//! Provides abstraction over graph stores (in-memory, SurrealDB)
//! and the services that ingest page views into the graph and
//! search a user's browsing history.

use async_trait::async_trait;
use std::sync::Arc;
use trail_core::{DatabaseConfig, Direction, EdgeLabel, GraphBackend, Properties, Result, Vertex};

pub mod accounts;
pub mod domain;
pub mod memory_store;
pub mod page_view;
pub mod search;
pub mod surrealdb_store;

pub use accounts::AccountService;
pub use domain::{normalize_domain, normalize_host, DomainResolver, SPECIAL_DOMAIN};
pub use memory_store::MemoryGraphStore;
pub use page_view::PageViewService;
pub use search::SearchService;
pub use surrealdb_store::SurrealDbStore;

/// Trait for graph store operations
///
/// Each call is atomic on its own; nothing spans calls.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Get vertex by ID
    async fn get_vertex(&self, id: &str) -> Result<Option<Vertex>>;

    /// Create a vertex with a store-assigned ID
    async fn add_vertex(&self, properties: Properties) -> Result<Vertex>;

    /// Create a vertex with a caller-chosen ID; fails if the ID is taken
    async fn insert_vertex(&self, id: &str, properties: Properties) -> Result<Vertex>;

    /// Overwrite the given keys on an existing vertex
    async fn merge_properties(&self, id: &str, properties: Properties) -> Result<Vertex>;

    /// Store a directed edge; both ends must exist
    async fn add_edge(&self, label: EdgeLabel, from: &str, to: &str) -> Result<()>;

    /// Find vertices whose property `key` equals `value`, oldest first
    async fn vertices_by_property(&self, key: &str, value: &serde_json::Value)
        -> Result<Vec<Vertex>>;

    /// Vertices adjacent to `id` over edges with `label`
    async fn neighbors(&self, id: &str, direction: Direction, label: EdgeLabel)
        -> Result<Vec<Vertex>>;

    /// Check the store is reachable
    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    /// Get store name for logging
    fn name(&self) -> &str;
}

/// Open the graph store selected by configuration
pub async fn connect(config: &DatabaseConfig) -> Result<Arc<dyn GraphStore>> {
    match config.backend {
        GraphBackend::Memory => {
            tracing::info!("Using in-memory graph store");
            Ok(Arc::new(MemoryGraphStore::new()))
        }
        GraphBackend::SurrealDb => {
            tracing::info!(url = %config.surrealdb_url, "Connecting to SurrealDB graph store");
            let store = SurrealDbStore::new(config).await?;
            store.init_schema().await?;
            Ok(Arc::new(store))
        }
    }
}
