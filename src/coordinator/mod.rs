// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Search engine coordinator.
//!
//! The [`SearchEngine`] is the per-pool façade that ties together:
//! - the engine backend (Redis or in-memory)
//! - the shared [`SearchRegistry`] of schemas and indices
//! - the query compiler for the pool's namespace
//! - the reindex trigger publisher
//!
//! # Flows
//!
//! ```text
//! search_*/aggregate* ─→ QueryCompiler ─→ FT.SEARCH / FT.AGGREGATE ─→ reply parsers
//! on_record_changed ───→ CompiledSchema::write_change ─→ DocumentPusher ─→ pipeline
//! force_reindex ───────→ FT.DROPINDEX DD ─→ FT.CREATE ─→ publish IndexerEvent
//! handle_indexer_event → Reindexer (cursor-driven) ─→ DocumentPusher
//! get_alters ──────────→ FT._LIST + FT.INFO ─→ diff_index ─→ IndexAlter
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use redisearch_sync::{SearchConfig, SearchEngine, SearchRegistry};
//! use redisearch_sync::search::{Pager, SearchQuery};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), redisearch_sync::SearchError> {
//! let config = SearchConfig {
//!     redis_url: Some("redis://localhost:6379/0".into()),
//!     ..Default::default()
//! };
//! let registry = Arc::new(SearchRegistry::new(config.schema_compiler()));
//! let engine = SearchEngine::connect(config, registry).await?;
//!
//! let query = SearchQuery::new().filter_int_min_max("Age", 18, 30);
//! let (total, keys) = engine.search_keys("users", &query, Some(&Pager::new(1, 100))).await?;
//! # let _ = (total, keys);
//! # Ok(())
//! # }
//! ```

mod index_api;
mod search_api;
mod sync_api;
mod types;

pub use types::IndexStatistics;

use std::sync::Arc;

use dashmap::DashMap;
use tracing::{info, warn};

use crate::config::SearchConfig;
use crate::pusher::DocumentPusher;
use crate::schema::{CompiledSchema, SearchRegistry};
use crate::search::QueryCompiler;
use crate::storage::redis::{RedisSearchBackend, RedisStreamPublisher};
use crate::storage::traits::{IndexerEventPublisher, SearchBackend, SearchError};

/// Search façade for one pool.
///
/// # Thread Safety
///
/// The engine is `Send + Sync`. Compilation is pure; the only shared
/// mutable state is the registry (locked) and the reindex guard (DashMap).
pub struct SearchEngine {
    /// Configuration
    pub(super) config: SearchConfig,

    /// Engine connection for this pool
    pub(super) backend: Arc<dyn SearchBackend>,

    /// Schemas and indices shared across pools
    pub(super) registry: Arc<SearchRegistry>,

    /// Receives `IndexerEvent`s from `force_reindex` (optional)
    pub(super) publisher: Option<Arc<dyn IndexerEventPublisher>>,

    /// Compiler bound to this pool's namespace and page limit
    pub(super) compiler: QueryCompiler,

    /// `pool:index` keys with a reindex loop running in this process
    pub(super) running_reindexes: Arc<DashMap<String, ()>>,
}

impl SearchEngine {
    /// Connect to the engine at `config.redis_url`.
    ///
    /// Indexer events are published to the `indexer_channel` stream on the
    /// same connection.
    pub async fn connect(config: SearchConfig, registry: Arc<SearchRegistry>) -> Result<Self, SearchError> {
        let url = config
            .redis_url
            .clone()
            .ok_or_else(|| SearchError::Config(format!("missing redis_url for pool {}", config.pool)))?;

        let backend = RedisSearchBackend::connect(&url, &config.pool).await?;
        let publisher: Arc<dyn IndexerEventPublisher> = Arc::new(RedisStreamPublisher::new(backend.connection()));

        info!(pool = %config.pool, namespace = %config.namespace, "Search engine connected");
        Ok(Self::with_backend(config, Arc::new(backend), registry, Some(publisher)))
    }

    /// Build over an existing backend (in-memory backends, shared connections).
    pub fn with_backend(
        config: SearchConfig,
        backend: Arc<dyn SearchBackend>,
        registry: Arc<SearchRegistry>,
        publisher: Option<Arc<dyn IndexerEventPublisher>>,
    ) -> Self {
        if backend.pool() != config.pool {
            warn!(config_pool = %config.pool, backend_pool = %backend.pool(), "Backend pool differs from configured pool");
        }
        registry.register_pool(config.pool.clone());

        Self {
            compiler: QueryCompiler::new(config.compile_options()),
            config,
            backend,
            registry,
            publisher,
            running_reindexes: Arc::new(DashMap::new()),
        }
    }

    pub fn pool(&self) -> &str {
        &self.config.pool
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<SearchRegistry> {
        &self.registry
    }

    /// A write sink for this pool, for custom indexers and bulk loads.
    pub fn pusher(&self) -> DocumentPusher {
        DocumentPusher::new(
            Arc::clone(&self.backend),
            self.config.namespace.clone(),
            self.config.pusher_flush_threshold,
        )
    }

    /// Compiled schema of a record type indexed in this pool.
    pub(super) fn record_schema(&self, record: &str) -> Result<Arc<CompiledSchema>, SearchError> {
        let schema = self
            .registry
            .schema(record)
            .ok_or_else(|| SearchError::Config(format!("entity {} is not searchable", record)))?;
        if schema.pool != self.config.pool {
            return Err(SearchError::Config(format!(
                "entity {} is indexed in pool {}, not {}",
                record, schema.pool, self.config.pool
            )));
        }
        Ok(schema)
    }
}
