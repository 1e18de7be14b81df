// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! # RediSearch Sync
//!
//! A client-side secondary search index kept in step with a system of
//! record, over a RediSearch-compatible engine.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Record descriptions                     │
//! │  • RecordDescriptor → SchemaCompiler → CompiledSchema        │
//! │  • SearchRegistry: pools, schemas, custom indices           │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Compilers (pure)                         │
//! │  • SearchQuery → FT.SEARCH args                             │
//! │  • Aggregation → FT.AGGREGATE args                          │
//! │  • IndexDefinition → FT.CREATE args                         │
//! │  • diff_index: desired vs FT.INFO → change reasons          │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                SearchEngine (one per pool)                  │
//! │  • search / aggregate / index lifecycle / get_alters        │
//! │  • on_record_changed → DocumentPusher pipeline              │
//! │  • force_reindex → IndexerEvent → Reindexer (cursor)        │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Redis (ConnectionManager)      SQL record source (sqlx)    │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use redisearch_sync::{SearchConfig, SearchEngine, SearchRegistry};
//! use redisearch_sync::schema::{FieldDescriptor, RecordDescriptor, RecordChange, SemanticType};
//! use redisearch_sync::search::{Pager, SearchQuery};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), redisearch_sync::SearchError> {
//!     let config = SearchConfig {
//!         redis_url: Some("redis://localhost:6379/0".into()),
//!         ..Default::default()
//!     };
//!     let registry = Arc::new(SearchRegistry::new(config.schema_compiler()));
//!     let engine = SearchEngine::connect(config, registry.clone()).await?;
//!
//!     let users = RecordDescriptor::new("users", "users")
//!         .pool("default")
//!         .field(FieldDescriptor::new("ID", SemanticType::UInt64).sortable())
//!         .field(FieldDescriptor::new("Age", SemanticType::Int).searchable().sortable());
//!     registry.register_record_type(&users, None)?;
//!
//!     for alter in engine.get_alters().await? {
//!         alter.apply(&engine).await?;
//!     }
//!
//!     engine.on_record_changed("users", &RecordChange::insert(1).set("Age", 30i64)).await?;
//!
//!     let query = SearchQuery::new().filter_int_min_max("Age", 18, 40);
//!     let (total, ids) = engine.search_ids("users", &query, Some(&Pager::new(1, 50))).await?;
//!     println!("{} matches: {:?}", total, ids);
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration
//!
//! See [`SearchConfig`] for all configuration options.
//!
//! ## Modules
//!
//! - [`coordinator`]: The per-pool [`SearchEngine`]
//! - [`schema`]: Record descriptions, field codecs, the registry
//! - [`search`]: Query, aggregation and index compilers, reply parsers, drift detection
//! - [`reindex`]: Cursor-driven full reindex
//! - [`pusher`]: Batched document writes
//! - [`storage`]: Engine backends (Redis, memory) and record sources (SQL, memory)
//! - [`resilience`]: Retry logic for connections and source reads

pub mod config;
pub mod coordinator;
pub mod metrics;
pub mod pusher;
pub mod reindex;
pub mod resilience;
pub mod schema;
pub mod search;
pub mod storage;

// Note: We don't expose a `tracing` module to avoid conflict with the tracing crate

pub use config::SearchConfig;
pub use coordinator::{IndexStatistics, SearchEngine};
pub use pusher::DocumentPusher;
pub use reindex::{Indexer, IndexerEvent, ReindexReport, Reindexer};
pub use schema::{CompiledSchema, SchemaCompiler, SearchRegistry};
pub use storage::traits::{IndexerEventPublisher, RecordSource, Reply, SearchBackend, SearchError};
pub use resilience::retry::RetryConfig;
pub use metrics::LatencyTimer;
