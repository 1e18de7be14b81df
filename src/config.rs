// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Configuration for one search pool.
//!
//! # Example
//!
//! ```
//! use redisearch_sync::SearchConfig;
//!
//! // Minimal config (uses defaults)
//! let config = SearchConfig::default();
//! assert_eq!(config.max_page_size, 10_000);
//!
//! // Full config
//! let config = SearchConfig {
//!     redis_url: Some("redis://localhost:6379/0".into()),
//!     pool: "search".into(),
//!     namespace: "app".into(),
//!     indexer_page_size: 1000,
//!     ..Default::default()
//! };
//! ```

use serde::Deserialize;

use crate::schema::SchemaCompiler;
use crate::search::CompileOptions;

/// Configuration for a [`SearchEngine`](crate::SearchEngine).
///
/// All fields have defaults. `redis_url` is required by
/// [`SearchEngine::connect`](crate::SearchEngine::connect).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SearchConfig {
    /// Redis connection string (e.g., "redis://localhost:6379/0")
    #[serde(default)]
    pub redis_url: Option<String>,

    /// Pool name that record types bind to (default: "default")
    #[serde(default = "default_pool")]
    pub pool: String,

    /// Prefix for index names, document keys and cursor keys (default: none)
    #[serde(default)]
    pub namespace: String,

    /// Rows per page of the schema-derived indexer
    #[serde(default = "default_indexer_page_size")]
    pub indexer_page_size: usize,

    /// Largest accepted search/aggregate page
    #[serde(default = "default_max_page_size")]
    pub max_page_size: u32,

    /// Lifetime of a stored reindex cursor
    #[serde(default = "default_cursor_ttl_secs")]
    pub cursor_ttl_secs: u64,

    /// Stream that receives reindex trigger events
    #[serde(default = "default_indexer_channel")]
    pub indexer_channel: String,

    /// Buffered write commands before the pusher flushes
    #[serde(default = "default_pusher_flush_threshold")]
    pub pusher_flush_threshold: usize,
}

fn default_pool() -> String { "default".to_string() }
fn default_indexer_page_size() -> usize { 5000 }
fn default_max_page_size() -> u32 { 10_000 }
fn default_cursor_ttl_secs() -> u64 { 86_400 } // 1 day
fn default_indexer_channel() -> String { "orm-redis-search-channel".to_string() }
fn default_pusher_flush_threshold() -> usize { 10_000 }

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            redis_url: None,
            pool: default_pool(),
            namespace: String::new(),
            indexer_page_size: default_indexer_page_size(),
            max_page_size: default_max_page_size(),
            cursor_ttl_secs: default_cursor_ttl_secs(),
            indexer_channel: default_indexer_channel(),
            pusher_flush_threshold: default_pusher_flush_threshold(),
        }
    }
}

impl SearchConfig {
    /// Schema compiler whose scans use `indexer_page_size`.
    pub fn schema_compiler(&self) -> SchemaCompiler {
        SchemaCompiler::new(self.indexer_page_size)
    }

    pub(crate) fn compile_options(&self) -> CompileOptions {
        CompileOptions {
            namespace: self.namespace.clone(),
            max_page_size: self.max_page_size,
        }
    }
}
