// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Resumable full reindex.
//!
//! A reindex walks the system of record in primary-key order, one page at
//! a time, and pushes every row into the index. Progress is kept in a
//! cursor key on the engine so a crashed run resumes where it stopped.
//!
//! # State machine
//!
//! ```text
//!             ┌──────────── has_more, next > last ───────────┐
//!             ▼                                              │
//! start ─→ Running{last_id} ─→ index_page ─→ flush ─→ store cursor
//!             │
//!             ├── !has_more ─────────→ delete cursor ─→ Done
//!             └── has_more, next <= last ─→ LoopDetected (cursor untouched)
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::metrics;
use crate::pusher::DocumentPusher;
use crate::schema::{CompiledSchema, RecordChange};
use crate::search::add_namespace;
use crate::storage::traits::{RecordSource, Reply, SearchBackend, SearchError};

/// Cursor key stem; the index name is appended.
pub const CURSOR_KEY_PREFIX: &str = "_orm_force_index";

/// Published after a forced reindex so a consumer runs the indexer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexerEvent {
    #[serde(rename = "Index")]
    pub index: String,
}

impl IndexerEvent {
    pub fn new(index: impl Into<String>) -> Self {
        Self { index: index.into() }
    }
}

/// Refills one index page by page.
#[async_trait]
pub trait Indexer: Send + Sync {
    /// Push rows after `last_id`; returns the last id pushed and whether
    /// more rows remain.
    async fn index_page(&self, last_id: u64, pusher: &mut DocumentPusher) -> Result<(u64, bool), SearchError>;
}

/// Indexer for a compiled record type, reading from a [`RecordSource`].
pub struct SchemaIndexer {
    schema: Arc<CompiledSchema>,
    source: Arc<dyn RecordSource>,
}

impl SchemaIndexer {
    pub fn new(schema: Arc<CompiledSchema>, source: Arc<dyn RecordSource>) -> Self {
        Self { schema, source }
    }
}

#[async_trait]
impl Indexer for SchemaIndexer {
    async fn index_page(&self, last_id: u64, pusher: &mut DocumentPusher) -> Result<(u64, bool), SearchError> {
        let scan = &self.schema.scan;
        let rows = self.source.scan(scan, last_id).await?;

        let mut next_id = last_id;
        for row in &rows {
            let mut change = RecordChange::insert(row.id);
            for (column, raw) in scan.columns.iter().zip(row.values.iter()) {
                let Some(codec) = self.schema.codecs.get(&column.name) else {
                    continue;
                };
                change.fields.insert(column.name.clone(), codec.decode(raw.clone())?);
            }
            self.schema.write_change(&change, pusher)?;
            pusher.flush_if_full().await?;
            next_id = row.id;
        }

        Ok((next_id, rows.len() == scan.page_size))
    }
}

/// Persisted reindex progress.
pub struct ReindexCursor {
    backend: Arc<dyn SearchBackend>,
    key: String,
    ttl_secs: u64,
}

impl ReindexCursor {
    pub fn new(backend: Arc<dyn SearchBackend>, namespace: &str, index: &str, ttl_secs: u64) -> Self {
        Self {
            backend,
            key: Self::key(namespace, index),
            ttl_secs,
        }
    }

    pub fn key(namespace: &str, index: &str) -> String {
        add_namespace(namespace, &format!("{}{}", CURSOR_KEY_PREFIX, index))
    }

    /// Last stored id; unreadable values count as absent.
    pub async fn load(&self) -> Result<Option<u64>, SearchError> {
        let reply = self.backend.execute(&["GET".to_string(), self.key.clone()]).await?;
        Ok(match reply {
            Reply::Nil => None,
            other => other.as_i64().and_then(|v| u64::try_from(v).ok()),
        })
    }

    pub async fn store(&self, id: u64) -> Result<(), SearchError> {
        self.backend
            .execute(&[
                "SET".to_string(),
                self.key.clone(),
                id.to_string(),
                "EX".to_string(),
                self.ttl_secs.to_string(),
            ])
            .await?;
        Ok(())
    }

    pub async fn clear(&self) -> Result<(), SearchError> {
        self.backend.execute(&["DEL".to_string(), self.key.clone()]).await?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReindexState {
    Running { last_id: u64 },
    Done { last_id: u64 },
}

impl ReindexState {
    /// Next state after a page, or `None` when the indexer did not advance.
    pub fn advance(self, next_id: u64, has_more: bool) -> Option<ReindexState> {
        match self {
            ReindexState::Done { .. } => Some(self),
            ReindexState::Running { .. } if !has_more => Some(ReindexState::Done { last_id: next_id }),
            ReindexState::Running { last_id } if next_id <= last_id => None,
            ReindexState::Running { .. } => Some(ReindexState::Running { last_id: next_id }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReindexReport {
    pub index: String,
    pub pages: u64,
    pub last_id: u64,
}

/// Drives one index's [`Indexer`] to completion.
pub struct Reindexer {
    backend: Arc<dyn SearchBackend>,
    namespace: String,
    cursor_ttl_secs: u64,
    flush_threshold: usize,
}

impl Reindexer {
    pub fn new(
        backend: Arc<dyn SearchBackend>,
        namespace: impl Into<String>,
        cursor_ttl_secs: u64,
        flush_threshold: usize,
    ) -> Self {
        Self {
            backend,
            namespace: namespace.into(),
            cursor_ttl_secs,
            flush_threshold,
        }
    }

    /// Run until the indexer reports no more rows.
    ///
    /// Without an indexer the cursor is cleared and nothing is pushed.
    #[instrument(skip(self, indexer), fields(pool = %self.backend.pool()))]
    pub async fn run(&self, index: &str, indexer: Option<&Arc<dyn Indexer>>) -> Result<ReindexReport, SearchError> {
        let cursor = ReindexCursor::new(Arc::clone(&self.backend), &self.namespace, index, self.cursor_ttl_secs);
        let mut report = ReindexReport {
            index: index.to_string(),
            pages: 0,
            last_id: 0,
        };

        let Some(indexer) = indexer else {
            cursor.clear().await?;
            return Ok(report);
        };

        let start = cursor.load().await?.unwrap_or(0);
        if start > 0 {
            info!(index, resume_from = start, "Resuming reindex");
        }
        let mut state = ReindexState::Running { last_id: start };
        let mut pusher = DocumentPusher::new(Arc::clone(&self.backend), self.namespace.clone(), self.flush_threshold);

        while let ReindexState::Running { last_id } = state {
            let (next_id, has_more) = indexer.index_page(last_id, &mut pusher).await?;
            pusher.flush().await?;
            report.pages += 1;
            metrics::record_reindex_page(index);

            state = match state.advance(next_id, has_more) {
                Some(next) => next,
                None => {
                    warn!(index, last_id, next_id, "Indexer did not advance");
                    metrics::record_reindex_run(index, false);
                    return Err(SearchError::LoopDetected {
                        index: index.to_string(),
                        pool: self.backend.pool().to_string(),
                    });
                }
            };

            match state {
                ReindexState::Running { last_id } => {
                    cursor.store(last_id).await?;
                    debug!(index, last_id, "Reindex page done");
                }
                ReindexState::Done { last_id } => {
                    cursor.clear().await?;
                    report.last_id = last_id;
                }
            }
        }

        metrics::record_reindex_run(index, true);
        info!(index, pages = report.pages, last_id = report.last_id, "Reindex finished");
        Ok(report)
    }
}
