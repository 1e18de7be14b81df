// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Sync API for SearchEngine
//!
//! Keeps the index in step with the system of record:
//!
//! ```text
//! record mutation ─→ on_record_changed(s) ─→ write_change ─→ HSET / DEL pipeline
//! IndexerEvent ────→ handle_indexer_event ─→ Reindexer::run (cursor-driven)
//! ```
//!
//! At most one reindex loop per `pool:index` runs in this process; a second
//! one fails with [`SearchError::ReindexInProgress`]. Exclusion across
//! processes is left to the event consumer.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, error, info, instrument};

use crate::reindex::{IndexerEvent, ReindexReport, Reindexer};
use crate::schema::RecordChange;
use crate::storage::traits::SearchError;

use super::SearchEngine;

/// Releases the reindex slot when the loop ends, whatever the outcome.
struct ReindexGuard {
    running: Arc<DashMap<String, ()>>,
    key: String,
}

impl Drop for ReindexGuard {
    fn drop(&mut self) {
        self.running.remove(&self.key);
    }
}

impl SearchEngine {
    // ═══════════════════════════════════════════════════════════════════════════
    // Incremental sync
    // ═══════════════════════════════════════════════════════════════════════════

    /// Apply one record mutation to the index.
    #[instrument(skip(self, change), fields(pool = %self.config.pool, id = change.id))]
    pub async fn on_record_changed(&self, record: &str, change: &RecordChange) -> Result<(), SearchError> {
        self.on_record_changes(record, std::slice::from_ref(change)).await
    }

    /// Apply a batch of mutations of one record type, flushing as the buffer fills.
    pub async fn on_record_changes(&self, record: &str, changes: &[RecordChange]) -> Result<(), SearchError> {
        let schema = self.record_schema(record)?;
        let mut pusher = self.pusher();
        for change in changes {
            schema.write_change(change, &mut pusher)?;
            pusher.flush_if_full().await?;
        }
        pusher.flush().await?;
        debug!(record, changes = changes.len(), "Synced record changes");
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Reindex consumer
    // ═══════════════════════════════════════════════════════════════════════════

    /// Repopulate the index named by an event.
    ///
    /// Returns `None` for indices not registered in this pool. A stored
    /// cursor makes the run resume where an earlier one stopped.
    #[instrument(skip(self, event), fields(pool = %self.config.pool, index = %event.index))]
    pub async fn handle_indexer_event(&self, event: &IndexerEvent) -> Result<Option<ReindexReport>, SearchError> {
        let Some(registered) = self.registry.index(&self.config.pool, &event.index) else {
            debug!("Ignoring event for unregistered index");
            return Ok(None);
        };

        let key = format!("{}:{}", self.config.pool, event.index);
        let _guard = match self.running_reindexes.entry(key.clone()) {
            Entry::Occupied(_) => {
                return Err(SearchError::ReindexInProgress {
                    index: event.index.clone(),
                    pool: self.config.pool.clone(),
                });
            }
            Entry::Vacant(slot) => {
                slot.insert(());
                ReindexGuard {
                    running: Arc::clone(&self.running_reindexes),
                    key,
                }
            }
        };

        let reindexer = Reindexer::new(
            Arc::clone(&self.backend),
            self.config.namespace.clone(),
            self.config.cursor_ttl_secs,
            self.config.pusher_flush_threshold,
        );
        reindexer.run(&event.index, registered.indexer.as_ref()).await.map(Some)
    }

    /// Handle events until the channel closes.
    ///
    /// Failed runs are logged and leave their cursor for the next event.
    pub async fn consume_indexer_events(&self, mut events: UnboundedReceiver<(String, IndexerEvent)>) {
        while let Some((channel, event)) = events.recv().await {
            if channel != self.config.indexer_channel {
                continue;
            }
            match self.handle_indexer_event(&event).await {
                Ok(Some(report)) => info!(index = %report.index, pages = report.pages, "Indexer event handled"),
                Ok(None) => {}
                Err(e) => error!(index = %event.index, error = %e, "Indexer event failed"),
            }
        }
    }
}
