// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Index lifecycle API for SearchEngine
//!
//! Create, drop, list and inspect indices, force a full reindex, and
//! report schema drift as [`IndexAlter`]s.
//!
//! "Unknown index" replies on drop and info are ordinary not-found results;
//! every other engine error propagates with its original message.

use std::collections::BTreeSet;

use tracing::{debug, info, instrument, warn};

use crate::metrics;
use crate::reindex::IndexerEvent;
use crate::search::{
    add_namespace, diff_index, remove_namespace, search_module, AlterAction, DiffContext, IndexAlter, IndexDefinition,
    IndexInfo,
};
use crate::storage::traits::SearchError;

use super::{IndexStatistics, SearchEngine};

impl SearchEngine {
    // ═══════════════════════════════════════════════════════════════════════════
    // Index API
    // ═══════════════════════════════════════════════════════════════════════════

    /// `FT.CREATE` for a definition, under this pool's namespace.
    #[instrument(skip(self, definition), fields(index = %definition.name, pool = %self.config.pool))]
    pub async fn create_index(&self, definition: &IndexDefinition) -> Result<(), SearchError> {
        let args = definition.to_ft_create_args(&self.config.namespace)?;
        self.backend.execute(&args).await?;
        info!("Created search index");
        Ok(())
    }

    /// `FT.DROPINDEX`, optionally deleting the indexed hashes.
    ///
    /// Returns `false` when the index does not exist.
    #[instrument(skip(self), fields(pool = %self.config.pool))]
    pub async fn drop_index(&self, index: &str, delete_documents: bool) -> Result<bool, SearchError> {
        let mut args = vec![
            "FT.DROPINDEX".to_string(),
            add_namespace(&self.config.namespace, index),
        ];
        if delete_documents {
            args.push("DD".to_string());
        }

        match self.backend.execute(&args).await {
            Ok(_) => {
                info!("Dropped search index");
                Ok(true)
            }
            Err(e) if e.is_unknown_index() => {
                debug!("Index not found, nothing to drop");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// Index names in this pool's namespace, namespace removed.
    pub async fn list_indices(&self) -> Result<Vec<String>, SearchError> {
        let reply = self.backend.execute(&["FT._LIST".to_string()]).await?;
        let names = reply
            .as_array()
            .map(|items| items.iter().filter_map(|r| r.to_text()).collect::<Vec<_>>())
            .unwrap_or_default();

        let namespace = &self.config.namespace;
        if namespace.is_empty() {
            return Ok(names);
        }
        let prefix = format!("{}:", namespace);
        Ok(names
            .iter()
            .filter(|name| name.starts_with(&prefix))
            .map(|name| remove_namespace(namespace, name).to_string())
            .collect())
    }

    /// `FT.INFO`, or `None` when the index does not exist.
    pub async fn info(&self, index: &str) -> Result<Option<IndexInfo>, SearchError> {
        let args = vec!["FT.INFO".to_string(), add_namespace(&self.config.namespace, index)];
        match self.backend.execute(&args).await {
            Ok(reply) => Ok(Some(IndexInfo::from_reply(&reply, &self.config.namespace))),
            Err(e) if e.is_unknown_index() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Drop the index with its documents, recreate it, and publish an
    /// [`IndexerEvent`] so a consumer repopulates it.
    ///
    /// Repopulation happens asynchronously, in whoever handles the event.
    #[instrument(skip(self), fields(pool = %self.config.pool))]
    pub async fn force_reindex(&self, index: &str) -> Result<(), SearchError> {
        let registered = self
            .registry
            .index(&self.config.pool, index)
            .ok_or_else(|| SearchError::UnknownIndex {
                index: index.to_string(),
                pool: self.config.pool.clone(),
            })?;

        self.drop_index(index, true).await?;
        self.create_index(&registered.definition).await?;

        let event = IndexerEvent::new(index);
        match &self.publisher {
            Some(publisher) => publisher.publish(&self.config.indexer_channel, &event).await?,
            None => warn!("No indexer event publisher, index recreated empty"),
        }
        info!(channel = %self.config.indexer_channel, "Forced reindex");
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Drift detection
    // ═══════════════════════════════════════════════════════════════════════════

    /// Compare registered indices with the engine and list corrective actions.
    ///
    /// Nothing is changed; run [`IndexAlter::apply`] to act on an alter.
    /// Pools on a non-zero database or without the search module report
    /// nothing.
    #[instrument(skip(self), fields(pool = %self.config.pool))]
    pub async fn get_alters(&self) -> Result<Vec<IndexAlter>, SearchError> {
        let pool = self.config.pool.as_str();
        if self.backend.database() > 0 {
            debug!(database = self.backend.database(), "Skipping drift check on non-zero database");
            return Ok(Vec::new());
        }

        let modules = self
            .backend
            .execute(&["INFO".to_string(), "modules".to_string()])
            .await?
            .to_text()
            .unwrap_or_default();
        let Some(module) = search_module(&modules) else {
            debug!("Search module not loaded, skipping drift check");
            return Ok(Vec::new());
        };
        let ctx = DiffContext {
            namespace: self.config.namespace.clone(),
            module_version: module.version,
        };

        let mut alters = Vec::new();
        let mut live = BTreeSet::new();

        for name in self.list_indices().await? {
            let info = self.info(&name).await?;
            let documents = info.as_ref().map_or(0, |i| i.num_docs);

            let Some(registered) = self.registry.index(pool, &name) else {
                alters.push(IndexAlter::drop_orphan(pool, &name, documents));
                continue;
            };
            live.insert(name.clone());

            let Some(info) = info else { continue };
            let changes = diff_index(&registered.definition, &info, &ctx);
            if !changes.is_empty() {
                debug!(index = %name, ?changes, "Index drifted");
                alters.push(IndexAlter::recreate(
                    &registered.definition,
                    &self.config.namespace,
                    documents,
                    changes,
                    AlterAction::Reindex,
                )?);
            }
        }

        for registered in self.registry.indices_for_pool(pool) {
            if !live.contains(&registered.definition.name) {
                alters.push(IndexAlter::recreate(
                    &registered.definition,
                    &self.config.namespace,
                    0,
                    vec!["new index".to_string()],
                    AlterAction::Create,
                )?);
            }
        }

        for action in [AlterAction::Create, AlterAction::Reindex, AlterAction::Drop] {
            let count = alters.iter().filter(|a| a.action == action).count();
            if count > 0 {
                metrics::record_alters_detected(pool, &format!("{:?}", action).to_lowercase(), count);
            }
        }
        info!(alters = alters.len(), "Drift check finished");
        Ok(alters)
    }

    /// Registered indices present in the engine, with their live statistics.
    pub async fn get_statistics(&self) -> Result<Vec<IndexStatistics>, SearchError> {
        let mut stats = Vec::new();
        for name in self.list_indices().await? {
            let Some(registered) = self.registry.index(&self.config.pool, &name) else {
                continue;
            };
            if let Some(info) = self.info(&name).await? {
                stats.push(IndexStatistics {
                    definition: registered.definition,
                    info,
                });
            }
        }
        Ok(stats)
    }
}
