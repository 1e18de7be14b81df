// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::info;

use super::{CompiledSchema, RecordDescriptor, SchemaCompiler};
use crate::reindex::{Indexer, SchemaIndexer};
use crate::search::IndexDefinition;
use crate::storage::traits::{RecordSource, SearchError};

/// An index known to one pool, with the indexer that refills it.
#[derive(Clone)]
pub struct RegisteredIndex {
    pub definition: Arc<IndexDefinition>,
    /// `None` means a reindex only recreates the empty index
    pub indexer: Option<Arc<dyn Indexer>>,
}

impl std::fmt::Debug for RegisteredIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredIndex")
            .field("definition", &self.definition.name)
            .field("indexer", &self.indexer.is_some())
            .finish()
    }
}

/// Process-wide catalogue of pools, compiled schemas and indices.
///
/// Shared by every pool's [`SearchEngine`](crate::coordinator::SearchEngine).
pub struct SearchRegistry {
    compiler: SchemaCompiler,
    pools: RwLock<BTreeSet<String>>,
    /// Compiled under the lock so each record type compiles exactly once
    schemas: Mutex<HashMap<String, Arc<CompiledSchema>>>,
    /// pool → index name → index
    indices: RwLock<HashMap<String, BTreeMap<String, RegisteredIndex>>>,
}

impl Default for SearchRegistry {
    fn default() -> Self {
        Self::new(SchemaCompiler::default())
    }
}

impl SearchRegistry {
    pub fn new(compiler: SchemaCompiler) -> Self {
        Self {
            compiler,
            pools: RwLock::new(BTreeSet::new()),
            schemas: Mutex::new(HashMap::new()),
            indices: RwLock::new(HashMap::new()),
        }
    }

    pub fn register_pool(&self, pool: impl Into<String>) {
        self.pools.write().insert(pool.into());
    }

    pub fn has_pool(&self, pool: &str) -> bool {
        self.pools.read().contains(pool)
    }

    /// Compile a record type and register its index.
    ///
    /// Later calls for the same record name return the cached schema.
    pub fn register_record_type(
        &self,
        record: &RecordDescriptor,
        source: Option<Arc<dyn RecordSource>>,
    ) -> Result<Arc<CompiledSchema>, SearchError> {
        let mut schemas = self.schemas.lock();
        if let Some(schema) = schemas.get(&record.name) {
            return Ok(Arc::clone(schema));
        }

        let pools = self.pools.read().clone();
        let schema = Arc::new(self.compiler.compile(record, &pools)?);
        schemas.insert(record.name.clone(), Arc::clone(&schema));

        let indexer = source.map(|source| Arc::new(SchemaIndexer::new(Arc::clone(&schema), source)) as Arc<dyn Indexer>);
        self.insert_index(Arc::new(schema.definition.clone()), indexer);

        info!(record = %record.name, pool = %schema.pool, "Registered searchable record type");
        Ok(schema)
    }

    /// Register an index not derived from a record type.
    pub fn register_custom_index(
        &self,
        definition: IndexDefinition,
        indexer: Option<Arc<dyn Indexer>>,
    ) -> Result<(), SearchError> {
        if !self.has_pool(&definition.pool) {
            return Err(SearchError::Config(format!("pool '{}' not found", definition.pool)));
        }
        if definition.prefixes.is_empty() {
            return Err(SearchError::Config(format!(
                "missing redis search prefix in index {}",
                definition.name
            )));
        }
        info!(index = %definition.name, pool = %definition.pool, "Registered custom search index");
        self.insert_index(Arc::new(definition), indexer);
        Ok(())
    }

    fn insert_index(&self, definition: Arc<IndexDefinition>, indexer: Option<Arc<dyn Indexer>>) {
        let mut indices = self.indices.write();
        indices
            .entry(definition.pool.clone())
            .or_default()
            .insert(definition.name.clone(), RegisteredIndex { definition, indexer });
    }

    pub fn schema(&self, record: &str) -> Option<Arc<CompiledSchema>> {
        self.schemas.lock().get(record).cloned()
    }

    pub fn index(&self, pool: &str, name: &str) -> Option<RegisteredIndex> {
        self.indices.read().get(pool).and_then(|m| m.get(name)).cloned()
    }

    /// Indices registered for a pool, sorted by name.
    pub fn indices_for_pool(&self, pool: &str) -> Vec<RegisteredIndex> {
        self.indices
            .read()
            .get(pool)
            .map(|m| m.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Forget every schema and index; pools stay registered.
    pub fn clear(&self) {
        self.schemas.lock().clear();
        self.indices.write().clear();
    }
}
