// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Public types for the search engine coordinator.

use std::sync::Arc;

use crate::search::{IndexDefinition, IndexInfo};

/// A registered index together with its live `FT.INFO` statistics.
///
/// Returned by [`super::SearchEngine::get_statistics()`] for every index
/// that is both registered and present in the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexStatistics {
    /// Desired definition
    pub definition: Arc<IndexDefinition>,
    /// Live state reported by the engine
    pub info: IndexInfo,
}

impl IndexStatistics {
    /// Documents currently indexed
    #[must_use]
    pub fn documents(&self) -> u64 {
        self.info.num_docs
    }

    /// True while the engine is still scanning keys
    #[must_use]
    pub fn is_indexing(&self) -> bool {
        self.info.indexing
    }
}
