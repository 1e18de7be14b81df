// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Search API for SearchEngine
//!
//! Index-level calls take an index name and a [`SearchQuery`]; record-level
//! calls take a record type name and add that record's soft-delete
//! suppression and field validation.
//!
//! ```text
//! search_*(index, query, pager)
//!       │
//!       ├─→ validate against the registered definition (if any)
//!       ├─→ QueryCompiler::search_args   (pager mandatory, size capped)
//!       ├─→ FT.SEARCH
//!       └─→ parse_search_reply           (layout from NOCONTENT/WITHSCORES/EXPLAINSCORE)
//! ```

use std::collections::HashMap;

use tracing::{debug, instrument};

use crate::metrics;
use crate::search::{
    parse_aggregate_reply, parse_search_reply, Aggregation, Pager, QueryCompiler, ReplyLayout, SearchQuery,
    SearchResultRow,
};
use crate::storage::traits::{Reply, SearchError};

use super::SearchEngine;

impl SearchEngine {
    // ═══════════════════════════════════════════════════════════════════════════
    // Search API: index level
    // ═══════════════════════════════════════════════════════════════════════════

    /// Raw search: the total and the reply elements after it, uninterpreted.
    pub async fn search_raw(
        &self,
        index: &str,
        query: &SearchQuery,
        pager: Option<&Pager>,
    ) -> Result<(u64, Vec<Reply>), SearchError> {
        let reply = self.run_search(index, query, pager, false).await?;
        let items = match reply {
            Reply::Array(items) => items,
            other => {
                return Err(SearchError::Protocol(format!("unexpected reply: {:?}", other)));
            }
        };
        let mut items = items.into_iter();
        let total = items
            .next()
            .and_then(|r| r.as_i64())
            .map(|v| v.max(0) as u64)
            .ok_or_else(|| SearchError::Protocol("unexpected reply: missing total count".to_string()))?;
        Ok((total, items.collect()))
    }

    /// Number of matching documents.
    pub async fn search_count(&self, index: &str, query: &SearchQuery) -> Result<u64, SearchError> {
        let reply = self.run_search(index, query, Some(&Pager::new(0, 0)), true).await?;
        let (total, _) = parse_search_reply(&reply, ReplyLayout { no_content: true, ..Default::default() }, "")?;
        Ok(total)
    }

    /// Documents with their fields, scores and explanations.
    pub async fn search_result(
        &self,
        index: &str,
        query: &SearchQuery,
        pager: Option<&Pager>,
    ) -> Result<(u64, Vec<SearchResultRow>), SearchError> {
        let reply = self.run_search(index, query, pager, false).await?;
        let layout = ReplyLayout {
            no_content: false,
            with_scores: query.with_scores,
            explain_score: query.explain_score,
        };
        let (total, rows) = parse_search_reply(&reply, layout, &self.config.namespace)?;
        metrics::record_search_results(index, rows.len());
        Ok((total, rows))
    }

    /// Matching document keys, namespace removed.
    pub async fn search_keys(
        &self,
        index: &str,
        query: &SearchQuery,
        pager: Option<&Pager>,
    ) -> Result<(u64, Vec<String>), SearchError> {
        let reply = self.run_search(index, query, pager, true).await?;
        let layout = ReplyLayout {
            no_content: true,
            with_scores: query.with_scores,
            explain_score: query.explain_score,
        };
        let (total, rows) = parse_search_reply(&reply, layout, &self.config.namespace)?;
        metrics::record_search_results(index, rows.len());
        Ok((total, rows.into_iter().map(|row| row.key).collect()))
    }

    /// Run an aggregation pipeline.
    #[instrument(skip(self, aggregation, pager), fields(pool = %self.config.pool))]
    pub async fn aggregate(
        &self,
        index: &str,
        aggregation: &Aggregation,
        pager: Option<&Pager>,
    ) -> Result<(u64, Vec<HashMap<String, String>>), SearchError> {
        self.validate_for_index(index, aggregation.query())?;
        let args = self.compiler.aggregate_args(index, aggregation, pager)?;
        debug!(query = %args[2], "FT.AGGREGATE");

        let reply = self.backend.execute(&args).await?;
        let rows_requested = pager.is_some_and(|p| p.page_size > 0);
        let (total, rows) = parse_aggregate_reply(&reply, rows_requested)?;
        metrics::record_search_results(index, rows.len());
        Ok((total, rows))
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Search API: record level
    // ═══════════════════════════════════════════════════════════════════════════

    /// Ids of matching records.
    ///
    /// Soft-deleted rows are excluded unless the query opts in; keys that
    /// do not belong to the record type are skipped.
    pub async fn search_ids(
        &self,
        record: &str,
        query: &SearchQuery,
        pager: Option<&Pager>,
    ) -> Result<(u64, Vec<u64>), SearchError> {
        let schema = self.record_schema(record)?;
        let mut query = query.clone();
        schema.prepare_query(&mut query);
        schema.validate_query(&query)?;

        let (total, keys) = self.search_keys(&schema.definition.name, &query, pager).await?;
        let ids = keys.iter().filter_map(|key| schema.id_from_key(key)).collect();
        Ok((total, ids))
    }

    /// Number of matching records.
    pub async fn search_record_count(&self, record: &str, query: &SearchQuery) -> Result<u64, SearchError> {
        let schema = self.record_schema(record)?;
        let mut query = query.clone();
        schema.prepare_query(&mut query);
        schema.validate_query(&query)?;
        self.search_count(&schema.definition.name, &query).await
    }

    /// Aggregate over a record type's index.
    pub async fn aggregate_records(
        &self,
        record: &str,
        aggregation: &Aggregation,
        pager: Option<&Pager>,
    ) -> Result<(u64, Vec<HashMap<String, String>>), SearchError> {
        let schema = self.record_schema(record)?;
        let mut aggregation = aggregation.clone();
        schema.prepare_query(aggregation.query_mut());
        schema.validate_query(aggregation.query())?;
        self.aggregate(&schema.definition.name, &aggregation, pager).await
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Internal helpers
    // ═══════════════════════════════════════════════════════════════════════════

    /// Filters on a registered index must match its definition.
    fn validate_for_index(&self, index: &str, query: &SearchQuery) -> Result<(), SearchError> {
        match self.registry.index(&self.config.pool, index) {
            Some(registered) => QueryCompiler::validate(query, &registered.definition),
            None => Ok(()),
        }
    }

    #[instrument(skip(self, query, pager), fields(pool = %self.config.pool))]
    async fn run_search(
        &self,
        index: &str,
        query: &SearchQuery,
        pager: Option<&Pager>,
        no_content: bool,
    ) -> Result<Reply, SearchError> {
        self.validate_for_index(index, query)?;
        let args = self.compiler.search_args(index, query, pager, no_content)?;
        debug!(query = %args[2], "FT.SEARCH");
        self.backend.execute(&args).await
    }
}
