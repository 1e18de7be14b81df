// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Reply interpretation for `FT.SEARCH` and `FT.AGGREGATE`.
//!
//! Both replies start with a total count followed by per-document (or
//! per-row) payloads:
//!
//! ```text
//! FT.SEARCH   [total, key, (score | [score, explain])?, [f1, v1, ...]?, key, ...]
//! FT.AGGREGATE [total, [f1, v1, ...], [f1, v1, ...], ...]
//! ```

use std::collections::HashMap;

use super::{remove_namespace, unescape};
use crate::storage::traits::{Reply, SearchError};

/// Which optional elements follow each key in a search reply.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplyLayout {
    pub no_content: bool,
    pub with_scores: bool,
    pub explain_score: bool,
}

/// One document of a search reply
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResultRow {
    /// Document key with the pool namespace removed
    pub key: String,
    pub score: f64,
    pub explain: Option<Reply>,
    /// Raw `(field, value)` pairs as stored in the engine
    pub fields: Vec<(String, String)>,
}

impl SearchResultRow {
    /// Unescaped value of a returned field.
    pub fn value(&self, field: &str) -> Option<String> {
        self.fields
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, value)| unescape(value))
    }
}

fn protocol(msg: &str) -> SearchError {
    SearchError::Protocol(format!("unexpected reply: {}", msg))
}

fn total_of(items: &[Reply]) -> Result<u64, SearchError> {
    items
        .first()
        .and_then(Reply::as_i64)
        .map(|v| v.max(0) as u64)
        .ok_or_else(|| protocol("missing total count"))
}

fn pairs(reply: &Reply) -> Vec<(String, String)> {
    let Some(items) = reply.as_array() else {
        return Vec::new();
    };
    items
        .chunks(2)
        .filter_map(|chunk| match chunk {
            [name, value] => {
                let name = name.to_text()?;
                let value = match value {
                    Reply::Array(list) => list.iter().filter_map(Reply::to_text).collect::<Vec<_>>().join(","),
                    Reply::Nil => String::new(),
                    other => other.to_text()?,
                };
                Some((name, value))
            }
            _ => None,
        })
        .collect()
}

/// Parse an `FT.SEARCH` reply into the total and its documents.
pub fn parse_search_reply(
    reply: &Reply,
    layout: ReplyLayout,
    namespace: &str,
) -> Result<(u64, Vec<SearchResultRow>), SearchError> {
    let items = reply.as_array().ok_or_else(|| protocol("search reply is not an array"))?;
    let total = total_of(items)?;

    let mut rows = Vec::new();
    let mut rest = items[1..].iter();
    while let Some(key) = rest.next() {
        let key = key.to_text().ok_or_else(|| protocol("document key is not a string"))?;
        let mut row = SearchResultRow {
            key: remove_namespace(namespace, &key).to_string(),
            score: 0.0,
            explain: None,
            fields: Vec::new(),
        };

        if layout.explain_score {
            let scored = rest.next().ok_or_else(|| protocol("missing explained score"))?;
            let parts = scored.as_array().unwrap_or_default();
            row.score = parts.first().and_then(Reply::as_f64).unwrap_or_default();
            row.explain = parts.get(1).cloned();
        } else if layout.with_scores {
            row.score = rest
                .next()
                .and_then(Reply::as_f64)
                .ok_or_else(|| protocol("missing score"))?;
        }

        if !layout.no_content {
            let fields = rest.next().ok_or_else(|| protocol("missing document fields"))?;
            row.fields = pairs(fields);
        }

        rows.push(row);
    }

    Ok((total, rows))
}

/// Parse an `FT.AGGREGATE` reply.
///
/// List values are joined with `,`. A non-zero total with no rows while
/// rows were requested means the engine timed out.
pub fn parse_aggregate_reply(
    reply: &Reply,
    rows_requested: bool,
) -> Result<(u64, Vec<HashMap<String, String>>), SearchError> {
    let items = reply.as_array().ok_or_else(|| protocol("aggregate reply is not an array"))?;
    let total = total_of(items)?;

    if rows_requested && total > 0 && items.len() == 1 {
        return Err(SearchError::Protocol("redisearch aggregate timeout".to_string()));
    }

    let rows = items[1..]
        .iter()
        .map(|row| pairs(row).into_iter().collect())
        .collect();
    Ok((total, rows))
}
