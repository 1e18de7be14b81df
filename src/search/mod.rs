// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Search Infrastructure
//!
//! Pure compilers from typed requests to RediSearch command arguments, plus
//! the reply parsers and the schema drift detector.
//!
//! # Architecture
//!
//! ```text
//! IndexDefinition ──→ FT.CREATE args
//! SearchQuery ─────→ QueryCompiler ─────→ FT.SEARCH args
//! Aggregation ─────→ QueryCompiler ─────→ FT.AGGREGATE args
//! FT.INFO reply ───→ IndexInfo ──┐
//! IndexDefinition ───────────────┴──→ diff_index → change reasons
//! ```
//!
//! # Query Language
//!
//! ```text
//! @Int:[3 6]                       - Numeric range, closed
//! @Int:[(3 +inf]                   - Numeric range, open lower bound
//! @Int:[1 1]|@Int:[4 4]            - Same-field alternatives
//! @Tag:{ a | b }                   - Tag membership (OR)
//! @Name:( "exact phrase" )         - Text match
//! (@Int:[-inf (3] | @Int:[(3 +inf]) - Numeric "not equal"
//! -@Tag:{ a }                      - Negation
//! ```
//!
//! Every user literal passes through [`escape`] before it reaches a query.

mod aggregate;
mod diff;
mod index;
mod info;
mod query;
mod result;
mod translator;

pub use aggregate::{AggregateStep, Aggregation, LoadFields, Reducer, SortKey};
pub use diff::{diff_index, search_module, AlterAction, DiffContext, IndexAlter, SearchModule};
pub use index::{FieldKind, FieldSpec, IndexDefinition};
pub use info::{IndexInfo, InfoDefinition, InfoField, InfoOptions};
pub use query::{GeoFilter, GeoUnit, Pager, SearchQuery};
pub use result::{parse_aggregate_reply, parse_search_reply, ReplyLayout, SearchResultRow};
pub use translator::{CompileOptions, QueryCompiler};

/// Characters with meaning in the query grammar.
const SPECIAL_CHARS: &[char] = &[
    ',', '.', '<', '>', '{', '}', '[', ']', '"', '\'', ':', ';', '!', '@', '#', '$', '%', '^', '&', '*', '(',
    ')', '-', '+', '=', '~', '|', '/', '\\', ' ',
];

/// Backslash-escape every grammar character, spaces included.
pub fn escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if SPECIAL_CHARS.contains(&c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Inverse of [`escape`].
pub fn unescape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(&next) = chars.peek() {
                if SPECIAL_CHARS.contains(&next) {
                    out.push(next);
                    chars.next();
                    continue;
                }
            }
        }
        out.push(c);
    }
    out
}

/// Prepend the pool namespace (`ns:`) to a key or index name.
pub(crate) fn add_namespace(namespace: &str, key: &str) -> String {
    if namespace.is_empty() {
        key.to_string()
    } else {
        format!("{}:{}", namespace, key)
    }
}

/// Strip the pool namespace, leaving foreign keys untouched.
pub(crate) fn remove_namespace<'a>(namespace: &str, key: &'a str) -> &'a str {
    if namespace.is_empty() {
        return key;
    }
    key.strip_prefix(namespace)
        .and_then(|rest| rest.strip_prefix(':'))
        .unwrap_or(key)
}
