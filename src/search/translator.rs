// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! RediSearch Translator
//!
//! Compiles [`SearchQuery`] and [`Aggregation`] into `FT.SEARCH` /
//! `FT.AGGREGATE` argument lists.
//!
//! # Query String Order
//!
//! ```text
//! free text
//! @f:[min max]|@f:[min max] @g:[..]     - numeric, OR within a field
//! @f:{ a | b }                          - tag groups
//! @f:( "a" | "b" )                      - string groups
//! (@f:[-inf (v] | @f:[(v +inf])         - negated numeric
//! -@f:{ a }                             - negated tags
//! -@f:( a )                             - negated strings
//! -@FakeDelete:{true}                   - soft-delete suppression
//! ```
//!
//! An empty query string becomes `*`. Fields are visited in sorted order,
//! so compiling the same query twice yields identical arguments.

use super::aggregate::Aggregation;
use super::index::{FieldKind, IndexDefinition};
use super::query::{Pager, SearchQuery};
use super::add_namespace;
use crate::storage::traits::SearchError;

/// Settings that do not belong to a single request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileOptions {
    /// Pool namespace prepended to index names and keys
    pub namespace: String,
    /// Largest accepted page size
    pub max_page_size: u32,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            namespace: String::new(),
            max_page_size: 10_000,
        }
    }
}

/// Search / aggregate command compiler
#[derive(Debug, Clone, Default)]
pub struct QueryCompiler {
    options: CompileOptions,
}

impl QueryCompiler {
    pub fn new(options: CompileOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &CompileOptions {
        &self.options
    }

    /// Build the query-string argument.
    pub fn build_query_string(query: &SearchQuery) -> String {
        let mut q = query.query.clone();

        for (field, ranges) in &query.numeric {
            if !q.is_empty() {
                q.push(' ');
            }
            let alternatives: Vec<String> = ranges
                .iter()
                .map(|(min, max)| format!("@{}:[{} {}]", field, min, max))
                .collect();
            q.push_str(&alternatives.join("|"));
        }

        push_groups(&mut q, &query.tags, "", '{', '}');
        push_groups(&mut q, &query.strings, "", '(', ')');

        for (field, values) in &query.not_numeric {
            if !q.is_empty() {
                q.push(' ');
            }
            let excluded: Vec<String> = values
                .iter()
                .map(|v| format!("(@{f}:[-inf ({v}] | @{f}:[({v} +inf])", f = field, v = v))
                .collect();
            q.push_str(&excluded.join(" "));
        }

        push_groups(&mut q, &query.not_tags, "-", '{', '}');
        push_groups(&mut q, &query.not_strings, "-", '(', ')');

        if let Some(marker) = &query.soft_delete_field {
            if !query.with_soft_deleted {
                if !q.is_empty() {
                    q.push(' ');
                }
                q.push_str(&format!("-@{}:{{true}}", marker));
            }
        }

        if q.is_empty() {
            q.push('*');
        }
        q
    }

    fn limit_args(&self, pager: Option<&Pager>, args: &mut Vec<String>) -> Result<(), SearchError> {
        let pager =
            pager.ok_or_else(|| SearchError::Validation("missing pager in redis search query".to_string()))?;
        if pager.page_size > self.options.max_page_size {
            return Err(SearchError::Validation(format!(
                "pager size exceeded limit {}",
                self.options.max_page_size
            )));
        }
        args.push("LIMIT".to_string());
        args.push(pager.offset().to_string());
        args.push(pager.page_size.to_string());
        Ok(())
    }

    /// Full `FT.SEARCH` command.
    pub fn search_args(
        &self,
        index: &str,
        query: &SearchQuery,
        pager: Option<&Pager>,
        no_content: bool,
    ) -> Result<Vec<String>, SearchError> {
        if let Some(err) = &query.deferred_error {
            return Err(err.clone());
        }

        let mut args = vec![
            "FT.SEARCH".to_string(),
            add_namespace(&self.options.namespace, index),
            Self::build_query_string(query),
        ];

        if no_content {
            args.push("NOCONTENT".to_string());
        }
        if query.verbatim {
            args.push("VERBATIM".to_string());
        }
        if query.no_stop_words {
            args.push("NOSTOPWORDS".to_string());
        }
        if query.with_scores {
            args.push("WITHSCORES".to_string());
        }
        if let Some((field, desc)) = &query.sort {
            args.push("SORTBY".to_string());
            args.push(field.clone());
            if *desc {
                args.push("DESC".to_string());
            }
        }
        if !query.in_keys.is_empty() {
            args.push("INKEYS".to_string());
            args.push(query.in_keys.len().to_string());
            args.extend(
                query
                    .in_keys
                    .iter()
                    .map(|k| add_namespace(&self.options.namespace, k)),
            );
        }
        if !query.in_fields.is_empty() {
            args.push("INFIELDS".to_string());
            args.push(query.in_fields.len().to_string());
            args.extend(query.in_fields.iter().cloned());
        }
        if !query.return_fields.is_empty() {
            args.push("RETURN".to_string());
            args.push(query.return_fields.len().to_string());
            args.extend(query.return_fields.iter().cloned());
        }
        if let Some(slop) = query.slop {
            args.push("SLOP".to_string());
            args.push(slop.to_string());
        }
        if query.in_order {
            args.push("INORDER".to_string());
        }
        if let Some(lang) = &query.lang {
            args.push("LANGUAGE".to_string());
            args.push(lang.clone());
        }
        if query.explain_score {
            args.push("EXPLAINSCORE".to_string());
        }
        if let Some(fields) = &query.highlight {
            args.push("HIGHLIGHT".to_string());
            if !fields.is_empty() {
                args.push("FIELDS".to_string());
                args.push(fields.len().to_string());
                args.extend(fields.iter().cloned());
            }
            if let Some((open, close)) = &query.highlight_tags {
                if !open.is_empty() && !close.is_empty() {
                    args.push("TAGS".to_string());
                    args.push(open.clone());
                    args.push(close.clone());
                }
            }
        }
        if let Some(fields) = &query.summarize {
            args.push("SUMMARIZE".to_string());
            if !fields.is_empty() {
                args.push("FIELDS".to_string());
                args.push(fields.len().to_string());
                args.extend(fields.iter().cloned());
            }
            if query.summarize_frags > 0 {
                args.push("FRAGS".to_string());
                args.push(query.summarize_frags.to_string());
            }
            if query.summarize_len > 0 {
                args.push("LEN".to_string());
                args.push(query.summarize_len.to_string());
            }
            if !query.summarize_separator.is_empty() {
                args.push("SEPARATOR".to_string());
                args.push(query.summarize_separator.clone());
            }
        }
        for (field, geo) in &query.geo {
            args.push("GEOFILTER".to_string());
            args.push(field.clone());
            args.push(geo.lon.to_string());
            args.push(geo.lat.to_string());
            args.push(geo.radius.to_string());
            args.push(geo.unit.to_string());
        }

        self.limit_args(pager, &mut args)?;
        Ok(args)
    }

    /// Full `FT.AGGREGATE` command.
    pub fn aggregate_args(
        &self,
        index: &str,
        aggregation: &Aggregation,
        pager: Option<&Pager>,
    ) -> Result<Vec<String>, SearchError> {
        let query = aggregation.query();
        if let Some(err) = &query.deferred_error {
            return Err(err.clone());
        }
        if !query.geo.is_empty() {
            return Err(SearchError::Validation(
                "geo filter is not supported in aggregations".to_string(),
            ));
        }

        let mut args = vec![
            "FT.AGGREGATE".to_string(),
            add_namespace(&self.options.namespace, index),
            Self::build_query_string(query),
        ];
        args.extend(aggregation.step_args());
        self.limit_args(pager, &mut args)?;
        Ok(args)
    }

    /// Check every filtered field against the index definition.
    pub fn validate(query: &SearchQuery, definition: &IndexDefinition) -> Result<(), SearchError> {
        Self::validate_fields(query, definition, |name| definition.get_field(name).is_some())
    }

    /// Like [`validate`](Self::validate), with `is_known` telling unknown
    /// fields apart from known fields that are not indexed.
    pub fn validate_fields<F>(query: &SearchQuery, definition: &IndexDefinition, is_known: F) -> Result<(), SearchError>
    where
        F: Fn(&str) -> bool,
    {
        let groups = [
            ("string", FieldKind::Text, query.strings.keys().chain(query.not_strings.keys()).collect::<Vec<_>>()),
            ("numeric", FieldKind::Numeric, query.numeric.keys().chain(query.not_numeric.keys()).collect()),
            ("tag", FieldKind::Tag, query.tags.keys().chain(query.not_tags.keys()).collect()),
            ("geo", FieldKind::Geo, query.geo.keys().collect()),
        ];

        for (label, expected, fields) in groups {
            for name in fields {
                if !is_known(name) {
                    return Err(SearchError::Validation(format!("unknown field {}", name)));
                }
                match definition.get_field(name) {
                    Some(field) if field.kind == expected => {}
                    Some(field) => {
                        return Err(SearchError::Validation(format!(
                            "{} filter on fields {} with type {} not allowed",
                            label, name, field.kind
                        )))
                    }
                    None => {
                        return Err(SearchError::Validation(format!(
                            "missing searchable tag for field {}",
                            name
                        )))
                    }
                }
            }
        }
        Ok(())
    }
}

fn push_groups(
    q: &mut String,
    groups: &std::collections::BTreeMap<String, Vec<Vec<String>>>,
    sign: &str,
    open: char,
    close: char,
) {
    for (field, values) in groups {
        for group in values {
            if !q.is_empty() {
                q.push(' ');
            }
            q.push_str(&format!("{}@{}:{} {} {}", sign, field, open, group.join(" | "), close));
        }
    }
}
