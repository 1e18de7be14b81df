// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! `FT.INFO` interpretation.
//!
//! The reply is a flat alternating key/value list. Older engines describe
//! fields under `fields` (name first), newer ones under `attributes`
//! (`identifier` key). Numeric statistics may arrive as doubles or as
//! strings and are skipped when NaN.

use super::index::FieldKind;
use super::remove_namespace;
use crate::storage::traits::Reply;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InfoOptions {
    pub no_freqs: bool,
    pub no_offsets: bool,
    pub no_fields: bool,
    pub max_text_fields: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct InfoDefinition {
    pub key_type: String,
    pub prefixes: Vec<String>,
    pub language_field: String,
    pub score_field: String,
    pub default_score: f64,
}

/// Live field as reported by the engine
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InfoField {
    pub name: String,
    /// `None` when the engine reports a type this crate does not model
    pub kind: Option<FieldKind>,
    pub weight: f64,
    pub sortable: bool,
    pub no_stem: bool,
    pub no_index: bool,
    pub tag_separator: String,
}

/// Live index description and statistics
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndexInfo {
    pub name: String,
    pub options: InfoOptions,
    pub definition: InfoDefinition,
    pub fields: Vec<InfoField>,
    pub num_docs: u64,
    pub max_doc_id: u64,
    pub num_terms: u64,
    pub num_records: u64,
    pub inverted_sz_mb: f64,
    pub total_inverted_index_blocks: f64,
    pub offset_vectors_sz_mb: f64,
    pub doc_table_size_mb: f64,
    pub sortable_values_size_mb: f64,
    pub key_table_size_mb: f64,
    pub records_per_doc_avg: i64,
    pub bytes_per_record_avg: i64,
    pub offsets_per_term_avg: f64,
    pub offset_bits_per_record_avg: f64,
    pub hash_indexing_failures: u64,
    pub indexing: bool,
    pub percent_indexed: f64,
    pub stop_words: Vec<String>,
}

fn number(value: &Reply) -> Option<f64> {
    value.as_f64().filter(|v| !v.is_nan())
}

fn strings(value: &Reply) -> Vec<String> {
    value
        .as_array()
        .map(|items| items.iter().filter_map(Reply::to_text).collect())
        .unwrap_or_default()
}

fn key_values(items: &[Reply]) -> impl Iterator<Item = (&str, Option<&Reply>)> {
    items
        .iter()
        .enumerate()
        .filter_map(move |(i, item)| item.as_str().map(|key| (key, items.get(i + 1))))
}

/// Walks `key [value] key …`; only the valued keys consume the next item,
/// so a field literally named `SORTABLE` is not read as a flag.
fn parse_field(attrs: &[Reply], name: Option<String>) -> InfoField {
    let mut field = InfoField {
        name: name.unwrap_or_default(),
        ..Default::default()
    };
    let mut items = attrs.iter();
    while let Some(item) = items.next() {
        let Some(key) = item.as_str() else { continue };
        match key {
            "identifier" => field.name = items.next().and_then(Reply::to_text).unwrap_or_default(),
            "attribute" => {
                items.next();
            }
            "type" => field.kind = items.next().and_then(Reply::as_str).and_then(FieldKind::parse),
            "WEIGHT" => field.weight = items.next().and_then(number).unwrap_or_default(),
            "SEPARATOR" => field.tag_separator = items.next().and_then(Reply::to_text).unwrap_or_default(),
            "SORTABLE" => field.sortable = true,
            "NOSTEM" => field.no_stem = true,
            "NOINDEX" => field.no_index = true,
            _ => {}
        }
    }
    field
}

impl IndexInfo {
    /// Build from an `FT.INFO` reply, stripping `namespace` from the name.
    pub fn from_reply(reply: &Reply, namespace: &str) -> Self {
        let mut info = IndexInfo::default();
        let Some(items) = reply.as_array() else {
            return info;
        };

        for (key, value) in key_values(items) {
            let Some(value) = value else { continue };
            match key {
                "index_name" => {
                    info.name = value
                        .to_text()
                        .map(|name| remove_namespace(namespace, &name).to_string())
                        .unwrap_or_default();
                }
                "index_options" => {
                    for option in strings(value) {
                        match option.as_str() {
                            "NOFREQS" => info.options.no_freqs = true,
                            "NOFIELDS" => info.options.no_fields = true,
                            "NOOFFSETS" => info.options.no_offsets = true,
                            "MAXTEXTFIELDS" => info.options.max_text_fields = true,
                            _ => {}
                        }
                    }
                }
                "index_definition" => {
                    let def = value.as_array().unwrap_or_default();
                    for (sub, sub_value) in key_values(def) {
                        let Some(sub_value) = sub_value else { continue };
                        match sub {
                            "key_type" => info.definition.key_type = sub_value.to_text().unwrap_or_default(),
                            "prefixes" => info.definition.prefixes = strings(sub_value),
                            "language_field" => {
                                info.definition.language_field = sub_value.to_text().unwrap_or_default()
                            }
                            "default_score" => info.definition.default_score = number(sub_value).unwrap_or_default(),
                            "score_field" => info.definition.score_field = sub_value.to_text().unwrap_or_default(),
                            _ => {}
                        }
                    }
                }
                "fields" => {
                    info.fields = value
                        .as_array()
                        .unwrap_or_default()
                        .iter()
                        .filter_map(Reply::as_array)
                        .filter_map(|def| {
                            let (name, attrs) = def.split_first()?;
                            Some(parse_field(attrs, name.to_text()))
                        })
                        .collect();
                }
                "attributes" => {
                    info.fields = value
                        .as_array()
                        .unwrap_or_default()
                        .iter()
                        .filter_map(Reply::as_array)
                        .map(|def| parse_field(def, None))
                        .collect();
                }
                "num_docs" => info.num_docs = number(value).map_or(0, |v| v as u64),
                "max_doc_id" => info.max_doc_id = number(value).map_or(0, |v| v as u64),
                "num_terms" => info.num_terms = number(value).map_or(0, |v| v as u64),
                "num_records" => info.num_records = number(value).map_or(0, |v| v as u64),
                "inverted_sz_mb" => info.inverted_sz_mb = number(value).unwrap_or_default(),
                "total_inverted_index_blocks" => {
                    info.total_inverted_index_blocks = number(value).unwrap_or_default()
                }
                "offset_vectors_sz_mb" => info.offset_vectors_sz_mb = number(value).unwrap_or_default(),
                "doc_table_size_mb" => info.doc_table_size_mb = number(value).unwrap_or_default(),
                "sortable_values_size_mb" => info.sortable_values_size_mb = number(value).unwrap_or_default(),
                "key_table_size_mb" => info.key_table_size_mb = number(value).unwrap_or_default(),
                "records_per_doc_avg" => info.records_per_doc_avg = number(value).map_or(0, |v| v as i64),
                "bytes_per_record_avg" => info.bytes_per_record_avg = number(value).map_or(0, |v| v as i64),
                "offsets_per_term_avg" => info.offsets_per_term_avg = number(value).unwrap_or_default(),
                "offset_bits_per_record_avg" => {
                    info.offset_bits_per_record_avg = number(value).unwrap_or_default()
                }
                "hash_indexing_failures" => {
                    info.hash_indexing_failures = number(value).map_or(0, |v| v as u64)
                }
                "indexing" => info.indexing = value.to_text().as_deref() == Some("1"),
                "percent_indexed" => info.percent_indexed = number(value).unwrap_or_default(),
                "stopwords_list" => info.stop_words = strings(value),
                _ => {}
            }
        }

        info
    }
}
