// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Index definitions.
//!
//! Declarative description of one RediSearch index over HASH documents.
//!
//! # RediSearch Index Creation
//!
//! ```text
//! FT.CREATE users
//!   ON HASH
//!   PREFIX 1 3f2a1:
//!   NOOFFSETS NOHL NOFREQS SKIPINITIALSCAN
//!   STOPWORDS 0
//!   SCHEMA
//!     Name TEXT NOSTEM SORTABLE
//!     Age NUMERIC SORTABLE
//!     Roles TAG SEPARATOR ,
//! ```

use serde::{Deserialize, Serialize};

use super::add_namespace;
use crate::storage::traits::SearchError;

/// Search field definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    /// Field name (hash field and query attribute)
    pub name: String,
    /// Field type
    pub kind: FieldKind,
    /// Whether the field is sortable
    pub sortable: bool,
    /// Whether to exclude from indexing (useful for SORTABLE-only fields)
    pub no_index: bool,
    /// Disable stemming (TEXT only)
    pub no_stem: bool,
    /// Relevance weight (TEXT only)
    pub weight: f64,
    /// Tag separator (TAG only)
    pub tag_separator: String,
}

impl FieldSpec {
    fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            sortable: false,
            no_index: false,
            no_stem: false,
            weight: if kind == FieldKind::Text { 1.0 } else { 0.0 },
            tag_separator: String::new(),
        }
    }

    pub fn text(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Text)
    }

    pub fn numeric(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Numeric)
    }

    pub fn tag(name: impl Into<String>) -> Self {
        let mut field = Self::new(name, FieldKind::Tag);
        field.tag_separator = ",".to_string();
        field
    }

    pub fn geo(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Geo)
    }

    pub fn sortable(mut self) -> Self {
        self.sortable = true;
        self
    }

    pub fn no_index(mut self) -> Self {
        self.no_index = true;
        self
    }

    pub fn no_stem(mut self) -> Self {
        self.no_stem = true;
        self
    }

    pub fn weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    pub fn separator(mut self, separator: impl Into<String>) -> Self {
        self.tag_separator = separator.into();
        self
    }

    fn to_schema_args(&self) -> Vec<String> {
        let mut args = vec![self.name.clone(), self.kind.to_string()];

        match self.kind {
            FieldKind::Text => {
                if self.no_stem {
                    args.push("NOSTEM".to_string());
                }
                if self.weight != 1.0 {
                    args.push("WEIGHT".to_string());
                    args.push(self.weight.to_string());
                }
            }
            FieldKind::Tag => {
                if !self.tag_separator.is_empty() && self.tag_separator != ", " {
                    args.push("SEPARATOR".to_string());
                    args.push(self.tag_separator.clone());
                }
            }
            FieldKind::Numeric | FieldKind::Geo => {}
        }

        if self.sortable {
            args.push("SORTABLE".to_string());
        }

        if self.no_index {
            args.push("NOINDEX".to_string());
        }

        args
    }
}

/// Search field types supported by RediSearch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldKind {
    /// Full-text searchable field
    Text,
    /// Numeric field (supports range queries)
    Numeric,
    /// Tag field (exact match, supports OR)
    Tag,
    /// Geographic field (longitude, latitude)
    Geo,
}

impl FieldKind {
    /// Parse the engine's type name.
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_uppercase().as_str() {
            "TEXT" => Some(FieldKind::Text),
            "NUMERIC" => Some(FieldKind::Numeric),
            "TAG" => Some(FieldKind::Tag),
            "GEO" => Some(FieldKind::Geo),
            _ => None,
        }
    }
}

impl std::fmt::Display for FieldKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldKind::Text => write!(f, "TEXT"),
            FieldKind::Numeric => write!(f, "NUMERIC"),
            FieldKind::Tag => write!(f, "TAG"),
            FieldKind::Geo => write!(f, "GEO"),
        }
    }
}

/// Search index definition
///
/// Built once at registration time; recreated (drop + create) only when
/// the drift detector reports a difference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexDefinition {
    /// Index name, unique per pool
    pub name: String,
    /// Engine pool the index lives in
    pub pool: String,
    /// Key prefixes owned by this index
    pub prefixes: Vec<String>,
    /// Field definitions, in declaration order
    pub fields: Vec<FieldSpec>,
    /// `None` keeps the engine's default stop-word list
    pub stop_words: Option<Vec<String>>,
    pub default_language: String,
    pub language_field: String,
    pub default_score: f64,
    pub score_field: String,
    pub max_text_fields: bool,
    pub no_offsets: bool,
    pub no_highlight: bool,
    pub no_fields: bool,
    pub no_freqs: bool,
    pub skip_initial_scan: bool,
}

impl IndexDefinition {
    /// Create a new, empty index definition
    pub fn new(name: impl Into<String>, pool: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pool: pool.into(),
            prefixes: Vec::new(),
            fields: Vec::new(),
            stop_words: None,
            default_language: String::new(),
            language_field: String::new(),
            default_score: 0.0,
            score_field: String::new(),
            max_text_fields: false,
            no_offsets: false,
            no_highlight: false,
            no_fields: false,
            no_freqs: false,
            skip_initial_scan: false,
        }
    }

    /// Add an owned key prefix
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefixes.push(prefix.into());
        self
    }

    /// Add a field
    pub fn field(mut self, field: FieldSpec) -> Self {
        self.fields.push(field);
        self
    }

    /// Add a text field with weight 1
    pub fn text(self, name: impl Into<String>) -> Self {
        self.field(FieldSpec::text(name))
    }

    /// Add a sortable numeric field
    pub fn numeric_sortable(self, name: impl Into<String>) -> Self {
        self.field(FieldSpec::numeric(name).sortable())
    }

    /// Add a numeric field
    pub fn numeric(self, name: impl Into<String>) -> Self {
        self.field(FieldSpec::numeric(name))
    }

    /// Add a tag field with `,` separator
    pub fn tag(self, name: impl Into<String>) -> Self {
        self.field(FieldSpec::tag(name))
    }

    /// Add a geo field
    pub fn geo(self, name: impl Into<String>) -> Self {
        self.field(FieldSpec::geo(name))
    }

    /// Replace the stop-word list (`Some(vec![])` disables stop words)
    pub fn stop_words(mut self, words: Vec<String>) -> Self {
        self.stop_words = Some(words);
        self
    }

    pub fn get_field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Force the first field indexable when every field is NOINDEX.
    pub fn ensure_indexable(&mut self) {
        if self.fields.iter().all(|f| f.no_index) {
            if let Some(first) = self.fields.first_mut() {
                first.no_index = false;
            }
        }
    }

    /// Whether a key belongs to this index.
    pub fn owns_key(&self, key: &str) -> bool {
        self.prefixes.iter().any(|p| key.starts_with(p.as_str()))
    }

    /// Generate the full `FT.CREATE` command.
    ///
    /// The pool namespace is prepended to both the index name and every
    /// key prefix so they match the keys actually stored.
    pub fn to_ft_create_args(&self, namespace: &str) -> Result<Vec<String>, SearchError> {
        if self.prefixes.is_empty() {
            return Err(SearchError::Config(format!(
                "missing redis search prefix in index {}",
                self.name
            )));
        }

        let mut args = vec![
            "FT.CREATE".to_string(),
            add_namespace(namespace, &self.name),
            "ON".to_string(),
            "HASH".to_string(),
            "PREFIX".to_string(),
            self.prefixes.len().to_string(),
        ];
        args.extend(self.prefixes.iter().map(|p| add_namespace(namespace, p)));

        if !self.default_language.is_empty() {
            args.push("LANGUAGE".to_string());
            args.push(self.default_language.clone());
        }
        if !self.language_field.is_empty() {
            args.push("LANGUAGE_FIELD".to_string());
            args.push(self.language_field.clone());
        }
        if self.default_score > 0.0 {
            args.push("SCORE".to_string());
            args.push(self.default_score.to_string());
        }
        if !self.score_field.is_empty() {
            args.push("SCORE_FIELD".to_string());
            args.push(self.score_field.clone());
        }

        let flags = [
            (self.max_text_fields, "MAXTEXTFIELDS"),
            (self.no_offsets, "NOOFFSETS"),
            (self.no_highlight, "NOHL"),
            (self.no_fields, "NOFIELDS"),
            (self.no_freqs, "NOFREQS"),
            (self.skip_initial_scan, "SKIPINITIALSCAN"),
        ];
        args.extend(flags.iter().filter(|(on, _)| *on).map(|(_, flag)| flag.to_string()));

        if let Some(words) = &self.stop_words {
            args.push("STOPWORDS".to_string());
            args.push(words.len().to_string());
            args.extend(words.iter().cloned());
        }

        args.push("SCHEMA".to_string());
        for field in &self.fields {
            args.extend(field.to_schema_args());
        }

        Ok(args)
    }
}
