// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Schema drift detection.
//!
//! Compares a desired [`IndexDefinition`] with the live [`IndexInfo`] and
//! names every difference. Nothing here touches the engine; corrective
//! actions run only through [`IndexAlter::apply`].

use std::collections::BTreeSet;

use serde::Serialize;

use super::add_namespace;
use super::index::{FieldKind, IndexDefinition};
use super::info::IndexInfo;
use crate::coordinator::SearchEngine;
use crate::storage::traits::SearchError;

const DEFAULT_TAG_SEPARATOR: &str = ",";

/// Engines before 2.2 report implicit language and score fields.
const IMPLICIT_FIELDS_BEFORE: u64 = 202;

/// The search module as reported by `INFO modules`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchModule {
    /// First three digits of `ver=`, e.g. `20613` → `206`
    pub version: Option<u64>,
}

/// Find the search module line in an `INFO modules` reply.
pub fn search_module(info_modules: &str) -> Option<SearchModule> {
    let line = info_modules
        .lines()
        .map(|line| line.trim_end_matches('\r'))
        .find(|line| line.starts_with("module:name=search"))?;

    let version = line
        .split(',')
        .find_map(|part| part.strip_prefix("ver="))
        .and_then(|ver| ver.get(0..3))
        .and_then(|digits| digits.parse().ok());

    Some(SearchModule { version })
}

/// Inputs to the comparison that do not come from either definition.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiffContext {
    pub namespace: String,
    pub module_version: Option<u64>,
}

impl DiffContext {
    fn implicit_fields(&self) -> bool {
        self.module_version.is_some_and(|v| v < IMPLICIT_FIELDS_BEFORE)
    }
}

fn separator(value: &str) -> &str {
    if value.is_empty() {
        DEFAULT_TAG_SEPARATOR
    } else {
        value
    }
}

/// Reasons why `live` differs from `desired`, empty when they match.
pub fn diff_index(desired: &IndexDefinition, live: &IndexInfo, ctx: &DiffContext) -> Vec<String> {
    let mut changes = Vec::new();

    // engine default and an explicit empty list are both reported as no words
    let words = desired.stop_words.as_deref().unwrap_or_default();
    let wanted: BTreeSet<&str> = words.iter().map(String::as_str).collect();
    let actual: BTreeSet<&str> = live.stop_words.iter().map(String::as_str).collect();
    if wanted != actual {
        changes.push("different stop words".to_string());
    }

    let wanted_prefixes: BTreeSet<String> = if desired.prefixes.iter().all(String::is_empty) {
        BTreeSet::from([add_namespace(&ctx.namespace, "")])
    } else {
        desired
            .prefixes
            .iter()
            .map(|p| add_namespace(&ctx.namespace, p))
            .collect()
    };
    let live_prefixes: BTreeSet<String> = live.definition.prefixes.iter().cloned().collect();
    if wanted_prefixes != live_prefixes {
        changes.push("different prefixes".to_string());
    }

    let mut language_field = desired.language_field.as_str();
    let mut score_field = desired.score_field.as_str();
    if ctx.implicit_fields() {
        if language_field.is_empty() {
            language_field = "__language";
        }
        if score_field.is_empty() {
            score_field = "__score";
        }
    }
    if live.definition.language_field != language_field {
        changes.push("different language field".to_string());
    }
    if live.definition.score_field != score_field {
        changes.push("different score field".to_string());
    }

    let options = [
        (live.options.no_freqs, desired.no_freqs, "NOFREQS"),
        (live.options.no_fields, desired.no_fields, "NOFIELDS"),
        (live.options.no_offsets, desired.no_offsets, "NOOFFSETS"),
        (live.options.max_text_fields, desired.max_text_fields, "MAXTEXTFIELDS"),
    ];
    for (actual, wanted, name) in options {
        if actual != wanted {
            changes.push(format!("different option {}", name));
        }
    }

    let default_score = if desired.default_score == 0.0 {
        1.0
    } else {
        desired.default_score
    };
    if live.definition.default_score != default_score {
        changes.push("different default score".to_string());
    }

    for wanted in &desired.fields {
        let Some(actual) = live.fields.iter().find(|f| f.name == wanted.name) else {
            changes.push(format!("new field {}", wanted.name));
            continue;
        };

        if actual.kind != Some(wanted.kind) {
            changes.push(format!("different field type {}", actual.name));
        } else {
            match wanted.kind {
                FieldKind::Text => {
                    if wanted.no_stem != actual.no_stem {
                        changes.push(format!("different field nostem {}", actual.name));
                    }
                    if wanted.weight != actual.weight {
                        changes.push(format!("different field weight {}", actual.name));
                    }
                }
                FieldKind::Tag => {
                    if separator(&wanted.tag_separator) != separator(&actual.tag_separator) {
                        changes.push(format!("different field separator {}", actual.name));
                    }
                }
                FieldKind::Numeric | FieldKind::Geo => {}
            }
        }

        if wanted.sortable != actual.sortable {
            changes.push(format!("different field sortable {}", actual.name));
        }
        if wanted.no_index != actual.no_index {
            changes.push(format!("different field noindex {}", actual.name));
        }
    }

    for actual in &live.fields {
        if desired.get_field(&actual.name).is_none() {
            changes.push(format!("unneeded field {}", actual.name));
        }
    }

    changes
}

/// Corrective action of an alter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AlterAction {
    /// Desired index missing from the engine
    Create,
    /// Live index differs; drop, recreate and repopulate
    Reindex,
    /// Live index with no desired definition; drop, keep the hashes
    Drop,
}

/// One detected difference between desired and live state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexAlter {
    pub pool: String,
    pub name: String,
    /// Command that `apply` will issue, for operator review
    pub command: String,
    /// Live document count
    pub documents: u64,
    pub changes: Vec<String>,
    pub action: AlterAction,
}

impl IndexAlter {
    pub(crate) fn recreate(
        definition: &IndexDefinition,
        namespace: &str,
        documents: u64,
        changes: Vec<String>,
        action: AlterAction,
    ) -> Result<Self, SearchError> {
        Ok(Self {
            pool: definition.pool.clone(),
            name: definition.name.clone(),
            command: definition.to_ft_create_args(namespace)?.join(" "),
            documents,
            changes,
            action,
        })
    }

    pub(crate) fn drop_orphan(pool: &str, name: &str, documents: u64) -> Self {
        Self {
            pool: pool.to_string(),
            name: name.to_string(),
            command: format!("FT.DROPINDEX {}", name),
            documents,
            changes: Vec::new(),
            action: AlterAction::Drop,
        }
    }

    /// Run the corrective action against the engine.
    pub async fn apply(&self, engine: &SearchEngine) -> Result<(), SearchError> {
        match self.action {
            AlterAction::Create | AlterAction::Reindex => engine.force_reindex(&self.name).await,
            AlterAction::Drop => engine.drop_index(&self.name, false).await.map(|_| ()),
        }
    }
}
