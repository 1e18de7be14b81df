// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Record schemas compiled into search indices.
//!
//! A [`RecordDescriptor`] describes one record type of the system of record.
//! [`SchemaCompiler`] turns it into a [`CompiledSchema`]: the index
//! definition, one [`FieldCodec`] per indexed field, the document key prefix
//! and the paged scan used by the reindexer.
//!
//! # Example
//!
//! ```rust
//! use redisearch_sync::schema::{FieldDescriptor, RecordDescriptor, SemanticType};
//!
//! let users = RecordDescriptor::new("User", "users")
//!     .pool("default")
//!     .field(FieldDescriptor::new("ID", SemanticType::UInt64).sortable())
//!     .field(FieldDescriptor::new("Name", SemanticType::String).searchable())
//!     .field(FieldDescriptor::new("Status", SemanticType::String).searchable().enumerated())
//!     .field(FieldDescriptor::fake_delete());
//! ```
//!
//! # Soft Delete
//!
//! A record type may carry a soft-delete marker. When the marker is not
//! searchable, flagged rows are removed from the index and skipped by the
//! scan. When it is searchable, it is indexed as a TAG and queries exclude
//! `true` rows unless they opt in.

pub mod codec;
mod compiler;
mod registry;

use std::collections::BTreeMap;

pub use codec::{FieldCodec, FieldValue, RawValue, ScanKind, NULL_NUMBER};
pub use compiler::SchemaCompiler;
pub use registry::{RegisteredIndex, SearchRegistry};

use crate::pusher::DocumentPusher;
use crate::search::{IndexDefinition, QueryCompiler, SearchQuery};
use crate::storage::traits::SearchError;

/// Conventional name of the soft-delete marker column.
pub const SOFT_DELETE_FIELD: &str = "FakeDelete";

/// Primary key column.
pub const ID_FIELD: &str = "ID";

/// Closed set of field types a record can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SemanticType {
    UInt,
    UInt64,
    NullableUInt,
    NullableUInt64,
    Int,
    Int64,
    NullableInt,
    NullableInt64,
    Float,
    NullableFloat,
    String,
    NullableString,
    StringList,
    Bool,
    NullableBool,
    Date,
    NullableDate,
    DateTime,
    NullableDateTime,
    /// Relation to one record, stored as its id
    Reference,
    /// Relation to many records
    ReferenceList,
    /// Cached query handle, never indexed
    CachedQuery,
    /// Anything else, stored as-is
    Other,
}

/// One field of a record type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub name: String,
    pub ty: SemanticType,
    pub searchable: bool,
    pub sortable: bool,
    pub enumerated: bool,
    /// `Some("true")` enables stemming on text fields
    pub stem: Option<String>,
    pub soft_delete: bool,
}

impl FieldDescriptor {
    pub fn new(name: impl Into<String>, ty: SemanticType) -> Self {
        Self {
            name: name.into(),
            ty,
            searchable: false,
            sortable: false,
            enumerated: false,
            stem: None,
            soft_delete: false,
        }
    }

    /// The conventional `FakeDelete` marker column.
    pub fn fake_delete() -> Self {
        let mut field = Self::new(SOFT_DELETE_FIELD, SemanticType::Bool);
        field.soft_delete = true;
        field
    }

    pub fn searchable(mut self) -> Self {
        self.searchable = true;
        self
    }

    pub fn sortable(mut self) -> Self {
        self.sortable = true;
        self
    }

    pub fn enumerated(mut self) -> Self {
        self.enumerated = true;
        self
    }

    pub fn stem(mut self, stem: impl Into<String>) -> Self {
        self.stem = Some(stem.into());
        self
    }

    pub fn soft_delete(mut self) -> Self {
        self.soft_delete = true;
        self
    }
}

/// Description of one record type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordDescriptor {
    pub name: String,
    pub table: String,
    /// Engine pool holding the index; required
    pub pool: Option<String>,
    pub fields: Vec<FieldDescriptor>,
}

impl RecordDescriptor {
    pub fn new(name: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table: table.into(),
            pool: None,
            fields: Vec::new(),
        }
    }

    pub fn pool(mut self, pool: impl Into<String>) -> Self {
        self.pool = Some(pool.into());
        self
    }

    pub fn field(mut self, field: FieldDescriptor) -> Self {
        self.fields.push(field);
        self
    }
}

/// How the soft-delete marker is honoured
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SoftDelete {
    None,
    /// Flagged rows are removed from the index
    Remove(String),
    /// Flagged rows stay indexed with a `true` tag
    Flag(String),
}

/// Ordered field name → codec map.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldCodecRegistry {
    entries: Vec<(String, FieldCodec)>,
}

impl FieldCodecRegistry {
    pub(crate) fn insert(&mut self, name: &str, codec: FieldCodec) {
        match self.entries.iter_mut().find(|(n, _)| n == name) {
            Some(entry) => entry.1 = codec,
            None => self.entries.push((name.to_string(), codec)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&FieldCodec> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, c)| c)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldCodec)> {
        self.entries.iter().map(|(n, c)| (n.as_str(), c))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Column read by the reindex scan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanColumn {
    pub name: String,
    pub kind: ScanKind,
    /// Read through `CAST(.. AS CHAR)` (date and time columns)
    pub as_text: bool,
}

/// Paged primary-key scan over one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanStatement {
    pub table: String,
    /// Columns after the leading `ID`
    pub columns: Vec<ScanColumn>,
    /// Skip rows whose marker is set
    pub exclude_soft_deleted: Option<String>,
    pub page_size: usize,
}

impl ScanStatement {
    /// `SELECT` with one positional `?` for the last seen id.
    pub fn sql(&self) -> String {
        let mut sql = format!("SELECT `{}`", ID_FIELD);
        for column in &self.columns {
            if column.as_text {
                sql.push_str(&format!(",CAST(`{0}` AS CHAR) AS `{0}`", column.name));
            } else {
                sql.push_str(&format!(",`{}`", column.name));
            }
        }
        sql.push_str(&format!(" FROM `{}` WHERE `{}` > ?", self.table, ID_FIELD));
        if let Some(marker) = &self.exclude_soft_deleted {
            sql.push_str(&format!(" AND `{}` = 0", marker));
        }
        sql.push_str(&format!(" ORDER BY `{}` LIMIT {}", ID_FIELD, self.page_size));
        sql
    }
}

/// Kind of record mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// One record mutation from the system of record.
///
/// `fields` holds only the fields the mutation touched.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordChange {
    pub id: u64,
    pub kind: ChangeKind,
    pub fields: BTreeMap<String, FieldValue>,
}

impl RecordChange {
    fn new(id: u64, kind: ChangeKind) -> Self {
        Self {
            id,
            kind,
            fields: BTreeMap::new(),
        }
    }

    pub fn insert(id: u64) -> Self {
        Self::new(id, ChangeKind::Insert)
    }

    pub fn update(id: u64) -> Self {
        Self::new(id, ChangeKind::Update)
    }

    pub fn delete(id: u64) -> Self {
        Self::new(id, ChangeKind::Delete)
    }

    pub fn set(mut self, field: &str, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(field.to_string(), value.into());
        self
    }
}

/// Everything derived from one record type.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledSchema {
    pub record: String,
    pub table: String,
    pub pool: String,
    pub definition: IndexDefinition,
    pub codecs: FieldCodecRegistry,
    /// `<5 hex chars of sha256(record)>:`
    pub key_prefix: String,
    pub soft_delete: SoftDelete,
    pub scan: ScanStatement,
    /// Every declared field, indexed or not
    pub(crate) record_fields: Vec<String>,
}

impl CompiledSchema {
    pub fn document_key(&self, id: u64) -> String {
        format!("{}{}", self.key_prefix, id)
    }

    /// Record id of a document key (namespace already removed).
    pub fn id_from_key(&self, key: &str) -> Option<u64> {
        key.strip_prefix(&self.key_prefix)?.parse().ok()
    }

    /// Check a query against this record's fields.
    pub fn validate_query(&self, query: &SearchQuery) -> Result<(), SearchError> {
        QueryCompiler::validate_fields(query, &self.definition, |name| {
            self.record_fields.iter().any(|f| f == name)
        })
    }

    /// Attach the soft-delete suppression this record needs.
    pub fn prepare_query(&self, query: &mut SearchQuery) {
        if let SoftDelete::Flag(marker) = &self.soft_delete {
            query.soft_delete_field = Some(marker.clone());
        }
    }

    /// Queue the index writes for one mutation.
    pub fn write_change(&self, change: &RecordChange, pusher: &mut DocumentPusher) -> Result<(), SearchError> {
        let key = self.document_key(change.id);

        if change.kind == ChangeKind::Delete {
            pusher.delete_documents([key]);
            return Ok(());
        }

        if let SoftDelete::Remove(marker) = &self.soft_delete {
            if let Some(value) = change.fields.get(marker) {
                if FieldCodec::SoftDelete.encode(value)? == "true" {
                    pusher.delete_documents([key]);
                    return Ok(());
                }
            }
        }

        let mut values = Vec::new();
        let mut changed = false;

        if let Some(codec) = self.codecs.get(ID_FIELD) {
            values.push((ID_FIELD.to_string(), codec.encode(&FieldValue::UInt(change.id))?));
            changed = change.kind == ChangeKind::Insert;
        }

        for (name, codec) in self.codecs.iter() {
            if name == ID_FIELD {
                continue;
            }
            if let Some(value) = change.fields.get(name) {
                values.push((name.to_string(), codec.encode(value)?));
                changed = true;
            }
        }

        if changed {
            pusher.new_document(&key);
            for (name, value) in values {
                pusher.set_field(&name, value);
            }
            pusher.push_document();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_sql() {
        let scan = ScanStatement {
            table: "users".into(),
            columns: vec![
                ScanColumn {
                    name: "Age".into(),
                    kind: ScanKind::Integer,
                    as_text: false,
                },
                ScanColumn {
                    name: "Born".into(),
                    kind: ScanKind::Text,
                    as_text: true,
                },
            ],
            exclude_soft_deleted: Some("FakeDelete".into()),
            page_size: 5000,
        };
        assert_eq!(
            scan.sql(),
            "SELECT `ID`,`Age`,CAST(`Born` AS CHAR) AS `Born` FROM `users` WHERE `ID` > ? \
             AND `FakeDelete` = 0 ORDER BY `ID` LIMIT 5000"
        );
    }

    #[test]
    fn test_codec_registry_keeps_order_and_replaces() {
        let mut codecs = FieldCodecRegistry::default();
        codecs.insert("B", FieldCodec::Text);
        codecs.insert("A", FieldCodec::Bool);
        codecs.insert("B", FieldCodec::Tags);
        let names: Vec<_> = codecs.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["B", "A"]);
        assert_eq!(codecs.get("B"), Some(&FieldCodec::Tags));
        assert_eq!(codecs.len(), 2);
    }

    #[test]
    fn test_record_change_builder() {
        let change = RecordChange::update(7).set("Name", "bob").set("Age", 3u64);
        assert_eq!(change.kind, ChangeKind::Update);
        assert_eq!(change.fields["Name"], FieldValue::Text("bob".into()));
        assert_eq!(change.fields["Age"], FieldValue::UInt(3));
    }
}
