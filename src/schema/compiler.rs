// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

use std::collections::BTreeSet;

use sha2::{Digest, Sha256};
use tracing::debug;

use super::{
    CompiledSchema, FieldCodec, FieldCodecRegistry, FieldDescriptor, RecordDescriptor, ScanColumn, ScanStatement,
    SemanticType, SoftDelete, ID_FIELD,
};
use crate::search::{FieldSpec, IndexDefinition};
use crate::storage::traits::SearchError;

/// Turns record descriptors into compiled schemas.
#[derive(Debug, Clone)]
pub struct SchemaCompiler {
    page_size: usize,
}

impl Default for SchemaCompiler {
    fn default() -> Self {
        Self { page_size: 5000 }
    }
}

/// Document key prefix: 5 hex chars of SHA-256 over the record name.
pub(crate) fn key_prefix(record: &str) -> String {
    let digest = hex::encode(Sha256::digest(record.as_bytes()));
    format!("{}:", &digest[..5])
}

fn is_64_bit(ty: SemanticType) -> bool {
    matches!(
        ty,
        SemanticType::UInt64 | SemanticType::NullableUInt64 | SemanticType::Int64 | SemanticType::NullableInt64
    )
}

impl SchemaCompiler {
    pub fn new(page_size: usize) -> Self {
        Self {
            page_size: page_size.max(1),
        }
    }

    /// Compile a record type.
    ///
    /// Fields neither searchable nor sortable are skipped. A record type
    /// with no indexed field at all is rejected, as is a soft-delete marker
    /// that is not a plain bool.
    pub fn compile(
        &self,
        record: &RecordDescriptor,
        known_pools: &BTreeSet<String>,
    ) -> Result<CompiledSchema, SearchError> {
        let mut codecs = FieldCodecRegistry::default();
        let mut fields = Vec::new();
        let mut soft_delete = SoftDelete::None;
        let mut has_searchable = false;

        for field in &record.fields {
            if field.soft_delete && !matches!(field.ty, SemanticType::Bool) {
                return Err(SearchError::Config(format!(
                    "unsupported field combination in {}: soft-delete marker {} must be a non-nullable bool",
                    record.name, field.name
                )));
            }
            if field.soft_delete {
                soft_delete = if field.searchable {
                    SoftDelete::Flag(field.name.clone())
                } else {
                    SoftDelete::Remove(field.name.clone())
                };
            }
            if !field.searchable && !field.sortable {
                continue;
            }
            let Some((spec, codec)) = Self::map_field(field) else {
                continue;
            };
            has_searchable |= field.searchable;
            fields.push(spec);
            codecs.insert(&field.name, codec);
        }

        if fields.is_empty() {
            return Err(SearchError::Config(format!(
                "record type {} declares no searchable or sortable fields",
                record.name
            )));
        }

        let pool = match &record.pool {
            None => return Err(SearchError::Config(format!("missing search pool in {}", record.name))),
            Some(pool) if !known_pools.contains(pool) => {
                return Err(SearchError::Config(format!("pool '{}' not found", pool)));
            }
            Some(pool) => pool.clone(),
        };

        let prefix = key_prefix(&record.name);
        let mut definition = IndexDefinition::new(&record.name, &pool).prefix(&prefix);
        definition.fields = fields;
        definition.stop_words = Some(Vec::new());
        definition.no_offsets = true;
        definition.no_freqs = true;
        definition.no_highlight = true;
        definition.skip_initial_scan = true;
        if !has_searchable {
            definition.ensure_indexable();
        }

        let scan = ScanStatement {
            table: record.table.clone(),
            columns: codecs
                .iter()
                .filter(|(name, _)| *name != ID_FIELD)
                .map(|(name, codec)| ScanColumn {
                    name: name.to_string(),
                    kind: codec.scan_kind(),
                    as_text: matches!(codec, FieldCodec::Time { .. }),
                })
                .collect(),
            exclude_soft_deleted: match &soft_delete {
                SoftDelete::Remove(marker) => Some(marker.clone()),
                _ => None,
            },
            page_size: self.page_size,
        };

        debug!(
            record = %record.name,
            pool = %pool,
            fields = codecs.len(),
            prefix = %prefix,
            "Compiled search schema"
        );

        Ok(CompiledSchema {
            record: record.name.clone(),
            table: record.table.clone(),
            pool,
            definition,
            codecs,
            key_prefix: prefix,
            soft_delete,
            scan,
            record_fields: record.fields.iter().map(|f| f.name.clone()).collect(),
        })
    }

    fn numeric(field: &FieldDescriptor) -> FieldSpec {
        let mut spec = FieldSpec::numeric(&field.name);
        spec.sortable = field.sortable;
        spec.no_index = !field.searchable;
        spec
    }

    fn tag(field: &FieldDescriptor) -> FieldSpec {
        let mut spec = FieldSpec::tag(&field.name);
        spec.sortable = field.sortable;
        spec.no_index = !field.searchable;
        spec
    }

    fn text(field: &FieldDescriptor) -> FieldSpec {
        let mut spec = FieldSpec::text(&field.name);
        spec.sortable = field.sortable;
        spec.no_index = !field.searchable;
        spec.no_stem = field.stem.as_deref() != Some("true");
        spec
    }

    fn map_field(field: &FieldDescriptor) -> Option<(FieldSpec, FieldCodec)> {
        let checked = field.sortable && is_64_bit(field.ty);
        let mapped = match field.ty {
            SemanticType::UInt | SemanticType::UInt64 => {
                (Self::numeric(field), FieldCodec::UInt { nullable: false, checked })
            }
            SemanticType::NullableUInt | SemanticType::NullableUInt64 => {
                (Self::numeric(field), FieldCodec::UInt { nullable: true, checked })
            }
            SemanticType::Int | SemanticType::Int64 => (Self::numeric(field), FieldCodec::Int { nullable: false, checked }),
            SemanticType::NullableInt | SemanticType::NullableInt64 => {
                (Self::numeric(field), FieldCodec::Int { nullable: true, checked })
            }
            SemanticType::Float => (Self::numeric(field), FieldCodec::Float { nullable: false }),
            SemanticType::NullableFloat => (Self::numeric(field), FieldCodec::Float { nullable: true }),
            SemanticType::String | SemanticType::NullableString if field.enumerated => {
                (Self::tag(field), FieldCodec::Text)
            }
            SemanticType::String | SemanticType::NullableString => (Self::text(field), FieldCodec::Text),
            SemanticType::StringList => (Self::tag(field), FieldCodec::Tags),
            SemanticType::Bool if field.soft_delete => (Self::tag(field), FieldCodec::SoftDelete),
            SemanticType::Bool | SemanticType::NullableBool => (Self::tag(field), FieldCodec::Bool),
            SemanticType::Date | SemanticType::NullableDate => {
                (Self::numeric(field), FieldCodec::Time { with_time: false })
            }
            SemanticType::DateTime | SemanticType::NullableDateTime => {
                (Self::numeric(field), FieldCodec::Time { with_time: true })
            }
            SemanticType::Reference => (Self::numeric(field), FieldCodec::Reference),
            SemanticType::ReferenceList => {
                if !field.searchable {
                    return None;
                }
                let spec = FieldSpec::text(&field.name).weight(0.0).no_stem();
                (spec, FieldCodec::ReferenceList)
            }
            SemanticType::CachedQuery => return None,
            SemanticType::Other => {
                let mut spec = Self::text(field);
                spec.no_stem = true;
                (spec, FieldCodec::Passthrough)
            }
        };
        Some(mapped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::FieldKind;

    fn pools() -> BTreeSet<String> {
        ["default".to_string()].into_iter().collect()
    }

    fn users() -> RecordDescriptor {
        RecordDescriptor::new("User", "users")
            .pool("default")
            .field(FieldDescriptor::new("ID", SemanticType::UInt64).sortable())
            .field(FieldDescriptor::new("Name", SemanticType::String).searchable())
            .field(FieldDescriptor::new("Bio", SemanticType::NullableString).searchable().stem("true"))
            .field(FieldDescriptor::new("Status", SemanticType::String).searchable().enumerated())
            .field(FieldDescriptor::new("Tags", SemanticType::StringList).searchable())
            .field(FieldDescriptor::new("Age", SemanticType::NullableInt).searchable().sortable())
            .field(FieldDescriptor::new("Active", SemanticType::Bool).searchable())
            .field(FieldDescriptor::new("Born", SemanticType::Date).searchable())
            .field(FieldDescriptor::new("Friends", SemanticType::ReferenceList).searchable())
            .field(FieldDescriptor::new("Hidden", SemanticType::Float))
            .field(FieldDescriptor::new("Cached", SemanticType::CachedQuery).searchable())
            .field(FieldDescriptor::fake_delete())
    }

    #[test]
    fn test_field_mapping() {
        let schema = SchemaCompiler::default().compile(&users(), &pools()).unwrap();
        let def = &schema.definition;

        let id = def.get_field("ID").unwrap();
        assert_eq!(id.kind, FieldKind::Numeric);
        assert!(id.sortable && id.no_index);

        let name = def.get_field("Name").unwrap();
        assert_eq!(name.kind, FieldKind::Text);
        assert!(name.no_stem);
        assert_eq!(name.weight, 1.0);
        assert!(!def.get_field("Bio").unwrap().no_stem);

        assert_eq!(def.get_field("Status").unwrap().kind, FieldKind::Tag);
        assert_eq!(def.get_field("Status").unwrap().tag_separator, ",");
        assert_eq!(def.get_field("Tags").unwrap().kind, FieldKind::Tag);
        assert_eq!(def.get_field("Active").unwrap().kind, FieldKind::Tag);
        assert_eq!(def.get_field("Born").unwrap().kind, FieldKind::Numeric);

        let friends = def.get_field("Friends").unwrap();
        assert_eq!(friends.kind, FieldKind::Text);
        assert_eq!(friends.weight, 0.0);
        assert!(friends.no_stem);

        assert!(def.get_field("Hidden").is_none());
        assert!(def.get_field("Cached").is_none());
        assert!(def.get_field("FakeDelete").is_none());
    }

    #[test]
    fn test_index_options_and_prefix() {
        let schema = SchemaCompiler::default().compile(&users(), &pools()).unwrap();
        let def = &schema.definition;
        assert_eq!(def.name, "User");
        assert_eq!(def.pool, "default");
        assert_eq!(def.stop_words, Some(Vec::new()));
        assert!(def.no_offsets && def.no_freqs && def.no_highlight && def.skip_initial_scan);

        let expected = format!("{}:", &hex::encode(Sha256::digest(b"User"))[..5]);
        assert_eq!(schema.key_prefix, expected);
        assert_eq!(def.prefixes, vec![expected]);
        assert_eq!(schema.document_key(12), format!("{}12", schema.key_prefix));
        assert_eq!(schema.id_from_key(&schema.document_key(12)), Some(12));
    }

    #[test]
    fn test_sortable_64_bit_is_checked() {
        let schema = SchemaCompiler::default().compile(&users(), &pools()).unwrap();
        assert_eq!(
            schema.codecs.get("ID"),
            Some(&FieldCodec::UInt { nullable: false, checked: true })
        );
        // 32-bit sortable stays unchecked
        assert_eq!(
            schema.codecs.get("Age"),
            Some(&FieldCodec::Int { nullable: true, checked: false })
        );
    }

    #[test]
    fn test_hidden_soft_delete_filters_scan() {
        let schema = SchemaCompiler::default().compile(&users(), &pools()).unwrap();
        assert_eq!(schema.soft_delete, SoftDelete::Remove("FakeDelete".into()));
        let sql = schema.scan.sql();
        assert!(sql.starts_with("SELECT `ID`,`Name`,`Bio`"));
        assert!(sql.contains("CAST(`Born` AS CHAR) AS `Born`"));
        assert!(sql.ends_with("FROM `users` WHERE `ID` > ? AND `FakeDelete` = 0 ORDER BY `ID` LIMIT 5000"));
    }

    #[test]
    fn test_searchable_soft_delete_is_tag() {
        let record = RecordDescriptor::new("Post", "posts")
            .pool("default")
            .field(FieldDescriptor::new("Title", SemanticType::String).searchable())
            .field(FieldDescriptor::fake_delete().searchable());
        let schema = SchemaCompiler::new(100).compile(&record, &pools()).unwrap();
        assert_eq!(schema.soft_delete, SoftDelete::Flag("FakeDelete".into()));
        assert_eq!(schema.codecs.get("FakeDelete"), Some(&FieldCodec::SoftDelete));
        assert_eq!(schema.definition.get_field("FakeDelete").unwrap().kind, FieldKind::Tag);
        assert!(schema.scan.exclude_soft_deleted.is_none());
        assert!(schema.scan.sql().ends_with("LIMIT 100"));
    }

    #[test]
    fn test_only_sortable_fields_forces_first_indexable() {
        let record = RecordDescriptor::new("Counter", "counters")
            .pool("default")
            .field(FieldDescriptor::new("Hits", SemanticType::UInt).sortable())
            .field(FieldDescriptor::new("Misses", SemanticType::UInt).sortable());
        let schema = SchemaCompiler::default().compile(&record, &pools()).unwrap();
        assert!(!schema.definition.fields[0].no_index);
        assert!(schema.definition.fields[1].no_index);
    }

    #[test]
    fn test_reference_list_needs_searchable() {
        let record = RecordDescriptor::new("Group", "groups")
            .pool("default")
            .field(FieldDescriptor::new("Name", SemanticType::String).searchable())
            .field(FieldDescriptor::new("Members", SemanticType::ReferenceList).sortable());
        let schema = SchemaCompiler::default().compile(&record, &pools()).unwrap();
        assert!(schema.definition.get_field("Members").is_none());
    }

    #[test]
    fn test_pool_errors() {
        let missing = RecordDescriptor::new("User", "users")
            .field(FieldDescriptor::new("Name", SemanticType::String).searchable());
        assert_eq!(
            SchemaCompiler::default().compile(&missing, &pools()).unwrap_err(),
            SearchError::Config("missing search pool in User".into())
        );

        let unknown = missing.pool("other");
        assert_eq!(
            SchemaCompiler::default().compile(&unknown, &pools()).unwrap_err(),
            SearchError::Config("pool 'other' not found".into())
        );
    }

    #[test]
    fn test_nothing_indexed_is_rejected() {
        let record = RecordDescriptor::new("Log", "logs")
            .pool("default")
            .field(FieldDescriptor::new("Line", SemanticType::String));
        assert_eq!(
            SchemaCompiler::default().compile(&record, &pools()).unwrap_err(),
            SearchError::Config("record type Log declares no searchable or sortable fields".into())
        );
    }

    #[test]
    fn test_soft_delete_marker_must_be_bool() {
        for ty in [SemanticType::Int, SemanticType::NullableBool, SemanticType::String] {
            let record = RecordDescriptor::new("Post", "posts")
                .pool("default")
                .field(FieldDescriptor::new("Title", SemanticType::String).searchable())
                .field(FieldDescriptor::new("Removed", ty).searchable().soft_delete());
            assert_eq!(
                SchemaCompiler::default().compile(&record, &pools()).unwrap_err(),
                SearchError::Config(
                    "unsupported field combination in Post: soft-delete marker Removed must be a non-nullable bool"
                        .into()
                )
            );
        }
    }

    #[test]
    fn test_compile_is_deterministic() {
        let compiler = SchemaCompiler::default();
        let a = compiler.compile(&users(), &pools()).unwrap();
        let b = compiler.compile(&users(), &pools()).unwrap();
        assert_eq!(a, b);
        assert_eq!(
            a.definition.to_ft_create_args("").unwrap(),
            b.definition.to_ft_create_args("").unwrap()
        );
    }
}
