// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Field codecs: domain value ⇄ wire value.
//!
//! Each codec is resolved once at schema-compile time from the field's
//! semantic type. Three conversions are supported:
//!
//! ```text
//! RawValue (store) ──decode──▶ FieldValue (domain) ──encode──▶ wire string
//!                                      ▲                            │
//!                                      └──────── parse_wire ────────┘
//! ```
//!
//! Absent numeric and time values encode to [`NULL_NUMBER`] so range
//! queries can include or exclude them explicitly. Absent strings and
//! booleans encode to the literal `NULL` token.

use chrono::{DateTime, NaiveDate, NaiveDateTime};

use crate::search::{escape, unescape};
use crate::storage::traits::SearchError;

/// Numeric sentinel for "absent".
pub const NULL_NUMBER: i64 = -i64::MAX;

/// Tag/text token for "absent".
pub const NULL_TOKEN: &str = "NULL";

const DATE_FORMAT: &str = "%Y-%m-%d";
const DATE_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const ZERO_DATE: &str = "0001-01-01";

/// Value as read from the system of record.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Null,
    Int(i64),
    UInt(u64),
    Float(f64),
    Bool(bool),
    Text(String),
}

/// Domain value of one record field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    UInt(u64),
    Int(i64),
    Float(f64),
    Bool(bool),
    Text(String),
    List(Vec<String>),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    References(Vec<u64>),
}

impl From<u64> for FieldValue {
    fn from(v: u64) -> Self {
        FieldValue::UInt(v)
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        FieldValue::Int(v)
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Float(v)
    }
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        FieldValue::Bool(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::Text(v.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        FieldValue::Text(v)
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(FieldValue::Null)
    }
}

/// How the system of record should hand a column to the scanner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanKind {
    Integer,
    Float,
    Bool,
    Text,
}

/// Per-field encoder/decoder.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldCodec {
    /// Unsigned integer; `checked` rejects values above `i32::MAX`.
    UInt { nullable: bool, checked: bool },
    /// Signed integer; `checked` rejects values above `i32::MAX`.
    Int { nullable: bool, checked: bool },
    Float { nullable: bool },
    /// Escaped string, TEXT or enum TAG.
    Text,
    /// String collection, comma-joined TAG.
    Tags,
    Bool,
    /// Soft-delete marker: any non-zero value encodes to `true`.
    SoftDelete,
    /// Unix seconds; `with_time` keeps the time of day.
    Time { with_time: bool },
    /// Single relation, stored as the referenced id.
    Reference,
    /// Relation collection, stored as space-joined `e<id>` tokens.
    ReferenceList,
    /// Unknown types pass through untouched.
    Passthrough,
}

fn too_high() -> SearchError {
    SearchError::Validation("integer too high for redis search sort field".to_string())
}

fn mismatch(codec: &FieldCodec, value: &FieldValue) -> SearchError {
    SearchError::Validation(format!("value {:?} is not valid for {:?} field", value, codec))
}

fn format_float(v: f64) -> String {
    v.to_string()
}

fn parse_time(text: &str) -> Result<FieldValue, SearchError> {
    if text.len() == 19 {
        NaiveDateTime::parse_from_str(text, DATE_TIME_FORMAT)
            .map(FieldValue::DateTime)
            .map_err(|e| SearchError::Validation(format!("invalid date time '{}': {}", text, e)))
    } else {
        let date = text.get(0..10).unwrap_or(text);
        NaiveDate::parse_from_str(date, DATE_FORMAT)
            .map(FieldValue::Date)
            .map_err(|e| SearchError::Validation(format!("invalid date '{}': {}", text, e)))
    }
}

fn is_zero_date(date: NaiveDate) -> bool {
    date.format(DATE_FORMAT).to_string() == ZERO_DATE
}

/// Split on separators that are not backslash-escaped.
fn split_unescaped(value: &str, separator: char) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            current.push(c);
            if let Some(next) = chars.next() {
                current.push(next);
            }
        } else if c == separator {
            parts.push(std::mem::take(&mut current));
        } else {
            current.push(c);
        }
    }
    parts.push(current);
    parts
}

impl FieldCodec {
    /// Column shape expected from the system of record.
    pub fn scan_kind(&self) -> ScanKind {
        match self {
            FieldCodec::UInt { .. } | FieldCodec::Int { .. } | FieldCodec::Reference | FieldCodec::SoftDelete => {
                ScanKind::Integer
            }
            FieldCodec::Float { .. } => ScanKind::Float,
            FieldCodec::Bool => ScanKind::Bool,
            FieldCodec::Text
            | FieldCodec::Tags
            | FieldCodec::Time { .. }
            | FieldCodec::ReferenceList
            | FieldCodec::Passthrough => ScanKind::Text,
        }
    }

    /// Domain value → wire value.
    pub fn encode(&self, value: &FieldValue) -> Result<String, SearchError> {
        match self {
            FieldCodec::UInt { nullable, checked } => {
                let v = match value {
                    FieldValue::Null if *nullable => return Ok(NULL_NUMBER.to_string()),
                    FieldValue::UInt(v) => *v,
                    FieldValue::Int(v) if *v >= 0 => *v as u64,
                    FieldValue::Text(s) if *nullable && s == NULL_TOKEN => return Ok(NULL_NUMBER.to_string()),
                    FieldValue::Text(s) => s.parse().map_err(|_| mismatch(self, value))?,
                    _ => return Err(mismatch(self, value)),
                };
                if *checked && v > i32::MAX as u64 {
                    return Err(too_high());
                }
                Ok(v.to_string())
            }
            FieldCodec::Int { nullable, checked } => {
                let v = match value {
                    FieldValue::Null if *nullable => return Ok(NULL_NUMBER.to_string()),
                    FieldValue::Int(v) => *v,
                    FieldValue::UInt(v) => i64::try_from(*v).map_err(|_| too_high())?,
                    FieldValue::Text(s) if *nullable && s == NULL_TOKEN => return Ok(NULL_NUMBER.to_string()),
                    FieldValue::Text(s) => s.parse().map_err(|_| mismatch(self, value))?,
                    _ => return Err(mismatch(self, value)),
                };
                if *checked && v > i32::MAX as i64 {
                    return Err(too_high());
                }
                Ok(v.to_string())
            }
            FieldCodec::Float { nullable } => match value {
                FieldValue::Null if *nullable => Ok(NULL_NUMBER.to_string()),
                FieldValue::Float(v) => Ok(format_float(*v)),
                FieldValue::Int(v) => Ok(v.to_string()),
                FieldValue::UInt(v) => Ok(v.to_string()),
                FieldValue::Text(s) => s
                    .parse::<f64>()
                    .map(format_float)
                    .map_err(|_| mismatch(self, value)),
                _ => Err(mismatch(self, value)),
            },
            FieldCodec::Text => match value {
                FieldValue::Null => Ok(NULL_TOKEN.to_string()),
                FieldValue::Text(s) if s == NULL_TOKEN => Ok(NULL_TOKEN.to_string()),
                FieldValue::Text(s) => Ok(escape(s)),
                _ => Err(mismatch(self, value)),
            },
            FieldCodec::Tags => match value {
                FieldValue::Null => Ok(NULL_TOKEN.to_string()),
                FieldValue::List(items) => Ok(items.iter().map(|s| escape(s)).collect::<Vec<_>>().join(",")),
                FieldValue::Text(s) => Ok(escape(s)),
                _ => Err(mismatch(self, value)),
            },
            FieldCodec::Bool => match value {
                FieldValue::Null => Ok(NULL_TOKEN.to_string()),
                FieldValue::Bool(true) => Ok("true".to_string()),
                FieldValue::Bool(false) => Ok("false".to_string()),
                FieldValue::Int(v) => Ok((*v == 1).to_string()),
                FieldValue::UInt(v) => Ok((*v == 1).to_string()),
                FieldValue::Text(s) if s == NULL_TOKEN => Ok(NULL_TOKEN.to_string()),
                FieldValue::Text(s) => Ok((s == "true" || s == "1").to_string()),
                _ => Err(mismatch(self, value)),
            },
            FieldCodec::SoftDelete => {
                let deleted = match value {
                    FieldValue::Null => false,
                    FieldValue::Bool(b) => *b,
                    FieldValue::UInt(v) => *v > 0,
                    FieldValue::Int(v) => *v > 0,
                    FieldValue::Text(s) => s
                        .parse::<u64>()
                        .map(|v| v > 0)
                        .map_err(|_| mismatch(self, value))?,
                    _ => return Err(mismatch(self, value)),
                };
                Ok(deleted.to_string())
            }
            FieldCodec::Time { .. } => {
                let seconds = match value {
                    FieldValue::Null => NULL_NUMBER,
                    FieldValue::Text(s) if s == NULL_TOKEN => NULL_NUMBER,
                    FieldValue::Text(s) if s.starts_with(ZERO_DATE) => 0,
                    FieldValue::Text(s) => return self.encode(&parse_time(s)?),
                    FieldValue::Date(d) if is_zero_date(*d) => 0,
                    FieldValue::Date(d) => d.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc().timestamp()).unwrap_or(0),
                    FieldValue::DateTime(dt) if is_zero_date(dt.date()) => 0,
                    FieldValue::DateTime(dt) => dt.and_utc().timestamp(),
                    _ => return Err(mismatch(self, value)),
                };
                Ok(seconds.to_string())
            }
            FieldCodec::Reference => match value {
                FieldValue::Null | FieldValue::UInt(0) => Ok(NULL_NUMBER.to_string()),
                FieldValue::UInt(v) => Ok(v.to_string()),
                FieldValue::Int(v) if *v > 0 => Ok(v.to_string()),
                FieldValue::Text(s) if s == NULL_TOKEN => Ok(NULL_NUMBER.to_string()),
                FieldValue::Text(s) => s
                    .parse::<u64>()
                    .map(|v| v.to_string())
                    .map_err(|_| mismatch(self, value)),
                _ => Err(mismatch(self, value)),
            },
            FieldCodec::ReferenceList => match value {
                FieldValue::Null => Ok(String::new()),
                FieldValue::References(ids) => Ok(reference_tokens(ids).join(" ")),
                FieldValue::Text(s) if s.is_empty() || s == NULL_TOKEN => Ok(String::new()),
                FieldValue::Text(s) => Ok(reference_tokens(&parse_reference_json(s)?).join(" ")),
                _ => Err(mismatch(self, value)),
            },
            FieldCodec::Passthrough => match value {
                FieldValue::Null => Ok(NULL_TOKEN.to_string()),
                FieldValue::UInt(v) => Ok(v.to_string()),
                FieldValue::Int(v) => Ok(v.to_string()),
                FieldValue::Float(v) => Ok(format_float(*v)),
                FieldValue::Bool(v) => Ok(v.to_string()),
                FieldValue::Text(s) => Ok(s.clone()),
                FieldValue::List(items) => Ok(items.join(",")),
                FieldValue::Date(d) => Ok(d.format(DATE_FORMAT).to_string()),
                FieldValue::DateTime(dt) => Ok(dt.format(DATE_TIME_FORMAT).to_string()),
                FieldValue::References(ids) => Ok(reference_tokens(ids).join(" ")),
            },
        }
    }

    /// Raw store value → domain value.
    pub fn decode(&self, raw: RawValue) -> Result<FieldValue, SearchError> {
        let bad = |raw: &RawValue| SearchError::Source(format!("unexpected {:?} for {:?} field", raw, self));
        match (self, raw) {
            (_, RawValue::Null) => Ok(match self {
                FieldCodec::SoftDelete => FieldValue::Bool(false),
                _ => FieldValue::Null,
            }),
            (FieldCodec::UInt { .. } | FieldCodec::Reference, RawValue::UInt(v)) => Ok(FieldValue::UInt(v)),
            (FieldCodec::UInt { .. } | FieldCodec::Reference, RawValue::Int(v)) if v >= 0 => Ok(FieldValue::UInt(v as u64)),
            (FieldCodec::UInt { .. } | FieldCodec::Reference, RawValue::Text(s)) => {
                s.parse().map(FieldValue::UInt).map_err(|_| bad(&RawValue::Text(s)))
            }
            (FieldCodec::Int { .. }, RawValue::Int(v)) => Ok(FieldValue::Int(v)),
            (FieldCodec::Int { .. }, RawValue::UInt(v)) => {
                i64::try_from(v).map(FieldValue::Int).map_err(|_| bad(&RawValue::UInt(v)))
            }
            (FieldCodec::Int { .. }, RawValue::Text(s)) => s.parse().map(FieldValue::Int).map_err(|_| bad(&RawValue::Text(s))),
            (FieldCodec::Float { .. }, RawValue::Float(v)) => Ok(FieldValue::Float(v)),
            (FieldCodec::Float { .. }, RawValue::Int(v)) => Ok(FieldValue::Float(v as f64)),
            (FieldCodec::Float { .. }, RawValue::UInt(v)) => Ok(FieldValue::Float(v as f64)),
            (FieldCodec::Float { .. }, RawValue::Text(s)) => {
                s.parse().map(FieldValue::Float).map_err(|_| bad(&RawValue::Text(s)))
            }
            (FieldCodec::Text, RawValue::Text(s)) => Ok(FieldValue::Text(s)),
            (FieldCodec::Tags, RawValue::Text(s)) if s.is_empty() => Ok(FieldValue::List(Vec::new())),
            (FieldCodec::Tags, RawValue::Text(s)) => Ok(FieldValue::List(s.split(',').map(str::to_string).collect())),
            (FieldCodec::Bool, RawValue::Bool(b)) => Ok(FieldValue::Bool(b)),
            (FieldCodec::Bool, RawValue::Int(v)) => Ok(FieldValue::Bool(v == 1)),
            (FieldCodec::Bool, RawValue::UInt(v)) => Ok(FieldValue::Bool(v == 1)),
            (FieldCodec::Bool, RawValue::Text(s)) => Ok(FieldValue::Bool(s == "1" || s == "true")),
            (FieldCodec::SoftDelete, RawValue::Bool(b)) => Ok(FieldValue::Bool(b)),
            (FieldCodec::SoftDelete, RawValue::Int(v)) => Ok(FieldValue::Bool(v > 0)),
            (FieldCodec::SoftDelete, RawValue::UInt(v)) => Ok(FieldValue::Bool(v > 0)),
            (FieldCodec::Time { with_time }, RawValue::Text(s)) => match parse_time(&s)? {
                FieldValue::DateTime(dt) if !with_time => Ok(FieldValue::Date(dt.date())),
                FieldValue::Date(d) if *with_time => Ok(FieldValue::DateTime(d.and_hms_opt(0, 0, 0).unwrap_or_default())),
                other => Ok(other),
            },
            (FieldCodec::ReferenceList, RawValue::Text(s)) if s.is_empty() => Ok(FieldValue::References(Vec::new())),
            (FieldCodec::ReferenceList, RawValue::Text(s)) => parse_reference_json(&s).map(FieldValue::References),
            (FieldCodec::Passthrough, RawValue::Int(v)) => Ok(FieldValue::Int(v)),
            (FieldCodec::Passthrough, RawValue::UInt(v)) => Ok(FieldValue::UInt(v)),
            (FieldCodec::Passthrough, RawValue::Float(v)) => Ok(FieldValue::Float(v)),
            (FieldCodec::Passthrough, RawValue::Bool(v)) => Ok(FieldValue::Bool(v)),
            (FieldCodec::Passthrough, RawValue::Text(s)) => Ok(FieldValue::Text(s)),
            (_, raw) => Err(bad(&raw)),
        }
    }

    /// Wire value (as stored in the engine) → domain value.
    pub fn parse_wire(&self, wire: &str) -> FieldValue {
        let null_number = NULL_NUMBER.to_string();
        match self {
            FieldCodec::UInt { .. } | FieldCodec::Reference => {
                if wire == null_number {
                    FieldValue::Null
                } else {
                    wire.parse().map(FieldValue::UInt).unwrap_or_else(|_| FieldValue::Text(wire.to_string()))
                }
            }
            FieldCodec::Int { .. } => {
                if wire == null_number {
                    FieldValue::Null
                } else {
                    wire.parse().map(FieldValue::Int).unwrap_or_else(|_| FieldValue::Text(wire.to_string()))
                }
            }
            FieldCodec::Float { .. } => {
                if wire == null_number {
                    FieldValue::Null
                } else {
                    wire.parse().map(FieldValue::Float).unwrap_or_else(|_| FieldValue::Text(wire.to_string()))
                }
            }
            FieldCodec::Text => match wire {
                NULL_TOKEN => FieldValue::Null,
                _ => FieldValue::Text(unescape(wire)),
            },
            FieldCodec::Tags => match wire {
                NULL_TOKEN => FieldValue::Null,
                "" => FieldValue::List(Vec::new()),
                _ => FieldValue::List(split_unescaped(wire, ',').iter().map(|s| unescape(s)).collect()),
            },
            FieldCodec::Bool | FieldCodec::SoftDelete => match wire {
                "true" => FieldValue::Bool(true),
                "false" => FieldValue::Bool(false),
                _ => FieldValue::Null,
            },
            FieldCodec::Time { with_time } => {
                if wire == null_number {
                    return FieldValue::Null;
                }
                let Ok(seconds) = wire.parse::<i64>() else {
                    return FieldValue::Text(wire.to_string());
                };
                match DateTime::from_timestamp(seconds, 0) {
                    Some(dt) if *with_time => FieldValue::DateTime(dt.naive_utc()),
                    Some(dt) => FieldValue::Date(dt.date_naive()),
                    None => FieldValue::Text(wire.to_string()),
                }
            }
            FieldCodec::ReferenceList => FieldValue::References(
                wire.split_whitespace()
                    .filter_map(|token| token.strip_prefix('e'))
                    .filter_map(|id| id.parse().ok())
                    .collect(),
            ),
            FieldCodec::Passthrough => FieldValue::Text(wire.to_string()),
        }
    }
}

fn reference_tokens(ids: &[u64]) -> Vec<String> {
    ids.iter().map(|id| format!("e{}", id)).collect()
}

/// Reference collections are persisted as a JSON list of `{"ID": n}` objects.
fn parse_reference_json(raw: &str) -> Result<Vec<u64>, SearchError> {
    let holder: Vec<serde_json::Map<String, serde_json::Value>> = serde_json::from_str(raw)
        .map_err(|e| SearchError::Validation(format!("invalid reference list '{}': {}", raw, e)))?;
    Ok(holder
        .iter()
        .filter_map(|item| item.get("ID"))
        .filter_map(|id| id.as_u64().or_else(|| id.as_f64().map(|f| f as u64)))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_null_number_is_negative_max() {
        assert_eq!(NULL_NUMBER, -9_223_372_036_854_775_807);
    }

    #[test]
    fn test_checked_uint_rejects_overflow() {
        let codec = FieldCodec::UInt { nullable: false, checked: true };
        assert_eq!(codec.encode(&FieldValue::UInt(42)).unwrap(), "42");
        assert_eq!(codec.encode(&FieldValue::UInt(i32::MAX as u64)).unwrap(), "2147483647");

        let err = codec.encode(&FieldValue::UInt(i32::MAX as u64 + 1)).unwrap_err();
        assert_eq!(
            err,
            SearchError::Validation("integer too high for redis search sort field".into())
        );
    }

    #[test]
    fn test_unchecked_int_allows_large_values() {
        let codec = FieldCodec::Int { nullable: false, checked: false };
        assert_eq!(codec.encode(&FieldValue::Int(i64::MAX)).unwrap(), i64::MAX.to_string());
        assert_eq!(codec.encode(&FieldValue::Int(-5)).unwrap(), "-5");
    }

    #[test]
    fn test_checked_int_only_bounds_above() {
        let codec = FieldCodec::Int { nullable: true, checked: true };
        assert_eq!(codec.encode(&FieldValue::Int(-10_000_000_000)).unwrap(), "-10000000000");
        assert!(codec.encode(&FieldValue::Int(10_000_000_000)).is_err());
    }

    #[test]
    fn test_nullable_numeric_uses_sentinel() {
        let codec = FieldCodec::Int { nullable: true, checked: false };
        assert_eq!(codec.encode(&FieldValue::Null).unwrap(), "-9223372036854775807");
        assert_eq!(codec.parse_wire("-9223372036854775807"), FieldValue::Null);

        let float = FieldCodec::Float { nullable: true };
        assert_eq!(float.encode(&FieldValue::Null).unwrap(), NULL_NUMBER.to_string());
    }

    #[test]
    fn test_non_nullable_numeric_rejects_null() {
        let codec = FieldCodec::UInt { nullable: false, checked: false };
        assert!(codec.encode(&FieldValue::Null).is_err());
    }

    #[test]
    fn test_float_encoding() {
        let codec = FieldCodec::Float { nullable: false };
        assert_eq!(codec.encode(&FieldValue::Float(10.0)).unwrap(), "10");
        assert_eq!(codec.encode(&FieldValue::Float(2.5)).unwrap(), "2.5");
        assert_eq!(codec.parse_wire("2.5"), FieldValue::Float(2.5));
    }

    #[test]
    fn test_text_is_escaped_and_null_literal() {
        let codec = FieldCodec::Text;
        assert_eq!(codec.encode(&"hello world".into()).unwrap(), "hello\\ world");
        assert_eq!(codec.encode(&FieldValue::Null).unwrap(), "NULL");
        assert_eq!(codec.parse_wire("hello\\ world"), FieldValue::Text("hello world".into()));
        assert_eq!(codec.parse_wire("NULL"), FieldValue::Null);
    }

    #[test]
    fn test_tags_join_with_comma() {
        let codec = FieldCodec::Tags;
        let value = FieldValue::List(vec!["a".into(), "b c".into()]);
        assert_eq!(codec.encode(&value).unwrap(), "a,b\\ c");
        assert_eq!(codec.parse_wire("a,b\\ c"), value);
    }

    #[test]
    fn test_tags_keep_escaped_commas_together() {
        let codec = FieldCodec::Tags;
        let value = FieldValue::List(vec!["x,y".into(), "z".into()]);
        let wire = codec.encode(&value).unwrap();
        assert_eq!(wire, "x\\,y,z");
        assert_eq!(codec.parse_wire(&wire), value);
    }

    #[test]
    fn test_bool_encoding() {
        let codec = FieldCodec::Bool;
        assert_eq!(codec.encode(&true.into()).unwrap(), "true");
        assert_eq!(codec.encode(&false.into()).unwrap(), "false");
        assert_eq!(codec.encode(&FieldValue::Null).unwrap(), "NULL");
        assert_eq!(codec.encode(&"1".into()).unwrap(), "true");
        assert_eq!(codec.parse_wire("NULL"), FieldValue::Null);
    }

    #[test]
    fn test_soft_delete_marker() {
        let codec = FieldCodec::SoftDelete;
        assert_eq!(codec.encode(&FieldValue::UInt(7)).unwrap(), "true");
        assert_eq!(codec.encode(&FieldValue::UInt(0)).unwrap(), "false");
        assert_eq!(codec.encode(&"3".into()).unwrap(), "true");
        assert_eq!(codec.decode(RawValue::Int(1)).unwrap(), FieldValue::Bool(true));
        assert_eq!(codec.decode(RawValue::Null).unwrap(), FieldValue::Bool(false));
    }

    #[test]
    fn test_time_encoding() {
        let day = FieldCodec::Time { with_time: false };
        assert_eq!(day.encode(&FieldValue::Date(date(2024, 3, 1))).unwrap(), "1709251200");
        assert_eq!(day.encode(&"2024-03-01".into()).unwrap(), "1709251200");
        assert_eq!(day.encode(&"0001-01-01".into()).unwrap(), "0");
        assert_eq!(day.encode(&FieldValue::Date(date(1, 1, 1))).unwrap(), "0");
        assert_eq!(day.encode(&FieldValue::Null).unwrap(), NULL_NUMBER.to_string());

        let stamp = FieldCodec::Time { with_time: true };
        assert_eq!(stamp.encode(&"2024-03-01 10:20:30".into()).unwrap(), "1709288430");
        assert_eq!(stamp.encode(&"0001-01-01 00:00:00".into()).unwrap(), "0");
        assert_eq!(
            stamp.parse_wire("1709288430"),
            FieldValue::DateTime(date(2024, 3, 1).and_hms_opt(10, 20, 30).unwrap())
        );
    }

    #[test]
    fn test_time_decode_from_store_text() {
        let stamp = FieldCodec::Time { with_time: true };
        assert_eq!(
            stamp.decode(RawValue::Text("2023-12-31 23:59:59".into())).unwrap(),
            FieldValue::DateTime(date(2023, 12, 31).and_hms_opt(23, 59, 59).unwrap())
        );
        let day = FieldCodec::Time { with_time: false };
        assert_eq!(
            day.decode(RawValue::Text("2023-12-31".into())).unwrap(),
            FieldValue::Date(date(2023, 12, 31))
        );
        assert!(day.decode(RawValue::Text("not a date".into())).is_err());
    }

    #[test]
    fn test_reference_list_tokens() {
        let codec = FieldCodec::ReferenceList;
        assert_eq!(codec.encode(&FieldValue::References(vec![1, 22])).unwrap(), "e1 e22");
        assert_eq!(codec.encode(&"[{\"ID\":3},{\"ID\":4}]".into()).unwrap(), "e3 e4");
        assert_eq!(codec.encode(&FieldValue::Null).unwrap(), "");
        assert_eq!(codec.parse_wire("e3 e4"), FieldValue::References(vec![3, 4]));
        assert_eq!(
            codec.decode(RawValue::Text("[{\"ID\":9}]".into())).unwrap(),
            FieldValue::References(vec![9])
        );
    }

    #[test]
    fn test_reference_zero_is_null() {
        let codec = FieldCodec::Reference;
        assert_eq!(codec.encode(&FieldValue::UInt(0)).unwrap(), NULL_NUMBER.to_string());
        assert_eq!(codec.encode(&FieldValue::UInt(12)).unwrap(), "12");
    }

    #[test]
    fn test_decode_numeric_from_store() {
        let codec = FieldCodec::UInt { nullable: true, checked: false };
        assert_eq!(codec.decode(RawValue::Int(5)).unwrap(), FieldValue::UInt(5));
        assert_eq!(codec.decode(RawValue::Null).unwrap(), FieldValue::Null);
        assert!(codec.decode(RawValue::Int(-1)).is_err());
    }

    #[test]
    fn test_scan_kinds() {
        assert_eq!(FieldCodec::Time { with_time: true }.scan_kind(), ScanKind::Text);
        assert_eq!(FieldCodec::SoftDelete.scan_kind(), ScanKind::Integer);
        assert_eq!(FieldCodec::Float { nullable: true }.scan_kind(), ScanKind::Float);
    }
}
