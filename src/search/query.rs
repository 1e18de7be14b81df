// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Search Query - typed filter set
//!
//! A [`SearchQuery`] collects free text, typed filter groups and request
//! options. It is compiled into `FT.SEARCH` arguments by
//! [`QueryCompiler`](super::QueryCompiler).
//!
//! # Example
//!
//! ```rust
//! use redisearch_sync::search::{Pager, SearchQuery};
//!
//! let query = SearchQuery::new()
//!     .query("alice")
//!     .filter_int_min_max("Age", 25, 40)
//!     .filter_tag("Status", ["active", "pending"])
//!     .sort("Age", true);
//!
//! let pager = Pager::new(1, 100);
//! ```
//!
//! Every literal is escaped as it is added, so the stored groups are
//! ready to be concatenated into the query string.

use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveDateTime, Timelike};

use super::aggregate::Aggregation;
use super::escape;
use crate::schema::codec::{NULL_NUMBER, NULL_TOKEN};
use crate::storage::traits::SearchError;

/// Float bounds are widened by this much to absorb representation error.
const FLOAT_EPSILON: f64 = 0.00001;

const POS_INF: &str = "+inf";
const NEG_INF: &str = "-inf";

/// Page of results, 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pager {
    pub current_page: u32,
    pub page_size: u32,
}

impl Pager {
    pub fn new(current_page: u32, page_size: u32) -> Self {
        Self {
            current_page,
            page_size,
        }
    }

    /// Row offset of the first result of this page.
    pub fn offset(&self) -> u64 {
        u64::from(self.current_page.saturating_sub(1)) * u64::from(self.page_size)
    }
}

/// Distance unit of a geo filter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeoUnit {
    Meters,
    Kilometers,
    Miles,
    Feet,
}

impl std::fmt::Display for GeoUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GeoUnit::Meters => write!(f, "m"),
            GeoUnit::Kilometers => write!(f, "km"),
            GeoUnit::Miles => write!(f, "mi"),
            GeoUnit::Feet => write!(f, "ft"),
        }
    }
}

/// Radius filter around a point
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoFilter {
    pub lon: f64,
    pub lat: f64,
    pub radius: f64,
    pub unit: GeoUnit,
}

/// Typed search request.
///
/// Filter groups are keyed by field name in sorted maps; values within a
/// field keep insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchQuery {
    pub(crate) query: String,
    /// Per field: `(min, max)` bounds, already rendered (`(` marks exclusive).
    pub(crate) numeric: BTreeMap<String, Vec<(String, String)>>,
    pub(crate) not_numeric: BTreeMap<String, Vec<String>>,
    pub(crate) tags: BTreeMap<String, Vec<Vec<String>>>,
    pub(crate) not_tags: BTreeMap<String, Vec<Vec<String>>>,
    pub(crate) strings: BTreeMap<String, Vec<Vec<String>>>,
    pub(crate) not_strings: BTreeMap<String, Vec<Vec<String>>>,
    pub(crate) geo: BTreeMap<String, GeoFilter>,
    pub(crate) in_keys: Vec<String>,
    pub(crate) in_fields: Vec<String>,
    pub(crate) return_fields: Vec<String>,
    pub(crate) sort: Option<(String, bool)>,
    pub(crate) verbatim: bool,
    pub(crate) no_stop_words: bool,
    pub(crate) with_scores: bool,
    pub(crate) slop: Option<u32>,
    pub(crate) in_order: bool,
    pub(crate) lang: Option<String>,
    pub(crate) explain_score: bool,
    pub(crate) highlight: Option<Vec<String>>,
    pub(crate) highlight_tags: Option<(String, String)>,
    pub(crate) summarize: Option<Vec<String>>,
    pub(crate) summarize_separator: String,
    pub(crate) summarize_frags: u32,
    pub(crate) summarize_len: u32,
    pub(crate) with_soft_deleted: bool,
    /// Marker field whose `true` rows are excluded, set by the record-level API.
    pub(crate) soft_delete_field: Option<String>,
    /// First builder error, surfaced by the compiler before any I/O.
    pub(crate) deferred_error: Option<SearchError>,
}

fn cut_date(date: NaiveDate) -> i64 {
    date.and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc().timestamp())
        .unwrap_or_default()
}

fn cut_date_time(date_time: NaiveDateTime) -> i64 {
    date_time
        .with_nanosecond(0)
        .unwrap_or(date_time)
        .and_utc()
        .timestamp()
}

fn exclusive(value: impl std::fmt::Display) -> String {
    format!("({}", value)
}

fn escape_tags<I, S>(values: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    values
        .into_iter()
        .map(|v| match v.as_ref() {
            "" => NULL_TOKEN.to_string(),
            v => escape(v),
        })
        .collect()
}

#[derive(Clone, Copy)]
enum StringMode {
    Phrase,
    Term,
    Prefix,
}

impl SearchQuery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Free text, escaped.
    pub fn query(mut self, text: &str) -> Self {
        self.query = escape(text);
        self
    }

    /// Free text in raw query syntax, not escaped.
    pub fn query_raw(mut self, text: impl Into<String>) -> Self {
        self.query = text.into();
        self
    }

    pub fn append_query_raw(mut self, text: &str) -> Self {
        self.query.push_str(text);
        self
    }

    /// Include rows flagged by the soft-delete marker.
    pub fn with_soft_deleted_rows(mut self) -> Self {
        self.with_soft_deleted = true;
        self
    }

    fn numeric_range(mut self, field: &str, min: String, max: String) -> Self {
        self.numeric.entry(field.to_string()).or_default().push((min, max));
        self
    }

    fn not_numeric(mut self, field: &str, value: String) -> Self {
        self.not_numeric.entry(field.to_string()).or_default().push(value);
        self
    }

    // Signed integers

    pub fn filter_int_min_max(self, field: &str, min: i64, max: i64) -> Self {
        self.numeric_range(field, min.to_string(), max.to_string())
    }

    pub fn filter_int(self, field: &str, values: impl IntoIterator<Item = i64>) -> Self {
        values
            .into_iter()
            .fold(self, |q, v| q.filter_int_min_max(field, v, v))
    }

    pub fn filter_not_int(self, field: &str, values: impl IntoIterator<Item = i64>) -> Self {
        values
            .into_iter()
            .fold(self, |q, v| q.not_numeric(field, v.to_string()))
    }

    pub fn filter_int_null(self, field: &str) -> Self {
        self.filter_int(field, [NULL_NUMBER])
    }

    pub fn filter_not_int_null(self, field: &str) -> Self {
        self.filter_not_int(field, [NULL_NUMBER])
    }

    pub fn filter_int_greater_equal(self, field: &str, value: i64) -> Self {
        self.numeric_range(field, value.to_string(), POS_INF.to_string())
    }

    pub fn filter_int_greater(self, field: &str, value: i64) -> Self {
        self.numeric_range(field, exclusive(value), POS_INF.to_string())
    }

    pub fn filter_int_less_equal(self, field: &str, value: i64) -> Self {
        self.numeric_range(field, NEG_INF.to_string(), value.to_string())
    }

    pub fn filter_int_less(self, field: &str, value: i64) -> Self {
        self.numeric_range(field, NEG_INF.to_string(), exclusive(value))
    }

    // Unsigned integers

    pub fn filter_uint_min_max(self, field: &str, min: u64, max: u64) -> Self {
        self.numeric_range(field, min.to_string(), max.to_string())
    }

    pub fn filter_uint(self, field: &str, values: impl IntoIterator<Item = u64>) -> Self {
        values
            .into_iter()
            .fold(self, |q, v| q.filter_uint_min_max(field, v, v))
    }

    pub fn filter_uint_null(self, field: &str) -> Self {
        self.filter_int_null(field)
    }

    pub fn filter_uint_greater_equal(self, field: &str, value: u64) -> Self {
        self.numeric_range(field, value.to_string(), POS_INF.to_string())
    }

    pub fn filter_uint_greater(self, field: &str, value: u64) -> Self {
        self.numeric_range(field, exclusive(value), POS_INF.to_string())
    }

    pub fn filter_uint_less_equal(self, field: &str, value: u64) -> Self {
        self.numeric_range(field, NEG_INF.to_string(), value.to_string())
    }

    pub fn filter_uint_less(self, field: &str, value: u64) -> Self {
        self.numeric_range(field, NEG_INF.to_string(), exclusive(value))
    }

    // Floats, widened by FLOAT_EPSILON

    pub fn filter_float_min_max(self, field: &str, min: f64, max: f64) -> Self {
        self.numeric_range(
            field,
            (min - FLOAT_EPSILON).to_string(),
            (max + FLOAT_EPSILON).to_string(),
        )
    }

    pub fn filter_float(self, field: &str, values: impl IntoIterator<Item = f64>) -> Self {
        values
            .into_iter()
            .fold(self, |q, v| q.filter_float_min_max(field, v, v))
    }

    pub fn filter_float_null(self, field: &str) -> Self {
        self.filter_float(field, [NULL_NUMBER as f64])
    }

    pub fn filter_float_greater_equal(self, field: &str, value: f64) -> Self {
        self.numeric_range(field, (value - FLOAT_EPSILON).to_string(), POS_INF.to_string())
    }

    pub fn filter_float_greater(self, field: &str, value: f64) -> Self {
        self.numeric_range(field, exclusive(value + FLOAT_EPSILON), POS_INF.to_string())
    }

    pub fn filter_float_less_equal(self, field: &str, value: f64) -> Self {
        self.numeric_range(field, NEG_INF.to_string(), (value + FLOAT_EPSILON).to_string())
    }

    pub fn filter_float_less(self, field: &str, value: f64) -> Self {
        self.numeric_range(field, NEG_INF.to_string(), exclusive(value - FLOAT_EPSILON))
    }

    // Dates, truncated to midnight UTC

    pub fn filter_date_min_max(self, field: &str, min: NaiveDate, max: NaiveDate) -> Self {
        self.filter_int_min_max(field, cut_date(min), cut_date(max))
    }

    pub fn filter_date(self, field: &str, date: NaiveDate) -> Self {
        let day = cut_date(date);
        self.filter_int_min_max(field, day, day)
    }

    pub fn filter_not_date(self, field: &str, date: NaiveDate) -> Self {
        self.not_numeric(field, cut_date(date).to_string())
    }

    pub fn filter_date_null(self, field: &str) -> Self {
        self.filter_int_null(field)
    }

    pub fn filter_not_date_null(self, field: &str) -> Self {
        self.filter_not_int_null(field)
    }

    pub fn filter_date_greater_equal(self, field: &str, date: NaiveDate) -> Self {
        self.filter_int_greater_equal(field, cut_date(date))
    }

    pub fn filter_date_greater(self, field: &str, date: NaiveDate) -> Self {
        self.filter_int_greater(field, cut_date(date))
    }

    pub fn filter_date_less_equal(self, field: &str, date: NaiveDate) -> Self {
        self.filter_int_less_equal(field, cut_date(date))
    }

    pub fn filter_date_less(self, field: &str, date: NaiveDate) -> Self {
        self.filter_int_less(field, cut_date(date))
    }

    // Date-times, truncated to the second

    pub fn filter_date_time_min_max(self, field: &str, min: NaiveDateTime, max: NaiveDateTime) -> Self {
        self.filter_int_min_max(field, cut_date_time(min), cut_date_time(max))
    }

    pub fn filter_date_time(self, field: &str, date_time: NaiveDateTime) -> Self {
        let second = cut_date_time(date_time);
        self.filter_int_min_max(field, second, second)
    }

    pub fn filter_date_time_null(self, field: &str) -> Self {
        self.filter_int_null(field)
    }

    pub fn filter_date_time_greater_equal(self, field: &str, date_time: NaiveDateTime) -> Self {
        self.filter_int_greater_equal(field, cut_date_time(date_time))
    }

    pub fn filter_date_time_greater(self, field: &str, date_time: NaiveDateTime) -> Self {
        self.filter_int_greater(field, cut_date_time(date_time))
    }

    pub fn filter_date_time_less_equal(self, field: &str, date_time: NaiveDateTime) -> Self {
        self.filter_int_less_equal(field, cut_date_time(date_time))
    }

    pub fn filter_date_time_less(self, field: &str, date_time: NaiveDateTime) -> Self {
        self.filter_int_less(field, cut_date_time(date_time))
    }

    // Tags

    /// Match any of the tags; `""` matches absent values.
    pub fn filter_tag<I, S>(mut self, field: &str, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.tags.entry(field.to_string()).or_default().push(escape_tags(tags));
        self
    }

    pub fn filter_not_tag<I, S>(mut self, field: &str, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.not_tags.entry(field.to_string()).or_default().push(escape_tags(tags));
        self
    }

    pub fn filter_bool(self, field: &str, value: bool) -> Self {
        self.filter_tag(field, [if value { "true" } else { "false" }])
    }

    // Text

    fn string_group<I, S>(mut self, field: &str, mode: StringMode, negate: bool, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut group = Vec::new();
        for value in values {
            let value = value.as_ref();
            if value.is_empty() {
                group.push(format!("\"{}\"", NULL_TOKEN));
                continue;
            }
            match mode {
                StringMode::Phrase => group.push(format!("\"{}\"", escape(value))),
                StringMode::Term => group.push(escape(value)),
                StringMode::Prefix => {
                    let tokens: Vec<String> = value
                        .trim_matches(' ')
                        .split(' ')
                        .filter(|token| token.chars().count() >= 2)
                        .map(|token| format!("{}*", escape(token)))
                        .collect();
                    if tokens.is_empty() {
                        if self.deferred_error.is_none() {
                            self.deferred_error = Some(SearchError::Validation(
                                "search start with requires min one word with 2 characters".to_string(),
                            ));
                        }
                        return self;
                    }
                    group.push(tokens.join(" "));
                }
            }
        }

        if group.is_empty() {
            return self;
        }

        let target = if negate {
            &mut self.not_strings
        } else {
            &mut self.strings
        };
        target.entry(field.to_string()).or_default().push(group);
        self
    }

    /// Exact phrase match on a TEXT field; `""` matches absent values.
    pub fn filter_string<I, S>(self, field: &str, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.string_group(field, StringMode::Phrase, false, values)
    }

    pub fn filter_not_string<I, S>(self, field: &str, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.string_group(field, StringMode::Phrase, true, values)
    }

    /// Term match on a TEXT field.
    pub fn query_field<I, S>(self, field: &str, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.string_group(field, StringMode::Term, false, values)
    }

    /// Prefix match: every token of at least two characters becomes `token*`.
    pub fn query_field_prefix_match<I, S>(self, field: &str, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.string_group(field, StringMode::Prefix, false, values)
    }

    /// Records whose reference collection contains any of the ids.
    pub fn filter_many_reference_in(self, field: &str, ids: impl IntoIterator<Item = u64>) -> Self {
        let tokens: Vec<String> = ids.into_iter().map(|id| format!("e{}", id)).collect();
        self.string_group(field, StringMode::Term, false, tokens)
    }

    pub fn filter_many_reference_not_in(self, field: &str, ids: impl IntoIterator<Item = u64>) -> Self {
        let tokens: Vec<String> = ids.into_iter().map(|id| format!("e{}", id)).collect();
        self.string_group(field, StringMode::Term, true, tokens)
    }

    // Geo

    pub fn filter_geo(mut self, field: &str, lon: f64, lat: f64, radius: f64, unit: GeoUnit) -> Self {
        self.geo.insert(
            field.to_string(),
            GeoFilter {
                lon,
                lat,
                radius,
                unit,
            },
        );
        self
    }

    // Options

    pub fn sort(mut self, field: &str, desc: bool) -> Self {
        self.sort = Some((field.to_string(), desc));
        self
    }

    pub fn verbatim(mut self) -> Self {
        self.verbatim = true;
        self
    }

    pub fn no_stop_words(mut self) -> Self {
        self.no_stop_words = true;
        self
    }

    pub fn with_scores(mut self) -> Self {
        self.with_scores = true;
        self
    }

    pub fn in_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.in_keys.extend(keys.into_iter().map(Into::into));
        self
    }

    pub fn in_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.in_fields.extend(fields.into_iter().map(Into::into));
        self
    }

    pub fn return_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.return_fields.extend(fields.into_iter().map(Into::into));
        self
    }

    pub fn slop(mut self, slop: u32) -> Self {
        self.slop = Some(slop);
        self
    }

    pub fn in_order(mut self) -> Self {
        self.in_order = true;
        self
    }

    pub fn lang(mut self, lang: impl Into<String>) -> Self {
        self.lang = Some(lang.into());
        self
    }

    pub fn explain_score(mut self) -> Self {
        self.explain_score = true;
        self
    }

    /// Highlight matches; no fields means all fields.
    pub fn highlight<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.highlight
            .get_or_insert_with(Vec::new)
            .extend(fields.into_iter().map(Into::into));
        self
    }

    pub fn highlight_tags(mut self, open: impl Into<String>, close: impl Into<String>) -> Self {
        self.highlight_tags = Some((open.into(), close.into()));
        self
    }

    /// Summarize matches; no fields means all fields.
    pub fn summarize<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.summarize
            .get_or_insert_with(Vec::new)
            .extend(fields.into_iter().map(Into::into));
        self
    }

    pub fn summarize_options(mut self, separator: impl Into<String>, frags: u32, len: u32) -> Self {
        self.summarize_separator = separator.into();
        self.summarize_frags = frags;
        self.summarize_len = len;
        self
    }

    /// Start an aggregation pipeline over this query.
    pub fn aggregate(self) -> Aggregation {
        Aggregation::new(self)
    }

    /// Field names referenced by any filter, sorted and deduplicated.
    pub fn filtered_fields(&self) -> Vec<&str> {
        let mut fields: Vec<&str> = self
            .numeric
            .keys()
            .chain(self.not_numeric.keys())
            .chain(self.tags.keys())
            .chain(self.not_tags.keys())
            .chain(self.strings.keys())
            .chain(self.not_strings.keys())
            .chain(self.geo.keys())
            .map(String::as_str)
            .collect();
        fields.sort_unstable();
        fields.dedup();
        fields
    }
}
