// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Aggregation pipeline.
//!
//! Steps are emitted in construction order; nothing is reordered.
//!
//! ```text
//! FT.AGGREGATE idx "*"
//!   GROUPBY 1 @Int REDUCE SUM 1 @Float AS total
//!   SORTBY 2 @total DESC
//!   LIMIT 0 10
//! ```

use super::query::SearchQuery;

/// One reduce function inside a GROUPBY step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reducer {
    function: String,
    args: Vec<String>,
    alias: String,
}

impl Reducer {
    fn new(function: &str, args: Vec<String>, alias: &str) -> Self {
        Self {
            function: function.to_string(),
            args,
            alias: alias.to_string(),
        }
    }

    pub fn count(alias: &str) -> Self {
        Self::new("COUNT", Vec::new(), alias)
    }

    /// `COUNT_DISTINCT`, or the approximate `COUNT_DISTINCTISH`.
    pub fn count_distinct(property: &str, alias: &str, approximate: bool) -> Self {
        let function = if approximate {
            "COUNT_DISTINCTISH"
        } else {
            "COUNT_DISTINCT"
        };
        Self::new(function, vec![property.to_string()], alias)
    }

    pub fn sum(property: &str, alias: &str) -> Self {
        Self::new("SUM", vec![property.to_string()], alias)
    }

    pub fn min(property: &str, alias: &str) -> Self {
        Self::new("MIN", vec![property.to_string()], alias)
    }

    pub fn max(property: &str, alias: &str) -> Self {
        Self::new("MAX", vec![property.to_string()], alias)
    }

    pub fn avg(property: &str, alias: &str) -> Self {
        Self::new("AVG", vec![property.to_string()], alias)
    }

    pub fn stddev(property: &str, alias: &str) -> Self {
        Self::new("STDDEV", vec![property.to_string()], alias)
    }

    pub fn quantile(property: &str, quantile: &str, alias: &str) -> Self {
        Self::new("QUANTILE", vec![property.to_string(), quantile.to_string()], alias)
    }

    pub fn to_list(property: &str, alias: &str) -> Self {
        Self::new("TOLIST", vec![property.to_string()], alias)
    }

    pub fn first_value(property: &str, alias: &str) -> Self {
        Self::new("FIRST_VALUE", vec![property.to_string()], alias)
    }

    pub fn first_value_by(property: &str, by: &str, alias: &str, desc: bool) -> Self {
        let order = if desc { "DESC" } else { "ASC" };
        Self::new(
            "FIRST_VALUE",
            vec![property.to_string(), "BY".to_string(), by.to_string(), order.to_string()],
            alias,
        )
    }

    /// Sample size defaults to 1.
    pub fn random_sample(property: &str, alias: &str, size: Option<u32>) -> Self {
        let size = size.unwrap_or(1).to_string();
        Self::new("RANDOM_SAMPLE", vec![property.to_string(), size], alias)
    }

    fn write_args(&self, args: &mut Vec<String>) {
        args.push("REDUCE".to_string());
        args.push(self.function.clone());
        args.push(self.args.len().to_string());
        args.extend(self.args.iter().cloned());
        args.push("AS".to_string());
        args.push(self.alias.clone());
    }
}

/// Sort key of a SORTBY step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    pub field: String,
    pub desc: bool,
}

impl SortKey {
    pub fn asc(field: &str) -> Self {
        Self {
            field: field.to_string(),
            desc: false,
        }
    }

    pub fn desc(field: &str) -> Self {
        Self {
            field: field.to_string(),
            desc: true,
        }
    }
}

/// Field list of a LOAD step.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadFields {
    args: Vec<String>,
}

impl LoadFields {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_field(mut self, field: &str) -> Self {
        self.args.push(field.to_string());
        self
    }

    pub fn add_field_with_alias(mut self, field: &str, alias: &str) -> Self {
        self.args.push(field.to_string());
        self.args.push("AS".to_string());
        self.args.push(alias.to_string());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AggregateStep {
    GroupBy {
        fields: Vec<String>,
        reducers: Vec<Reducer>,
    },
    SortBy(Vec<SortKey>),
    Load(LoadFields),
    LoadAll,
    Apply {
        expression: String,
        alias: String,
    },
    Filter(String),
}

impl AggregateStep {
    fn write_args(&self, args: &mut Vec<String>) {
        match self {
            AggregateStep::GroupBy { fields, reducers } => {
                args.push("GROUPBY".to_string());
                args.push(fields.len().to_string());
                args.extend(fields.iter().cloned());
                for reducer in reducers {
                    reducer.write_args(args);
                }
            }
            AggregateStep::SortBy(keys) => {
                args.push("SORTBY".to_string());
                args.push((keys.len() * 2).to_string());
                for key in keys {
                    args.push(key.field.clone());
                    args.push(if key.desc { "DESC" } else { "ASC" }.to_string());
                }
            }
            AggregateStep::Load(fields) => {
                args.push("LOAD".to_string());
                args.push(fields.args.len().to_string());
                args.extend(fields.args.iter().cloned());
            }
            AggregateStep::LoadAll => {
                args.push("LOAD".to_string());
                args.push("*".to_string());
            }
            AggregateStep::Apply { expression, alias } => {
                args.push("APPLY".to_string());
                args.push(expression.clone());
                args.push("AS".to_string());
                args.push(alias.clone());
            }
            AggregateStep::Filter(expression) => {
                args.push("FILTER".to_string());
                args.push(expression.clone());
            }
        }
    }
}

/// Query plus ordered pipeline steps.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Aggregation {
    pub(crate) query: SearchQuery,
    pub(crate) steps: Vec<AggregateStep>,
}

impl Aggregation {
    pub fn new(query: SearchQuery) -> Self {
        Self {
            query,
            steps: Vec::new(),
        }
    }

    pub fn group_by_field(self, field: &str, reducers: Vec<Reducer>) -> Self {
        self.group_by_fields(&[field], reducers)
    }

    pub fn group_by_fields(mut self, fields: &[&str], reducers: Vec<Reducer>) -> Self {
        self.steps.push(AggregateStep::GroupBy {
            fields: fields.iter().map(|f| f.to_string()).collect(),
            reducers,
        });
        self
    }

    pub fn sort(mut self, keys: Vec<SortKey>) -> Self {
        self.steps.push(AggregateStep::SortBy(keys));
        self
    }

    pub fn load(mut self, fields: LoadFields) -> Self {
        self.steps.push(AggregateStep::Load(fields));
        self
    }

    pub fn load_all(mut self) -> Self {
        self.steps.push(AggregateStep::LoadAll);
        self
    }

    pub fn apply(mut self, expression: &str, alias: &str) -> Self {
        self.steps.push(AggregateStep::Apply {
            expression: expression.to_string(),
            alias: alias.to_string(),
        });
        self
    }

    pub fn filter(mut self, expression: &str) -> Self {
        self.steps.push(AggregateStep::Filter(expression.to_string()));
        self
    }

    pub fn query(&self) -> &SearchQuery {
        &self.query
    }

    pub(crate) fn query_mut(&mut self) -> &mut SearchQuery {
        &mut self.query
    }

    /// Pipeline arguments, without the query string and LIMIT.
    pub fn step_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        for step in &self.steps {
            step.write_args(&mut args);
        }
        args
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_by_with_reducers() {
        let agg = SearchQuery::new().aggregate().group_by_field(
            "@Int",
            vec![Reducer::sum("@Float", "total"), Reducer::count("cnt")],
        );
        assert_eq!(
            agg.step_args().join(" "),
            "GROUPBY 1 @Int REDUCE SUM 1 @Float AS total REDUCE COUNT 0 AS cnt"
        );
    }

    #[test]
    fn test_steps_keep_construction_order() {
        let agg = Aggregation::new(SearchQuery::new())
            .filter("@Int > 1")
            .apply("@Int * 2", "double")
            .sort(vec![SortKey::desc("@double"), SortKey::asc("@Int")])
            .load_all();
        assert_eq!(
            agg.step_args().join(" "),
            "FILTER @Int > 1 APPLY @Int * 2 AS double SORTBY 4 @double DESC @Int ASC LOAD *"
        );
    }

    #[test]
    fn test_load_counts_alias_tokens() {
        let fields = LoadFields::new().add_field("@A").add_field_with_alias("@B", "b");
        let agg = Aggregation::new(SearchQuery::new()).load(fields);
        assert_eq!(agg.step_args().join(" "), "LOAD 4 @A @B AS b");
    }

    #[test]
    fn test_reducer_arguments() {
        let agg = Aggregation::new(SearchQuery::new()).group_by_fields(
            &["@A", "@B"],
            vec![
                Reducer::count_distinct("@C", "c", true),
                Reducer::quantile("@D", "0.5", "median"),
                Reducer::first_value_by("@E", "@F", "first", true),
                Reducer::random_sample("@G", "sample", None),
            ],
        );
        assert_eq!(
            agg.step_args().join(" "),
            "GROUPBY 2 @A @B REDUCE COUNT_DISTINCTISH 1 @C AS c REDUCE QUANTILE 2 @D 0.5 AS median \
             REDUCE FIRST_VALUE 4 @E BY @F DESC AS first REDUCE RANDOM_SAMPLE 2 @G 1 AS sample"
        );
    }
}
