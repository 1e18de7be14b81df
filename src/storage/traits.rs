// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

use async_trait::async_trait;
use thiserror::Error;

use crate::reindex::IndexerEvent;
use crate::schema::codec::RawValue;
use crate::schema::ScanStatement;

/// Error taxonomy for the search layer.
///
/// Configuration and validation failures are raised before any network
/// round-trip. Protocol errors carry the engine's message unmodified.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SearchError {
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Invalid search request: {0}")]
    Validation(String),
    #[error("{0}")]
    Protocol(String),
    #[error("unknown index {index} in pool {pool}")]
    UnknownIndex { index: String, pool: String },
    #[error("loop detected in indexer for index {index} in pool {pool}")]
    LoopDetected { index: String, pool: String },
    #[error("reindex of index {index} in pool {pool} is already running")]
    ReindexInProgress { index: String, pool: String },
    #[error("Record source error: {0}")]
    Source(String),
    #[error("Connection error: {0}")]
    Connection(String),
}

impl SearchError {
    /// True for the engine's "index does not exist" replies.
    pub fn is_unknown_index(&self) -> bool {
        match self {
            SearchError::Protocol(msg) => {
                let msg = msg.to_ascii_lowercase();
                msg.contains("unknown index") || msg.contains("no such index")
            }
            SearchError::UnknownIndex { .. } => true,
            _ => false,
        }
    }
}

/// Transport-neutral reply tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Nil,
    Int(i64),
    Double(f64),
    Text(String),
    Array(Vec<Reply>),
}

impl Reply {
    pub fn text(value: impl Into<String>) -> Self {
        Reply::Text(value.into())
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Reply::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Reply]> {
        match self {
            Reply::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Integer view; RESP2 engines send most numbers as bulk strings.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Reply::Int(v) => Some(*v),
            Reply::Double(v) if v.is_finite() => Some(*v as i64),
            Reply::Text(s) => s.parse().ok().or_else(|| s.parse::<f64>().ok().filter(|f| f.is_finite()).map(|f| f as i64)),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Reply::Int(v) => Some(*v as f64),
            Reply::Double(v) => Some(*v),
            Reply::Text(s) => s.parse().ok(),
            _ => None,
        }
    }

    /// Scalar rendered as a string (numbers included).
    pub fn to_text(&self) -> Option<String> {
        match self {
            Reply::Text(s) => Some(s.clone()),
            Reply::Int(v) => Some(v.to_string()),
            Reply::Double(v) => Some(v.to_string()),
            _ => None,
        }
    }
}

impl From<redis::Value> for Reply {
    fn from(value: redis::Value) -> Self {
        match value {
            redis::Value::Nil => Reply::Nil,
            redis::Value::Int(v) => Reply::Int(v),
            redis::Value::Double(v) => Reply::Double(v),
            redis::Value::Boolean(b) => Reply::Int(i64::from(b)),
            redis::Value::Okay => Reply::Text("OK".to_string()),
            redis::Value::SimpleString(s) => Reply::Text(s),
            redis::Value::BulkString(bytes) => Reply::Text(String::from_utf8_lossy(&bytes).into_owned()),
            redis::Value::VerbatimString { text, .. } => Reply::Text(text),
            redis::Value::Array(items) | redis::Value::Set(items) => {
                Reply::Array(items.into_iter().map(Reply::from).collect())
            }
            // RESP3 maps flatten to the RESP2 alternating layout
            redis::Value::Map(pairs) => Reply::Array(
                pairs
                    .into_iter()
                    .flat_map(|(k, v)| [Reply::from(k), Reply::from(v)])
                    .collect(),
            ),
            redis::Value::Attribute { data, .. } => Reply::from(*data),
            other => Reply::Text(format!("{:?}", other)),
        }
    }
}

/// Command sink toward one engine pool.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    /// Pool code this backend talks to.
    fn pool(&self) -> &str;

    /// Logical database number of the connection.
    fn database(&self) -> i64 {
        0
    }

    /// Execute a single command; `args[0]` is the command name.
    async fn execute(&self, args: &[String]) -> Result<Reply, SearchError>;

    /// Execute commands in one round-trip.
    /// Default implementation falls back to sequential execution.
    async fn execute_pipeline(&self, commands: &[Vec<String>]) -> Result<(), SearchError> {
        for command in commands {
            self.execute(command).await?;
        }
        Ok(())
    }
}

/// One row of a system-of-record page, values positional to the
/// statement's columns.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceRow {
    pub id: u64,
    pub values: Vec<RawValue>,
}

/// Paged reader over the system of record.
#[async_trait]
pub trait RecordSource: Send + Sync {
    /// Rows with primary key greater than `after_id`, ascending, at most
    /// `statement.page_size` of them.
    async fn scan(&self, statement: &ScanStatement, after_id: u64) -> Result<Vec<SourceRow>, SearchError>;
}

/// Sink for reindex trigger events consumed out of process.
#[async_trait]
pub trait IndexerEventPublisher: Send + Sync {
    async fn publish(&self, channel: &str, event: &IndexerEvent) -> Result<(), SearchError>;
}
