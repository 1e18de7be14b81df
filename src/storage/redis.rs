// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Redis engine backend.
//!
//! Commands go out as raw `redis::cmd` argument lists over a shared
//! [`ConnectionManager`]; buffered document writes go out as one
//! `redis::pipe`. Only the initial connection is retried. Engine errors
//! are handed back with their original message so callers can match on
//! them (for example "Unknown Index name").

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{cmd, pipe, Client};
use tracing::debug;

use super::traits::{IndexerEventPublisher, Reply, SearchBackend, SearchError};
use crate::metrics;
use crate::reindex::IndexerEvent;
use crate::resilience::retry::{retry, RetryConfig};

/// Server errors are rebuilt as `<code> <detail>`, the way the engine sent them.
fn protocol_error(e: redis::RedisError) -> SearchError {
    match (e.code(), e.detail()) {
        (Some(code), Some(detail)) => SearchError::Protocol(format!("{} {}", code, detail)),
        (Some(code), None) => SearchError::Protocol(code.to_string()),
        _ => SearchError::Protocol(e.to_string()),
    }
}

pub struct RedisSearchBackend {
    connection: ConnectionManager,
    pool: String,
    database: i64,
}

impl RedisSearchBackend {
    /// Connect with startup-mode retry.
    pub async fn connect(connection_string: &str, pool: &str) -> Result<Self, SearchError> {
        let client = Client::open(connection_string).map_err(|e| SearchError::Config(e.to_string()))?;
        let database = client.get_connection_info().redis.db;

        // Use startup config: fast-fail, don't hang forever
        let connection = retry("redis_connect", &RetryConfig::startup(), || async {
            ConnectionManager::new(client.clone()).await
        })
        .await
        .map_err(|e: redis::RedisError| SearchError::Connection(e.to_string()))?;

        debug!(pool, database, "Connected search backend");
        Ok(Self {
            connection,
            pool: pool.to_string(),
            database,
        })
    }

    /// Get a clone of the connection manager (for sharing with the publisher)
    pub fn connection(&self) -> ConnectionManager {
        self.connection.clone()
    }

    fn build(args: &[String]) -> Result<redis::Cmd, SearchError> {
        let (name, rest) = args
            .split_first()
            .ok_or_else(|| SearchError::Validation("empty command".to_string()))?;
        let mut command = cmd(name);
        for arg in rest {
            command.arg(arg);
        }
        Ok(command)
    }
}

#[async_trait]
impl SearchBackend for RedisSearchBackend {
    fn pool(&self) -> &str {
        &self.pool
    }

    fn database(&self) -> i64 {
        self.database
    }

    async fn execute(&self, args: &[String]) -> Result<Reply, SearchError> {
        let command = Self::build(args)?;
        let name = args[0].as_str();
        let mut conn = self.connection.clone();

        let _timer = metrics::LatencyTimer::new(&self.pool, name);
        match command.query_async::<redis::Value>(&mut conn).await {
            Ok(value) => {
                metrics::record_command(&self.pool, name, "success");
                Ok(Reply::from(value))
            }
            Err(e) => {
                metrics::record_command(&self.pool, name, "error");
                Err(protocol_error(e))
            }
        }
    }

    async fn execute_pipeline(&self, commands: &[Vec<String>]) -> Result<(), SearchError> {
        if commands.is_empty() {
            return Ok(());
        }
        let mut pipeline = pipe();
        for args in commands {
            pipeline.add_command(Self::build(args)?).ignore();
        }
        let mut conn = self.connection.clone();
        pipeline.query_async::<()>(&mut conn).await.map_err(protocol_error)
    }
}

/// Appends indexer events to a Redis stream (`XADD`).
pub struct RedisStreamPublisher {
    connection: ConnectionManager,
}

impl RedisStreamPublisher {
    pub fn new(connection: ConnectionManager) -> Self {
        Self { connection }
    }
}

#[async_trait]
impl IndexerEventPublisher for RedisStreamPublisher {
    async fn publish(&self, channel: &str, event: &IndexerEvent) -> Result<(), SearchError> {
        let payload = serde_json::to_string(event).map_err(|e| SearchError::Validation(e.to_string()))?;
        let mut conn = self.connection.clone();
        let _: String = cmd("XADD")
            .arg(channel)
            .arg("*")
            .arg("s")
            .arg(&payload)
            .query_async(&mut conn)
            .await
            .map_err(protocol_error)?;
        debug!(channel, index = %event.index, "Published indexer event");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_command() {
        let command = RedisSearchBackend::build(&["FT.INFO".to_string(), "users".to_string()]).unwrap();
        let packed = String::from_utf8(command.get_packed_command()).unwrap();
        assert!(packed.contains("FT.INFO"));
        assert!(packed.contains("users"));
    }

    #[test]
    fn test_empty_command_rejected() {
        assert!(matches!(
            RedisSearchBackend::build(&[]),
            Err(SearchError::Validation(_))
        ));
    }
}
