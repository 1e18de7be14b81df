// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! SQL system of record (MySQL or SQLite through the sqlx `Any` driver).
//!
//! Runs the compiled [`ScanStatement`] with the last seen id bound to its
//! single placeholder. Column values are read according to their
//! [`ScanKind`]; drivers that report booleans or floats as integers fall
//! back to the integer read.

use std::sync::Once;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::any::{AnyPoolOptions, AnyRow};
use sqlx::{AnyPool, Row};
use tracing::debug;

use super::traits::{RecordSource, SearchError, SourceRow};
use crate::resilience::retry::{retry, RetryConfig};
use crate::schema::{RawValue, ScanKind, ScanStatement};

// SQLx `Any` driver requires runtime installation
static INSTALL_DRIVERS: Once = Once::new();

fn install_drivers() {
    INSTALL_DRIVERS.call_once(|| {
        sqlx::any::install_default_drivers();
    });
}

pub struct SqlRecordSource {
    pool: AnyPool,
}

fn source_error(e: sqlx::Error) -> SearchError {
    SearchError::Source(e.to_string())
}

fn read_integer(row: &AnyRow, i: usize) -> Result<RawValue, sqlx::Error> {
    Ok(row.try_get::<Option<i64>, _>(i)?.map_or(RawValue::Null, RawValue::Int))
}

fn read_text(row: &AnyRow, i: usize) -> Result<RawValue, sqlx::Error> {
    Ok(row.try_get::<Option<String>, _>(i)?.map_or(RawValue::Null, RawValue::Text))
}

fn read_value(row: &AnyRow, i: usize, kind: ScanKind) -> Result<RawValue, sqlx::Error> {
    match kind {
        ScanKind::Integer => read_integer(row, i).or_else(|_| read_text(row, i)),
        ScanKind::Float => row
            .try_get::<Option<f64>, _>(i)
            .map(|v| v.map_or(RawValue::Null, RawValue::Float))
            .or_else(|_| read_integer(row, i))
            .or_else(|_| read_text(row, i)),
        ScanKind::Bool => row
            .try_get::<Option<bool>, _>(i)
            .map(|v| v.map_or(RawValue::Null, RawValue::Bool))
            .or_else(|_| read_integer(row, i)),
        ScanKind::Text => read_text(row, i),
    }
}

impl SqlRecordSource {
    /// Connect with startup-mode retry (fails fast if config is wrong).
    pub async fn connect(connection_string: &str) -> Result<Self, SearchError> {
        install_drivers();

        // every in-memory SQLite connection is its own database
        let max_connections = if connection_string.starts_with("sqlite:") { 1 } else { 10 };

        let pool = retry("sql_connect", &RetryConfig::startup(), || async {
            AnyPoolOptions::new()
                .max_connections(max_connections)
                .acquire_timeout(Duration::from_secs(10))
                .idle_timeout(Duration::from_secs(300))
                .connect(connection_string)
                .await
                .map_err(|e| SearchError::Connection(e.to_string()))
        })
        .await?;

        Ok(Self { pool })
    }

    pub fn from_pool(pool: AnyPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> AnyPool {
        self.pool.clone()
    }

    fn decode_row(statement: &ScanStatement, row: &AnyRow) -> Result<SourceRow, SearchError> {
        let id: i64 = row.try_get(0).map_err(source_error)?;
        let id = u64::try_from(id).map_err(|_| SearchError::Source(format!("negative primary key {}", id)))?;
        let values = statement
            .columns
            .iter()
            .enumerate()
            .map(|(i, column)| read_value(row, i + 1, column.kind).map_err(source_error))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(SourceRow { id, values })
    }
}

#[async_trait]
impl RecordSource for SqlRecordSource {
    async fn scan(&self, statement: &ScanStatement, after_id: u64) -> Result<Vec<SourceRow>, SearchError> {
        let sql = statement.sql();
        let after = i64::try_from(after_id).map_err(|_| SearchError::Source(format!("id {} out of range", after_id)))?;

        let rows = retry("sql_scan", &RetryConfig::source_page(), || {
            let sql = sql.clone();
            async move { sqlx::query(&sql).bind(after).fetch_all(&self.pool).await }
        })
        .await
        .map_err(source_error)?;

        debug!(table = %statement.table, after_id, rows = rows.len(), "Scanned record page");
        rows.iter().map(|row| Self::decode_row(statement, row)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ScanColumn;

    async fn source_with_users() -> SqlRecordSource {
        let source = SqlRecordSource::connect("sqlite::memory:").await.unwrap();
        let pool = source.pool();
        sqlx::query(
            "CREATE TABLE users (ID INTEGER PRIMARY KEY, Name TEXT, Score REAL, Active INTEGER, \
             Born TEXT, FakeDelete INTEGER NOT NULL DEFAULT 0)",
        )
        .execute(&pool)
        .await
        .unwrap();
        for (id, name, deleted) in [(1, "ann", 0), (2, "bob", 1), (3, "cid", 0), (4, "dee", 0)] {
            sqlx::query("INSERT INTO users (ID, Name, Score, Active, Born, FakeDelete) VALUES (?, ?, 1.5, 1, '2024-03-01', ?)")
                .bind(id)
                .bind(name)
                .bind(deleted)
                .execute(&pool)
                .await
                .unwrap();
        }
        sqlx::query("INSERT INTO users (ID) VALUES (5)").execute(&pool).await.unwrap();
        source
    }

    fn statement(page_size: usize) -> ScanStatement {
        let column = |name: &str, kind, as_text| ScanColumn {
            name: name.into(),
            kind,
            as_text,
        };
        ScanStatement {
            table: "users".into(),
            columns: vec![
                column("Name", ScanKind::Text, false),
                column("Score", ScanKind::Float, false),
                column("Active", ScanKind::Bool, false),
                column("Born", ScanKind::Text, true),
            ],
            exclude_soft_deleted: Some("FakeDelete".into()),
            page_size,
        }
    }

    #[tokio::test]
    async fn test_scan_pages_skip_soft_deleted() {
        let source = source_with_users().await;

        let first = source.scan(&statement(2), 0).await.unwrap();
        assert_eq!(first.iter().map(|r| r.id).collect::<Vec<_>>(), vec![1, 3]);
        assert_eq!(first[0].values[0], RawValue::Text("ann".into()));
        assert_eq!(first[0].values[1], RawValue::Float(1.5));
        assert!(matches!(first[0].values[2], RawValue::Bool(true) | RawValue::Int(1)));
        assert_eq!(first[0].values[3], RawValue::Text("2024-03-01".into()));

        let second = source.scan(&statement(2), 3).await.unwrap();
        assert_eq!(second.iter().map(|r| r.id).collect::<Vec<_>>(), vec![4, 5]);
        assert_eq!(second[1].values, vec![RawValue::Null; 4]);
    }
}
