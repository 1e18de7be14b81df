// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Metrics instrumentation for redisearch-sync.
//!
//! Uses the `metrics` crate for backend-agnostic metrics collection.
//! The host application is responsible for choosing the exporter (Prometheus, OTEL, etc.)
//!
//! # Metric Naming Convention
//! - `redisearch_sync_` prefix for all metrics
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Labels
//! - `pool`: engine pool code
//! - `command`: FT.SEARCH, FT.CREATE, HSET, ...
//! - `status`: success, error

use metrics::{counter, histogram};
use std::time::{Duration, Instant};

/// Record one engine command
pub fn record_command(pool: &str, command: &str, status: &str) {
    counter!(
        "redisearch_sync_commands_total",
        "pool" => pool.to_string(),
        "command" => command.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record engine command latency
pub fn record_command_latency(pool: &str, command: &str, duration: Duration) {
    histogram!(
        "redisearch_sync_command_seconds",
        "pool" => pool.to_string(),
        "command" => command.to_string()
    )
    .record(duration.as_secs_f64());
}

/// Record the number of rows a search returned
pub fn record_search_results(index: &str, count: usize) {
    histogram!(
        "redisearch_sync_search_results",
        "index" => index.to_string()
    )
    .record(count as f64);
}

/// Record documents written or deleted by a pusher flush
pub fn record_documents_pushed(pool: &str, written: usize, deleted: usize) {
    counter!("redisearch_sync_documents_written_total", "pool" => pool.to_string()).increment(written as u64);
    counter!("redisearch_sync_documents_deleted_total", "pool" => pool.to_string()).increment(deleted as u64);
}

/// Record one reindex page
pub fn record_reindex_page(index: &str) {
    counter!(
        "redisearch_sync_reindex_pages_total",
        "index" => index.to_string()
    )
    .increment(1);
}

/// Record a finished reindex run
pub fn record_reindex_run(index: &str, success: bool) {
    let status = if success { "success" } else { "failure" };
    counter!(
        "redisearch_sync_reindex_runs_total",
        "index" => index.to_string(),
        "status" => status
    )
    .increment(1);
}

/// Record index alters found by drift detection
pub fn record_alters_detected(pool: &str, action: &str, count: usize) {
    counter!(
        "redisearch_sync_alters_detected_total",
        "pool" => pool.to_string(),
        "action" => action.to_string()
    )
    .increment(count as u64);
}

/// A timing guard that records command latency on drop
pub struct LatencyTimer {
    pool: String,
    command: String,
    start: Instant,
}

impl LatencyTimer {
    /// Start a new latency timer
    pub fn new(pool: &str, command: &str) -> Self {
        Self {
            pool: pool.to_string(),
            command: command.to_string(),
            start: Instant::now(),
        }
    }
}

impl Drop for LatencyTimer {
    fn drop(&mut self) {
        record_command_latency(&self.pool, &self.command, self.start.elapsed());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use metrics_util::debugging::{DebugValue, DebuggingRecorder};

    #[test]
    fn test_record_command() {
        record_command("default", "FT.SEARCH", "success");
        record_command("default", "FT.CREATE", "error");
    }

    #[test]
    fn test_document_and_reindex_metrics() {
        record_documents_pushed("default", 10, 2);
        record_reindex_page("users");
        record_reindex_run("users", true);
        record_reindex_run("users", false);
        record_alters_detected("default", "reindex", 3);
        record_search_results("users", 42);
    }

    #[test]
    fn test_latency_timer_records_on_drop() {
        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();

        metrics::with_local_recorder(&recorder, || {
            let _timer = LatencyTimer::new("default", "FT.INFO");
            std::thread::sleep(Duration::from_micros(10));
        });

        let snapshot = snapshotter.snapshot().into_vec();
        let recorded = snapshot.iter().any(|(key, _, _, value)| {
            key.key().name() == "redisearch_sync_command_seconds"
                && matches!(value, DebugValue::Histogram(samples) if samples.len() == 1)
        });
        assert!(recorded);
    }

    #[test]
    fn test_command_counter_labels() {
        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();

        metrics::with_local_recorder(&recorder, || {
            record_command("default", "HSET", "success");
            record_command("default", "HSET", "success");
        });

        let snapshot = snapshotter.snapshot().into_vec();
        let count = snapshot.iter().find_map(|(key, _, _, value)| {
            let labels: Vec<_> = key.key().labels().map(|l| (l.key(), l.value())).collect();
            (key.key().name() == "redisearch_sync_commands_total" && labels.contains(&("command", "HSET")))
                .then_some(value.clone())
        });
        assert_eq!(count, Some(&DebugValue::Counter(2)));
    }
}
