// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Batched document writes.
//!
//! [`DocumentPusher`] buffers `HSET` and `DEL` commands and sends them to
//! the engine as one pipeline. Keys are namespaced on the way in.
//!
//! ```text
//! new_document(key) → set_field(..)* → push_document()   ─┐
//! delete_documents(keys)                                  ─┼─→ buffer ─→ flush() ─→ pipeline
//!                                   flush_if_full() at threshold ────┘
//! ```

use std::sync::Arc;

use tracing::debug;

use crate::metrics;
use crate::search::{add_namespace, escape};
use crate::storage::traits::{SearchBackend, SearchError};

/// Default buffered command count before [`DocumentPusher::flush_if_full`] flushes.
pub const DEFAULT_FLUSH_THRESHOLD: usize = 10_000;

pub struct DocumentPusher {
    backend: Arc<dyn SearchBackend>,
    namespace: String,
    threshold: usize,
    commands: Vec<Vec<String>>,
    /// `HSET key field value ...` under construction
    current: Option<Vec<String>>,
    written: usize,
    deleted: usize,
}

impl DocumentPusher {
    pub fn new(backend: Arc<dyn SearchBackend>, namespace: impl Into<String>, threshold: usize) -> Self {
        Self {
            backend,
            namespace: namespace.into(),
            threshold: threshold.max(1),
            commands: Vec::new(),
            current: None,
            written: 0,
            deleted: 0,
        }
    }

    /// Start a document; an uncommitted previous one is discarded.
    pub fn new_document(&mut self, key: &str) {
        self.current = Some(vec!["HSET".to_string(), add_namespace(&self.namespace, key)]);
    }

    /// Set a field to an already-encoded value.
    pub fn set_field(&mut self, name: &str, value: impl Into<String>) {
        if let Some(doc) = self.current.as_mut() {
            doc.push(name.to_string());
            doc.push(value.into());
        }
    }

    pub fn set_uint(&mut self, name: &str, value: u64) {
        self.set_field(name, value.to_string());
    }

    pub fn set_int(&mut self, name: &str, value: i64) {
        self.set_field(name, value.to_string());
    }

    pub fn set_float(&mut self, name: &str, value: f64) {
        self.set_field(name, value.to_string());
    }

    /// Escaped string value.
    pub fn set_string(&mut self, name: &str, value: &str) {
        self.set_field(name, escape(value));
    }

    pub fn set_bool(&mut self, name: &str, value: bool) {
        self.set_field(name, if value { "true" } else { "false" });
    }

    /// Escaped tags joined with `,`.
    pub fn set_tag<I, S>(&mut self, name: &str, tags: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let joined = tags.into_iter().map(|t| escape(t.as_ref())).collect::<Vec<_>>().join(",");
        self.set_field(name, joined);
    }

    /// `lon,lat` pair for a GEO field.
    pub fn set_geo(&mut self, name: &str, lon: f64, lat: f64) {
        self.set_field(name, format!("{},{}", lon, lat));
    }

    /// Commit the current document. Documents without fields are dropped.
    pub fn push_document(&mut self) {
        if let Some(doc) = self.current.take() {
            if doc.len() > 2 {
                self.commands.push(doc);
                self.written += 1;
            }
        }
    }

    pub fn delete_documents<I, S>(&mut self, keys: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut command = vec!["DEL".to_string()];
        command.extend(keys.into_iter().map(|k| add_namespace(&self.namespace, k.as_ref())));
        if command.len() > 1 {
            self.deleted += command.len() - 1;
            self.commands.push(command);
        }
    }

    /// Buffered command count.
    pub fn pending(&self) -> usize {
        self.commands.len()
    }

    /// Send every buffered command in one pipeline.
    pub async fn flush(&mut self) -> Result<(), SearchError> {
        if self.commands.is_empty() {
            return Ok(());
        }
        let commands = std::mem::take(&mut self.commands);
        let (written, deleted) = (std::mem::take(&mut self.written), std::mem::take(&mut self.deleted));

        let pool = self.backend.pool().to_string();
        let _timer = metrics::LatencyTimer::new(&pool, "PIPELINE");
        match self.backend.execute_pipeline(&commands).await {
            Ok(()) => {
                metrics::record_command(&pool, "PIPELINE", "success");
                metrics::record_documents_pushed(&pool, written, deleted);
                debug!(pool = %pool, commands = commands.len(), written, deleted, "Flushed documents");
                Ok(())
            }
            Err(e) => {
                metrics::record_command(&pool, "PIPELINE", "error");
                Err(e)
            }
        }
    }

    /// Flush once the buffer reaches the threshold.
    pub async fn flush_if_full(&mut self) -> Result<(), SearchError> {
        if self.commands.len() >= self.threshold {
            self.flush().await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::MemoryBackend;

    fn pusher(backend: &Arc<MemoryBackend>, threshold: usize) -> DocumentPusher {
        DocumentPusher::new(backend.clone(), "app", threshold)
    }

    #[tokio::test]
    async fn test_push_and_flush() {
        let backend = Arc::new(MemoryBackend::new("default"));
        let mut p = pusher(&backend, 100);

        p.new_document("u:1");
        p.set_string("Name", "john doe");
        p.set_uint("Age", 30);
        p.set_bool("Active", true);
        p.set_tag("Tags", ["a", "b c"]);
        p.set_geo("Loc", 1.5, 2.25);
        p.push_document();
        p.delete_documents(["u:2", "u:3"]);
        assert_eq!(p.pending(), 2);

        p.flush().await.unwrap();
        assert_eq!(p.pending(), 0);

        let hash = backend.hash("app:u:1").unwrap();
        assert_eq!(hash["Name"], "john\\ doe");
        assert_eq!(hash["Age"], "30");
        assert_eq!(hash["Active"], "true");
        assert_eq!(hash["Tags"], "a,b\\ c");
        assert_eq!(hash["Loc"], "1.5,2.25");

        let log = backend.command_log();
        assert_eq!(log[1], vec!["DEL", "app:u:2", "app:u:3"]);
    }

    #[tokio::test]
    async fn test_empty_document_skipped() {
        let backend = Arc::new(MemoryBackend::new("default"));
        let mut p = pusher(&backend, 100);
        p.new_document("u:1");
        p.push_document();
        p.delete_documents(Vec::<String>::new());
        assert_eq!(p.pending(), 0);
        p.flush().await.unwrap();
        assert!(backend.command_log().is_empty());
    }

    #[tokio::test]
    async fn test_flush_if_full() {
        let backend = Arc::new(MemoryBackend::new("default"));
        let mut p = pusher(&backend, 2);

        p.new_document("u:1");
        p.set_int("A", -1);
        p.push_document();
        p.flush_if_full().await.unwrap();
        assert_eq!(p.pending(), 1);

        p.new_document("u:2");
        p.set_float("B", 0.5);
        p.push_document();
        p.flush_if_full().await.unwrap();
        assert_eq!(p.pending(), 0);
        assert_eq!(backend.hash("app:u:2").unwrap()["B"], "0.5");
    }

    #[tokio::test]
    async fn test_new_document_discards_uncommitted() {
        let backend = Arc::new(MemoryBackend::new("default"));
        let mut p = DocumentPusher::new(backend.clone(), "", DEFAULT_FLUSH_THRESHOLD);
        p.new_document("a");
        p.set_field("X", "1");
        p.new_document("b");
        p.set_field("Y", "2");
        p.push_document();
        p.flush().await.unwrap();
        assert!(backend.hash("a").is_none());
        assert_eq!(backend.hash("b").unwrap()["Y"], "2");
    }
}
