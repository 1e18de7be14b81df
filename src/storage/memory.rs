// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! In-process stand-ins for the engine, the system of record and the event
//! broker. Used by unit tests and by callers that want to dry-run the
//! engine-facing code.
//!
//! [`MemoryBackend`] keeps hashes, strings and index definitions, answers
//! `FT.INFO` from the stored `FT.CREATE` arguments and returns scripted
//! replies for `FT.SEARCH` / `FT.AGGREGATE`. Every command is logged.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc;

use super::traits::{IndexerEventPublisher, RecordSource, Reply, SearchBackend, SearchError, SourceRow};
use crate::reindex::IndexerEvent;
use crate::schema::{RawValue, ScanStatement};

const DEFAULT_MODULES: &str = "# Modules\r\nmodule:name=search,ver=20809,api=1,filters=0,usedby=[],using=[ReJSON],options=[]\r\n";

#[derive(Default)]
struct MemoryState {
    hashes: BTreeMap<String, BTreeMap<String, String>>,
    strings: BTreeMap<String, String>,
    /// index name → `FT.CREATE` arguments
    indices: BTreeMap<String, Vec<String>>,
    /// (command, index) → reply
    scripted: HashMap<(String, String), Reply>,
    failures: HashMap<String, String>,
    streams: Vec<(String, Vec<(String, String)>)>,
    log: Vec<Vec<String>>,
}

/// Engine simulation for one pool.
pub struct MemoryBackend {
    pool: String,
    database: i64,
    modules: String,
    state: Mutex<MemoryState>,
}

fn prefixes_of(create_args: &[String]) -> Vec<String> {
    let Some(pos) = create_args.iter().position(|a| a == "PREFIX") else {
        return Vec::new();
    };
    let count: usize = create_args.get(pos + 1).and_then(|n| n.parse().ok()).unwrap_or(0);
    create_args.iter().skip(pos + 2).take(count).cloned().collect()
}

fn text(value: &str) -> Reply {
    Reply::text(value)
}

/// `FT.INFO` reply (attributes layout) rebuilt from `FT.CREATE` arguments.
fn info_reply(name: &str, create_args: &[String], num_docs: usize) -> Reply {
    let mut options = Vec::new();
    let mut language_field = String::new();
    let mut score_field = String::new();
    let mut default_score = "1".to_string();
    let mut stop_words = Vec::new();

    let schema_at = create_args.iter().position(|a| a == "SCHEMA").unwrap_or(create_args.len());
    let mut head = create_args[..schema_at].iter().skip(2);
    while let Some(arg) = head.next() {
        match arg.as_str() {
            "LANGUAGE_FIELD" => language_field = head.next().cloned().unwrap_or_default(),
            "SCORE_FIELD" => score_field = head.next().cloned().unwrap_or_default(),
            "SCORE" => default_score = head.next().cloned().unwrap_or_default(),
            "NOFREQS" | "NOFIELDS" | "NOOFFSETS" | "MAXTEXTFIELDS" => options.push(text(arg)),
            "STOPWORDS" => {
                let count: usize = head.next().and_then(|n| n.parse().ok()).unwrap_or(0);
                stop_words = head.by_ref().take(count).map(|w| text(w)).collect();
            }
            _ => {}
        }
    }

    let mut attributes = Vec::new();
    let mut current: Option<Vec<Reply>> = None;
    let mut tail = create_args.iter().skip(schema_at + 1);
    while let Some(arg) = tail.next() {
        match arg.as_str() {
            "SORTABLE" | "NOSTEM" | "NOINDEX" => {
                if let Some(attr) = current.as_mut() {
                    attr.push(text(arg));
                }
            }
            "WEIGHT" | "SEPARATOR" => {
                let value = tail.next().cloned().unwrap_or_default();
                if let Some(attr) = current.as_mut() {
                    if let Some(pos) = attr.iter().position(|r| r.as_str() == Some(arg.as_str())) {
                        attr[pos + 1] = text(&value);
                    }
                }
            }
            field => {
                let kind = tail.next().cloned().unwrap_or_default();
                if let Some(done) = current.take() {
                    attributes.push(Reply::Array(done));
                }
                let mut attr = vec![text("identifier"), text(field), text("attribute"), text(field), text("type"), text(&kind)];
                match kind.as_str() {
                    "TEXT" => attr.extend([text("WEIGHT"), text("1")]),
                    "TAG" => attr.extend([text("SEPARATOR"), text(",")]),
                    _ => {}
                }
                current = Some(attr);
            }
        }
    }
    if let Some(done) = current {
        attributes.push(Reply::Array(done));
    }

    Reply::Array(vec![
        text("index_name"),
        text(name),
        text("index_options"),
        Reply::Array(options),
        text("index_definition"),
        Reply::Array(vec![
            text("key_type"),
            text("HASH"),
            text("prefixes"),
            Reply::Array(prefixes_of(create_args).iter().map(|p| text(p)).collect()),
            text("language_field"),
            text(&language_field),
            text("default_score"),
            text(&default_score),
            text("score_field"),
            text(&score_field),
        ]),
        text("attributes"),
        Reply::Array(attributes),
        text("num_docs"),
        text(&num_docs.to_string()),
        text("indexing"),
        text("0"),
        text("percent_indexed"),
        text("1"),
        text("stopwords_list"),
        Reply::Array(stop_words),
    ])
}

impl MemoryBackend {
    pub fn new(pool: impl Into<String>) -> Self {
        Self {
            pool: pool.into(),
            database: 0,
            modules: DEFAULT_MODULES.to_string(),
            state: Mutex::new(MemoryState::default()),
        }
    }

    pub fn with_database(mut self, database: i64) -> Self {
        self.database = database;
        self
    }

    /// Replace the `INFO modules` text.
    pub fn with_modules(mut self, modules: impl Into<String>) -> Self {
        self.modules = modules.into();
        self
    }

    /// Answer `command` on `index` with `reply`.
    pub fn script(&self, command: &str, index: &str, reply: Reply) {
        self.state
            .lock()
            .scripted
            .insert((command.to_string(), index.to_string()), reply);
    }

    /// Fail every `command` with an engine error.
    pub fn fail_command(&self, command: &str, message: &str) {
        self.state.lock().failures.insert(command.to_string(), message.to_string());
    }

    pub fn clear_failures(&self) {
        self.state.lock().failures.clear();
    }

    pub fn hash(&self, key: &str) -> Option<BTreeMap<String, String>> {
        self.state.lock().hashes.get(key).cloned()
    }

    pub fn hash_count(&self) -> usize {
        self.state.lock().hashes.len()
    }

    pub fn string(&self, key: &str) -> Option<String> {
        self.state.lock().strings.get(key).cloned()
    }

    pub fn set_string(&self, key: &str, value: &str) {
        self.state.lock().strings.insert(key.to_string(), value.to_string());
    }

    pub fn has_index(&self, name: &str) -> bool {
        self.state.lock().indices.contains_key(name)
    }

    /// Stored `FT.CREATE` arguments of an index.
    pub fn create_args(&self, name: &str) -> Option<Vec<String>> {
        self.state.lock().indices.get(name).cloned()
    }

    pub fn stream(&self, name: &str) -> Vec<Vec<(String, String)>> {
        self.state
            .lock()
            .streams
            .iter()
            .filter(|(stream, _)| stream == name)
            .map(|(_, fields)| fields.clone())
            .collect()
    }

    pub fn command_log(&self) -> Vec<Vec<String>> {
        self.state.lock().log.clone()
    }

    pub fn clear_log(&self) {
        self.state.lock().log.clear();
    }

    fn apply(&self, args: &[String]) -> Result<Reply, SearchError> {
        let mut state = self.state.lock();
        state.log.push(args.to_vec());

        let command = args.first().map(|c| c.to_ascii_uppercase()).unwrap_or_default();
        if let Some(message) = state.failures.get(&command) {
            return Err(SearchError::Protocol(message.clone()));
        }
        let arg = |i: usize| args.get(i).cloned().unwrap_or_default();

        match command.as_str() {
            "HSET" => {
                let hash = state.hashes.entry(arg(1)).or_default();
                let mut added = 0;
                for pair in args[2..].chunks(2) {
                    if let [field, value] = pair {
                        if hash.insert(field.clone(), value.clone()).is_none() {
                            added += 1;
                        }
                    }
                }
                Ok(Reply::Int(added))
            }
            "DEL" => {
                let mut removed = 0;
                for key in &args[1..] {
                    if state.hashes.remove(key).is_some() || state.strings.remove(key).is_some() {
                        removed += 1;
                    }
                }
                Ok(Reply::Int(removed))
            }
            "GET" => Ok(state.strings.get(&arg(1)).map_or(Reply::Nil, |v| text(v))),
            "SET" => {
                state.strings.insert(arg(1), arg(2));
                Ok(text("OK"))
            }
            "XADD" => {
                let fields = args[3..]
                    .chunks(2)
                    .filter_map(|pair| match pair {
                        [k, v] => Some((k.clone(), v.clone())),
                        _ => None,
                    })
                    .collect();
                state.streams.push((arg(1), fields));
                Ok(text("0-1"))
            }
            "INFO" => Ok(text(&self.modules)),
            "FT._LIST" => Ok(Reply::Array(state.indices.keys().map(|k| text(k)).collect())),
            "FT.CREATE" => {
                let name = arg(1);
                if state.indices.contains_key(&name) {
                    return Err(SearchError::Protocol("Index already exists".to_string()));
                }
                state.indices.insert(name, args.to_vec());
                Ok(text("OK"))
            }
            "FT.DROPINDEX" => {
                let name = arg(1);
                let Some(create_args) = state.indices.remove(&name) else {
                    return Err(SearchError::Protocol("Unknown Index name".to_string()));
                };
                if arg(2).eq_ignore_ascii_case("DD") {
                    let prefixes = prefixes_of(&create_args);
                    state.hashes.retain(|key, _| !prefixes.iter().any(|p| key.starts_with(p.as_str())));
                }
                Ok(text("OK"))
            }
            "FT.INFO" => {
                let name = arg(1);
                if let Some(reply) = state.scripted.get(&(command.clone(), name.clone())) {
                    return Ok(reply.clone());
                }
                let Some(create_args) = state.indices.get(&name) else {
                    return Err(SearchError::Protocol("Unknown Index name".to_string()));
                };
                let prefixes = prefixes_of(create_args);
                let docs = state
                    .hashes
                    .keys()
                    .filter(|key| prefixes.iter().any(|p| key.starts_with(p.as_str())))
                    .count();
                Ok(info_reply(&name, create_args, docs))
            }
            "FT.SEARCH" | "FT.AGGREGATE" => {
                let name = arg(1);
                if !state.indices.contains_key(&name) {
                    return Err(SearchError::Protocol(format!("{}: no such index", name)));
                }
                Ok(state
                    .scripted
                    .get(&(command.clone(), name))
                    .cloned()
                    .unwrap_or_else(|| Reply::Array(vec![Reply::Int(0)])))
            }
            other => Err(SearchError::Protocol(format!("ERR unknown command '{}'", other))),
        }
    }
}

#[async_trait]
impl SearchBackend for MemoryBackend {
    fn pool(&self) -> &str {
        &self.pool
    }

    fn database(&self) -> i64 {
        self.database
    }

    async fn execute(&self, args: &[String]) -> Result<Reply, SearchError> {
        self.apply(args)
    }
}

/// Rows keyed by id, columns by name.
#[derive(Default)]
pub struct MemoryRecordSource {
    rows: RwLock<BTreeMap<u64, HashMap<String, RawValue>>>,
    scans: AtomicUsize,
}

impl MemoryRecordSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert<'a>(&self, id: u64, values: impl IntoIterator<Item = (&'a str, RawValue)>) {
        let row = values.into_iter().map(|(k, v)| (k.to_string(), v)).collect();
        self.rows.write().insert(id, row);
    }

    pub fn remove(&self, id: u64) {
        self.rows.write().remove(&id);
    }

    pub fn len(&self) -> usize {
        self.rows.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.read().is_empty()
    }

    /// Number of `scan` calls served.
    pub fn scan_count(&self) -> usize {
        self.scans.load(Ordering::Relaxed)
    }
}

fn is_flagged(value: Option<&RawValue>) -> bool {
    match value {
        Some(RawValue::Int(v)) => *v != 0,
        Some(RawValue::UInt(v)) => *v != 0,
        Some(RawValue::Bool(b)) => *b,
        Some(RawValue::Text(s)) => s != "0" && !s.is_empty(),
        _ => false,
    }
}

#[async_trait]
impl RecordSource for MemoryRecordSource {
    async fn scan(&self, statement: &ScanStatement, after_id: u64) -> Result<Vec<SourceRow>, SearchError> {
        self.scans.fetch_add(1, Ordering::Relaxed);
        let rows = self.rows.read();
        Ok(rows
            .range(after_id.saturating_add(1)..)
            .filter(|(_, row)| {
                statement
                    .exclude_soft_deleted
                    .as_ref()
                    .map_or(true, |marker| !is_flagged(row.get(marker)))
            })
            .take(statement.page_size)
            .map(|(id, row)| SourceRow {
                id: *id,
                values: statement
                    .columns
                    .iter()
                    .map(|c| row.get(&c.name).cloned().unwrap_or(RawValue::Null))
                    .collect(),
            })
            .collect())
    }
}

/// Publishes indexer events onto a tokio channel.
pub struct ChannelPublisher {
    tx: mpsc::UnboundedSender<(String, IndexerEvent)>,
}

impl ChannelPublisher {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<(String, IndexerEvent)>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl IndexerEventPublisher for ChannelPublisher {
    async fn publish(&self, channel: &str, event: &IndexerEvent) -> Result<(), SearchError> {
        self.tx
            .send((channel.to_string(), event.clone()))
            .map_err(|_| SearchError::Connection(format!("indexer channel {} closed", channel)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ScanColumn, ScanKind};
    use crate::search::{FieldSpec, IndexDefinition, IndexInfo};

    fn cmd(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_hash_and_string_commands() {
        let backend = MemoryBackend::new("default");
        backend.execute(&cmd(&["HSET", "k", "a", "1", "b", "2"])).await.unwrap();
        backend.execute(&cmd(&["SET", "s", "v", "EX", "10"])).await.unwrap();
        assert_eq!(backend.hash("k").unwrap()["b"], "2");
        assert_eq!(backend.execute(&cmd(&["GET", "s"])).await.unwrap(), Reply::text("v"));

        let removed = backend.execute(&cmd(&["DEL", "k", "s", "missing"])).await.unwrap();
        assert_eq!(removed, Reply::Int(2));
        assert_eq!(backend.execute(&cmd(&["GET", "s"])).await.unwrap(), Reply::Nil);
    }

    #[tokio::test]
    async fn test_info_reflects_create_args() {
        let backend = MemoryBackend::new("default");
        let mut def = IndexDefinition::new("users", "default")
            .prefix("u:")
            .field(FieldSpec::text("Name").no_stem())
            .field(FieldSpec::text("Refs").weight(0.0))
            .field(FieldSpec::tag("Role").sortable())
            .field(FieldSpec::numeric("Age").no_index())
            .stop_words(vec![]);
        def.no_freqs = true;
        backend.execute(&def.to_ft_create_args("").unwrap()).await.unwrap();

        let reply = backend.execute(&cmd(&["FT.INFO", "users"])).await.unwrap();
        let info = IndexInfo::from_reply(&reply, "");
        assert_eq!(info.name, "users");
        assert_eq!(info.definition.prefixes, vec!["u:"]);
        assert!(info.options.no_freqs);
        assert_eq!(info.fields.len(), 4);
        assert!(info.fields[0].no_stem);
        assert_eq!(info.fields[1].weight, 0.0);
        assert!(info.fields[2].sortable);
        assert_eq!(info.fields[2].tag_separator, ",");
        assert!(info.fields[3].no_index);
    }

    #[tokio::test]
    async fn test_dropindex_dd_removes_prefixed_hashes() {
        let backend = MemoryBackend::new("default");
        let def = IndexDefinition::new("users", "default").prefix("u:").text("Name");
        backend.execute(&def.to_ft_create_args("").unwrap()).await.unwrap();
        backend.execute(&cmd(&["HSET", "u:1", "Name", "a"])).await.unwrap();
        backend.execute(&cmd(&["HSET", "x:1", "Name", "b"])).await.unwrap();

        backend.execute(&cmd(&["FT.DROPINDEX", "users", "DD"])).await.unwrap();
        assert!(backend.hash("u:1").is_none());
        assert!(backend.hash("x:1").is_some());

        let err = backend.execute(&cmd(&["FT.DROPINDEX", "users"])).await.unwrap_err();
        assert!(err.is_unknown_index());
    }

    #[tokio::test]
    async fn test_failure_injection() {
        let backend = MemoryBackend::new("default");
        backend.fail_command("FT.CREATE", "boom");
        let err = backend.execute(&cmd(&["FT.CREATE", "x"])).await.unwrap_err();
        assert_eq!(err, SearchError::Protocol("boom".into()));
        backend.clear_failures();
        assert!(backend.execute(&cmd(&["FT.CREATE", "x"])).await.is_ok());
    }

    #[tokio::test]
    async fn test_record_source_pages_and_skips_deleted() {
        let source = MemoryRecordSource::new();
        for id in 1..=5 {
            let deleted = if id == 3 { 1 } else { 0 };
            source.insert(id, [("Name", RawValue::Text(format!("n{}", id))), ("FakeDelete", RawValue::Int(deleted))]);
        }
        let statement = ScanStatement {
            table: "t".into(),
            columns: vec![ScanColumn {
                name: "Name".into(),
                kind: ScanKind::Text,
                as_text: false,
            }],
            exclude_soft_deleted: Some("FakeDelete".into()),
            page_size: 2,
        };

        let first = source.scan(&statement, 0).await.unwrap();
        assert_eq!(first.iter().map(|r| r.id).collect::<Vec<_>>(), vec![1, 2]);
        let second = source.scan(&statement, 2).await.unwrap();
        assert_eq!(second.iter().map(|r| r.id).collect::<Vec<_>>(), vec![4, 5]);
        assert_eq!(second[0].values, vec![RawValue::Text("n4".into())]);
        assert_eq!(source.scan_count(), 2);
    }

    #[tokio::test]
    async fn test_channel_publisher() {
        let (publisher, mut rx) = ChannelPublisher::new();
        publisher.publish("chan", &IndexerEvent::new("users")).await.unwrap();
        let (channel, event) = rx.recv().await.unwrap();
        assert_eq!(channel, "chan");
        assert_eq!(event.index, "users");

        drop(rx);
        assert!(publisher.publish("chan", &IndexerEvent::new("x")).await.is_err());
    }
}
