// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Integration Tests for RediSearch Sync
//!
//! These tests run against a real RediSearch engine (redis-stack-server).
//! Tests use testcontainers for portability - no external docker-compose required.
//!
//! # Running Tests
//! ```bash
//! # Run all integration tests (requires Docker)
//! cargo test --test integration -- --ignored
//!
//! # Run only query scenarios
//! cargo test --test integration query -- --ignored
//! ```
//!
//! # Test Organization
//! - `query_*` - Query and aggregation compilation against the engine
//! - `index_*` - Index lifecycle, drift detection, forced reindex
//! - `sync_*` - Incremental sync and SQL-driven reindex

use std::sync::Arc;

use redisearch_sync::schema::{FieldDescriptor, RawValue, RecordChange, RecordDescriptor, SemanticType};
use redisearch_sync::search::{AlterAction, FieldSpec, IndexDefinition, Pager, Reducer, SearchQuery};
use redisearch_sync::storage::memory::{ChannelPublisher, MemoryRecordSource};
use redisearch_sync::storage::redis::RedisSearchBackend;
use redisearch_sync::storage::sql::SqlRecordSource;
use redisearch_sync::{IndexerEvent, SearchConfig, SearchEngine, SearchRegistry};

use testcontainers::{clients::Cli, core::WaitFor, Container, GenericImage};

// =============================================================================
// Container Helpers
// =============================================================================

/// Create a redis-stack container (Redis with the search module)
fn redis_stack_container(docker: &Cli) -> Container<'_, GenericImage> {
    let image = GenericImage::new("redis/redis-stack-server", "7.2.0-v10")
        .with_exposed_port(6379)
        .with_wait_for(WaitFor::message_on_stdout("Ready to accept connections"));
    docker.run(image)
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Engine on a fresh namespace so tests never see each other's indices.
async fn engine_for(container: &Container<'_, GenericImage>, registry: Arc<SearchRegistry>) -> SearchEngine {
    init_tracing();
    let port = container.get_host_port_ipv4(6379);
    let config = SearchConfig {
        redis_url: Some(format!("redis://127.0.0.1:{}/0", port)),
        namespace: format!("t{}", uuid::Uuid::new_v4().simple()),
        ..Default::default()
    };
    SearchEngine::connect(config, registry).await.expect("connect")
}

/// `{ID NUMERIC sortable, Int NUMERIC sortable, Float NUMERIC, String TEXT, Tag TAG}`
fn scenario_index() -> IndexDefinition {
    IndexDefinition::new("scenario", "default")
        .prefix("s:")
        .field(FieldSpec::numeric("ID").sortable())
        .field(FieldSpec::numeric("Int").sortable())
        .field(FieldSpec::numeric("Float"))
        .field(FieldSpec::text("String").no_stem())
        .field(FieldSpec::tag("Tag"))
}

async fn push_rows(engine: &SearchEngine, rows: &[(u64, i64, f64, Option<&str>)]) {
    let mut pusher = engine.pusher();
    for (id, int, float, tag) in rows {
        pusher.new_document(&format!("s:{}", id));
        pusher.set_uint("ID", *id);
        pusher.set_int("Int", *int);
        pusher.set_float("Float", *float);
        pusher.set_string("String", &format!("row {}", id));
        pusher.set_tag("Tag", [tag.unwrap_or("NULL")]);
        pusher.push_document();
    }
    pusher.flush().await.expect("flush");
}

async fn scenario_engine(container: &Container<'_, GenericImage>) -> SearchEngine {
    let registry = Arc::new(SearchRegistry::default());
    registry.register_pool("default");
    registry.register_custom_index(scenario_index(), None).unwrap();
    let engine = engine_for(container, registry).await;
    engine.create_index(&scenario_index()).await.unwrap();
    engine
}

fn page() -> Option<&'static Pager> {
    static PAGE: Pager = Pager {
        current_page: 1,
        page_size: 100,
    };
    Some(&PAGE)
}

// =============================================================================
// Query Scenarios
// =============================================================================

#[tokio::test]
#[ignore] // Requires Docker
async fn query_numeric_range_in_key_order() {
    let docker = Cli::default();
    let redis = redis_stack_container(&docker);
    let engine = scenario_engine(&redis).await;
    push_rows(&engine, &[(1, 2, 0.0, None), (2, 4, 0.0, None), (3, 5, 0.0, None), (4, 7, 0.0, None)]).await;

    let query = SearchQuery::new().filter_int_min_max("Int", 3, 6).sort("ID", false);
    let (total, keys) = engine.search_keys("scenario", &query, page()).await.unwrap();
    assert_eq!(total, 2);
    assert_eq!(keys, vec!["s:2", "s:3"]);

    assert_eq!(engine.search_count("scenario", &query).await.unwrap(), 2);
}

#[tokio::test]
#[ignore] // Requires Docker
async fn query_not_int_excludes_only_that_value() {
    let docker = Cli::default();
    let redis = redis_stack_container(&docker);
    let engine = scenario_engine(&redis).await;
    push_rows(&engine, &[(1, 2, 0.0, None), (2, 4, 0.0, None), (3, 3, 0.0, None)]).await;

    let query = SearchQuery::new().filter_not_int("Int", [3]).sort("ID", false);
    let (total, keys) = engine.search_keys("scenario", &query, page()).await.unwrap();
    assert_eq!(total, 2);
    assert_eq!(keys, vec!["s:1", "s:2"]);
}

#[tokio::test]
#[ignore] // Requires Docker
async fn query_empty_and_null_tag_match_absent() {
    let docker = Cli::default();
    let redis = redis_stack_container(&docker);
    let engine = scenario_engine(&redis).await;
    push_rows(&engine, &[(1, 1, 0.0, Some("red")), (2, 1, 0.0, None)]).await;

    let empty = SearchQuery::new().filter_tag("Tag", [""]);
    let null = SearchQuery::new().filter_tag("Tag", ["NULL"]);
    let (_, by_empty) = engine.search_keys("scenario", &empty, page()).await.unwrap();
    let (_, by_null) = engine.search_keys("scenario", &null, page()).await.unwrap();
    assert_eq!(by_empty, vec!["s:2"]);
    assert_eq!(by_empty, by_null);
}

#[tokio::test]
#[ignore] // Requires Docker
async fn query_search_result_returns_unescaped_fields() {
    let docker = Cli::default();
    let redis = redis_stack_container(&docker);
    let engine = scenario_engine(&redis).await;
    push_rows(&engine, &[(9, 1, 2.5, Some("a-b"))]).await;

    let query = SearchQuery::new().query_field("String", ["row"]).with_scores();
    let (total, rows) = engine.search_result("scenario", &query, page()).await.unwrap();
    assert_eq!(total, 1);
    assert_eq!(rows[0].key, "s:9");
    assert_eq!(rows[0].value("String").as_deref(), Some("row 9"));
    assert_eq!(rows[0].value("Tag").as_deref(), Some("a-b"));
    assert!(rows[0].score > 0.0);
}

#[tokio::test]
#[ignore] // Requires Docker
async fn query_group_by_sum() {
    let docker = Cli::default();
    let redis = redis_stack_container(&docker);
    let engine = scenario_engine(&redis).await;
    push_rows(
        &engine,
        &[
            (1, 1, 10.0, None),
            (2, 1, 10.0, None),
            (3, 1, 10.0, None),
            (4, 1, 10.0, None),
            (5, 2, 10.0, None),
            (6, 2, 10.0, None),
        ],
    )
    .await;

    let aggregation = SearchQuery::new()
        .aggregate()
        .group_by_field("@Int", vec![Reducer::sum("@Float", "sum")]);
    let (total, rows) = engine.aggregate("scenario", &aggregation, page()).await.unwrap();
    assert_eq!(total, 2);

    let mut sums: Vec<(String, String)> = rows.iter().map(|r| (r["Int"].clone(), r["sum"].clone())).collect();
    sums.sort();
    assert_eq!(sums, vec![("1".to_string(), "40".to_string()), ("2".to_string(), "20".to_string())]);
}

// =============================================================================
// Index Lifecycle
// =============================================================================

fn users() -> RecordDescriptor {
    RecordDescriptor::new("users", "users")
        .pool("default")
        .field(FieldDescriptor::new("ID", SemanticType::UInt64).sortable())
        .field(FieldDescriptor::new("Name", SemanticType::String).searchable())
        .field(FieldDescriptor::new("Age", SemanticType::Int).searchable().sortable())
        .field(FieldDescriptor::new("Active", SemanticType::Bool).searchable())
        .field(FieldDescriptor::fake_delete())
}

#[tokio::test]
#[ignore] // Requires Docker
async fn index_alters_create_then_clean() {
    let docker = Cli::default();
    let redis = redis_stack_container(&docker);
    let registry = Arc::new(SearchRegistry::default());
    let engine = engine_for(&redis, registry.clone()).await;
    registry.register_record_type(&users(), None).unwrap();

    let alters = engine.get_alters().await.unwrap();
    assert_eq!(alters.len(), 1);
    assert_eq!(alters[0].action, AlterAction::Create);
    alters[0].apply(&engine).await.unwrap();

    assert!(engine.get_alters().await.unwrap().is_empty());
    let stats = engine.get_statistics().await.unwrap();
    assert_eq!(stats.len(), 1);
    assert_eq!(stats[0].definition.name, "users");
}

#[tokio::test]
#[ignore] // Requires Docker
async fn index_alters_detect_drift_and_orphans() {
    let docker = Cli::default();
    let redis = redis_stack_container(&docker);
    let registry = Arc::new(SearchRegistry::default());
    let engine = engine_for(&redis, registry.clone()).await;
    let schema = registry.register_record_type(&users(), None).unwrap();

    let drifted = IndexDefinition::new("users", "default")
        .prefix(schema.key_prefix.clone())
        .field(FieldSpec::numeric("Age"));
    engine.create_index(&drifted).await.unwrap();
    engine
        .create_index(&IndexDefinition::new("legacy", "default").prefix("legacy:").text("Title"))
        .await
        .unwrap();

    let alters = engine.get_alters().await.unwrap();
    let users_alter = alters.iter().find(|a| a.name == "users").unwrap();
    assert_eq!(users_alter.action, AlterAction::Reindex);
    assert!(users_alter.changes.iter().any(|c| c == "different field sortable Age"));
    let legacy = alters.iter().find(|a| a.name == "legacy").unwrap();
    assert_eq!(legacy.action, AlterAction::Drop);

    for alter in &alters {
        alter.apply(&engine).await.unwrap();
    }
    assert!(engine.get_alters().await.unwrap().is_empty());
    assert_eq!(engine.list_indices().await.unwrap(), vec!["users"]);
}

#[tokio::test]
#[ignore] // Requires Docker
async fn index_drop_and_info_of_missing_index() {
    let docker = Cli::default();
    let redis = redis_stack_container(&docker);
    let engine = engine_for(&redis, Arc::new(SearchRegistry::default())).await;

    assert!(!engine.drop_index("missing", false).await.unwrap());
    assert!(engine.info("missing").await.unwrap().is_none());
}

// =============================================================================
// Sync and Reindex
// =============================================================================

#[tokio::test]
#[ignore] // Requires Docker
async fn sync_force_reindex_matches_fresh_build() {
    let docker = Cli::default();
    let redis = redis_stack_container(&docker);
    let port = redis.get_host_port_ipv4(6379);
    init_tracing();

    let source = Arc::new(MemoryRecordSource::new());
    for id in 1..=25u64 {
        source.insert(
            id,
            [
                ("Name", RawValue::Text(format!("user {}", id))),
                ("Age", RawValue::Int(id as i64)),
                ("Active", RawValue::Int((id % 2) as i64)),
                ("FakeDelete", RawValue::Int(0)),
            ],
        );
    }

    let config = SearchConfig {
        redis_url: Some(format!("redis://127.0.0.1:{}/0", port)),
        namespace: format!("t{}", uuid::Uuid::new_v4().simple()),
        indexer_page_size: 10,
        ..Default::default()
    };
    let registry = Arc::new(SearchRegistry::new(config.schema_compiler()));
    let engine = SearchEngine::connect(config, registry.clone()).await.unwrap();
    registry.register_record_type(&users(), Some(source.clone())).unwrap();
    for alter in engine.get_alters().await.unwrap() {
        alter.apply(&engine).await.unwrap();
    }

    let fresh = engine.handle_indexer_event(&IndexerEvent::new("users")).await.unwrap().unwrap();
    assert!(fresh.pages >= 3);
    let query = SearchQuery::new().sort("Age", false);
    let (fresh_total, fresh_rows) = engine.search_result("users", &query, page()).await.unwrap();
    assert_eq!(fresh_total, 25);

    engine.force_reindex("users").await.unwrap();
    assert_eq!(engine.search_count("users", &SearchQuery::new()).await.unwrap(), 0);
    engine.handle_indexer_event(&IndexerEvent::new("users")).await.unwrap();

    let (total, rows) = engine.search_result("users", &query, page()).await.unwrap();
    assert_eq!(total, fresh_total);
    assert_eq!(rows, fresh_rows);
}

#[tokio::test]
#[ignore] // Requires Docker
async fn sync_record_changes_and_soft_delete() {
    let docker = Cli::default();
    let redis = redis_stack_container(&docker);
    let registry = Arc::new(SearchRegistry::default());
    let engine = engine_for(&redis, registry.clone()).await;
    registry.register_record_type(&users(), None).unwrap();
    for alter in engine.get_alters().await.unwrap() {
        alter.apply(&engine).await.unwrap();
    }

    let changes: Vec<RecordChange> = (1..=3u64)
        .map(|id| {
            RecordChange::insert(id)
                .set("Name", format!("user {}", id))
                .set("Age", 20 + id as i64)
                .set("Active", true)
        })
        .collect();
    engine.on_record_changes("users", &changes).await.unwrap();

    let adults = SearchQuery::new().filter_int_greater_equal("Age", 21).sort("ID", false);
    let (total, ids) = engine.search_ids("users", &adults, page()).await.unwrap();
    assert_eq!(total, 3);
    assert_eq!(ids, vec![1, 2, 3]);

    // hidden soft-delete marker removes the document
    engine
        .on_record_changed("users", &RecordChange::update(2).set("FakeDelete", true))
        .await
        .unwrap();
    let (_, ids) = engine.search_ids("users", &adults, page()).await.unwrap();
    assert_eq!(ids, vec![1, 3]);

    engine.on_record_changed("users", &RecordChange::delete(3)).await.unwrap();
    assert_eq!(engine.search_record_count("users", &adults).await.unwrap(), 1);
}

#[tokio::test]
#[ignore] // Requires Docker
async fn sync_reindex_from_sql_source() {
    let docker = Cli::default();
    let redis = redis_stack_container(&docker);

    let sql = Arc::new(SqlRecordSource::connect("sqlite::memory:").await.unwrap());
    let pool = sql.pool();
    sqlx::query(
        "CREATE TABLE users (ID INTEGER PRIMARY KEY, Name TEXT, Age INTEGER NOT NULL, \
         Active INTEGER NOT NULL, FakeDelete INTEGER NOT NULL DEFAULT 0)",
    )
    .execute(&pool)
    .await
    .unwrap();
    for id in 1..=6i64 {
        sqlx::query("INSERT INTO users (ID, Name, Age, Active, FakeDelete) VALUES (?, ?, ?, 1, ?)")
            .bind(id)
            .bind(format!("user {}", id))
            .bind(id * 10)
            .bind(if id == 4 { 1 } else { 0 })
            .execute(&pool)
            .await
            .unwrap();
    }

    let registry = Arc::new(SearchRegistry::default());
    let (publisher, mut events) = ChannelPublisher::new();
    let config = SearchConfig {
        redis_url: Some(format!("redis://127.0.0.1:{}/0", redis.get_host_port_ipv4(6379))),
        namespace: format!("t{}", uuid::Uuid::new_v4().simple()),
        ..Default::default()
    };
    let backend = RedisSearchBackend::connect(config.redis_url.as_deref().unwrap(), &config.pool)
        .await
        .unwrap();
    let engine = SearchEngine::with_backend(config, Arc::new(backend), registry.clone(), Some(Arc::new(publisher)));
    registry.register_record_type(&users(), Some(sql)).unwrap();

    for alter in engine.get_alters().await.unwrap() {
        alter.apply(&engine).await.unwrap();
    }
    let (channel, event) = events.recv().await.unwrap();
    assert_eq!(channel, engine.config().indexer_channel);

    let report = engine.handle_indexer_event(&event).await.unwrap().unwrap();
    assert_eq!(report.last_id, 6);

    let query = SearchQuery::new().sort("ID", false);
    let (total, ids) = engine.search_ids("users", &query, page()).await.unwrap();
    assert_eq!(total, 5);
    assert_eq!(ids, vec![1, 2, 3, 5, 6]);
}

#[tokio::test]
#[ignore] // Requires Docker
async fn sync_concurrent_searches_share_engine() {
    let docker = Cli::default();
    let redis = redis_stack_container(&docker);
    let engine = Arc::new(scenario_engine(&redis).await);
    push_rows(&engine, &[(1, 1, 0.0, None), (2, 2, 0.0, None), (3, 3, 0.0, None)]).await;

    let handles: Vec<_> = (1..=3i64)
        .map(|n| {
            let engine = Arc::clone(&engine);
            tokio::spawn(async move {
                let query = SearchQuery::new().filter_int("Int", [n]);
                engine.search_keys("scenario", &query, page()).await.unwrap().1
            })
        })
        .collect();

    let results = futures::future::join_all(handles).await;
    for (n, result) in results.into_iter().enumerate() {
        assert_eq!(result.unwrap(), vec![format!("s:{}", n + 1)]);
    }
}
