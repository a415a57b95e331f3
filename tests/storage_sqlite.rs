#![cfg(feature = "sqlite")]

mod common;

use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Utc};
use common::fixtures::linear_graph;
use common::{eventually, notifiers::RecordingNotifier};
use mailgraph::engine::Engine;
use mailgraph::execution::{Execution, ExecutionStatus, LogEntry};
use mailgraph::storage::{
    AutomationStore, AutomationUpdate, ExecutionStore, SqliteStore, StorageError,
};
use tempfile::TempDir;

async fn open_store() -> (TempDir, SqliteStore) {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}?mode=rwc", dir.path().join("mailgraph.db").display());
    let store = SqliteStore::connect(&url).await.unwrap();
    (dir, store)
}

#[tokio::test]
async fn automation_roundtrip_and_uniqueness() {
    let (_dir, store) = open_store().await;
    let (nodes, edges) = linear_graph("hello");

    let created = AutomationStore::create(&store, "welcome", nodes.clone(), edges.clone())
        .await
        .unwrap();
    let loaded = AutomationStore::get(&store, &created.id).await.unwrap().unwrap();
    assert_eq!(loaded.name, "welcome");
    assert_eq!(loaded.nodes, nodes);
    assert_eq!(loaded.edges, edges);

    let err = AutomationStore::create(&store, "welcome", nodes.clone(), edges.clone())
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::DuplicateName { .. }));

    let updated = store
        .update(
            &created.id,
            AutomationUpdate {
                name: Some("renamed".into()),
                graph: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.name, "renamed");
    assert!(updated.updated_at >= loaded.updated_at);

    let summaries = store.list().await.unwrap();
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].name, "renamed");

    assert!(store.delete(&created.id).await.unwrap());
    assert!(AutomationStore::get(&store, &created.id).await.unwrap().is_none());
    assert!(!store.delete(&created.id).await.unwrap());
}

#[tokio::test]
async fn execution_transitions_roundtrip() {
    let (_dir, store) = open_store().await;
    let execution = Execution::new("auto-1", "a@b.com");
    ExecutionStore::create(&store, &execution).await.unwrap();

    store.mark_running(&execution.id, "start").await.unwrap();
    store
        .append_log(&execution.id, LogEntry::success("start", "start", "Flow started"))
        .await
        .unwrap();
    store
        .append_log(
            &execution.id,
            LogEntry::success("wait", "delay", "Delaying for 1 minutes"),
        )
        .await
        .unwrap();

    let due = Utc::now() + ChronoDuration::minutes(1);
    store.suspend(&execution.id, "wait", due).await.unwrap();

    let suspended = ExecutionStore::get(&store, &execution.id).await.unwrap().unwrap();
    assert_eq!(suspended.status, ExecutionStatus::Pending);
    assert_eq!(suspended.current_node_id.as_deref(), Some("wait"));
    // RFC3339 text storage keeps sub-second precision.
    assert_eq!(
        suspended.scheduled_for.unwrap().timestamp_millis(),
        due.timestamp_millis()
    );
    assert_eq!(suspended.execution_log.len(), 2);
    assert_eq!(suspended.execution_log[0].node_id, "start");
    assert_eq!(suspended.execution_log[1].node_id, "wait");

    let found = store.find_suspended().await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, execution.id);

    store.clear_schedule(&execution.id, "send").await.unwrap();
    assert!(store.find_suspended().await.unwrap().is_empty());

    let finished_at = Utc::now();
    store
        .finish(&execution.id, ExecutionStatus::Completed, finished_at)
        .await
        .unwrap();
    let finished = ExecutionStore::get(&store, &execution.id).await.unwrap().unwrap();
    assert_eq!(finished.status, ExecutionStatus::Completed);
    assert!(finished.completed_at.is_some());
    assert_eq!(finished.current_node_id.as_deref(), Some("send"));
}

#[tokio::test]
async fn unknown_execution_id_errors() {
    let (_dir, store) = open_store().await;
    let err = store.mark_running("missing", "n").await.unwrap_err();
    assert!(matches!(err, StorageError::NotFound { .. }));
    let err = store
        .append_log("missing", LogEntry::success("n", "start", "x"))
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::NotFound { .. }));
}

#[tokio::test]
async fn list_recent_orders_newest_first() {
    let (_dir, store) = open_store().await;
    let mut older = Execution::new("auto-1", "old@b.com");
    older.created_at = Utc::now() - ChronoDuration::minutes(5);
    let newer = Execution::new("auto-1", "new@b.com");
    ExecutionStore::create(&store, &older).await.unwrap();
    ExecutionStore::create(&store, &newer).await.unwrap();

    let recent = store.list_recent(10).await.unwrap();
    assert_eq!(recent.len(), 2);
    assert_eq!(recent[0].subject, "new@b.com");

    let capped = store.list_recent(1).await.unwrap();
    assert_eq!(capped.len(), 1);
}

#[tokio::test]
async fn engine_from_config_uses_the_configured_database() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("configured.db");
    let config = mailgraph::engine::EngineConfig::new(Some(path.display().to_string()));
    let engine = Engine::from_config(&config).await.unwrap();

    let (nodes, edges) = linear_graph("hello");
    let automation = engine.create_automation("configured", nodes, edges).await.unwrap();
    assert!(engine.automation(&automation.id).await.unwrap().is_some());
    assert!(path.exists());
}

#[tokio::test]
async fn engine_completes_a_flow_on_sqlite() {
    let (_dir, store) = open_store().await;
    let store = Arc::new(store);
    let notifier = Arc::new(RecordingNotifier::new());
    let engine = Engine::new(store.clone(), store.clone(), notifier.clone());

    let (nodes, edges) = linear_graph("hi");
    let automation = engine.create_automation("welcome", nodes, edges).await.unwrap();
    let execution = engine
        .start_execution(&automation.id, "a@b.com")
        .await
        .unwrap();

    let poll_engine = engine.clone();
    let id = execution.id.clone();
    eventually("sqlite-backed execution completes", || {
        let engine = poll_engine.clone();
        let id = id.clone();
        async move {
            engine.execution(&id).await.unwrap().status == ExecutionStatus::Completed
        }
    })
    .await;

    let finished = engine.execution(&execution.id).await.unwrap();
    assert_eq!(finished.execution_log.len(), 3);
    assert_eq!(notifier.send_count(), 1);
}
