mod common;

use common::fixtures::{branching_graph, linear_graph, rule};
use common::{TestRig, eventually};
use mailgraph::engine::EngineError;
use mailgraph::execution::{ExecutionStatus, LogStatus};
use mailgraph::model::{RuleLogic, RuleOperator};
use mailgraph::storage::AutomationStore;

#[tokio::test]
async fn end_to_end_without_delay() {
    mailgraph::telemetry::init();
    let rig = TestRig::new();
    let (nodes, edges) = linear_graph("hi");
    let automation = rig
        .engine
        .create_automation("welcome", nodes, edges)
        .await
        .unwrap();

    let execution = rig
        .engine
        .start_execution(&automation.id, "a@b.com")
        .await
        .unwrap();
    assert_eq!(execution.status, ExecutionStatus::Pending);

    let engine = rig.engine.clone();
    let id = execution.id.clone();
    eventually("execution completes", || {
        let engine = engine.clone();
        let id = id.clone();
        async move {
            engine.execution(&id).await.unwrap().status == ExecutionStatus::Completed
        }
    })
    .await;

    let finished = rig.engine.execution(&execution.id).await.unwrap();
    assert!(finished.completed_at.is_some());
    assert_eq!(finished.execution_log.len(), 3);

    let node_ids: Vec<&str> = finished
        .execution_log
        .iter()
        .map(|e| e.node_id.as_str())
        .collect();
    assert_eq!(node_ids, ["start", "send", "end"]);
    assert!(
        finished.execution_log[1]
            .message
            .as_deref()
            .unwrap()
            .starts_with("Message sent:")
    );

    assert_eq!(rig.notifier.sends(), vec![("a@b.com".to_string(), "hi".to_string())]);
}

#[tokio::test]
async fn branching_follows_true_path_for_matching_subject() {
    let rig = TestRig::new();
    let (nodes, edges) = branching_graph(
        vec![rule(RuleOperator::Includes, "test")],
        RuleLogic::And,
    );
    let automation = rig
        .engine
        .create_automation("branching", nodes, edges)
        .await
        .unwrap();

    let execution = rig
        .engine
        .start_execution(&automation.id, "test@example.com")
        .await
        .unwrap();

    let engine = rig.engine.clone();
    let id = execution.id.clone();
    eventually("true branch completes", || {
        let engine = engine.clone();
        let id = id.clone();
        async move {
            engine.execution(&id).await.unwrap().status == ExecutionStatus::Completed
        }
    })
    .await;

    let finished = rig.engine.execution(&execution.id).await.unwrap();
    let condition_entry = finished
        .execution_log
        .iter()
        .find(|e| e.node_id == "check")
        .unwrap();
    assert_eq!(
        condition_entry.message.as_deref(),
        Some("Condition evaluated to: TRUE")
    );
    assert!(finished.execution_log.iter().any(|e| e.node_id == "matched"));
    assert!(!finished.execution_log.iter().any(|e| e.node_id == "other"));
    assert_eq!(rig.notifier.sends()[0].1, "matched-branch");
}

#[tokio::test]
async fn branching_follows_false_path_for_non_matching_subject() {
    let rig = TestRig::new();
    let (nodes, edges) = branching_graph(
        vec![rule(RuleOperator::Includes, "test")],
        RuleLogic::And,
    );
    let automation = rig
        .engine
        .create_automation("branching", nodes, edges)
        .await
        .unwrap();

    let execution = rig
        .engine
        .start_execution(&automation.id, "foo@example.com")
        .await
        .unwrap();

    let engine = rig.engine.clone();
    let id = execution.id.clone();
    eventually("false branch completes", || {
        let engine = engine.clone();
        let id = id.clone();
        async move {
            engine.execution(&id).await.unwrap().status == ExecutionStatus::Completed
        }
    })
    .await;

    let finished = rig.engine.execution(&execution.id).await.unwrap();
    let condition_entry = finished
        .execution_log
        .iter()
        .find(|e| e.node_id == "check")
        .unwrap();
    assert_eq!(
        condition_entry.message.as_deref(),
        Some("Condition evaluated to: FALSE")
    );
    assert!(finished.execution_log.iter().any(|e| e.node_id == "other"));
    assert_eq!(rig.notifier.sends()[0].1, "other-branch");
}

#[tokio::test]
async fn notifier_failure_fails_the_execution() {
    let rig = TestRig::new();
    rig.notifier.fail_deliveries(true);
    let (nodes, edges) = linear_graph("hi");
    let automation = rig
        .engine
        .create_automation("welcome", nodes, edges)
        .await
        .unwrap();

    let execution = rig
        .engine
        .start_execution(&automation.id, "a@b.com")
        .await
        .unwrap();

    let engine = rig.engine.clone();
    let id = execution.id.clone();
    eventually("execution fails", || {
        let engine = engine.clone();
        let id = id.clone();
        async move { engine.execution(&id).await.unwrap().status == ExecutionStatus::Failed }
    })
    .await;

    let finished = rig.engine.execution(&execution.id).await.unwrap();
    assert!(finished.completed_at.is_some());
    let last = finished.execution_log.last().unwrap();
    assert_eq!(last.status, LogStatus::Failed);
    assert_eq!(last.node_id, "send");
    assert!(last.error.as_deref().unwrap().contains("failed to send message"));
}

#[tokio::test]
async fn save_gate_rejects_invalid_graph() {
    let rig = TestRig::new();
    let (mut nodes, edges) = linear_graph("hi");
    nodes.retain(|n| n.id != "end");

    let err = rig
        .engine
        .create_automation("broken", nodes, edges)
        .await
        .unwrap_err();
    match err {
        EngineError::InvalidAutomation { errors } => {
            assert!(errors.iter().any(|e| e.contains("exactly one End node")));
        }
        other => panic!("expected InvalidAutomation, got {other}"),
    }
}

#[tokio::test]
async fn start_rejects_automation_edited_into_invalid_state() {
    let rig = TestRig::new();
    // Bypass the engine's save gate: persist an invalid graph directly, the
    // way a raced concurrent edit would leave it.
    let (mut nodes, edges) = linear_graph("hi");
    nodes.retain(|n| n.id != "end");
    let automation = rig
        .automations
        .create("edited", nodes, edges)
        .await
        .unwrap();

    let err = rig
        .engine
        .start_execution(&automation.id, "a@b.com")
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidAutomation { .. }));
}

#[tokio::test]
async fn start_rejects_unknown_automation_and_empty_subject() {
    let rig = TestRig::new();
    let err = rig
        .engine
        .start_execution("no-such-id", "a@b.com")
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::AutomationNotFound { .. }));

    let (nodes, edges) = linear_graph("hi");
    let automation = rig
        .engine
        .create_automation("welcome", nodes, edges)
        .await
        .unwrap();
    let err = rig
        .engine
        .start_execution(&automation.id, "   ")
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidSubject));
}
