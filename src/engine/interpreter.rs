//! The graph interpreter: walks an automation one node at a time.
//!
//! One invocation of [`Engine::run_execution`] drives a single execution
//! from its current position until it reaches the end node, suspends at a
//! delay node, or fails. The automation is re-read from storage on every
//! entry (never cached across a suspension) so edits made while an
//! execution waited are picked up on resume.
//!
//! Failure semantics: an error inside a node's dispatch is recorded as a
//! failed log entry against that node, then the whole execution is marked
//! `failed` with `completed_at` set. There is no retry; a new execution
//! must be started.

use chrono::Utc;
use tracing::{debug, instrument, warn};

use crate::condition;
use crate::execution::{Execution, ExecutionStatus, LogEntry};
use crate::graph::GraphView;
use crate::model::{BranchHandle, Node, NodeKind};

use super::{Engine, EngineError, Result};

/// Maximum characters of an action message echoed into the log.
const MESSAGE_PREVIEW_LEN: usize = 50;

/// What a single node dispatch decided.
enum NodeStep {
    /// Continue with the node carrying this id.
    Advance(String),
    /// Parked at a delay node; durable state and a timer are in place.
    Suspend,
    /// Reached the end node; the execution is completed.
    Finish,
}

/// How a full interpreter pass ended (failures are handled before return).
enum PassOutcome {
    Completed,
    Suspended,
}

impl Engine {
    /// Run one execution until it completes, suspends, or fails. Detached
    /// entry point: all outcomes are persisted, nothing is returned.
    #[instrument(skip(self))]
    pub(crate) async fn run_execution(&self, execution_id: &str) {
        match self.step_loop(execution_id).await {
            Ok(PassOutcome::Completed) => debug!("execution completed"),
            Ok(PassOutcome::Suspended) => debug!("execution suspended at delay node"),
            Err(error) => {
                warn!(%error, "execution failed");
                // Best effort: the record may be gone when the lookup itself failed.
                if let Err(finish_error) = self
                    .inner
                    .executions
                    .finish(execution_id, ExecutionStatus::Failed, Utc::now())
                    .await
                {
                    warn!(%finish_error, "could not mark execution failed");
                }
            }
        }
    }

    async fn step_loop(&self, execution_id: &str) -> Result<PassOutcome> {
        let execution = self
            .inner
            .executions
            .get(execution_id)
            .await?
            .ok_or_else(|| EngineError::ExecutionNotFound {
                id: execution_id.to_string(),
            })?;
        let automation = self
            .inner
            .automations
            .get(&execution.automation_id)
            .await?
            .ok_or_else(|| EngineError::AutomationNotFound {
                id: execution.automation_id.clone(),
            })?;
        let graph = GraphView::new(&automation.nodes, &automation.edges);

        // Resumption case: continue from the persisted position; otherwise
        // this is a fresh run starting at the start node.
        let mut current_id = match &execution.current_node_id {
            Some(id) => id.clone(),
            None => graph
                .start_node()
                .ok_or(EngineError::MissingStartNode)?
                .id
                .clone(),
        };

        loop {
            let node = graph
                .node(&current_id)
                .ok_or_else(|| EngineError::NodeNotFound {
                    node_id: current_id.clone(),
                })?;

            self.inner
                .executions
                .mark_running(execution_id, &current_id)
                .await?;
            debug!(node_id = %node.id, node_type = %node.type_name(), "executing node");

            match self.dispatch_node(&execution, node, &graph).await {
                Ok(NodeStep::Advance(next_id)) => current_id = next_id,
                Ok(NodeStep::Suspend) => return Ok(PassOutcome::Suspended),
                Ok(NodeStep::Finish) => return Ok(PassOutcome::Completed),
                Err(error) => {
                    // Record the failure against the node that raised it,
                    // then let the caller mark the execution failed.
                    if let Err(log_error) = self
                        .inner
                        .executions
                        .append_log(
                            execution_id,
                            LogEntry::failure(&node.id, node.type_name(), error.to_string()),
                        )
                        .await
                    {
                        warn!(%log_error, "could not append failure log entry");
                    }
                    return Err(error);
                }
            }
        }
    }

    /// Execute a single node and decide how the walk continues.
    async fn dispatch_node(
        &self,
        execution: &Execution,
        node: &Node,
        graph: &GraphView<'_>,
    ) -> Result<NodeStep> {
        match &node.kind {
            NodeKind::Start => {
                self.log_success(&execution.id, node, "Flow started").await?;
                self.advance(node, graph)
            }
            NodeKind::Action(data) => {
                let delivery_id = self
                    .inner
                    .notifier
                    .send(&execution.subject, &data.message)
                    .await?;
                let preview: String = data.message.chars().take(MESSAGE_PREVIEW_LEN).collect();
                self.log_success(
                    &execution.id,
                    node,
                    format!("Message sent: \"{preview}...\" (id: {delivery_id})"),
                )
                .await?;
                self.advance(node, graph)
            }
            NodeKind::Delay(spec) => {
                let now = Utc::now();
                let duration = spec.duration_from(now);
                if duration.is_zero() {
                    // Past-due or zero-length wait: continue inline.
                    return self.advance(node, graph);
                }
                self.log_success(
                    &execution.id,
                    node,
                    format!("Delaying for {}", spec.describe()),
                )
                .await?;
                let due = now + duration;
                self.inner
                    .executions
                    .suspend(&execution.id, &node.id, due)
                    .await?;
                self.arm_timer(&execution.id, due).await;
                Ok(NodeStep::Suspend)
            }
            NodeKind::Condition(data) => {
                let outcome = condition::evaluate(data, &execution.subject);
                self.log_success(
                    &execution.id,
                    node,
                    format!(
                        "Condition evaluated to: {}",
                        if outcome { "TRUE" } else { "FALSE" }
                    ),
                )
                .await?;
                let handle = BranchHandle::from_outcome(outcome);
                match graph.branch_successor(&node.id, handle) {
                    Some(next_id) => Ok(NodeStep::Advance(next_id.to_string())),
                    // Should be unreachable behind validation; a concurrent
                    // edit can still produce it.
                    None => Err(EngineError::MissingBranch {
                        node_id: node.id.clone(),
                        outcome: handle.to_string().to_uppercase(),
                    }),
                }
            }
            NodeKind::End => {
                self.log_success(&execution.id, node, "Flow completed successfully")
                    .await?;
                self.inner
                    .executions
                    .finish(&execution.id, ExecutionStatus::Completed, Utc::now())
                    .await?;
                Ok(NodeStep::Finish)
            }
            NodeKind::Unknown(tag) => Err(EngineError::UnknownNodeType {
                node_type: tag.clone(),
            }),
        }
    }

    /// Follow the single outgoing edge of a non-branching node.
    fn advance(&self, node: &Node, graph: &GraphView<'_>) -> Result<NodeStep> {
        graph
            .successor(&node.id)
            .map(|next_id| NodeStep::Advance(next_id.to_string()))
            .ok_or_else(|| EngineError::MissingOutgoingEdge {
                node_id: node.id.clone(),
            })
    }

    async fn log_success(
        &self,
        execution_id: &str,
        node: &Node,
        message: impl Into<String>,
    ) -> Result<()> {
        self.inner
            .executions
            .append_log(
                execution_id,
                LogEntry::success(&node.id, node.type_name(), message),
            )
            .await?;
        Ok(())
    }
}
