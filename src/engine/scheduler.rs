//! Delay scheduling: durable suspend/resume for executions parked at a
//! delay node.
//!
//! The only authoritative scheduling facts are `scheduled_for` and
//! `current_node_id` on the execution record, persisted before any timer is
//! armed. The in-memory [`TimerRegistry`] is a disposable index over that
//! durable state: it exists so a live process can wake suspended executions
//! without polling, and it is rebuilt from storage by
//! [`Engine::resume_pending_executions`](super::Engine::resume_pending_executions)
//! after a restart. Losing it loses nothing.
//!
//! A timer task sleeps until the due time, re-reads the execution and its
//! automation, advances past the delay node, clears the due time, and
//! re-enters the interpreter. The registry refuses to arm a second timer
//! for an id it already tracks, which makes recovery idempotent: calling
//! the recovery scan twice cannot double-fire a wait or double-deliver a
//! message.

use chrono::{DateTime, Duration, Utc};
use rustc_hash::FxHashMap;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, instrument, warn};

use crate::execution::{ExecutionStatus, LogEntry};
use crate::graph::GraphView;

use super::{Engine, EngineError, Result};

/// Active delay timers keyed by execution id.
pub(super) struct TimerRegistry {
    timers: Mutex<FxHashMap<String, JoinHandle<()>>>,
}

impl TimerRegistry {
    pub(super) fn new() -> Self {
        Self {
            timers: Mutex::new(FxHashMap::default()),
        }
    }

    pub(super) async fn remove(&self, execution_id: &str) {
        self.timers.lock().await.remove(execution_id);
    }
}

impl Engine {
    /// Arm a timer that wakes `execution_id` at `due`. Returns `false`
    /// without arming when a timer for this id is already registered.
    ///
    /// The durable record must already carry the suspension
    /// (`suspend` happens before this is called); the timer is only the
    /// wake-up mechanism.
    pub(crate) async fn arm_timer(&self, execution_id: &str, due: DateTime<Utc>) -> bool {
        let mut timers = self.inner.timers.timers.lock().await;
        if timers.contains_key(execution_id) {
            return false;
        }

        let wait = (due - Utc::now())
            .max(Duration::zero())
            .to_std()
            .unwrap_or_default();
        debug!(%execution_id, wait_ms = wait.as_millis() as u64, "arming delay timer");

        let engine = self.clone();
        let id = execution_id.to_string();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(wait).await;
            engine.fire_timer(&id).await;
        });
        timers.insert(execution_id.to_string(), handle);
        true
    }

    /// Timer callback: resume the execution past its delay node.
    ///
    /// Returns a boxed future with an explicit `Send` bound so the
    /// `run_execution` → `arm_timer` → `fire_timer` recursion crosses a
    /// concrete (non-opaque) type, which is what lets the compiler prove the
    /// spawned timer task is `Send`.
    fn fire_timer<'a>(
        &'a self,
        execution_id: &'a str,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send + 'a>> {
        Box::pin(self.fire_timer_inner(execution_id))
    }

    #[instrument(skip(self))]
    async fn fire_timer_inner(&self, execution_id: &str) {
        debug!("delay timer fired");
        match self.resume_from_delay(execution_id).await {
            Ok(true) => self.run_execution(execution_id).await,
            Ok(false) => {}
            Err(error) => {
                warn!(%error, "resuming suspended execution failed");
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
        self.inner.timers.remove(execution_id).await;
    }

    /// Advance a suspended execution to its delay node's successor and
    /// clear the due time. Returns `false` when the record is no longer
    /// suspended (completed, failed, or already resumed elsewhere) and the
    /// interpreter should not be re-entered.
    async fn resume_from_delay(&self, execution_id: &str) -> Result<bool> {
        let execution = self
            .inner
            .executions
            .get(execution_id)
            .await?
            .ok_or_else(|| EngineError::ExecutionNotFound {
                id: execution_id.to_string(),
            })?;
        if !execution.is_suspended() {
            debug!(status = execution.status.as_str(), "execution no longer suspended, skipping");
            return Ok(false);
        }
        let Some(delay_node_id) = execution.current_node_id.clone() else {
            // suspend() always records the position; a record without one
            // cannot be resumed.
            warn!("suspended execution has no current node, skipping");
            return Ok(false);
        };

        let automation = self
            .inner
            .automations
            .get(&execution.automation_id)
            .await?
            .ok_or_else(|| EngineError::AutomationNotFound {
                id: execution.automation_id.clone(),
            })?;
        let graph = GraphView::new(&automation.nodes, &automation.edges);

        let Some(next_id) = graph.successor(&delay_node_id) else {
            // Graph integrity broke while the execution was parked (the
            // delay node or its edge was edited away).
            let error = EngineError::MissingOutgoingEdge {
                node_id: delay_node_id.clone(),
            };
            let node_type = graph
                .node(&delay_node_id)
                .map(|n| n.type_name().to_string())
                .unwrap_or_else(|| "delay".to_string());
            if let Err(log_error) = self
                .inner
                .executions
                .append_log(
                    execution_id,
                    LogEntry::failure(&delay_node_id, node_type, error.to_string()),
                )
                .await
            {
                warn!(%log_error, "could not append failure log entry");
            }
            return Err(error);
        };

        self.inner
            .executions
            .clear_schedule(execution_id, next_id)
            .await?;
        Ok(true)
    }
}
