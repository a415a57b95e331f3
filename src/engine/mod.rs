//! Engine runtime: validation-gated saves, execution kickoff, and recovery.
//!
//! [`Engine`] is the facade the transport layer talks to. It owns the
//! storage seams, the notifier capability, and the delay-timer registry,
//! and exposes the three operational entry points:
//!
//! - the save gate ([`create_automation`](Engine::create_automation) /
//!   [`update_automation`](Engine::update_automation)) — structural
//!   validation runs before anything is persisted;
//! - the trigger ([`start_execution`](Engine::start_execution)) — validates
//!   again, creates the `pending` record, and hands the execution id to a
//!   detached task; the caller never awaits the run;
//! - recovery ([`resume_pending_executions`](Engine::resume_pending_executions))
//!   — invoked once at process start to re-arm timers for every execution
//!   suspended before the restart.
//!
//! The interpreter loop and the delay scheduler live in the private
//! submodules; everything they persist goes through the storage traits, so
//! the engine holds no authoritative state of its own.

use std::sync::Arc;

use miette::Diagnostic;
use thiserror::Error;
use tracing::{debug, error};

use crate::execution::Execution;
use crate::model::{Automation, Edge, Node};
use crate::notifier::{Notifier, NotifierError};
use crate::storage::{
    AutomationStore, AutomationSummary, AutomationUpdate, ExecutionStore, StorageError,
};
use crate::validation;

mod config;
mod interpreter;
mod scheduler;

pub use config::EngineConfig;

use scheduler::TimerRegistry;

/// Default page size for [`Engine::recent_executions`].
pub const DEFAULT_RECENT_LIMIT: u32 = 50;

/// Errors surfaced by engine entry points.
///
/// Step-level failures inside a running execution are not surfaced here;
/// they are recorded in the execution's log and terminal status.
#[derive(Debug, Error, Diagnostic)]
pub enum EngineError {
    #[error("automation not found: {id}")]
    #[diagnostic(code(mailgraph::engine::automation_not_found))]
    AutomationNotFound { id: String },

    #[error("execution not found: {id}")]
    #[diagnostic(code(mailgraph::engine::execution_not_found))]
    ExecutionNotFound { id: String },

    /// The graph failed structural validation; `errors` is the full report.
    #[error("automation is invalid: {}", errors.join("; "))]
    #[diagnostic(
        code(mailgraph::engine::invalid_automation),
        help("Fix the reported graph defects and save again.")
    )]
    InvalidAutomation { errors: Vec<String> },

    #[error("subject identity must not be empty")]
    #[diagnostic(code(mailgraph::engine::invalid_subject))]
    InvalidSubject,

    #[error("start node not found")]
    #[diagnostic(code(mailgraph::engine::missing_start))]
    MissingStartNode,

    #[error("node {node_id} not found")]
    #[diagnostic(code(mailgraph::engine::node_not_found))]
    NodeNotFound { node_id: String },

    #[error("no outgoing edge from node {node_id}")]
    #[diagnostic(code(mailgraph::engine::missing_edge))]
    MissingOutgoingEdge { node_id: String },

    #[error("no {outcome} path found for condition node {node_id}")]
    #[diagnostic(code(mailgraph::engine::missing_branch))]
    MissingBranch { node_id: String, outcome: String },

    #[error("unknown node type: {node_type}")]
    #[diagnostic(code(mailgraph::engine::unknown_node_type))]
    UnknownNodeType { node_type: String },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Notifier(#[from] NotifierError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Storage(#[from] StorageError),
}

pub type Result<T> = std::result::Result<T, EngineError>;

struct EngineInner {
    automations: Arc<dyn AutomationStore>,
    executions: Arc<dyn ExecutionStore>,
    notifier: Arc<dyn Notifier>,
    timers: TimerRegistry,
}

/// The engine runtime. Cheap to clone; clones share stores, notifier, and
/// the timer registry.
#[derive(Clone)]
pub struct Engine {
    inner: Arc<EngineInner>,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine").finish()
    }
}

impl Engine {
    pub fn new(
        automations: Arc<dyn AutomationStore>,
        executions: Arc<dyn ExecutionStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            inner: Arc::new(EngineInner {
                automations,
                executions,
                notifier,
                timers: TimerRegistry::new(),
            }),
        }
    }

    /// Assemble an engine over the configured SQLite database with the
    /// development notifier. Hosts with a real transport use
    /// [`Engine::new`] and supply their own [`Notifier`].
    #[cfg(feature = "sqlite")]
    pub async fn from_config(config: &EngineConfig) -> Result<Self> {
        let store = Arc::new(crate::storage::SqliteStore::connect(&config.database_url()).await?);
        Ok(Self::new(
            store.clone(),
            store,
            Arc::new(crate::notifier::TracingNotifier::new()),
        ))
    }

    /* ---------- automation save gate ---------- */

    /// Validate and persist a new automation. The graph must pass the full
    /// structural report before it is stored.
    pub async fn create_automation(
        &self,
        name: &str,
        nodes: Vec<Node>,
        edges: Vec<Edge>,
    ) -> Result<Automation> {
        let errors = validation::validate(&nodes, &edges);
        if !errors.is_empty() {
            return Err(EngineError::InvalidAutomation { errors });
        }
        Ok(self.inner.automations.create(name, nodes, edges).await?)
    }

    /// Validate and persist changes to a stored automation. Only updates
    /// that touch the graph are re-validated.
    pub async fn update_automation(&self, id: &str, update: AutomationUpdate) -> Result<Automation> {
        if let Some((nodes, edges)) = &update.graph {
            let errors = validation::validate(nodes, edges);
            if !errors.is_empty() {
                return Err(EngineError::InvalidAutomation { errors });
            }
        }
        match self.inner.automations.update(id, update).await {
            Ok(automation) => Ok(automation),
            Err(StorageError::NotFound { .. }) => Err(EngineError::AutomationNotFound {
                id: id.to_string(),
            }),
            Err(other) => Err(other.into()),
        }
    }

    pub async fn automation(&self, id: &str) -> Result<Option<Automation>> {
        Ok(self.inner.automations.get(id).await?)
    }

    pub async fn list_automations(&self) -> Result<Vec<AutomationSummary>> {
        Ok(self.inner.automations.list().await?)
    }

    pub async fn delete_automation(&self, id: &str) -> Result<bool> {
        Ok(self.inner.automations.delete(id).await?)
    }

    /* ---------- execution trigger ---------- */

    /// Start a test execution of `automation_id` against `subject`.
    ///
    /// The automation is re-validated even though it passed at save time, to
    /// guard against records edited into an invalid state afterwards. On
    /// success the `pending` record is returned immediately and the
    /// interpreter runs on a detached task; callers observe progress by
    /// re-reading the execution.
    pub async fn start_execution(&self, automation_id: &str, subject: &str) -> Result<Execution> {
        let subject = subject.trim();
        if subject.is_empty() {
            return Err(EngineError::InvalidSubject);
        }
        let automation = self
            .inner
            .automations
            .get(automation_id)
            .await?
            .ok_or_else(|| EngineError::AutomationNotFound {
                id: automation_id.to_string(),
            })?;

        let errors = validation::validate(&automation.nodes, &automation.edges);
        if !errors.is_empty() {
            return Err(EngineError::InvalidAutomation { errors });
        }

        let execution = Execution::new(automation_id, subject);
        self.inner.executions.create(&execution).await?;
        debug!(execution_id = %execution.id, %automation_id, "execution created");

        let engine = self.clone();
        let execution_id = execution.id.clone();
        tokio::spawn(async move {
            engine.run_execution(&execution_id).await;
        });

        Ok(execution)
    }

    pub async fn execution(&self, id: &str) -> Result<Execution> {
        self.inner
            .executions
            .get(id)
            .await?
            .ok_or_else(|| EngineError::ExecutionNotFound { id: id.to_string() })
    }

    /// Most recent executions for operator inspection;
    /// [`DEFAULT_RECENT_LIMIT`] is the conventional page size.
    pub async fn recent_executions(&self, limit: u32) -> Result<Vec<Execution>> {
        Ok(self.inner.executions.list_recent(limit).await?)
    }

    /* ---------- startup recovery ---------- */

    /// Re-arm timers for every execution suspended at a delay node, using
    /// only the durable `scheduled_for`/`current_node_id` fields. Past-due
    /// executions continue immediately. Safe to call more than once:
    /// already-armed executions are skipped.
    ///
    /// Returns the number of timers armed by this call.
    pub async fn resume_pending_executions(&self) -> Result<usize> {
        let suspended = self.inner.executions.find_suspended().await?;
        debug!(count = suspended.len(), "found suspended executions to resume");

        let mut armed = 0;
        for execution in suspended {
            // find_suspended guarantees scheduled_for is set.
            let Some(due) = execution.scheduled_for else {
                error!(execution_id = %execution.id, "suspended execution without due time");
                continue;
            };
            if self.arm_timer(&execution.id, due).await {
                armed += 1;
            } else {
                debug!(execution_id = %execution.id, "timer already armed, skipping");
            }
        }
        Ok(armed)
    }
}
