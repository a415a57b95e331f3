//! Persistence seams for automations and executions.
//!
//! The engine depends only on the two traits here. [`AutomationStore`] is
//! the authoring subsystem's document store (the engine itself only reads
//! full graphs by id); [`ExecutionStore`] carries every mutation the
//! interpreter and scheduler perform, expressed as explicit atomic
//! transitions rather than a generic partial update so a backend can map
//! each one to a single-record write.
//!
//! # Backends
//!
//! - [`memory`] — volatile mutex-guarded maps for tests and development.
//! - [`sqlite`] — durable sqlx-backed persistence (feature `sqlite`,
//!   enabled by default).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use miette::Diagnostic;
use thiserror::Error;

use crate::execution::{Execution, ExecutionStatus, LogEntry};
use crate::model::{Automation, Edge, Node};

pub mod memory;
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use memory::{InMemoryAutomationStore, InMemoryExecutionStore};
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStore;

/// Automation names are unique and 1–100 characters after trimming.
pub const MAX_NAME_LEN: usize = 100;

/// Errors surfaced by storage backends.
#[derive(Debug, Error, Diagnostic)]
pub enum StorageError {
    #[error("{what} not found: {id}")]
    #[diagnostic(code(mailgraph::storage::not_found))]
    NotFound { what: &'static str, id: String },

    #[error("automation name must be unique: {name}")]
    #[diagnostic(
        code(mailgraph::storage::duplicate_name),
        help("Pick a name no other automation uses.")
    )]
    DuplicateName { name: String },

    #[error("invalid automation name: {reason}")]
    #[diagnostic(code(mailgraph::storage::invalid_name))]
    InvalidName { reason: String },

    #[error("serialization failed: {source}")]
    #[diagnostic(code(mailgraph::storage::serde))]
    Serde {
        #[source]
        source: serde_json::Error,
    },

    #[error("storage backend error: {message}")]
    #[diagnostic(
        code(mailgraph::storage::backend),
        help("Check that the database is reachable and migrated.")
    )]
    Backend { message: String },
}

impl StorageError {
    pub fn backend(message: impl Into<String>) -> Self {
        StorageError::Backend {
            message: message.into(),
        }
    }

    pub fn automation_not_found(id: impl Into<String>) -> Self {
        StorageError::NotFound {
            what: "automation",
            id: id.into(),
        }
    }

    pub fn execution_not_found(id: impl Into<String>) -> Self {
        StorageError::NotFound {
            what: "execution",
            id: id.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, StorageError>;

/// Validate and normalize an automation name (trimmed, 1–100 chars).
pub fn normalize_name(name: &str) -> Result<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(StorageError::InvalidName {
            reason: "name must not be empty".to_string(),
        });
    }
    if trimmed.len() > MAX_NAME_LEN {
        return Err(StorageError::InvalidName {
            reason: format!("name must be at most {MAX_NAME_LEN} characters"),
        });
    }
    Ok(trimmed.to_string())
}

/// Partial update of a stored automation. `None` fields are left untouched;
/// nodes and edges always change together.
#[derive(Clone, Debug, Default)]
pub struct AutomationUpdate {
    pub name: Option<String>,
    pub graph: Option<(Vec<Node>, Vec<Edge>)>,
}

/// Listing row for automations: identity and timestamps without the graph.
#[derive(Clone, Debug, PartialEq)]
pub struct AutomationSummary {
    pub id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Document store for saved automations, keyed by id with a uniqueness
/// constraint on `name`.
#[async_trait]
pub trait AutomationStore: Send + Sync {
    async fn create(&self, name: &str, nodes: Vec<Node>, edges: Vec<Edge>) -> Result<Automation>;

    async fn get(&self, id: &str) -> Result<Option<Automation>>;

    /// Apply `update`; errors with `NotFound` for unknown ids.
    async fn update(&self, id: &str, update: AutomationUpdate) -> Result<Automation>;

    /// Returns `true` when a record was deleted.
    async fn delete(&self, id: &str) -> Result<bool>;

    /// Summaries of all automations, most recently updated first.
    async fn list(&self) -> Result<Vec<AutomationSummary>>;
}

/// Store for execution records.
///
/// Each mutating method is one atomic per-record transition; together they
/// cover every write the interpreter and scheduler perform. All of them
/// error with `NotFound` for unknown ids.
#[async_trait]
pub trait ExecutionStore: Send + Sync {
    async fn create(&self, execution: &Execution) -> Result<()>;

    async fn get(&self, id: &str) -> Result<Option<Execution>>;

    /// Most recently created executions, capped at `limit`.
    async fn list_recent(&self, limit: u32) -> Result<Vec<Execution>>;

    /// Append one entry to the execution's audit log.
    async fn append_log(&self, id: &str, entry: LogEntry) -> Result<()>;

    /// Transition to `running` positioned at `current_node_id`.
    async fn mark_running(&self, id: &str, current_node_id: &str) -> Result<()>;

    /// Park at a delay node: `pending`, positioned at the delay node,
    /// due at `scheduled_for`.
    async fn suspend(
        &self,
        id: &str,
        current_node_id: &str,
        scheduled_for: DateTime<Utc>,
    ) -> Result<()>;

    /// Wake from a delay: advance to `next_node_id` and clear the due time.
    async fn clear_schedule(&self, id: &str, next_node_id: &str) -> Result<()>;

    /// Terminal transition to `completed` or `failed`.
    async fn finish(
        &self,
        id: &str,
        status: ExecutionStatus,
        completed_at: DateTime<Utc>,
    ) -> Result<()>;

    /// All suspended executions (`pending` with a due time), for startup
    /// recovery.
    async fn find_suspended(&self) -> Result<Vec<Execution>>;
}
