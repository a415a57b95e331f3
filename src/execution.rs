//! Execution records: one test run of an automation against one subject.
//!
//! An [`Execution`] is created `pending`, moves to `running` while the
//! interpreter is actively stepping, drops back to `pending` (with
//! `scheduled_for` set) while parked at a delay node, and terminates as
//! `completed` or `failed`. Records are never deleted by the engine; the
//! append-only [`LogEntry`] list is the audit trail of the run.
//!
//! `current_node_id` and `scheduled_for` are the only facts the scheduler
//! needs to rebuild its in-memory timers after a restart.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle state of an execution.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    /// Created but not stepping, or suspended at a delay node.
    Pending,
    /// The interpreter is actively walking the graph.
    Running,
    /// Reached the end node.
    Completed,
    /// A step errored; terminal, inspectable via the log.
    Failed,
}

impl ExecutionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ExecutionStatus::Pending => "pending",
            ExecutionStatus::Running => "running",
            ExecutionStatus::Completed => "completed",
            ExecutionStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(ExecutionStatus::Pending),
            "running" => Some(ExecutionStatus::Running),
            "completed" => Some(ExecutionStatus::Completed),
            "failed" => Some(ExecutionStatus::Failed),
            _ => None,
        }
    }

    /// Terminal states accept no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, ExecutionStatus::Completed | ExecutionStatus::Failed)
    }
}

/// Outcome of a single logged step.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogStatus {
    Success,
    Failed,
}

/// One append-only entry in an execution's audit log.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub node_id: String,
    /// Wire type name of the node (`"action"`, `"delay"`, ...).
    pub node_type: String,
    pub timestamp: DateTime<Utc>,
    pub status: LogStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl LogEntry {
    pub fn success(
        node_id: impl Into<String>,
        node_type: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            node_id: node_id.into(),
            node_type: node_type.into(),
            timestamp: Utc::now(),
            status: LogStatus::Success,
            message: Some(message.into()),
            error: None,
        }
    }

    pub fn failure(
        node_id: impl Into<String>,
        node_type: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            node_id: node_id.into(),
            node_type: node_type.into(),
            timestamp: Utc::now(),
            status: LogStatus::Failed,
            message: None,
            error: Some(error.into()),
        }
    }
}

/// One run of an automation against one subject identity.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Execution {
    pub id: String,
    pub automation_id: String,
    /// The test recipient identity; also the value condition rules compare.
    pub subject: String,
    pub status: ExecutionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_node_id: Option<String>,
    #[serde(default)]
    pub execution_log: Vec<LogEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduled_for: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Execution {
    /// Fresh `pending` record for a new test run.
    pub fn new(automation_id: impl Into<String>, subject: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            automation_id: automation_id.into(),
            subject: subject.into(),
            status: ExecutionStatus::Pending,
            current_node_id: None,
            execution_log: Vec::new(),
            scheduled_for: None,
            completed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// True when the record is parked at a delay node awaiting its due time.
    pub fn is_suspended(&self) -> bool {
        self.status == ExecutionStatus::Pending && self.scheduled_for.is_some()
    }
}
