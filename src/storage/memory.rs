//! Volatile in-memory backends for tests and development.
//!
//! State lives in mutex-guarded maps and disappears with the process, which
//! also makes these stores the simplest way to exercise restart recovery in
//! tests: drop the engine, keep the store, build a new engine on top.

use chrono::{DateTime, Utc};
use rustc_hash::FxHashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

use async_trait::async_trait;

use crate::execution::{Execution, ExecutionStatus, LogEntry};
use crate::model::{Automation, Edge, Node};

use super::{
    AutomationStore, AutomationSummary, AutomationUpdate, ExecutionStore, Result, StorageError,
    normalize_name,
};

/// In-memory [`AutomationStore`].
#[derive(Debug, Default)]
pub struct InMemoryAutomationStore {
    automations: Mutex<FxHashMap<String, Automation>>,
}

impl InMemoryAutomationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AutomationStore for InMemoryAutomationStore {
    async fn create(&self, name: &str, nodes: Vec<Node>, edges: Vec<Edge>) -> Result<Automation> {
        let name = normalize_name(name)?;
        let mut automations = self.automations.lock().await;
        if automations.values().any(|a| a.name == name) {
            return Err(StorageError::DuplicateName { name });
        }
        let now = Utc::now();
        let automation = Automation {
            id: Uuid::new_v4().to_string(),
            name,
            nodes,
            edges,
            created_at: now,
            updated_at: now,
        };
        automations.insert(automation.id.clone(), automation.clone());
        Ok(automation)
    }

    async fn get(&self, id: &str) -> Result<Option<Automation>> {
        Ok(self.automations.lock().await.get(id).cloned())
    }

    async fn update(&self, id: &str, update: AutomationUpdate) -> Result<Automation> {
        let mut automations = self.automations.lock().await;
        let new_name = match update.name {
            Some(name) => {
                let name = normalize_name(&name)?;
                if automations.values().any(|a| a.name == name && a.id != id) {
                    return Err(StorageError::DuplicateName { name });
                }
                Some(name)
            }
            None => None,
        };
        let automation = automations
            .get_mut(id)
            .ok_or_else(|| StorageError::automation_not_found(id))?;
        if let Some(name) = new_name {
            automation.name = name;
        }
        if let Some((nodes, edges)) = update.graph {
            automation.nodes = nodes;
            automation.edges = edges;
        }
        automation.updated_at = Utc::now();
        Ok(automation.clone())
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        Ok(self.automations.lock().await.remove(id).is_some())
    }

    async fn list(&self) -> Result<Vec<AutomationSummary>> {
        let automations = self.automations.lock().await;
        let mut summaries: Vec<AutomationSummary> = automations
            .values()
            .map(|a| AutomationSummary {
                id: a.id.clone(),
                name: a.name.clone(),
                created_at: a.created_at,
                updated_at: a.updated_at,
            })
            .collect();
        summaries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(summaries)
    }
}

/// In-memory [`ExecutionStore`].
#[derive(Debug, Default)]
pub struct InMemoryExecutionStore {
    executions: Mutex<FxHashMap<String, Execution>>,
}

impl InMemoryExecutionStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn with_execution<T>(
        &self,
        id: &str,
        mutate: impl FnOnce(&mut Execution) -> T,
    ) -> Result<T> {
        let mut executions = self.executions.lock().await;
        let execution = executions
            .get_mut(id)
            .ok_or_else(|| StorageError::execution_not_found(id))?;
        let out = mutate(execution);
        execution.updated_at = Utc::now();
        Ok(out)
    }
}

#[async_trait]
impl ExecutionStore for InMemoryExecutionStore {
    async fn create(&self, execution: &Execution) -> Result<()> {
        self.executions
            .lock()
            .await
            .insert(execution.id.clone(), execution.clone());
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Execution>> {
        Ok(self.executions.lock().await.get(id).cloned())
    }

    async fn list_recent(&self, limit: u32) -> Result<Vec<Execution>> {
        let executions = self.executions.lock().await;
        let mut all: Vec<Execution> = executions.values().cloned().collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        all.truncate(limit as usize);
        Ok(all)
    }

    async fn append_log(&self, id: &str, entry: LogEntry) -> Result<()> {
        self.with_execution(id, |execution| execution.execution_log.push(entry))
            .await
    }

    async fn mark_running(&self, id: &str, current_node_id: &str) -> Result<()> {
        self.with_execution(id, |execution| {
            execution.status = ExecutionStatus::Running;
            execution.current_node_id = Some(current_node_id.to_string());
        })
        .await
    }

    async fn suspend(
        &self,
        id: &str,
        current_node_id: &str,
        scheduled_for: DateTime<Utc>,
    ) -> Result<()> {
        self.with_execution(id, |execution| {
            execution.status = ExecutionStatus::Pending;
            execution.current_node_id = Some(current_node_id.to_string());
            execution.scheduled_for = Some(scheduled_for);
        })
        .await
    }

    async fn clear_schedule(&self, id: &str, next_node_id: &str) -> Result<()> {
        self.with_execution(id, |execution| {
            execution.current_node_id = Some(next_node_id.to_string());
            execution.scheduled_for = None;
        })
        .await
    }

    async fn finish(
        &self,
        id: &str,
        status: ExecutionStatus,
        completed_at: DateTime<Utc>,
    ) -> Result<()> {
        self.with_execution(id, |execution| {
            execution.status = status;
            execution.completed_at = Some(completed_at);
        })
        .await
    }

    async fn find_suspended(&self) -> Result<Vec<Execution>> {
        let executions = self.executions.lock().await;
        Ok(executions
            .values()
            .filter(|e| e.is_suspended())
            .cloned()
            .collect())
    }
}
