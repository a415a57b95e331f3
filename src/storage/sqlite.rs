//! SQLite-backed persistence for automations and executions.
//!
//! One [`SqliteStore`] implements both storage traits over a shared
//! connection pool. Graphs and execution logs are stored as JSON columns;
//! log appends use SQLite's `json_insert` so an append is a single-record
//! atomic update rather than a read-modify-write of the whole row.
//!
//! When the `sqlite-migrations` feature is enabled (default), embedded
//! migrations (`sqlx::migrate!("./migrations")`) are executed on connect;
//! disabling the feature assumes external migration orchestration.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool, sqlite::SqliteRow};
use tracing::instrument;
use uuid::Uuid;

use crate::execution::{Execution, ExecutionStatus, LogEntry};
use crate::model::{Automation, Edge, Node};

use super::{
    AutomationStore, AutomationSummary, AutomationUpdate, ExecutionStore, Result, StorageError,
    normalize_name,
};

/// Durable store over a shared SQLite pool.
pub struct SqliteStore {
    pool: Arc<SqlitePool>,
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore").finish()
    }
}

impl SqliteStore {
    /// Connect (or create) a SQLite database at `database_url`.
    /// Example URL: `"sqlite://mailgraph.db?mode=rwc"`.
    #[instrument(skip(database_url))]
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = SqlitePool::connect(database_url)
            .await
            .map_err(|e| StorageError::backend(format!("connect error: {e}")))?;
        #[cfg(feature = "sqlite-migrations")]
        {
            if let Err(e) = sqlx::migrate!("./migrations").run(&pool).await {
                return Err(StorageError::backend(format!("migration failure: {e}")));
            }
        }
        Ok(Self {
            pool: Arc::new(pool),
        })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn serialize<T: serde::Serialize>(value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(|source| StorageError::Serde { source })
}

fn deserialize<T: serde::de::DeserializeOwned>(json: &str) -> Result<T> {
    serde_json::from_str(json).map_err(|source| StorageError::Serde { source })
}

/// Timestamps are stored as RFC3339 text; record timestamps fall back to
/// "now" on a malformed value, but `scheduled_for` is parsed strictly since
/// the scheduler arms real timers from it.
fn parse_timestamp_lenient(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn parse_timestamp_strict(raw: &str, column: &'static str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StorageError::backend(format!("malformed {column}: {e}")))
}

fn is_unique_violation(error: &sqlx::Error) -> bool {
    matches!(error, sqlx::Error::Database(db) if db.is_unique_violation())
}

fn automation_from_row(row: &SqliteRow) -> Result<Automation> {
    let nodes_json: String = row.get("nodes_json");
    let edges_json: String = row.get("edges_json");
    Ok(Automation {
        id: row.get("id"),
        name: row.get("name"),
        nodes: deserialize(&nodes_json)?,
        edges: deserialize(&edges_json)?,
        created_at: parse_timestamp_lenient(&row.get::<String, _>("created_at")),
        updated_at: parse_timestamp_lenient(&row.get::<String, _>("updated_at")),
    })
}

fn execution_from_row(row: &SqliteRow) -> Result<Execution> {
    let status_raw: String = row.get("status");
    let status = ExecutionStatus::parse(&status_raw)
        .ok_or_else(|| StorageError::backend(format!("unknown execution status: {status_raw}")))?;
    let log_json: String = row.get("execution_log_json");
    let scheduled_for = row
        .get::<Option<String>, _>("scheduled_for")
        .map(|raw| parse_timestamp_strict(&raw, "scheduled_for"))
        .transpose()?;
    let completed_at = row
        .get::<Option<String>, _>("completed_at")
        .map(|raw| parse_timestamp_lenient(&raw));
    Ok(Execution {
        id: row.get("id"),
        automation_id: row.get("automation_id"),
        subject: row.get("subject"),
        status,
        current_node_id: row.get("current_node_id"),
        execution_log: deserialize(&log_json)?,
        scheduled_for,
        completed_at,
        created_at: parse_timestamp_lenient(&row.get::<String, _>("created_at")),
        updated_at: parse_timestamp_lenient(&row.get::<String, _>("updated_at")),
    })
}

#[async_trait]
impl AutomationStore for SqliteStore {
    #[instrument(skip(self, nodes, edges), err)]
    async fn create(&self, name: &str, nodes: Vec<Node>, edges: Vec<Edge>) -> Result<Automation> {
        let name = normalize_name(name)?;
        let now = Utc::now();
        let automation = Automation {
            id: Uuid::new_v4().to_string(),
            name,
            nodes,
            edges,
            created_at: now,
            updated_at: now,
        };
        sqlx::query(
            r#"
            INSERT INTO automations (id, name, nodes_json, edges_json, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&automation.id)
        .bind(&automation.name)
        .bind(serialize(&automation.nodes)?)
        .bind(serialize(&automation.edges)?)
        .bind(automation.created_at.to_rfc3339())
        .bind(automation.updated_at.to_rfc3339())
        .execute(&*self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                StorageError::DuplicateName {
                    name: automation.name.clone(),
                }
            } else {
                StorageError::backend(format!("insert automation: {e}"))
            }
        })?;
        Ok(automation)
    }

    #[instrument(skip(self), err)]
    async fn get(&self, id: &str) -> Result<Option<Automation>> {
        let row = sqlx::query("SELECT * FROM automations WHERE id = ?1")
            .bind(id)
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| StorageError::backend(format!("select automation: {e}")))?;
        row.as_ref().map(automation_from_row).transpose()
    }

    #[instrument(skip(self, update), err)]
    async fn update(&self, id: &str, update: AutomationUpdate) -> Result<Automation> {
        let mut automation = AutomationStore::get(self, id)
            .await?
            .ok_or_else(|| StorageError::automation_not_found(id))?;
        if let Some(name) = update.name {
            automation.name = normalize_name(&name)?;
        }
        if let Some((nodes, edges)) = update.graph {
            automation.nodes = nodes;
            automation.edges = edges;
        }
        automation.updated_at = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE automations
            SET name = ?2, nodes_json = ?3, edges_json = ?4, updated_at = ?5
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(&automation.name)
        .bind(serialize(&automation.nodes)?)
        .bind(serialize(&automation.edges)?)
        .bind(automation.updated_at.to_rfc3339())
        .execute(&*self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                StorageError::DuplicateName {
                    name: automation.name.clone(),
                }
            } else {
                StorageError::backend(format!("update automation: {e}"))
            }
        })?;
        if result.rows_affected() == 0 {
            return Err(StorageError::automation_not_found(id));
        }
        Ok(automation)
    }

    #[instrument(skip(self), err)]
    async fn delete(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM automations WHERE id = ?1")
            .bind(id)
            .execute(&*self.pool)
            .await
            .map_err(|e| StorageError::backend(format!("delete automation: {e}")))?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self), err)]
    async fn list(&self) -> Result<Vec<AutomationSummary>> {
        let rows = sqlx::query(
            r#"
            SELECT id, name, created_at, updated_at
            FROM automations
            ORDER BY updated_at DESC
            "#,
        )
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| StorageError::backend(format!("list automations: {e}")))?;
        Ok(rows
            .into_iter()
            .map(|row| AutomationSummary {
                id: row.get("id"),
                name: row.get("name"),
                created_at: parse_timestamp_lenient(&row.get::<String, _>("created_at")),
                updated_at: parse_timestamp_lenient(&row.get::<String, _>("updated_at")),
            })
            .collect())
    }
}

/// Map an UPDATE touching exactly one row; zero rows means the id is gone.
fn require_row(result: sqlx::sqlite::SqliteQueryResult, id: &str) -> Result<()> {
    if result.rows_affected() == 0 {
        Err(StorageError::execution_not_found(id))
    } else {
        Ok(())
    }
}

#[async_trait]
impl ExecutionStore for SqliteStore {
    #[instrument(skip(self, execution), err)]
    async fn create(&self, execution: &Execution) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO executions (
                id, automation_id, subject, status, current_node_id,
                execution_log_json, scheduled_for, completed_at, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(&execution.id)
        .bind(&execution.automation_id)
        .bind(&execution.subject)
        .bind(execution.status.as_str())
        .bind(&execution.current_node_id)
        .bind(serialize(&execution.execution_log)?)
        .bind(execution.scheduled_for.map(|t| t.to_rfc3339()))
        .bind(execution.completed_at.map(|t| t.to_rfc3339()))
        .bind(execution.created_at.to_rfc3339())
        .bind(execution.updated_at.to_rfc3339())
        .execute(&*self.pool)
        .await
        .map_err(|e| StorageError::backend(format!("insert execution: {e}")))?;
        Ok(())
    }

    #[instrument(skip(self), err)]
    async fn get(&self, id: &str) -> Result<Option<Execution>> {
        let row = sqlx::query("SELECT * FROM executions WHERE id = ?1")
            .bind(id)
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| StorageError::backend(format!("select execution: {e}")))?;
        row.as_ref().map(execution_from_row).transpose()
    }

    #[instrument(skip(self), err)]
    async fn list_recent(&self, limit: u32) -> Result<Vec<Execution>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM executions
            ORDER BY created_at DESC
            LIMIT ?1
            "#,
        )
        .bind(limit)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| StorageError::backend(format!("list executions: {e}")))?;
        rows.iter().map(execution_from_row).collect()
    }

    #[instrument(skip(self, entry), err)]
    async fn append_log(&self, id: &str, entry: LogEntry) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE executions
            SET execution_log_json = json_insert(execution_log_json, '$[#]', json(?2)),
                updated_at = ?3
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(serialize(&entry)?)
        .bind(Utc::now().to_rfc3339())
        .execute(&*self.pool)
        .await
        .map_err(|e| StorageError::backend(format!("append log: {e}")))?;
        require_row(result, id)
    }

    #[instrument(skip(self), err)]
    async fn mark_running(&self, id: &str, current_node_id: &str) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE executions
            SET status = 'running', current_node_id = ?2, updated_at = ?3
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(current_node_id)
        .bind(Utc::now().to_rfc3339())
        .execute(&*self.pool)
        .await
        .map_err(|e| StorageError::backend(format!("mark running: {e}")))?;
        require_row(result, id)
    }

    #[instrument(skip(self), err)]
    async fn suspend(
        &self,
        id: &str,
        current_node_id: &str,
        scheduled_for: DateTime<Utc>,
    ) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE executions
            SET status = 'pending', current_node_id = ?2, scheduled_for = ?3, updated_at = ?4
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(current_node_id)
        .bind(scheduled_for.to_rfc3339())
        .bind(Utc::now().to_rfc3339())
        .execute(&*self.pool)
        .await
        .map_err(|e| StorageError::backend(format!("suspend execution: {e}")))?;
        require_row(result, id)
    }

    #[instrument(skip(self), err)]
    async fn clear_schedule(&self, id: &str, next_node_id: &str) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE executions
            SET current_node_id = ?2, scheduled_for = NULL, updated_at = ?3
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(next_node_id)
        .bind(Utc::now().to_rfc3339())
        .execute(&*self.pool)
        .await
        .map_err(|e| StorageError::backend(format!("clear schedule: {e}")))?;
        require_row(result, id)
    }

    #[instrument(skip(self), err)]
    async fn finish(
        &self,
        id: &str,
        status: ExecutionStatus,
        completed_at: DateTime<Utc>,
    ) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE executions
            SET status = ?2, completed_at = ?3, updated_at = ?4
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(status.as_str())
        .bind(completed_at.to_rfc3339())
        .bind(Utc::now().to_rfc3339())
        .execute(&*self.pool)
        .await
        .map_err(|e| StorageError::backend(format!("finish execution: {e}")))?;
        require_row(result, id)
    }

    #[instrument(skip(self), err)]
    async fn find_suspended(&self) -> Result<Vec<Execution>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM executions
            WHERE status = 'pending' AND scheduled_for IS NOT NULL
            "#,
        )
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| StorageError::backend(format!("find suspended: {e}")))?;
        rows.iter().map(execution_from_row).collect()
    }
}
