//! # Mailgraph: Graph-driven Message-Automation Engine
//!
//! Mailgraph executes operator-built automation graphs — send a message,
//! wait, branch on a condition — against a single test recipient, with
//! durable suspension: a delay node parks the execution in storage and a
//! restart-safe timer wakes it at the due time, even days later, even after
//! the process has been restarted in between.
//!
//! ## Core Concepts
//!
//! - **Automation**: the saved workflow graph of typed [`model::Node`]s and
//!   directed [`model::Edge`]s
//! - **Validation**: a pure structural report ([`validation::validate`])
//!   gating both save and execution start
//! - **Execution**: one run of an automation against one subject identity,
//!   with an append-only audit log
//! - **Suspension**: delay nodes persist a due time and hold no task,
//!   thread, or lock while waiting
//! - **Recovery**: on startup, timers are rebuilt from the durable records
//!   alone
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use mailgraph::engine::Engine;
//! use mailgraph::model::{ActionData, Edge, Node, NodeKind};
//! use mailgraph::notifier::TracingNotifier;
//! use mailgraph::storage::{InMemoryAutomationStore, InMemoryExecutionStore};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = Engine::new(
//!     Arc::new(InMemoryAutomationStore::new()),
//!     Arc::new(InMemoryExecutionStore::new()),
//!     Arc::new(TracingNotifier::new()),
//! );
//!
//! let automation = engine
//!     .create_automation(
//!         "welcome",
//!         vec![
//!             Node::new("start", NodeKind::Start),
//!             Node::new("hello", NodeKind::Action(ActionData { message: "Hi!".into() })),
//!             Node::new("end", NodeKind::End),
//!         ],
//!         vec![
//!             Edge::new("e1", "start", "hello"),
//!             Edge::new("e2", "hello", "end"),
//!         ],
//!     )
//!     .await?;
//!
//! // Fire-and-forget: returns the pending record, the run proceeds on its own.
//! let execution = engine.start_execution(&automation.id, "test@example.com").await?;
//!
//! // After a restart: rebuild timers for everything suspended at a delay.
//! engine.resume_pending_executions().await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Guide
//!
//! - [`model`] - Automation graph value types (nodes, edges, payloads)
//! - [`graph`] - Read-only adjacency view the interpreter walks
//! - [`validation`] - Structural validation report
//! - [`condition`] - Condition-rule evaluation
//! - [`execution`] - Execution records and the append-only log
//! - [`engine`] - The interpreter loop, delay scheduler, and engine facade
//! - [`storage`] - Persistence seams with in-memory and SQLite backends
//! - [`notifier`] - Outbound delivery capability
//! - [`telemetry`] - Tracing subscriber setup

pub mod condition;
pub mod engine;
pub mod execution;
pub mod graph;
pub mod model;
pub mod notifier;
pub mod storage;
pub mod telemetry;
pub mod validation;
