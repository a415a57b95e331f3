//! Outbound delivery capability.
//!
//! The engine never talks to a transport directly; an action node hands the
//! subject identity and message text to whatever [`Notifier`] the engine was
//! built with and records the returned delivery id in the execution log.
//! Production deployments plug an SMTP or webhook transport in here;
//! [`TracingNotifier`] is the built-in development implementation that logs
//! the message instead of sending it.

use async_trait::async_trait;
use miette::Diagnostic;
use thiserror::Error;
use uuid::Uuid;

/// Failure surfaced by a notifier transport.
#[derive(Debug, Error, Diagnostic)]
pub enum NotifierError {
    /// The transport accepted the request but could not deliver.
    #[error("failed to send message: {message}")]
    #[diagnostic(
        code(mailgraph::notifier::delivery),
        help("Check transport credentials and connectivity; the execution is marked failed and can be re-run.")
    )]
    Delivery { message: String },
}

impl NotifierError {
    pub fn delivery(message: impl Into<String>) -> Self {
        NotifierError::Delivery {
            message: message.into(),
        }
    }
}

/// Opaque message-delivery capability.
///
/// `send` returns a transport-assigned delivery id on success. The engine
/// performs no retries; a delivery error fails the execution's current step.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, recipient: &str, message: &str) -> Result<String, NotifierError>;
}

/// Development notifier: logs the outbound message via `tracing` and
/// fabricates a delivery id. Stands in for a real transport the same way
/// the usual throwaway SMTP test account would.
#[derive(Debug, Default)]
pub struct TracingNotifier;

impl TracingNotifier {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Notifier for TracingNotifier {
    async fn send(&self, recipient: &str, message: &str) -> Result<String, NotifierError> {
        let delivery_id = Uuid::new_v4().to_string();
        tracing::info!(recipient, delivery_id, "delivering message: {message}");
        Ok(delivery_id)
    }
}
