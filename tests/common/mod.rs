//! Shared helpers for integration tests.

pub mod fixtures;
pub mod notifiers;

use std::future::Future;
use std::sync::Arc;

use mailgraph::engine::Engine;
use mailgraph::storage::{InMemoryAutomationStore, InMemoryExecutionStore};

use notifiers::RecordingNotifier;

/// Engine over in-memory stores plus handles to its collaborators.
pub struct TestRig {
    pub engine: Engine,
    pub automations: Arc<InMemoryAutomationStore>,
    pub executions: Arc<InMemoryExecutionStore>,
    pub notifier: Arc<RecordingNotifier>,
}

impl TestRig {
    pub fn new() -> Self {
        let automations = Arc::new(InMemoryAutomationStore::new());
        let executions = Arc::new(InMemoryExecutionStore::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let engine = Engine::new(automations.clone(), executions.clone(), notifier.clone());
        Self {
            engine,
            automations,
            executions,
            notifier,
        }
    }

    /// A second engine sharing this rig's stores and notifier, standing in
    /// for a freshly restarted process (its timer registry starts empty).
    pub fn restarted_engine(&self) -> Engine {
        Engine::new(
            self.automations.clone(),
            self.executions.clone(),
            self.notifier.clone(),
        )
    }
}

/// Poll `check` until it returns true, yielding to the runtime between
/// attempts. Panics after a bounded number of attempts so a stuck
/// execution fails the test instead of hanging it. Never sleeps, so it
/// does not trigger auto-advance on a paused clock.
pub async fn eventually<F, Fut>(what: &str, mut check: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    for _ in 0..10_000 {
        if check().await {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("condition not reached: {what}");
}
