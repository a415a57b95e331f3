//! Notifier doubles for integration tests.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use mailgraph::notifier::{Notifier, NotifierError};

/// Records every delivery; can be switched into a failing mode to exercise
/// the interpreter's step-failure path.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sends: Mutex<Vec<(String, String)>>,
    fail: AtomicBool,
    counter: AtomicUsize,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_deliveries(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn sends(&self) -> Vec<(String, String)> {
        self.sends.lock().unwrap().clone()
    }

    pub fn send_count(&self) -> usize {
        self.sends.lock().unwrap().len()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, recipient: &str, message: &str) -> Result<String, NotifierError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(NotifierError::delivery("transport unavailable"));
        }
        self.sends
            .lock()
            .unwrap()
            .push((recipient.to_string(), message.to_string()));
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        Ok(format!("delivery-{n}"))
    }
}
