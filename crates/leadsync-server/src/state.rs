use serde_json::Value;
use tokio::sync::mpsc;

/// Shared application state passed to all route handlers.
///
/// The webhook handler only ever enqueues; reconciliation happens on the
/// single consumer task, so no handler holds vendor clients or locks.
#[derive(Clone)]
pub struct AppState {
    pub queue: mpsc::Sender<Value>,
}

impl AppState {
    pub fn new(queue: mpsc::Sender<Value>) -> Self {
        Self { queue }
    }
}
