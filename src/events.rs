//! In-process domain events. Emission is best-effort notification, not part of the
//! write: a missing or lagging listener never fails the request that emitted.

use serde::Serialize;
use serde_json::Value;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;

const DEFAULT_CAPACITY: usize = 64;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AppEvent {
    pub name: String,
    pub payload: Value,
}

#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<AppEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        EventBus { sender }
    }

    /// Fire and forget. Delivery failure (no listeners) is logged and swallowed.
    pub fn emit(&self, name: &str, payload: Value) {
        let event = AppEvent {
            name: name.to_string(),
            payload,
        };
        match self.sender.send(event) {
            Ok(receivers) => tracing::debug!(event = %name, receivers, "event emitted"),
            Err(_) => tracing::debug!(event = %name, "event dropped: no listeners"),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AppEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        EventBus::new(DEFAULT_CAPACITY)
    }
}

/// Log every event on the bus until it closes.
pub fn spawn_event_logger(bus: &EventBus) -> JoinHandle<()> {
    let mut rx = bus.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => tracing::info!(event = %event.name, payload = %event.payload, "app event"),
                Err(RecvError::Lagged(skipped)) => tracing::warn!(skipped, "event logger lagged"),
                Err(RecvError::Closed) => break,
            }
        }
    })
}
