//! Draft event feed for observability.
//!
//! Emits [`DraftEvent`]s via a [`tokio::sync::broadcast`] channel so that
//! external observers (the canvas, the console panel, tests) can follow draft
//! changes and validation results without coupling to the store internals.

use serde::{Deserialize, Serialize};

/// Severity of a console feed entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsoleLevel {
    Error,
    Warn,
    Success,
}

/// One entry of the non-blocking console message feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsoleMessage {
    pub level: ConsoleLevel,
    /// Stage name the message refers to, when there is one.
    pub origin: Option<String>,
    pub text: String,
}

/// Events emitted by the draft store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DraftEvent {
    StateReplaced,
    ValidationCompleted { valid: bool, error_count: usize },
    Console(ConsoleMessage),
}

/// Event emitter wrapping a broadcast sender.
#[derive(Clone)]
pub struct EventEmitter {
    sender: tokio::sync::broadcast::Sender<DraftEvent>,
}

impl EventEmitter {
    /// Create a new emitter with the given channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = tokio::sync::broadcast::channel(capacity);
        Self { sender }
    }

    /// Emit an event to all current subscribers.
    ///
    /// If there are no active receivers the event is silently dropped.
    pub fn emit(&self, event: DraftEvent) {
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<DraftEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventEmitter {
    fn default() -> Self {
        Self::new(256)
    }
}
