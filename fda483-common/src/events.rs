//! Progress events for classification runs
//!
//! Events are broadcast via [`EventBus`]; subscribers (a progress display, a
//! log sink) are optional and emission never blocks a worker.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Terminal status of one classified row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowStatus {
    /// Service returned a usable structured result
    Success,
    /// Text absent or too short, never sent
    Skipped,
    /// Service replied but the payload was not interpretable
    ParseFailure,
    /// The call itself failed (quota, transport, timeout)
    ServiceFailure,
}

impl RowStatus {
    /// Whether the row counts as an error in the labeled output
    pub fn is_error(&self) -> bool {
        !matches!(self, RowStatus::Success)
    }

    /// Check mark used in progress logs
    pub fn symbol(&self) -> &'static str {
        match self {
            RowStatus::Success => "✓",
            _ => "✗",
        }
    }
}

/// Classification run events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClassificationEvent {
    /// Batch accepted and about to be dispatched
    BatchStarted {
        run_id: Uuid,
        total: usize,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// One row reached its terminal outcome
    RowClassified {
        run_id: Uuid,
        row_id: String,
        status: RowStatus,
        /// Rows finished so far, including this one
        completed: usize,
        total: usize,
    },

    /// Every row has an outcome
    BatchCompleted {
        run_id: Uuid,
        total: usize,
        succeeded: usize,
        failed: usize,
        skipped: usize,
        elapsed_ms: u64,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

/// Broadcast channel for [`ClassificationEvent`]s
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<ClassificationEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// Slow subscribers lose the oldest events once `capacity` is exceeded.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<ClassificationEvent> {
        self.tx.subscribe()
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: ClassificationEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
