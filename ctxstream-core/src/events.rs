//! Delivery events and the sink boundary.
//!
//! The sequencer reports everything it does through an [`EventSink`]. Events
//! serialize to tagged JSON (`{"type": "...", "data": {...}}`) so a UI bridge
//! can forward them unchanged.

use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tokio::sync::{broadcast, mpsc};

use crate::error::{Error, ErrorKind};

/// Progress and outcome events emitted during a delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum DeliveryEvent {
    /// Part `current` of `total` is about to be sent
    Progress {
        current: usize,
        total: usize,
        /// Size of the part message in bytes
        message_size: usize,
    },
    /// Part `current` of `total` was acknowledged
    PartComplete { current: usize, total: usize },
    /// All parts acknowledged; the final question is being asked
    FinalProcessing { total: usize },
    /// The answer to the caller's prompt
    Complete { response: String },
    /// The delivery failed and was abandoned
    Error { kind: ErrorKind, message: String },
}

impl DeliveryEvent {
    /// Create a progress event.
    pub fn progress(current: usize, total: usize, message_size: usize) -> Self {
        Self::Progress {
            current,
            total,
            message_size,
        }
    }

    /// Create a part-complete event.
    pub fn part_complete(current: usize, total: usize) -> Self {
        Self::PartComplete { current, total }
    }

    /// Create a final-processing event.
    pub fn final_processing(total: usize) -> Self {
        Self::FinalProcessing { total }
    }

    /// Create a completion event.
    pub fn complete(response: impl Into<String>) -> Self {
        Self::Complete {
            response: response.into(),
        }
    }

    /// Create an error event from an error.
    pub fn error(error: &Error) -> Self {
        Self::Error {
            kind: error.kind(),
            message: error.to_string(),
        }
    }

    /// Whether this event ends a delivery.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete { .. } | Self::Error { .. })
    }

    /// Get the event type name.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Progress { .. } => "progress",
            Self::PartComplete { .. } => "part_complete",
            Self::FinalProcessing { .. } => "final_processing",
            Self::Complete { .. } => "complete",
            Self::Error { .. } => "error",
        }
    }

    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Receiver of delivery events. Emitting never fails the delivery.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: DeliveryEvent);
}

impl<T: EventSink + ?Sized> EventSink for Arc<T> {
    fn emit(&self, event: DeliveryEvent) {
        (**self).emit(event)
    }
}

impl EventSink for mpsc::UnboundedSender<DeliveryEvent> {
    fn emit(&self, event: DeliveryEvent) {
        // A dropped receiver means nobody is listening any more.
        let _ = self.send(event);
    }
}

impl EventSink for broadcast::Sender<DeliveryEvent> {
    fn emit(&self, event: DeliveryEvent) {
        let _ = self.send(event);
    }
}

/// Discards all events.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl EventSink for NoopSink {
    fn emit(&self, _event: DeliveryEvent) {}
}

/// Adapts a closure into a sink.
pub struct FnSink<F>(pub F);

impl<F> EventSink for FnSink<F>
where
    F: Fn(DeliveryEvent) + Send + Sync,
{
    fn emit(&self, event: DeliveryEvent) {
        (self.0)(event)
    }
}

/// Records events in memory, for harnesses and tests.
#[derive(Debug, Default)]
pub struct CollectingSink {
    events: Mutex<Vec<DeliveryEvent>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of events received so far.
    pub fn events(&self) -> Vec<DeliveryEvent> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Event type names in arrival order.
    pub fn type_names(&self) -> Vec<&'static str> {
        self.events().iter().map(DeliveryEvent::type_name).collect()
    }
}

impl EventSink for CollectingSink {
    fn emit(&self, event: DeliveryEvent) {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(event);
    }
}
