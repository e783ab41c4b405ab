//! Calculation lifecycle events and the emitter that fans them out.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::status::Outcome;

/// Lifecycle status carried by a calculation event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventStatus {
    Scheduled,
    InProgress,
    Success,
    Failure,
    PartialFailure,
}

impl EventStatus {
    /// Whether no further event follows for the run.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Success | Self::Failure | Self::PartialFailure)
    }
}

impl From<Outcome> for EventStatus {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Success => Self::Success,
            Outcome::PartialFailure => Self::PartialFailure,
            Outcome::Failure => Self::Failure,
        }
    }
}

impl fmt::Display for EventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Scheduled => "SCHEDULED",
            Self::InProgress => "IN_PROGRESS",
            Self::Success => "SUCCESS",
            Self::Failure => "FAILURE",
            Self::PartialFailure => "PARTIAL_FAILURE",
        };
        f.write_str(s)
    }
}

/// Immutable record of a run status transition.
///
/// Fields that carry no meaning at a given transition are `None` and are
/// omitted when serialized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalculationEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plate_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub measurement_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol_id: Option<String>,
    pub status: EventStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dataset_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl CalculationEvent {
    /// Event for the given run identifiers.
    #[must_use]
    pub fn new(
        plate_id: impl Into<String>,
        measurement_id: impl Into<String>,
        protocol_id: impl Into<String>,
        status: EventStatus,
    ) -> Self {
        Self {
            plate_id: non_empty(plate_id.into()),
            measurement_id: non_empty(measurement_id.into()),
            protocol_id: non_empty(protocol_id.into()),
            status,
            dataset_id: None,
            message: None,
        }
    }

    /// Attach the result dataset id.
    #[must_use]
    pub fn with_dataset(mut self, dataset_id: u64) -> Self {
        self.dataset_id = Some(dataset_id);
        self
    }

    /// Attach a detail message.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = non_empty(message.into());
        self
    }
}

fn non_empty(s: String) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

/// Receiver of calculation events.
pub trait EventSink: Send + Sync {
    /// Receive an event. Must not block the run for long.
    fn on_event(&self, event: &CalculationEvent);
}

/// Fans events out to every registered sink.
pub struct EventEmitter {
    sinks: RwLock<Vec<Arc<dyn EventSink>>>,
}

impl EventEmitter {
    /// Create an emitter with no sinks.
    #[must_use]
    pub fn new() -> Self {
        Self {
            sinks: RwLock::new(Vec::new()),
        }
    }

    /// Register a sink.
    pub fn register(&self, sink: Arc<dyn EventSink>) {
        self.sinks.write().push(sink);
    }

    /// Remove all sinks.
    pub fn clear(&self) {
        self.sinks.write().clear();
    }

    /// Deliver `event` to every sink.
    pub fn emit(&self, event: &CalculationEvent) {
        let sinks = self.sinks.read();
        for sink in sinks.iter() {
            sink.on_event(event);
        }
    }

    /// Number of registered sinks.
    #[must_use]
    pub fn count(&self) -> usize {
        self.sinks.read().len()
    }
}

impl Default for EventEmitter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sinks::CollectingEventSink;

    #[test]
    fn absent_fields_are_omitted() {
        let event = CalculationEvent::new("P1", "", "PR1", EventStatus::Scheduled);
        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(json, r#"{"plate_id":"P1","protocol_id":"PR1","status":"SCHEDULED"}"#);
    }

    #[test]
    fn dataset_and_message_are_serialized_when_set() {
        let event = CalculationEvent::new("P1", "M1", "PR1", EventStatus::Failure)
            .with_dataset(7)
            .with_message("protocol not found");
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["dataset_id"], 7);
        assert_eq!(json["status"], "FAILURE");
        assert_eq!(json["message"], "protocol not found");
    }

    #[test]
    fn outcome_maps_to_terminal_status() {
        assert_eq!(EventStatus::from(Outcome::PartialFailure), EventStatus::PartialFailure);
        assert!(EventStatus::from(Outcome::Success).is_terminal());
        assert!(!EventStatus::InProgress.is_terminal());
        assert_eq!(EventStatus::InProgress.to_string(), "IN_PROGRESS");
    }

    #[test]
    fn emitter_fans_out() {
        let emitter = EventEmitter::new();
        let a = Arc::new(CollectingEventSink::new());
        let b = Arc::new(CollectingEventSink::new());
        emitter.register(a.clone());
        emitter.register(b.clone());
        assert_eq!(emitter.count(), 2);

        emitter.emit(&CalculationEvent::new("P", "M", "R", EventStatus::Scheduled));
        assert_eq!(a.events().len(), 1);
        assert_eq!(b.events().len(), 1);

        emitter.clear();
        emitter.emit(&CalculationEvent::new("P", "M", "R", EventStatus::Success));
        assert_eq!(a.events().len(), 1);
    }
}
