//! Concrete event sinks.

use crossbeam_channel::Sender;
use parking_lot::Mutex;
use tracing::{info, warn};

use crate::events::{CalculationEvent, EventSink, EventStatus};

/// Sink that forwards events through a channel (non-blocking).
pub struct ChannelEventSink {
    sender: Sender<CalculationEvent>,
}

impl ChannelEventSink {
    /// Create a new channel sink.
    #[must_use]
    pub fn new(sender: Sender<CalculationEvent>) -> Self {
        Self { sender }
    }
}

impl EventSink for ChannelEventSink {
    fn on_event(&self, event: &CalculationEvent) {
        // A full or disconnected channel drops the event rather than stalling the run.
        let _ = self.sender.try_send(event.clone());
    }
}

/// Sink that logs every event through `tracing`.
pub struct LoggingEventSink;

impl LoggingEventSink {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Default for LoggingEventSink {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for LoggingEventSink {
    fn on_event(&self, event: &CalculationEvent) {
        let plate = event.plate_id.as_deref().unwrap_or("-");
        let measurement = event.measurement_id.as_deref().unwrap_or("-");
        let protocol = event.protocol_id.as_deref().unwrap_or("-");
        match event.status {
            EventStatus::Failure | EventStatus::PartialFailure => warn!(
                plate_id = plate,
                measurement_id = measurement,
                protocol_id = protocol,
                dataset_id = ?event.dataset_id,
                detail = event.message.as_deref().unwrap_or(""),
                "Calculation {}",
                event.status
            ),
            _ => info!(
                plate_id = plate,
                measurement_id = measurement,
                protocol_id = protocol,
                dataset_id = ?event.dataset_id,
                "Calculation {}",
                event.status
            ),
        }
    }
}

/// Sink that keeps every event in memory, in emission order.
pub struct CollectingEventSink {
    events: Mutex<Vec<CalculationEvent>>,
}

impl CollectingEventSink {
    #[must_use]
    pub fn new() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
        }
    }

    /// Snapshot of the events received so far.
    #[must_use]
    pub fn events(&self) -> Vec<CalculationEvent> {
        self.events.lock().clone()
    }

    /// Statuses received so far, in order.
    #[must_use]
    pub fn statuses(&self) -> Vec<EventStatus> {
        self.events.lock().iter().map(|e| e.status).collect()
    }
}

impl Default for CollectingEventSink {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for CollectingEventSink {
    fn on_event(&self, event: &CalculationEvent) {
        self.events.lock().push(event.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(status: EventStatus) -> CalculationEvent {
        CalculationEvent::new("P1", "M1", "PR1", status)
    }

    #[test]
    fn channel_sink_sends() {
        let (tx, rx) = crossbeam_channel::bounded(4);
        let sink = ChannelEventSink::new(tx);
        sink.on_event(&event(EventStatus::Scheduled));
        assert_eq!(rx.try_recv().unwrap().status, EventStatus::Scheduled);
    }

    #[test]
    fn channel_sink_drops_when_full() {
        let (tx, rx) = crossbeam_channel::bounded(1);
        let sink = ChannelEventSink::new(tx);
        sink.on_event(&event(EventStatus::Scheduled));
        sink.on_event(&event(EventStatus::Success));
        assert_eq!(rx.try_recv().unwrap().status, EventStatus::Scheduled);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn channel_sink_survives_disconnect() {
        let (tx, rx) = crossbeam_channel::bounded(1);
        drop(rx);
        ChannelEventSink::new(tx).on_event(&event(EventStatus::Failure));
    }

    #[test]
    fn collecting_sink_keeps_order() {
        let sink = CollectingEventSink::new();
        sink.on_event(&event(EventStatus::Scheduled));
        sink.on_event(&event(EventStatus::InProgress));
        sink.on_event(&event(EventStatus::Success));
        assert_eq!(
            sink.statuses(),
            vec![EventStatus::Scheduled, EventStatus::InProgress, EventStatus::Success]
        );
    }

    #[test]
    fn logging_sink_handles_every_status() {
        LoggingEventSink::new().on_event(&event(EventStatus::PartialFailure));
        LoggingEventSink::new().on_event(&event(EventStatus::InProgress));
        LoggingEventSink::new().on_event(&event(EventStatus::Failure));
    }
}
