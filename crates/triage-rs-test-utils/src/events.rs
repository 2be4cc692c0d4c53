use parking_lot::Mutex;
use std::sync::Arc;
use triage_rs_protocol::{EventPayload, EventSink, TriageEvent};

/// Event sink that keeps every event in memory.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    events: Arc<Mutex<Vec<TriageEvent>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<TriageEvent> {
        self.events.lock().clone()
    }

    pub fn payloads(&self) -> Vec<EventPayload> {
        self.events
            .lock()
            .iter()
            .map(|event| event.payload.clone())
            .collect()
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: TriageEvent) {
        self.events.lock().push(event);
    }
}
