use std::cell::RefCell;

use dispatchr_core::ports::event_bus::{EventBus, PlatformEvent};

#[derive(Default)]
pub struct RecordingEventBus {
    published: RefCell<Vec<PlatformEvent>>,
}

impl RecordingEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn published(&self) -> Vec<PlatformEvent> {
        self.published.borrow().clone()
    }

    pub fn on_channel(&self, channel: &str) -> Vec<PlatformEvent> {
        self.published
            .borrow()
            .iter()
            .filter(|event| event.channel == channel)
            .cloned()
            .collect()
    }
}

impl EventBus for RecordingEventBus {
    fn publish(&self, event: PlatformEvent) {
        self.published.borrow_mut().push(event);
    }
}
