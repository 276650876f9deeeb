use tokio::sync::broadcast;
use tracing::trace;

use crate::ports::event_bus::{EventBus, PlatformEvent};

/// Publishes onto a broadcast channel shared by every context of one root.
pub struct BroadcastBus {
    sender: broadcast::Sender<PlatformEvent>,
}

impl BroadcastBus {
    pub fn new(sender: broadcast::Sender<PlatformEvent>) -> Self {
        Self { sender }
    }
}

impl EventBus for BroadcastBus {
    fn publish(&self, event: PlatformEvent) {
        let channel = event.channel.clone();
        match self.sender.send(event) {
            Ok(receivers) => trace!(%channel, receivers, "event published"),
            Err(_) => trace!(%channel, "event dropped, no subscribers"),
        }
    }
}
