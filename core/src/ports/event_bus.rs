use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Notification published to subscribers outside the current transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlatformEvent {
    pub channel: String,
    pub payload: Value,
    pub published_at: DateTime<Utc>,
}

impl PlatformEvent {
    pub fn new(channel: impl Into<String>, payload: Value, published_at: DateTime<Utc>) -> Self {
        Self {
            channel: channel.into(),
            payload,
            published_at,
        }
    }
}

/// Fire-and-forget publishing. Delivery is not confirmed to the caller.
pub trait EventBus {
    fn publish(&self, event: PlatformEvent);
}
