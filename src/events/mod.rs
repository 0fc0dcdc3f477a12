//! Event system for configuration notifications
//!
//! Consumers that are not driven by the composition root (UI, telemetry)
//! subscribe here to learn when a configuration domain changed.

pub mod types;

pub use types::{ConfigDomain, SystemEvent};

use tokio::sync::broadcast;

/// Event channel capacity (ring buffer size)
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Event bus for broadcasting system events
pub struct EventBus {
    tx: broadcast::Sender<SystemEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { tx }
    }

    /// Publish an event to all subscribers
    ///
    /// Dropped silently when nobody is subscribed.
    pub fn publish(&self, event: SystemEvent) {
        let _ = self.tx.send(event);
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<SystemEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_subscribe() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 1);

        bus.publish(SystemEvent::ApplyDeferred {
            domain: ConfigDomain::Video,
            reason: "engine missing".to_string(),
        });

        let event = rx.recv().await.unwrap();
        assert_eq!(event.event_name(), "config.apply_deferred");
    }

    #[test]
    fn test_publish_without_subscribers() {
        let bus = EventBus::new();
        bus.publish(SystemEvent::AudioDeviceRestarted { failed_commands: 0 });
        assert_eq!(bus.subscriber_count(), 0);
    }
}
