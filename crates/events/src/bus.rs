//! Event bus implementation using tokio broadcast channels

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::types::{Event, EventEnvelope};

/// Capacity for the broadcast channel
const DEFAULT_CAPACITY: usize = 1024;

/// Event bus for publishing and subscribing to fleet events
///
/// Cloning is cheap; all clones publish into the same channel. Events
/// published while no subscriber exists are dropped, which is acceptable:
/// all state is rebuilt from the live status stream.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<EventEnvelope>,
    /// Number of events published (for monitoring)
    event_count: Arc<AtomicUsize>,
}

impl EventBus {
    /// Create a new event bus with default capacity
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a new event bus with specified capacity
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            event_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Wrap an event in an envelope and publish it
    ///
    /// Returns the number of subscribers that received the event.
    pub fn publish(&self, event: Event) -> usize {
        self.publish_envelope(EventEnvelope::new(event))
    }

    /// Publish a pre-built envelope
    pub fn publish_envelope(&self, envelope: EventEnvelope) -> usize {
        self.event_count.fetch_add(1, Ordering::Relaxed);
        self.sender.send(envelope).unwrap_or(0)
    }

    /// Subscribe to events
    ///
    /// Returns a receiver that will receive all published events.
    /// Events published before subscribing will not be received.
    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.sender.subscribe()
    }

    /// Get the number of current subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Get the total number of events published
    pub fn event_count(&self) -> usize {
        self.event_count.load(Ordering::Relaxed)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .field("event_count", &self.event_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleet_core::RobotId;

    #[tokio::test]
    async fn test_publish_subscribe() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();

        let sent = bus.publish(Event::ExcavatorReady {
            robot: RobotId::Excavator1,
        });
        assert_eq!(sent, 1);

        let received = rx.recv().await.unwrap();
        assert!(matches!(
            received.event,
            Event::ExcavatorReady {
                robot: RobotId::Excavator1
            }
        ));
    }

    #[tokio::test]
    async fn test_multiple_subscribers() {
        let bus = EventBus::new();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        let sent = bus.publish(Event::HaulerFilled {
            robot: RobotId::Hauler1,
        });
        assert_eq!(sent, 2);

        assert!(rx1.recv().await.is_ok());
        assert!(rx2.recv().await.is_ok());
    }

    #[tokio::test]
    async fn test_no_subscribers_drops_event() {
        let bus = EventBus::new();
        let sent = bus.publish(Event::HaulerFilled {
            robot: RobotId::Hauler2,
        });
        assert_eq!(sent, 0);
        assert_eq!(bus.event_count(), 1);
    }

    #[tokio::test]
    async fn test_clones_share_channel() {
        let bus = EventBus::new();
        let clone = bus.clone();
        let mut rx = bus.subscribe();

        clone.publish(Event::OutOfCommission {
            robot: RobotId::Scout2,
        });
        assert!(rx.recv().await.is_ok());
        assert_eq!(bus.event_count(), 1);
    }
}
