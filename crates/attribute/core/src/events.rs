//! Attribute change notifications.
//!
//! The store publishes an [`AttributeEvent`] whenever a modifier list or a capacity
//! counter changes. Consumers subscribe explicitly; there is no global bus. Events
//! are best-effort: publishing with no subscribers is not an error, and a subscriber
//! that falls behind the channel capacity observes a lag instead of blocking the engine.

use tokio::sync::broadcast;

use crate::config::EngineConfig;
use crate::instance::InstanceId;

/// A single change to an attribute instance.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AttributeEvent {
    /// `modifier` was attached to `target`.
    ModifierAdded {
        target: InstanceId,
        modifier: InstanceId,
    },

    /// One reference to `modifier` was detached from `target`.
    ModifierRemoved {
        target: InstanceId,
        modifier: InstanceId,
    },

    /// Capacity usage of `instance` changed from `previous` to `current`.
    CapacityChanged {
        instance: InstanceId,
        current: f64,
        previous: f64,
    },
}

impl AttributeEvent {
    /// The instance whose state changed.
    pub fn instance(&self) -> InstanceId {
        match self {
            Self::ModifierAdded { target, .. } | Self::ModifierRemoved { target, .. } => *target,
            Self::CapacityChanged { instance, .. } => *instance,
        }
    }
}

/// Broadcast channel for [`AttributeEvent`]s.
pub struct EventBus {
    sender: broadcast::Sender<AttributeEvent>,
}

impl EventBus {
    /// Creates a new event bus with the default capacity
    pub fn new() -> Self {
        Self::with_capacity(EngineConfig::DEFAULT_EVENT_CAPACITY)
    }

    /// Creates a new event bus with the given capacity (at least one slot)
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publish an event to every current subscriber
    pub fn publish(&self, event: AttributeEvent) {
        if self.sender.send(event).is_err() {
            // No subscribers - this is normal, not an error
            tracing::trace!("no subscribers for attribute event");
        }
    }

    /// Subscribe to every event published after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<AttributeEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Clone for EventBus {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
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
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publish_without_subscribers_is_silent() {
        let bus = EventBus::with_capacity(0);
        bus.publish(AttributeEvent::ModifierAdded {
            target: InstanceId(1),
            modifier: InstanceId(2),
        });
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn subscribers_receive_events_in_order() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();

        bus.publish(AttributeEvent::ModifierAdded {
            target: InstanceId(1),
            modifier: InstanceId(2),
        });
        bus.publish(AttributeEvent::CapacityChanged {
            instance: InstanceId(1),
            current: 5.0,
            previous: 0.0,
        });

        assert_eq!(rx.try_recv().unwrap().instance(), InstanceId(1));
        assert!(matches!(
            rx.try_recv().unwrap(),
            AttributeEvent::CapacityChanged { current, .. } if current == 5.0
        ));
        assert!(rx.try_recv().is_err());
    }
}
