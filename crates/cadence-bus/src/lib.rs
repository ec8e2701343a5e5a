// SPDX-FileCopyrightText: 2026 Cadence Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-process typed event bus.
//!
//! A thin wrapper over `tokio::sync::broadcast`. The bus is a notification
//! path only: every event also has a persisted trigger (queue entry, status
//! row, scheduled sweep), so a lagging subscriber that drops events delays
//! work until the next sweep but never loses it.

pub mod events;

pub use events::{BusEvent, EventEnvelope};

use chrono::Utc;
use tokio::sync::broadcast;
use tracing::{debug, trace};

/// Default channel capacity.
pub const DEFAULT_CAPACITY: usize = 1024;

/// Cloneable handle for publishing and subscribing.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<EventEnvelope>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publish an event. Having no subscribers is not an error.
    pub fn publish(&self, event: BusEvent) -> EventEnvelope {
        let envelope = EventEnvelope {
            id: uuid::Uuid::new_v4().to_string(),
            name: event.name().to_string(),
            occurred_at: cadence_core::time::format_ts(Utc::now()),
            event,
        };
        match self.sender.send(envelope.clone()) {
            Ok(receivers) => trace!(event = %envelope.name, receivers, "event published"),
            Err(_) => debug!(event = %envelope.name, "event published with no subscribers"),
        }
        envelope
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_receive_in_order() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        bus.publish(BusEvent::EmailApproved {
            send_id: "s-1".into(),
        });
        bus.publish(BusEvent::ReplyReceived {
            reply_id: "r-1".into(),
        });

        let first = rx.recv().await.unwrap();
        assert_eq!(first.name, "campaign.email-approved");
        let second = rx.recv().await.unwrap();
        assert_eq!(
            second.event,
            BusEvent::ReplyReceived {
                reply_id: "r-1".into()
            }
        );
        assert_ne!(first.id, second.id);
    }

    #[test]
    fn publish_without_subscribers_is_fine() {
        let bus = EventBus::default();
        let envelope = bus.publish(BusEvent::EmailApproved {
            send_id: "s-1".into(),
        });
        assert_eq!(envelope.name, "campaign.email-approved");
        assert_eq!(bus.subscriber_count(), 0);
    }
}
