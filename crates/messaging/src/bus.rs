//! Message bus abstraction and the in-memory implementation.

use std::sync::RwLock;

use async_trait::async_trait;
use thiserror::Error;

use crate::commands::Command;
use crate::envelope::Envelope;
use crate::events::Event;

/// Errors surfaced by the bus.
///
/// A bus error is an integration failure: the broker was unreachable or
/// rejected the message. Callers must not treat it as a business
/// failure; the outbox dispatcher retries transient publish errors with
/// a bounded budget.
#[derive(Debug, Error)]
pub enum BusError {
    /// An event could not be published.
    #[error("publish failed: {0}")]
    Publish(String),

    /// A command could not be delivered.
    #[error("send failed: {0}")]
    Send(String),
}

/// Abstraction over the message broker.
///
/// Two delivery modes:
/// - [`publish`](MessageBus::publish): fan-out of an immutable fact to
///   zero or more subscribers.
/// - [`send`](MessageBus::send): point-to-point delivery of a command
///   to exactly one consumer.
///
/// Delivery is at-least-once; consumers must tolerate duplicates and
/// reordering across aggregates.
#[async_trait]
pub trait MessageBus: Send + Sync {
    /// Publishes an event to all subscribers.
    async fn publish(&self, event: Envelope<Event>) -> Result<(), BusError>;

    /// Sends a command to its single consumer.
    async fn send(&self, command: Envelope<Command>) -> Result<(), BusError>;
}

#[derive(Debug, Default)]
struct InMemoryBusState {
    published: Vec<Envelope<Event>>,
    sent: Vec<Envelope<Command>>,
    fail_publishes: bool,
    fail_sends: bool,
}

/// In-memory bus for tests and single-process wiring.
///
/// Records all traffic for inspection and can be told to fail, which is
/// how dispatcher retry behavior is exercised.
#[derive(Debug, Clone, Default)]
pub struct InMemoryBus {
    state: std::sync::Arc<RwLock<InMemoryBusState>>,
}

impl InMemoryBus {
    /// Creates a new empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent publish fail.
    pub fn set_fail_publishes(&self, fail: bool) {
        self.state.write().unwrap().fail_publishes = fail;
    }

    /// Makes every subsequent send fail.
    pub fn set_fail_sends(&self, fail: bool) {
        self.state.write().unwrap().fail_sends = fail;
    }

    /// Returns a copy of everything published so far.
    pub fn published(&self) -> Vec<Envelope<Event>> {
        self.state.read().unwrap().published.clone()
    }

    /// Returns a copy of everything sent so far.
    pub fn sent(&self) -> Vec<Envelope<Command>> {
        self.state.read().unwrap().sent.clone()
    }

    /// Removes and returns all published events.
    pub fn drain_published(&self) -> Vec<Envelope<Event>> {
        std::mem::take(&mut self.state.write().unwrap().published)
    }

    /// Removes and returns all sent commands.
    pub fn drain_sent(&self) -> Vec<Envelope<Command>> {
        std::mem::take(&mut self.state.write().unwrap().sent)
    }

    /// Returns how many events have been published.
    pub fn published_count(&self) -> usize {
        self.state.read().unwrap().published.len()
    }
}

#[async_trait]
impl MessageBus for InMemoryBus {
    async fn publish(&self, event: Envelope<Event>) -> Result<(), BusError> {
        let mut state = self.state.write().unwrap();
        if state.fail_publishes {
            return Err(BusError::Publish("injected publish failure".to_string()));
        }
        state.published.push(event);
        Ok(())
    }

    async fn send(&self, command: Envelope<Command>) -> Result<(), BusError> {
        let mut state = self.state.write().unwrap();
        if state.fail_sends {
            return Err(BusError::Send("injected send failure".to_string()));
        }
        state.sent.push(command);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::MessageContext;
    use crate::events::OrderCancelled;
    use common::OrderId;
    use uuid::Uuid;

    fn event_envelope() -> Envelope<Event> {
        Envelope::new(
            Event::OrderCancelled(OrderCancelled {
                order_id: OrderId::new(),
            }),
            MessageContext::root(Uuid::new_v4()),
        )
    }

    #[tokio::test]
    async fn publish_records_event() {
        let bus = InMemoryBus::new();
        bus.publish(event_envelope()).await.unwrap();
        assert_eq!(bus.published_count(), 1);
    }

    #[tokio::test]
    async fn injected_failure_rejects_publish() {
        let bus = InMemoryBus::new();
        bus.set_fail_publishes(true);

        let result = bus.publish(event_envelope()).await;
        assert!(matches!(result, Err(BusError::Publish(_))));
        assert_eq!(bus.published_count(), 0);

        bus.set_fail_publishes(false);
        bus.publish(event_envelope()).await.unwrap();
        assert_eq!(bus.published_count(), 1);
    }

    #[tokio::test]
    async fn drain_empties_the_bus() {
        let bus = InMemoryBus::new();
        bus.publish(event_envelope()).await.unwrap();
        bus.publish(event_envelope()).await.unwrap();

        assert_eq!(bus.drain_published().len(), 2);
        assert_eq!(bus.published_count(), 0);
    }
}
