//! Aggregate repositories: the transactional commit boundary.

use async_trait::async_trait;
use common::{OrderId, PaymentId};
use domain::{Order, Payment};
use messaging::{Command, Envelope, Event, Message, MessageContext};

use crate::error::Result;
use crate::message::OutboxMessage;

/// Builds the outbox rows for one commit: the aggregate's buffered
/// events followed by any outbound commands, all under one causal
/// context. `occurred_on` is stamped row by row, so dispatch order
/// matches emission order.
pub fn outbox_messages_for(
    events: &[Event],
    commands: &[Command],
    context: &MessageContext,
) -> std::result::Result<Vec<OutboxMessage>, serde_json::Error> {
    let mut messages = Vec::with_capacity(events.len() + commands.len());
    for event in events {
        let envelope = Envelope::<Message>::new(event.clone(), *context);
        messages.push(OutboxMessage::from_envelope(&envelope)?);
    }
    for command in commands {
        let envelope = Envelope::<Message>::new(command.clone(), *context);
        messages.push(OutboxMessage::from_envelope(&envelope)?);
    }
    Ok(messages)
}

/// Storage for the orders service's aggregates.
///
/// `insert` and `update` are the outbox commit: the aggregate row, its
/// buffered events, and any outbound commands become durable in one
/// transaction. On success the implementation clears the aggregate's
/// event buffer and bumps its version; on any failure both stay
/// untouched so the caller can retry.
///
/// `update` performs an optimistic version check: two handlers racing
/// on the same aggregate serialize into one winner and one
/// [`StoreError::ConcurrencyConflict`](crate::StoreError::ConcurrencyConflict).
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Loads an order by ID.
    async fn find(&self, id: OrderId) -> Result<Option<Order>>;

    /// Loads an order by its caller-supplied idempotency key.
    async fn find_by_idempotency_key(&self, key: &str) -> Result<Option<Order>>;

    /// Persists a new order with its events and outbound commands.
    ///
    /// A uniqueness race on the idempotency key fails with
    /// [`StoreError::DuplicateIdempotencyKey`](crate::StoreError::DuplicateIdempotencyKey);
    /// the caller fetches and returns the winner.
    async fn insert(
        &self,
        order: &mut Order,
        context: &MessageContext,
        commands: &[Command],
    ) -> Result<()>;

    /// Persists changes to an existing order with its events and
    /// outbound commands, guarded by the version the caller loaded.
    async fn update(
        &self,
        order: &mut Order,
        context: &MessageContext,
        commands: &[Command],
    ) -> Result<()>;
}

/// Storage for the payments service's aggregates. Same commit contract
/// as [`OrderRepository`].
#[async_trait]
pub trait PaymentRepository: Send + Sync {
    /// Loads a payment by ID.
    async fn find(&self, id: PaymentId) -> Result<Option<Payment>>;

    /// Loads a payment by its caller-supplied idempotency key.
    async fn find_by_idempotency_key(&self, key: &str) -> Result<Option<Payment>>;

    /// Loads a payment by the provider's transaction reference.
    /// Used when a settlement webhook arrives.
    async fn find_by_provider_transaction_id(&self, id: &str) -> Result<Option<Payment>>;

    /// Persists a new payment with its events.
    async fn insert(
        &self,
        payment: &mut Payment,
        context: &MessageContext,
        commands: &[Command],
    ) -> Result<()>;

    /// Persists changes to an existing payment, guarded by version.
    async fn update(
        &self,
        payment: &mut Payment,
        context: &MessageContext,
        commands: &[Command],
    ) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use messaging::CancelPayment;
    use messaging::events::OrderCancelled;
    use uuid::Uuid;

    #[test]
    fn outbox_messages_preserve_emission_order() {
        let context = MessageContext::root(Uuid::new_v4());
        let order_id = OrderId::new();
        let events = vec![Event::OrderCancelled(OrderCancelled { order_id })];
        let commands = vec![Command::CancelPayment(CancelPayment {
            payment_id: PaymentId::new(),
            order_id,
            idempotency_key: format!("cancel-{order_id}"),
        })];

        let messages = outbox_messages_for(&events, &commands, &context).unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].message_type, "orders.order-cancelled.v1");
        assert_eq!(messages[1].message_type, "payments.cancel-payment.v1");
    }
}
