//! In-memory store implementations for tests and single-process wiring.
//!
//! Each repository shares an [`InMemoryOutboxStore`] with its service;
//! one lock region per commit stands in for the database transaction,
//! which keeps the uniqueness race deterministic: concurrent inserts
//! with the same idempotency key serialize into one winner and one
//! [`StoreError::DuplicateIdempotencyKey`].

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use common::{OrderId, PaymentId};
use domain::{Order, Payment};
use messaging::{Command, MessageContext};
use tokio::sync::RwLock;

use crate::error::{Result, StoreError};
use crate::message::{MessageId, OutboxMessage};
use crate::repository::{OrderRepository, PaymentRepository, outbox_messages_for};
use crate::store::{MAX_RETRIES, OutboxStore};

/// In-memory outbox table.
#[derive(Clone, Default)]
pub struct InMemoryOutboxStore {
    messages: Arc<RwLock<Vec<OutboxMessage>>>,
}

impl InMemoryOutboxStore {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of every row, in insertion order.
    pub async fn all_messages(&self) -> Vec<OutboxMessage> {
        self.messages.read().await.clone()
    }

    /// Returns the total number of rows.
    pub async fn message_count(&self) -> usize {
        self.messages.read().await.len()
    }
}

#[async_trait]
impl OutboxStore for InMemoryOutboxStore {
    async fn enqueue(&self, messages: Vec<OutboxMessage>) -> Result<()> {
        self.messages.write().await.extend(messages);
        Ok(())
    }

    async fn pending(&self, limit: usize) -> Result<Vec<OutboxMessage>> {
        let messages = self.messages.read().await;
        let mut pending: Vec<OutboxMessage> = messages
            .iter()
            .filter(|m| m.processed_on.is_none() && m.retries < MAX_RETRIES)
            .cloned()
            .collect();
        pending.sort_by_key(|m| m.occurred_on);
        pending.truncate(limit);
        Ok(pending)
    }

    async fn mark_processed(&self, id: MessageId) -> Result<()> {
        let mut messages = self.messages.write().await;
        let message = messages
            .iter_mut()
            .find(|m| m.id == id)
            .ok_or(StoreError::NotFound {
                entity: "outbox message",
                id: id.to_string(),
            })?;
        message.processed_on = Some(Utc::now());
        Ok(())
    }

    async fn record_failure(&self, id: MessageId, error: &str) -> Result<()> {
        let mut messages = self.messages.write().await;
        let message = messages
            .iter_mut()
            .find(|m| m.id == id)
            .ok_or(StoreError::NotFound {
                entity: "outbox message",
                id: id.to_string(),
            })?;
        message.retries += 1;
        message.error = Some(error.to_string());
        Ok(())
    }

    async fn poison(&self, id: MessageId, error: &str) -> Result<()> {
        let mut messages = self.messages.write().await;
        let message = messages
            .iter_mut()
            .find(|m| m.id == id)
            .ok_or(StoreError::NotFound {
                entity: "outbox message",
                id: id.to_string(),
            })?;
        message.retries = MAX_RETRIES;
        message.error = Some(error.to_string());
        Ok(())
    }
}

/// In-memory order storage with outbox commit semantics.
#[derive(Clone)]
pub struct InMemoryOrderRepository {
    orders: Arc<RwLock<HashMap<OrderId, Order>>>,
    outbox: InMemoryOutboxStore,
}

impl InMemoryOrderRepository {
    /// Creates a repository committing into the given outbox.
    pub fn new(outbox: InMemoryOutboxStore) -> Self {
        Self {
            orders: Arc::new(RwLock::new(HashMap::new())),
            outbox,
        }
    }

    /// Returns the number of stored orders.
    pub async fn order_count(&self) -> usize {
        self.orders.read().await.len()
    }
}

#[async_trait]
impl OrderRepository for InMemoryOrderRepository {
    async fn find(&self, id: OrderId) -> Result<Option<Order>> {
        Ok(self.orders.read().await.get(&id).cloned())
    }

    async fn find_by_idempotency_key(&self, key: &str) -> Result<Option<Order>> {
        Ok(self
            .orders
            .read()
            .await
            .values()
            .find(|o| o.idempotency_key() == key)
            .cloned())
    }

    async fn insert(
        &self,
        order: &mut Order,
        context: &MessageContext,
        commands: &[Command],
    ) -> Result<()> {
        let messages = outbox_messages_for(order.pending_events(), commands, context)?;

        let mut orders = self.orders.write().await;
        if orders
            .values()
            .any(|o| o.idempotency_key() == order.idempotency_key())
        {
            return Err(StoreError::DuplicateIdempotencyKey {
                key: order.idempotency_key().to_string(),
            });
        }

        order.set_version(order.version().next());
        let mut stored = order.clone();
        stored.clear_pending_events();
        orders.insert(order.id(), stored);
        self.outbox.enqueue(messages).await?;
        order.clear_pending_events();
        Ok(())
    }

    async fn update(
        &self,
        order: &mut Order,
        context: &MessageContext,
        commands: &[Command],
    ) -> Result<()> {
        let messages = outbox_messages_for(order.pending_events(), commands, context)?;

        let mut orders = self.orders.write().await;
        let stored = orders.get(&order.id()).ok_or(StoreError::NotFound {
            entity: "order",
            id: order.id().to_string(),
        })?;
        if stored.version() != order.version() {
            return Err(StoreError::ConcurrencyConflict {
                entity: "order",
                id: order.id().to_string(),
                expected: order.version().as_i64(),
            });
        }

        order.set_version(order.version().next());
        let mut stored = order.clone();
        stored.clear_pending_events();
        orders.insert(order.id(), stored);
        self.outbox.enqueue(messages).await?;
        order.clear_pending_events();
        Ok(())
    }
}

/// In-memory payment storage with outbox commit semantics.
#[derive(Clone)]
pub struct InMemoryPaymentRepository {
    payments: Arc<RwLock<HashMap<PaymentId, Payment>>>,
    outbox: InMemoryOutboxStore,
}

impl InMemoryPaymentRepository {
    /// Creates a repository committing into the given outbox.
    pub fn new(outbox: InMemoryOutboxStore) -> Self {
        Self {
            payments: Arc::new(RwLock::new(HashMap::new())),
            outbox,
        }
    }

    /// Returns the number of stored payments.
    pub async fn payment_count(&self) -> usize {
        self.payments.read().await.len()
    }
}

#[async_trait]
impl PaymentRepository for InMemoryPaymentRepository {
    async fn find(&self, id: PaymentId) -> Result<Option<Payment>> {
        Ok(self.payments.read().await.get(&id).cloned())
    }

    async fn find_by_idempotency_key(&self, key: &str) -> Result<Option<Payment>> {
        Ok(self
            .payments
            .read()
            .await
            .values()
            .find(|p| p.idempotency_key() == key)
            .cloned())
    }

    async fn find_by_provider_transaction_id(&self, id: &str) -> Result<Option<Payment>> {
        Ok(self
            .payments
            .read()
            .await
            .values()
            .find(|p| p.provider_transaction_id() == Some(id))
            .cloned())
    }

    async fn insert(
        &self,
        payment: &mut Payment,
        context: &MessageContext,
        commands: &[Command],
    ) -> Result<()> {
        let messages = outbox_messages_for(payment.pending_events(), commands, context)?;

        let mut payments = self.payments.write().await;
        if payments
            .values()
            .any(|p| p.idempotency_key() == payment.idempotency_key())
        {
            return Err(StoreError::DuplicateIdempotencyKey {
                key: payment.idempotency_key().to_string(),
            });
        }

        payment.set_version(payment.version().next());
        let mut stored = payment.clone();
        stored.clear_pending_events();
        payments.insert(payment.id(), stored);
        self.outbox.enqueue(messages).await?;
        payment.clear_pending_events();
        Ok(())
    }

    async fn update(
        &self,
        payment: &mut Payment,
        context: &MessageContext,
        commands: &[Command],
    ) -> Result<()> {
        let messages = outbox_messages_for(payment.pending_events(), commands, context)?;

        let mut payments = self.payments.write().await;
        let stored = payments.get(&payment.id()).ok_or(StoreError::NotFound {
            entity: "payment",
            id: payment.id().to_string(),
        })?;
        if stored.version() != payment.version() {
            return Err(StoreError::ConcurrencyConflict {
                entity: "payment",
                id: payment.id().to_string(),
                expected: payment.version().as_i64(),
            });
        }

        payment.set_version(payment.version().next());
        let mut stored = payment.clone();
        stored.clear_pending_events();
        payments.insert(payment.id(), stored);
        self.outbox.enqueue(messages).await?;
        payment.clear_pending_events();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{Currency, CustomerId, Money, Version};
    use uuid::Uuid;

    fn context() -> MessageContext {
        MessageContext::root(Uuid::new_v4())
    }

    fn order(key: &str) -> Order {
        Order::create(
            CustomerId::new(),
            Money::from_cents(25000),
            Currency::new("USD"),
            key,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn insert_commits_state_and_events_together() {
        let outbox = InMemoryOutboxStore::new();
        let repository = InMemoryOrderRepository::new(outbox.clone());

        let mut order = order("K1");
        repository.insert(&mut order, &context(), &[]).await.unwrap();

        assert_eq!(order.version(), Version::new(1));
        assert!(order.pending_events().is_empty());
        assert_eq!(repository.order_count().await, 1);
        assert_eq!(outbox.message_count().await, 1);
        assert_eq!(
            outbox.all_messages().await[0].message_type,
            "orders.order-created.v1"
        );
    }

    #[tokio::test]
    async fn duplicate_idempotency_key_is_rejected() {
        let outbox = InMemoryOutboxStore::new();
        let repository = InMemoryOrderRepository::new(outbox.clone());

        let mut first = order("K1");
        repository.insert(&mut first, &context(), &[]).await.unwrap();

        let mut second = order("K1");
        let result = repository.insert(&mut second, &context(), &[]).await;
        assert!(matches!(
            result,
            Err(StoreError::DuplicateIdempotencyKey { .. })
        ));

        // Loser leaves no trace: no row, no outbox messages, buffer intact.
        assert_eq!(repository.order_count().await, 1);
        assert_eq!(outbox.message_count().await, 1);
        assert!(!second.pending_events().is_empty());
    }

    #[tokio::test]
    async fn stale_version_update_is_rejected() {
        let outbox = InMemoryOutboxStore::new();
        let repository = InMemoryOrderRepository::new(outbox.clone());

        let mut order = order("K1");
        repository.insert(&mut order, &context(), &[]).await.unwrap();

        let mut fresh = repository.find(order.id()).await.unwrap().unwrap();
        let mut stale = repository.find(order.id()).await.unwrap().unwrap();

        fresh.start_payment_authorization().unwrap();
        repository.update(&mut fresh, &context(), &[]).await.unwrap();

        stale.cancel().unwrap();
        let result = repository.update(&mut stale, &context(), &[]).await;
        assert!(matches!(
            result,
            Err(StoreError::ConcurrencyConflict { .. })
        ));

        let stored = repository.find(order.id()).await.unwrap().unwrap();
        assert_eq!(stored.status(), domain::OrderStatus::PaymentAuthorizing);
    }

    #[tokio::test]
    async fn payment_lookup_by_provider_transaction() {
        let outbox = InMemoryOutboxStore::new();
        let repository = InMemoryPaymentRepository::new(outbox);

        let mut payment = Payment::create(
            OrderId::new(),
            Money::from_cents(100),
            Currency::new("USD"),
            "K2",
        )
        .unwrap();
        payment.mark_authorized("sim_auth_77").unwrap();
        repository
            .insert(&mut payment, &context(), &[])
            .await
            .unwrap();

        let found = repository
            .find_by_provider_transaction_id("sim_auth_77")
            .await
            .unwrap();
        assert_eq!(found.unwrap().id(), payment.id());

        let missing = repository
            .find_by_provider_transaction_id("sim_auth_unknown")
            .await
            .unwrap();
        assert!(missing.is_none());
    }
}
