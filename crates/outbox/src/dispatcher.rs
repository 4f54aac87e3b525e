//! Background outbox dispatcher.
//!
//! The second half of the outbox pattern: a polling loop reads
//! undispatched rows and hands them to the bus. Each row's outcome is
//! committed on its own, so a failing message never blocks the rest of
//! a batch. Within one batch messages go out in `occurred_on` order;
//! no ordering is guaranteed across services or across batches.

use std::time::Duration;

use messaging::{Envelope, Message, MessageBus};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::error::Result;
use crate::message::{OutboxMessage, OutboxPayload};
use crate::registry::MessageRegistry;
use crate::store::{MAX_RETRIES, OutboxStore};

/// Dispatcher tuning knobs.
///
/// The retry budget itself is [`MAX_RETRIES`], enforced by the store's
/// pending query and its poison operation.
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Sleep between polling cycles.
    pub poll_interval: Duration,

    /// Maximum rows pulled per cycle.
    pub batch_size: usize,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(2),
            batch_size: 50,
        }
    }
}

/// Handle for a running dispatcher task.
pub struct DispatcherHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl DispatcherHandle {
    /// Signals shutdown and waits for the loop to finish its current
    /// batch item. No row is abandoned mid-write.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        let _ = self.task.await;
    }
}

/// Polls one service's outbox and hands messages to the bus.
pub struct OutboxDispatcher<S, B> {
    store: S,
    bus: B,
    registry: MessageRegistry,
    config: DispatcherConfig,
}

impl<S, B> OutboxDispatcher<S, B>
where
    S: OutboxStore + Send + Sync + 'static,
    B: MessageBus + Send + Sync + 'static,
{
    /// Creates a dispatcher with default configuration.
    pub fn new(store: S, bus: B, registry: MessageRegistry) -> Self {
        Self::with_config(store, bus, registry, DispatcherConfig::default())
    }

    /// Creates a dispatcher with explicit configuration.
    pub fn with_config(
        store: S,
        bus: B,
        registry: MessageRegistry,
        config: DispatcherConfig,
    ) -> Self {
        Self {
            store,
            bus,
            registry,
            config,
        }
    }

    /// Spawns the polling loop on the current runtime.
    pub fn start(self) -> DispatcherHandle {
        let (shutdown, receiver) = watch::channel(false);
        let task = tokio::spawn(self.run(receiver));
        DispatcherHandle { shutdown, task }
    }

    /// Runs the polling loop until the shutdown signal flips.
    ///
    /// A batch in progress always completes: the loop only observes the
    /// signal between cycles, never between a publish and the commit of
    /// its outcome.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!("outbox dispatcher started");

        loop {
            if *shutdown.borrow() {
                break;
            }

            match self.run_once().await {
                Ok(dispatched) if dispatched > 0 => {
                    tracing::debug!(dispatched, "outbox cycle complete");
                }
                Ok(_) => {}
                Err(error) => {
                    tracing::error!(%error, "outbox cycle failed");
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(self.config.poll_interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        tracing::info!("outbox dispatcher stopped");
    }

    /// Processes one batch. Returns how many messages were attempted.
    ///
    /// Store errors bubble up (the next cycle retries the whole batch);
    /// per-message publish failures are recorded on the row instead.
    pub async fn run_once(&self) -> Result<usize> {
        let batch = self.store.pending(self.config.batch_size).await?;
        let attempted = batch.len();

        for message in batch {
            self.dispatch(message).await?;
        }

        Ok(attempted)
    }

    async fn dispatch(&self, message: OutboxMessage) -> Result<()> {
        let Some(decoder) = self.registry.resolve(&message.message_type) else {
            // Retrying cannot help: the tag will stay unknown until a
            // code change, so the row is poisoned on first sight.
            tracing::warn!(
                id = %message.id,
                message_type = %message.message_type,
                "unknown message type in outbox, poisoning"
            );
            metrics::counter!("outbox_messages_poisoned").increment(1);
            return self
                .store
                .poison(
                    message.id,
                    &format!("cannot resolve message type: {}", message.message_type),
                )
                .await;
        };

        let payload: OutboxPayload = match serde_json::from_value(message.payload.clone()) {
            Ok(payload) => payload,
            Err(error) => {
                tracing::warn!(id = %message.id, %error, "undecodable outbox payload, poisoning");
                metrics::counter!("outbox_messages_poisoned").increment(1);
                return self
                    .store
                    .poison(message.id, &format!("undecodable payload: {error}"))
                    .await;
            }
        };

        let decoded = match decoder(payload.data) {
            Ok(decoded) => decoded,
            Err(error) => {
                tracing::warn!(id = %message.id, %error, "undecodable outbox payload, poisoning");
                metrics::counter!("outbox_messages_poisoned").increment(1);
                return self
                    .store
                    .poison(message.id, &format!("undecodable payload: {error}"))
                    .await;
            }
        };

        let delivery = match decoded {
            Message::Event(event) => {
                self.bus
                    .publish(Envelope::at(event, payload.context, message.occurred_on))
                    .await
            }
            Message::Command(command) => {
                self.bus
                    .send(Envelope::at(command, payload.context, message.occurred_on))
                    .await
            }
        };

        match delivery {
            Ok(()) => {
                self.store.mark_processed(message.id).await?;
                metrics::counter!("outbox_messages_dispatched").increment(1);
                tracing::debug!(
                    id = %message.id,
                    message_type = %message.message_type,
                    "outbox message dispatched"
                );
                Ok(())
            }
            Err(error) => {
                metrics::counter!("outbox_dispatch_failures").increment(1);
                tracing::warn!(
                    id = %message.id,
                    retry = message.retries + 1,
                    max_retries = MAX_RETRIES,
                    %error,
                    "outbox dispatch failed, will retry"
                );
                self.store.record_failure(message.id, &error.to_string()).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryOutboxStore;
    use chrono::{Duration as ChronoDuration, Utc};
    use common::{Currency, Money, OrderId, PaymentId};
    use messaging::events::{PaymentAuthorized, PaymentCaptured};
    use messaging::{Event, InMemoryBus, MessageContext};
    use uuid::Uuid;

    fn captured_event(cents: i64) -> Message {
        Message::Event(Event::PaymentCaptured(PaymentCaptured {
            payment_id: PaymentId::new(),
            order_id: OrderId::new(),
            amount: Money::from_cents(cents),
            currency: Currency::new("USD"),
            provider_transaction_id: "sim_auth_1".to_string(),
        }))
    }

    fn row_at(message: &Message, offset_secs: i64) -> OutboxMessage {
        let envelope = Envelope::at(
            message.clone(),
            MessageContext::root(Uuid::new_v4()),
            Utc::now() + ChronoDuration::seconds(offset_secs),
        );
        OutboxMessage::from_envelope(&envelope).unwrap()
    }

    fn dispatcher(
        store: InMemoryOutboxStore,
        bus: InMemoryBus,
    ) -> OutboxDispatcher<InMemoryOutboxStore, InMemoryBus> {
        OutboxDispatcher::new(store, bus, MessageRegistry::default())
    }

    #[tokio::test]
    async fn dispatches_in_occurred_on_order() {
        let store = InMemoryOutboxStore::new();
        let bus = InMemoryBus::new();

        let late = captured_event(300);
        let early = captured_event(100);
        store
            .enqueue(vec![row_at(&late, 10), row_at(&early, -10)])
            .await
            .unwrap();

        let attempted = dispatcher(store.clone(), bus.clone()).run_once().await.unwrap();
        assert_eq!(attempted, 2);

        let published = bus.published();
        assert_eq!(published.len(), 2);
        assert_eq!(Message::Event(published[0].message.clone()), early);
        assert_eq!(Message::Event(published[1].message.clone()), late);

        assert!(store.all_messages().await.iter().all(|m| m.is_processed()));
    }

    #[tokio::test]
    async fn failed_publish_never_sets_processed_on() {
        let store = InMemoryOutboxStore::new();
        let bus = InMemoryBus::new();
        bus.set_fail_publishes(true);

        store
            .enqueue(vec![row_at(&captured_event(100), 0)])
            .await
            .unwrap();

        let dispatcher = dispatcher(store.clone(), bus.clone());
        dispatcher.run_once().await.unwrap();

        let messages = store.all_messages().await;
        let stored = &messages[0];
        assert!(stored.processed_on.is_none());
        assert_eq!(stored.retries, 1);
        assert!(stored.error.as_deref().unwrap().contains("publish failed"));

        // Transient failure clears: the next cycle succeeds.
        bus.set_fail_publishes(false);
        dispatcher.run_once().await.unwrap();
        assert!(store.all_messages().await[0].is_processed());
    }

    #[tokio::test]
    async fn retry_budget_is_bounded() {
        let store = InMemoryOutboxStore::new();
        let bus = InMemoryBus::new();
        bus.set_fail_publishes(true);

        store
            .enqueue(vec![row_at(&captured_event(100), 0)])
            .await
            .unwrap();

        let dispatcher = dispatcher(store.clone(), bus.clone());
        for _ in 0..MAX_RETRIES {
            dispatcher.run_once().await.unwrap();
        }

        let messages = store.all_messages().await;
        let stored = &messages[0];
        assert_eq!(stored.retries, MAX_RETRIES);
        assert!(stored.is_poisoned());

        // Budget exhausted: even a healthy bus sees nothing anymore.
        bus.set_fail_publishes(false);
        let attempted = dispatcher.run_once().await.unwrap();
        assert_eq!(attempted, 0);
        assert_eq!(bus.published_count(), 0);
    }

    #[tokio::test]
    async fn unknown_message_type_is_poisoned_on_first_attempt() {
        let store = InMemoryOutboxStore::new();
        let bus = InMemoryBus::new();

        let mut row = row_at(&captured_event(100), 0);
        row.message_type = "payments.payment-refunded.v9".to_string();
        store.enqueue(vec![row]).await.unwrap();

        dispatcher(store.clone(), bus.clone()).run_once().await.unwrap();

        let messages = store.all_messages().await;
        let stored = &messages[0];
        assert!(stored.is_poisoned());
        assert_eq!(stored.retries, MAX_RETRIES);
        assert!(
            stored
                .error
                .as_deref()
                .unwrap()
                .contains("cannot resolve message type")
        );
        assert_eq!(bus.published_count(), 0);

        // Never reattempted.
        let attempted = dispatcher(store.clone(), bus.clone()).run_once().await.unwrap();
        assert_eq!(attempted, 0);
    }

    #[tokio::test]
    async fn undecodable_payload_is_poisoned_on_first_attempt() {
        let store = InMemoryOutboxStore::new();
        let bus = InMemoryBus::new();

        let mut row = row_at(&captured_event(100), 0);
        row.payload = serde_json::json!("not an envelope");
        store.enqueue(vec![row]).await.unwrap();

        dispatcher(store.clone(), bus.clone()).run_once().await.unwrap();

        let messages = store.all_messages().await;
        let stored = &messages[0];
        assert!(stored.is_poisoned());
        assert!(stored.error.as_deref().unwrap().contains("undecodable"));
        assert_eq!(bus.published_count(), 0);
    }

    #[tokio::test]
    async fn bad_message_does_not_block_the_rest_of_the_batch() {
        let store = InMemoryOutboxStore::new();
        let bus = InMemoryBus::new();

        let mut poison_row = row_at(&captured_event(100), -5);
        poison_row.message_type = "unknown.v1".to_string();
        let good = captured_event(200);
        store
            .enqueue(vec![poison_row, row_at(&good, 5)])
            .await
            .unwrap();

        dispatcher(store.clone(), bus.clone()).run_once().await.unwrap();

        assert_eq!(bus.published_count(), 1);
        let messages = store.all_messages().await;
        assert!(messages[0].is_poisoned());
        assert!(messages[1].is_processed());
    }

    #[tokio::test]
    async fn commands_are_sent_not_published() {
        let store = InMemoryOutboxStore::new();
        let bus = InMemoryBus::new();

        let command = Message::Command(messaging::Command::CancelPayment(
            messaging::CancelPayment {
                payment_id: PaymentId::new(),
                order_id: OrderId::new(),
                idempotency_key: "cancel-1".to_string(),
            },
        ));
        store.enqueue(vec![row_at(&command, 0)]).await.unwrap();

        dispatcher(store.clone(), bus.clone()).run_once().await.unwrap();

        assert_eq!(bus.published_count(), 0);
        assert_eq!(bus.sent().len(), 1);
    }

    #[tokio::test]
    async fn start_and_stop_drain_pending_messages() {
        let store = InMemoryOutboxStore::new();
        let bus = InMemoryBus::new();

        let event = Message::Event(Event::PaymentAuthorized(PaymentAuthorized {
            payment_id: PaymentId::new(),
            order_id: OrderId::new(),
            amount: Money::from_cents(100),
            currency: Currency::new("USD"),
            provider_transaction_id: "sim_auth_2".to_string(),
        }));
        store.enqueue(vec![row_at(&event, 0)]).await.unwrap();

        let dispatcher = OutboxDispatcher::with_config(
            store.clone(),
            bus.clone(),
            MessageRegistry::default(),
            DispatcherConfig {
                poll_interval: Duration::from_millis(10),
                ..DispatcherConfig::default()
            },
        );

        let handle = dispatcher.start();
        tokio::time::sleep(Duration::from_millis(100)).await;
        handle.stop().await;

        assert_eq!(bus.published_count(), 1);
        assert!(store.all_messages().await[0].is_processed());
    }
}
