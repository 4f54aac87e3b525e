//! Transactional outbox: the atomicity boundary between local state and
//! integration messages.
//!
//! The guarantee: an aggregate's row changes and the messages announcing
//! them become durable in one local transaction, so a crash can never
//! leave a committed state change without its messages, nor a published
//! message without its committed state. Delivery then happens
//! asynchronously: a polling [`OutboxDispatcher`] reads unprocessed
//! rows, decodes them through an explicit [`MessageRegistry`], and hands
//! them to the bus with bounded retry and permanent poisoning of
//! undecodable rows.
//!
//! Delivery is at-least-once. Consumers must be idempotent.

pub mod dispatcher;
pub mod error;
pub mod memory;
pub mod message;
pub mod postgres;
pub mod registry;
pub mod repository;
pub mod store;

pub use dispatcher::{DispatcherConfig, DispatcherHandle, OutboxDispatcher};
pub use error::StoreError;
pub use memory::{InMemoryOrderRepository, InMemoryOutboxStore, InMemoryPaymentRepository};
pub use message::{MessageId, OutboxMessage, OutboxPayload};
pub use postgres::{
    PostgresOrderRepository, PostgresOutboxStore, PostgresPaymentRepository, run_migrations,
};
pub use registry::MessageRegistry;
pub use repository::{OrderRepository, PaymentRepository, outbox_messages_for};
pub use store::{MAX_RETRIES, OutboxStore};
