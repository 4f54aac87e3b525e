//! Integration message contracts shared by all services.
//!
//! This crate defines:
//! - the commands and events that cross service boundaries,
//! - the correlation/causation context threaded through every hop,
//! - the envelope that pairs a message with that context, and
//! - the [`MessageBus`] abstraction with its two delivery modes:
//!   `publish` (fan-out event, a fact) and `send` (point-to-point
//!   command, a request for action).
//!
//! Services never exchange types beyond these contracts; each service's
//! aggregates and storage stay private to it.

pub mod bus;
pub mod commands;
pub mod context;
pub mod envelope;
pub mod events;
pub mod message;

pub use bus::{BusError, InMemoryBus, MessageBus};
pub use commands::{AuthorizePayment, CancelPayment, CapturePayment, Command};
pub use context::MessageContext;
pub use envelope::Envelope;
pub use events::{
    Event, LedgerEntryCreated, OrderAuthorized, OrderCancelled, OrderCaptured, OrderCreated,
    OrderFailed, OrderPaymentAuthorizing, PaymentAuthorized, PaymentCancelled, PaymentCaptured,
    PaymentFailed, PaymentSettled,
};
pub use message::{Message, tags};
