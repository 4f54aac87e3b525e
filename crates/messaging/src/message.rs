//! The command/event union and the stable wire tags.

use serde::{Deserialize, Serialize};

use crate::commands::{AuthorizePayment, CancelPayment, CapturePayment, Command};
use crate::events::{
    Event, LedgerEntryCreated, OrderAuthorized, OrderCancelled, OrderCaptured, OrderCreated,
    OrderFailed, OrderPaymentAuthorizing, PaymentAuthorized, PaymentCancelled, PaymentCaptured,
    PaymentFailed, PaymentSettled,
};

/// Stable wire tags for every message contract.
///
/// These strings are what gets stored in the outbox `message_type`
/// column and what the dispatch registry resolves. They are versioned
/// and must never be edited once messages with them exist; a breaking
/// payload change gets a new `.v2` tag instead.
pub mod tags {
    pub const AUTHORIZE_PAYMENT: &str = "payments.authorize-payment.v1";
    pub const CAPTURE_PAYMENT: &str = "payments.capture-payment.v1";
    pub const CANCEL_PAYMENT: &str = "payments.cancel-payment.v1";

    pub const ORDER_CREATED: &str = "orders.order-created.v1";
    pub const ORDER_PAYMENT_AUTHORIZING: &str = "orders.order-payment-authorizing.v1";
    pub const ORDER_AUTHORIZED: &str = "orders.order-authorized.v1";
    pub const ORDER_CAPTURED: &str = "orders.order-captured.v1";
    pub const ORDER_FAILED: &str = "orders.order-failed.v1";
    pub const ORDER_CANCELLED: &str = "orders.order-cancelled.v1";

    pub const PAYMENT_AUTHORIZED: &str = "payments.payment-authorized.v1";
    pub const PAYMENT_CAPTURED: &str = "payments.payment-captured.v1";
    pub const PAYMENT_FAILED: &str = "payments.payment-failed.v1";
    pub const PAYMENT_CANCELLED: &str = "payments.payment-cancelled.v1";
    pub const PAYMENT_SETTLED: &str = "payments.payment-settled.v1";

    pub const LEDGER_ENTRY_CREATED: &str = "accounting.ledger-entry-created.v1";
}

/// Anything that can sit in an outbox row: a command or an event.
///
/// The dispatcher decides the delivery mode from this: events are
/// published (fan-out), commands are sent (point-to-point).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Message {
    Command(Command),
    Event(Event),
}

impl Message {
    /// Returns the stable wire tag of the wrapped message.
    pub fn message_type(&self) -> &'static str {
        match self {
            Message::Command(command) => command.command_type(),
            Message::Event(event) => event.event_type(),
        }
    }

    /// Serializes the inner payload, without any enum wrapper.
    pub fn data(&self) -> Result<serde_json::Value, serde_json::Error> {
        match self {
            Message::Command(command) => command.data(),
            Message::Event(event) => event.data(),
        }
    }

    /// Returns true if this is a command.
    pub fn is_command(&self) -> bool {
        matches!(self, Message::Command(_))
    }
}

impl From<Command> for Message {
    fn from(command: Command) -> Self {
        Message::Command(command)
    }
}

impl From<Event> for Message {
    fn from(event: Event) -> Self {
        Message::Event(event)
    }
}

impl From<AuthorizePayment> for Message {
    fn from(command: AuthorizePayment) -> Self {
        Message::Command(Command::AuthorizePayment(command))
    }
}

impl From<CapturePayment> for Message {
    fn from(command: CapturePayment) -> Self {
        Message::Command(Command::CapturePayment(command))
    }
}

impl From<CancelPayment> for Message {
    fn from(command: CancelPayment) -> Self {
        Message::Command(Command::CancelPayment(command))
    }
}

impl From<OrderCreated> for Message {
    fn from(event: OrderCreated) -> Self {
        Message::Event(Event::OrderCreated(event))
    }
}

impl From<OrderPaymentAuthorizing> for Message {
    fn from(event: OrderPaymentAuthorizing) -> Self {
        Message::Event(Event::OrderPaymentAuthorizing(event))
    }
}

impl From<OrderAuthorized> for Message {
    fn from(event: OrderAuthorized) -> Self {
        Message::Event(Event::OrderAuthorized(event))
    }
}

impl From<OrderCaptured> for Message {
    fn from(event: OrderCaptured) -> Self {
        Message::Event(Event::OrderCaptured(event))
    }
}

impl From<OrderFailed> for Message {
    fn from(event: OrderFailed) -> Self {
        Message::Event(Event::OrderFailed(event))
    }
}

impl From<OrderCancelled> for Message {
    fn from(event: OrderCancelled) -> Self {
        Message::Event(Event::OrderCancelled(event))
    }
}

impl From<PaymentAuthorized> for Message {
    fn from(event: PaymentAuthorized) -> Self {
        Message::Event(Event::PaymentAuthorized(event))
    }
}

impl From<PaymentCaptured> for Message {
    fn from(event: PaymentCaptured) -> Self {
        Message::Event(Event::PaymentCaptured(event))
    }
}

impl From<PaymentFailed> for Message {
    fn from(event: PaymentFailed) -> Self {
        Message::Event(Event::PaymentFailed(event))
    }
}

impl From<PaymentCancelled> for Message {
    fn from(event: PaymentCancelled) -> Self {
        Message::Event(Event::PaymentCancelled(event))
    }
}

impl From<PaymentSettled> for Message {
    fn from(event: PaymentSettled) -> Self {
        Message::Event(Event::PaymentSettled(event))
    }
}

impl From<LedgerEntryCreated> for Message {
    fn from(event: LedgerEntryCreated) -> Self {
        Message::Event(Event::LedgerEntryCreated(event))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{Currency, Money, OrderId, PaymentId};

    #[test]
    fn message_type_delegates_to_inner() {
        let message: Message = AuthorizePayment {
            order_id: OrderId::new(),
            amount: Money::from_cents(25000),
            currency: Currency::new("USD"),
            idempotency_key: "K1".to_string(),
        }
        .into();
        assert_eq!(message.message_type(), tags::AUTHORIZE_PAYMENT);
        assert!(message.is_command());

        let message: Message = PaymentCancelled {
            payment_id: PaymentId::new(),
            order_id: OrderId::new(),
        }
        .into();
        assert_eq!(message.message_type(), tags::PAYMENT_CANCELLED);
        assert!(!message.is_command());
    }
}
