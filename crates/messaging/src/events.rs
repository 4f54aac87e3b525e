//! Fan-out integration events.
//!
//! An event is an immutable fact about something that already happened.
//! Zero or more services subscribe to each one. Events are produced by
//! aggregates, persisted through the outbox in the same transaction as
//! the state change they describe, and published asynchronously by the
//! dispatcher.

use common::{Currency, CustomerId, LedgerEntryId, Money, OrderId, PaymentId, TransactionId};
use serde::{Deserialize, Serialize};

use crate::message::tags;

/// A new order was accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderCreated {
    pub order_id: OrderId,
    pub customer_id: CustomerId,
    pub amount: Money,
    pub currency: Currency,
    pub idempotency_key: String,
}

/// An order started waiting for payment authorization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderPaymentAuthorizing {
    pub order_id: OrderId,
}

/// An order's payment was authorized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderAuthorized {
    pub order_id: OrderId,
    pub payment_id: PaymentId,
}

/// An order's payment was captured; the order is complete.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderCaptured {
    pub order_id: OrderId,
    pub payment_id: PaymentId,
}

/// An order failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderFailed {
    pub order_id: OrderId,
    pub reason: String,
}

/// An order was cancelled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderCancelled {
    pub order_id: OrderId,
}

/// The provider authorized a payment; funds are reserved but not moved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentAuthorized {
    pub payment_id: PaymentId,
    pub order_id: OrderId,
    pub amount: Money,
    pub currency: Currency,
    pub provider_transaction_id: String,
}

/// Funds were captured from the customer. The point of no return:
/// accounting reacts by posting the ledger pair, orders finalize.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentCaptured {
    pub payment_id: PaymentId,
    pub order_id: OrderId,
    pub amount: Money,
    pub currency: Currency,
    pub provider_transaction_id: String,
}

/// A payment failed at some stage. A compensating fact, not an
/// exception: consumers react explicitly instead of retrying a charge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentFailed {
    pub payment_id: PaymentId,
    pub order_id: OrderId,
    pub reason: String,
    pub failure_code: String,
}

/// An authorized payment was voided before capture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentCancelled {
    pub payment_id: PaymentId,
    pub order_id: OrderId,
}

/// The provider confirmed settlement of a captured payment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentSettled {
    pub payment_id: PaymentId,
    pub order_id: OrderId,
    pub amount: Money,
    pub currency: Currency,
    pub provider_settlement_id: String,
}

/// A double-entry pair was posted to the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntryCreated {
    pub ledger_entry_id: LedgerEntryId,
    pub transaction_id: TransactionId,
    pub payment_id: PaymentId,
    pub debit_account: String,
    pub credit_account: String,
    pub amount: Money,
    pub currency: Currency,
}

/// All events that travel over the bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum Event {
    OrderCreated(OrderCreated),
    OrderPaymentAuthorizing(OrderPaymentAuthorizing),
    OrderAuthorized(OrderAuthorized),
    OrderCaptured(OrderCaptured),
    OrderFailed(OrderFailed),
    OrderCancelled(OrderCancelled),
    PaymentAuthorized(PaymentAuthorized),
    PaymentCaptured(PaymentCaptured),
    PaymentFailed(PaymentFailed),
    PaymentCancelled(PaymentCancelled),
    PaymentSettled(PaymentSettled),
    LedgerEntryCreated(LedgerEntryCreated),
}

impl Event {
    /// Returns the stable wire tag of this event.
    pub fn event_type(&self) -> &'static str {
        match self {
            Event::OrderCreated(_) => tags::ORDER_CREATED,
            Event::OrderPaymentAuthorizing(_) => tags::ORDER_PAYMENT_AUTHORIZING,
            Event::OrderAuthorized(_) => tags::ORDER_AUTHORIZED,
            Event::OrderCaptured(_) => tags::ORDER_CAPTURED,
            Event::OrderFailed(_) => tags::ORDER_FAILED,
            Event::OrderCancelled(_) => tags::ORDER_CANCELLED,
            Event::PaymentAuthorized(_) => tags::PAYMENT_AUTHORIZED,
            Event::PaymentCaptured(_) => tags::PAYMENT_CAPTURED,
            Event::PaymentFailed(_) => tags::PAYMENT_FAILED,
            Event::PaymentCancelled(_) => tags::PAYMENT_CANCELLED,
            Event::PaymentSettled(_) => tags::PAYMENT_SETTLED,
            Event::LedgerEntryCreated(_) => tags::LEDGER_ENTRY_CREATED,
        }
    }

    /// Serializes the inner payload, without the enum wrapper.
    pub fn data(&self) -> Result<serde_json::Value, serde_json::Error> {
        match self {
            Event::OrderCreated(e) => serde_json::to_value(e),
            Event::OrderPaymentAuthorizing(e) => serde_json::to_value(e),
            Event::OrderAuthorized(e) => serde_json::to_value(e),
            Event::OrderCaptured(e) => serde_json::to_value(e),
            Event::OrderFailed(e) => serde_json::to_value(e),
            Event::OrderCancelled(e) => serde_json::to_value(e),
            Event::PaymentAuthorized(e) => serde_json::to_value(e),
            Event::PaymentCaptured(e) => serde_json::to_value(e),
            Event::PaymentFailed(e) => serde_json::to_value(e),
            Event::PaymentCancelled(e) => serde_json::to_value(e),
            Event::PaymentSettled(e) => serde_json::to_value(e),
            Event::LedgerEntryCreated(e) => serde_json::to_value(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_type_returns_wire_tag() {
        let event = Event::PaymentCaptured(PaymentCaptured {
            payment_id: PaymentId::new(),
            order_id: OrderId::new(),
            amount: Money::from_cents(25000),
            currency: Currency::new("USD"),
            provider_transaction_id: "sim_auth_1".to_string(),
        });
        assert_eq!(event.event_type(), "payments.payment-captured.v1");
    }

    #[test]
    fn event_data_roundtrip() {
        let original = PaymentFailed {
            payment_id: PaymentId::new(),
            order_id: OrderId::new(),
            reason: "insufficient funds".to_string(),
            failure_code: "INSUFFICIENT_FUNDS".to_string(),
        };

        let data = Event::PaymentFailed(original.clone()).data().unwrap();
        let back: PaymentFailed = serde_json::from_value(data).unwrap();
        assert_eq!(back, original);
    }
}
