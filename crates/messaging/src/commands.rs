//! Point-to-point commands between services.
//!
//! A command is a request for action with exactly one consumer. All
//! payment commands are consumed by the payments service. Each carries
//! an idempotency key so redelivery or caller retries cannot trigger a
//! second charge.

use common::{Currency, Money, OrderId, PaymentId};
use serde::{Deserialize, Serialize};

use crate::message::tags;

/// Asks the payments service to authorize funds for an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorizePayment {
    /// The order being paid for.
    pub order_id: OrderId,

    /// Amount to authorize.
    pub amount: Money,

    /// Currency of the amount.
    pub currency: Currency,

    /// Caller-supplied key making the authorization safe to repeat.
    pub idempotency_key: String,
}

/// Asks the payments service to capture a previously authorized payment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapturePayment {
    /// The payment to capture.
    pub payment_id: PaymentId,

    /// The order the payment belongs to.
    pub order_id: OrderId,

    /// Key making the capture safe to repeat.
    pub idempotency_key: String,
}

/// Asks the payments service to void an authorized payment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CancelPayment {
    /// The payment to void.
    pub payment_id: PaymentId,

    /// The order the payment belongs to.
    pub order_id: OrderId,

    /// Key making the cancellation safe to repeat.
    pub idempotency_key: String,
}

/// All commands that travel over the bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum Command {
    AuthorizePayment(AuthorizePayment),
    CapturePayment(CapturePayment),
    CancelPayment(CancelPayment),
}

impl Command {
    /// Returns the stable wire tag of this command.
    ///
    /// Tags are versioned wire names, deliberately decoupled from the
    /// Rust type names so a rename cannot break replay of stored
    /// messages.
    pub fn command_type(&self) -> &'static str {
        match self {
            Command::AuthorizePayment(_) => tags::AUTHORIZE_PAYMENT,
            Command::CapturePayment(_) => tags::CAPTURE_PAYMENT,
            Command::CancelPayment(_) => tags::CANCEL_PAYMENT,
        }
    }

    /// Serializes the inner payload, without the enum wrapper.
    pub fn data(&self) -> Result<serde_json::Value, serde_json::Error> {
        match self {
            Command::AuthorizePayment(c) => serde_json::to_value(c),
            Command::CapturePayment(c) => serde_json::to_value(c),
            Command::CancelPayment(c) => serde_json::to_value(c),
        }
    }
}

impl From<AuthorizePayment> for Command {
    fn from(command: AuthorizePayment) -> Self {
        Command::AuthorizePayment(command)
    }
}

impl From<CapturePayment> for Command {
    fn from(command: CapturePayment) -> Self {
        Command::CapturePayment(command)
    }
}

impl From<CancelPayment> for Command {
    fn from(command: CancelPayment) -> Self {
        Command::CancelPayment(command)
    }
}
