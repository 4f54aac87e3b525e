//! Application-layer error types.

use common::OrderId;
use domain::{OrderError, PaymentError};
use ledger::LedgerError;
use outbox::StoreError;
use thiserror::Error;

/// Errors surfaced by the service handlers.
///
/// Domain variants are caller errors and must not be retried; store and
/// serialization variants are infrastructure errors that propagate to
/// the message-consumption layer, whose own retry/dead-letter policy
/// applies.
#[derive(Debug, Error)]
pub enum ChoreographyError {
    /// An order rejected the requested transition.
    #[error("order error: {0}")]
    Order(#[from] OrderError),

    /// A payment rejected the requested transition.
    #[error("payment error: {0}")]
    Payment(#[from] PaymentError),

    /// A ledger invariant was violated.
    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    /// Storage failed.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// A payload could not be (de)serialized.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The referenced order does not exist.
    #[error("order not found: {0}")]
    OrderNotFound(OrderId),

    /// The order exists but is missing state the operation needs.
    #[error("order not ready: {0}")]
    OrderNotReady(String),
}

/// Convenience result alias for service handlers.
pub type Result<T> = std::result::Result<T, ChoreographyError>;
