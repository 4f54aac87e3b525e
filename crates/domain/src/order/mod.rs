//! Order aggregate and related types.

mod aggregate;
mod state;

pub use aggregate::{Order, OrderRecord};
pub use state::OrderStatus;

use thiserror::Error;

/// Errors that can occur during order operations.
///
/// Every variant is a caller error: the operation is rejected
/// synchronously, no state changes, no event is buffered, and the
/// caller must not retry the same call.
#[derive(Debug, Error)]
pub enum OrderError {
    /// Order amount must be strictly positive.
    #[error("Order amount must be positive, got {amount}")]
    InvalidAmount { amount: String },

    /// Currency is required.
    #[error("Currency is required")]
    MissingCurrency,

    /// Idempotency key is required.
    #[error("Idempotency key is required")]
    MissingIdempotencyKey,

    /// The order is not in a state that allows the requested action.
    #[error("Cannot {action} from {current} state")]
    InvalidTransition {
        current: OrderStatus,
        action: &'static str,
    },

    /// A captured order cannot be failed or cancelled.
    #[error("Cannot {action} a captured order; use the refund flow instead")]
    AlreadyCaptured { action: &'static str },

    /// The order already reached a terminal state.
    #[error("Order is already in terminal state {current}")]
    AlreadyTerminal { current: OrderStatus },
}
