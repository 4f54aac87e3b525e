//! Payment aggregate and related types.

mod aggregate;
mod state;

pub use aggregate::{Payment, PaymentRecord};
pub use state::PaymentStatus;

use thiserror::Error;

/// Errors that can occur during payment operations.
#[derive(Debug, Error)]
pub enum PaymentError {
    /// Payment amount must be strictly positive.
    #[error("Payment amount must be positive, got {amount}")]
    InvalidAmount { amount: String },

    /// The payment is not in a state that allows the requested action.
    #[error("Cannot {action} payment in {current} state")]
    InvalidTransition {
        current: PaymentStatus,
        action: &'static str,
    },
}
