//! Ledger error types.

use thiserror::Error;

/// Errors that can occur in the ledger.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Ledger entry amounts must be strictly positive.
    #[error("Ledger entry amount must be positive, got {amount}")]
    InvalidAmount { amount: String },

    /// The two entries of a posting do not form a balanced pair.
    #[error("Unbalanced posting pair: {reason}")]
    UnbalancedPair { reason: &'static str },
}
