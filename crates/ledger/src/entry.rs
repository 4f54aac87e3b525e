//! Ledger entry rows.

use chrono::{DateTime, Utc};
use common::{Currency, LedgerEntryId, Money, PaymentId, TransactionId};
use serde::{Deserialize, Serialize};

use crate::error::LedgerError;

/// A single row in the double-entry ledger.
///
/// Exactly one of `debit_amount`/`credit_amount` is nonzero. Entries
/// are immutable after creation; a wrong posting is corrected with a
/// new compensating pair so the audit trail stays complete.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Unique identifier of this row.
    pub id: LedgerEntryId,

    /// Shared by both rows of one posting pair.
    pub transaction_id: TransactionId,

    /// The payment that triggered this entry.
    pub payment_id: PaymentId,

    /// The account this entry affects.
    pub account_name: String,

    /// Amount debited; zero for a credit entry.
    pub debit_amount: Money,

    /// Amount credited; zero for a debit entry.
    pub credit_amount: Money,

    /// Currency code of the amount.
    pub currency: Currency,

    /// Human-readable description.
    pub description: String,

    /// When the entry was written.
    pub created_at: DateTime<Utc>,
}

impl LedgerEntry {
    /// Creates a debit entry.
    pub fn debit(
        transaction_id: TransactionId,
        payment_id: PaymentId,
        account_name: impl Into<String>,
        amount: Money,
        currency: Currency,
        description: impl Into<String>,
    ) -> Result<Self, LedgerError> {
        Self::validate_amount(amount)?;
        Ok(Self {
            id: LedgerEntryId::new(),
            transaction_id,
            payment_id,
            account_name: account_name.into(),
            debit_amount: amount,
            credit_amount: Money::zero(),
            currency,
            description: description.into(),
            created_at: Utc::now(),
        })
    }

    /// Creates a credit entry.
    pub fn credit(
        transaction_id: TransactionId,
        payment_id: PaymentId,
        account_name: impl Into<String>,
        amount: Money,
        currency: Currency,
        description: impl Into<String>,
    ) -> Result<Self, LedgerError> {
        Self::validate_amount(amount)?;
        Ok(Self {
            id: LedgerEntryId::new(),
            transaction_id,
            payment_id,
            account_name: account_name.into(),
            debit_amount: Money::zero(),
            credit_amount: amount,
            currency,
            description: description.into(),
            created_at: Utc::now(),
        })
    }

    /// Returns true if this is a debit entry.
    pub fn is_debit(&self) -> bool {
        self.debit_amount.is_positive()
    }

    /// Returns true if this is a credit entry.
    pub fn is_credit(&self) -> bool {
        self.credit_amount.is_positive()
    }

    /// Returns the nonzero side of the entry.
    pub fn amount(&self) -> Money {
        if self.is_debit() {
            self.debit_amount
        } else {
            self.credit_amount
        }
    }

    fn validate_amount(amount: Money) -> Result<(), LedgerError> {
        if !amount.is_positive() {
            return Err(LedgerError::InvalidAmount {
                amount: amount.to_string(),
            });
        }
        Ok(())
    }
}
