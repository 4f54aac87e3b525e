//! Ledger storage.

use std::sync::Arc;

use async_trait::async_trait;
use common::{LedgerEntryId, PaymentId};
use tokio::sync::RwLock;

use crate::entry::LedgerEntry;
use crate::error::LedgerError;

/// Append-only storage for ledger entries.
///
/// Postings only ever enter as validated pairs; there is no update or
/// delete operation because entries are immutable facts.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Appends one balanced posting pair atomically.
    async fn append_pair(&self, debit: LedgerEntry, credit: LedgerEntry)
    -> Result<(), LedgerError>;

    /// Returns all entries referencing a payment. The idempotency guard
    /// for capture redelivery: a non-empty result means the posting
    /// already happened.
    async fn entries_for_payment(
        &self,
        payment_id: PaymentId,
    ) -> Result<Vec<LedgerEntry>, LedgerError>;

    /// Returns every entry in the ledger.
    async fn all_entries(&self) -> Result<Vec<LedgerEntry>, LedgerError>;
}

/// Validates that two entries form one balanced posting.
pub fn validate_pair(debit: &LedgerEntry, credit: &LedgerEntry) -> Result<(), LedgerError> {
    if !debit.is_debit() || !credit.is_credit() {
        return Err(LedgerError::UnbalancedPair {
            reason: "pair must be one debit and one credit",
        });
    }
    if debit.transaction_id != credit.transaction_id {
        return Err(LedgerError::UnbalancedPair {
            reason: "pair must share a transaction id",
        });
    }
    if debit.debit_amount != credit.credit_amount {
        return Err(LedgerError::UnbalancedPair {
            reason: "debit and credit amounts must match",
        });
    }
    if debit.currency != credit.currency {
        return Err(LedgerError::UnbalancedPair {
            reason: "pair must share a currency",
        });
    }
    Ok(())
}

/// In-memory ledger store.
#[derive(Clone, Default)]
pub struct InMemoryLedgerStore {
    entries: Arc<RwLock<Vec<LedgerEntry>>>,
}

impl InMemoryLedgerStore {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored entries.
    pub async fn entry_count(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Removes a single entry, bypassing the pair discipline.
    ///
    /// Exists only to exercise the reconciliation failure path: nothing
    /// in the system deletes entries, so a missing row is exactly the
    /// kind of corruption reconciliation must detect.
    pub async fn remove_entry(&self, id: LedgerEntryId) {
        self.entries.write().await.retain(|e| e.id != id);
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn append_pair(
        &self,
        debit: LedgerEntry,
        credit: LedgerEntry,
    ) -> Result<(), LedgerError> {
        validate_pair(&debit, &credit)?;

        let mut entries = self.entries.write().await;
        entries.push(debit);
        entries.push(credit);
        Ok(())
    }

    async fn entries_for_payment(
        &self,
        payment_id: PaymentId,
    ) -> Result<Vec<LedgerEntry>, LedgerError> {
        Ok(self
            .entries
            .read()
            .await
            .iter()
            .filter(|e| e.payment_id == payment_id)
            .cloned()
            .collect())
    }

    async fn all_entries(&self) -> Result<Vec<LedgerEntry>, LedgerError> {
        Ok(self.entries.read().await.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{Currency, Money, TransactionId};

    fn pair(cents: i64) -> (LedgerEntry, LedgerEntry) {
        let transaction_id = TransactionId::new();
        let payment_id = PaymentId::new();
        let debit = LedgerEntry::debit(
            transaction_id,
            payment_id,
            "CustomerReceivable",
            Money::from_cents(cents),
            Currency::new("USD"),
            "capture",
        )
        .unwrap();
        let credit = LedgerEntry::credit(
            transaction_id,
            payment_id,
            "Revenue",
            Money::from_cents(cents),
            Currency::new("USD"),
            "revenue",
        )
        .unwrap();
        (debit, credit)
    }

    #[tokio::test]
    async fn append_pair_stores_both_entries() {
        let store = InMemoryLedgerStore::new();
        let (debit, credit) = pair(25000);
        let payment_id = debit.payment_id;

        store.append_pair(debit, credit).await.unwrap();

        assert_eq!(store.entry_count().await, 2);
        assert_eq!(
            store.entries_for_payment(payment_id).await.unwrap().len(),
            2
        );
    }

    #[tokio::test]
    async fn mismatched_amounts_are_rejected() {
        let store = InMemoryLedgerStore::new();
        let transaction_id = TransactionId::new();
        let payment_id = PaymentId::new();
        let debit = LedgerEntry::debit(
            transaction_id,
            payment_id,
            "CustomerReceivable",
            Money::from_cents(25000),
            Currency::new("USD"),
            "capture",
        )
        .unwrap();
        let credit = LedgerEntry::credit(
            transaction_id,
            payment_id,
            "Revenue",
            Money::from_cents(10000),
            Currency::new("USD"),
            "revenue",
        )
        .unwrap();

        let result = store.append_pair(debit, credit).await;
        assert!(matches!(result, Err(LedgerError::UnbalancedPair { .. })));
        assert_eq!(store.entry_count().await, 0);
    }

    #[tokio::test]
    async fn two_debits_are_rejected() {
        let store = InMemoryLedgerStore::new();
        let (debit_a, _) = pair(25000);
        let (debit_b, _) = pair(25000);

        let result = store.append_pair(debit_a, debit_b).await;
        assert!(matches!(result, Err(LedgerError::UnbalancedPair { .. })));
    }

    #[tokio::test]
    async fn different_transaction_ids_are_rejected() {
        let store = InMemoryLedgerStore::new();
        let (debit, _) = pair(25000);
        let (_, credit) = pair(25000);

        let result = store.append_pair(debit, credit).await;
        assert!(matches!(result, Err(LedgerError::UnbalancedPair { .. })));
    }
}
