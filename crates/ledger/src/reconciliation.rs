//! Ledger integrity check.

use chrono::{DateTime, Utc};
use common::Money;
use serde::Serialize;

use crate::error::LedgerError;
use crate::store::LedgerStore;

/// Outcome of one reconciliation run.
#[derive(Debug, Clone, Serialize)]
pub struct ReconciliationReport {
    /// True when total debits equal total credits exactly.
    pub is_balanced: bool,

    /// Sum of all debit amounts.
    pub total_debits: Money,

    /// Sum of all credit amounts.
    pub total_credits: Money,

    /// `total_debits - total_credits`; zero when balanced.
    pub difference: Money,

    /// Number of entries examined.
    pub entry_count: usize,

    /// When the check ran.
    pub run_at: DateTime<Utc>,
}

/// Verifies the double-entry invariant across the whole ledger.
///
/// Every posting enters as a balanced pair and entries are never
/// edited, so an imbalance can only mean a bug, a partial write, or
/// external tampering. This is an integrity check, not a business
/// adjustment tool: it reports, it never fixes.
pub struct Reconciler<L> {
    store: L,
}

impl<L: LedgerStore> Reconciler<L> {
    /// Creates a reconciler over the given store.
    pub fn new(store: L) -> Self {
        Self { store }
    }

    /// Sums all debits and credits and reports the balance.
    #[tracing::instrument(skip(self))]
    pub async fn run(&self) -> Result<ReconciliationReport, LedgerError> {
        let entries = self.store.all_entries().await?;

        let total_debits: Money = entries.iter().map(|e| e.debit_amount).sum();
        let total_credits: Money = entries.iter().map(|e| e.credit_amount).sum();
        let difference = total_debits - total_credits;
        let is_balanced = difference.is_zero();

        metrics::counter!("ledger_reconciliation_runs").increment(1);

        if is_balanced {
            tracing::info!(
                total_debits = %total_debits,
                total_credits = %total_credits,
                entry_count = entries.len(),
                "reconciliation passed, ledger balanced"
            );
        } else {
            tracing::error!(
                total_debits = %total_debits,
                total_credits = %total_credits,
                difference = %difference,
                "reconciliation failed, ledger unbalanced"
            );
        }

        Ok(ReconciliationReport {
            is_balanced,
            total_debits,
            total_credits,
            difference,
            entry_count: entries.len(),
            run_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounts;
    use crate::entry::LedgerEntry;
    use crate::store::InMemoryLedgerStore;
    use common::{Currency, PaymentId, TransactionId};

    async fn post_capture(store: &InMemoryLedgerStore, cents: i64) -> LedgerEntry {
        let transaction_id = TransactionId::new();
        let payment_id = PaymentId::new();
        let debit = LedgerEntry::debit(
            transaction_id,
            payment_id,
            accounts::CUSTOMER_RECEIVABLE,
            Money::from_cents(cents),
            Currency::new("USD"),
            "capture",
        )
        .unwrap();
        let credit = LedgerEntry::credit(
            transaction_id,
            payment_id,
            accounts::REVENUE,
            Money::from_cents(cents),
            Currency::new("USD"),
            "revenue",
        )
        .unwrap();
        let debit_copy = debit.clone();
        store.append_pair(debit, credit).await.unwrap();
        debit_copy
    }

    #[tokio::test]
    async fn empty_ledger_is_balanced() {
        let store = InMemoryLedgerStore::new();
        let report = Reconciler::new(store).run().await.unwrap();

        assert!(report.is_balanced);
        assert!(report.difference.is_zero());
        assert_eq!(report.entry_count, 0);
    }

    #[tokio::test]
    async fn balanced_ledger_reports_zero_difference() {
        let store = InMemoryLedgerStore::new();
        post_capture(&store, 25000).await;
        post_capture(&store, 9999).await;
        post_capture(&store, 1).await;

        let report = Reconciler::new(store).run().await.unwrap();

        assert!(report.is_balanced);
        assert_eq!(report.total_debits.cents(), 35000);
        assert_eq!(report.total_credits.cents(), 35000);
        assert!(report.difference.is_zero());
        assert_eq!(report.entry_count, 6);
    }

    #[tokio::test]
    async fn missing_entry_surfaces_as_exact_difference() {
        let store = InMemoryLedgerStore::new();
        post_capture(&store, 25000).await;
        let debit = post_capture(&store, 9999).await;

        store.remove_entry(debit.id).await;

        let report = Reconciler::new(store).run().await.unwrap();

        assert!(!report.is_balanced);
        assert_eq!(report.difference.cents(), -9999);
        assert_eq!(report.entry_count, 3);
    }
}
