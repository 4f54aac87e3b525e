//! Accounting service: turns captures into balanced ledger postings.

use common::TransactionId;
use ledger::{LedgerEntry, LedgerStore, accounts};
use messaging::events::{LedgerEntryCreated, PaymentCaptured};
use messaging::{Envelope, Message, MessageContext};
use outbox::{OutboxMessage, OutboxStore};

use crate::error::Result;

/// The accounting service.
pub struct AccountingService<L, O> {
    ledger: L,
    outbox: O,
}

impl<L: LedgerStore, O: OutboxStore> AccountingService<L, O> {
    /// Creates the service over its ledger store and outbox.
    pub fn new(ledger: L, outbox: O) -> Self {
        Self { ledger, outbox }
    }

    /// Reacts to `PaymentCaptured` by posting the double-entry pair:
    /// a debit of the full amount against `CustomerReceivable` and a
    /// credit of the same amount against `Revenue`, sharing one fresh
    /// transaction ID.
    ///
    /// Idempotent under redelivery: entries existing for the payment
    /// mean the posting already happened and nothing is written.
    #[tracing::instrument(skip(self, event, context), fields(payment_id = %event.payment_id))]
    pub async fn on_payment_captured(
        &self,
        event: &PaymentCaptured,
        context: &MessageContext,
    ) -> Result<()> {
        let existing = self.ledger.entries_for_payment(event.payment_id).await?;
        if !existing.is_empty() {
            tracing::info!(
                payment_id = %event.payment_id,
                "ledger entries already exist, skipping"
            );
            return Ok(());
        }

        let transaction_id = TransactionId::new();

        let debit = LedgerEntry::debit(
            transaction_id,
            event.payment_id,
            accounts::CUSTOMER_RECEIVABLE,
            event.amount,
            event.currency.clone(),
            format!("Payment capture for order {}", event.order_id),
        )?;
        let credit = LedgerEntry::credit(
            transaction_id,
            event.payment_id,
            accounts::REVENUE,
            event.amount,
            event.currency.clone(),
            format!("Revenue from order {}", event.order_id),
        )?;

        let created = LedgerEntryCreated {
            ledger_entry_id: debit.id,
            transaction_id,
            payment_id: event.payment_id,
            debit_account: debit.account_name.clone(),
            credit_account: credit.account_name.clone(),
            amount: event.amount,
            currency: event.currency.clone(),
        };

        self.ledger.append_pair(debit, credit).await?;

        let context = context.caused_by(event.payment_id.as_uuid());
        let envelope = Envelope::<Message>::new(created, context);
        self.outbox
            .enqueue(vec![OutboxMessage::from_envelope(&envelope)?])
            .await?;

        metrics::counter!("ledger_pairs_posted").increment(1);
        tracing::info!(
            %transaction_id,
            payment_id = %event.payment_id,
            amount = %event.amount,
            currency = %event.currency,
            "ledger pair posted"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{Currency, Money, OrderId, PaymentId};
    use ledger::InMemoryLedgerStore;
    use outbox::InMemoryOutboxStore;
    use uuid::Uuid;

    fn captured(cents: i64) -> PaymentCaptured {
        PaymentCaptured {
            payment_id: PaymentId::new(),
            order_id: OrderId::new(),
            amount: Money::from_cents(cents),
            currency: Currency::new("USD"),
            provider_transaction_id: "sim_auth_1".to_string(),
        }
    }

    #[tokio::test]
    async fn capture_posts_one_balanced_pair() {
        let ledger_store = InMemoryLedgerStore::new();
        let outbox_store = InMemoryOutboxStore::new();
        let service = AccountingService::new(ledger_store.clone(), outbox_store.clone());

        let event = captured(25000);
        let context = MessageContext::root(Uuid::new_v4());
        service.on_payment_captured(&event, &context).await.unwrap();

        let entries = ledger_store
            .entries_for_payment(event.payment_id)
            .await
            .unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].transaction_id, entries[1].transaction_id);
        assert_eq!(entries[0].account_name, accounts::CUSTOMER_RECEIVABLE);
        assert_eq!(entries[1].account_name, accounts::REVENUE);
        assert_eq!(entries[0].debit_amount.cents(), 25000);
        assert_eq!(entries[1].credit_amount.cents(), 25000);

        let messages = outbox_store.all_messages().await;
        assert_eq!(messages.len(), 1);
        assert_eq!(
            messages[0].message_type,
            "accounting.ledger-entry-created.v1"
        );
    }

    #[tokio::test]
    async fn redelivery_creates_no_additional_rows() {
        let ledger_store = InMemoryLedgerStore::new();
        let outbox_store = InMemoryOutboxStore::new();
        let service = AccountingService::new(ledger_store.clone(), outbox_store.clone());

        let event = captured(25000);
        let context = MessageContext::root(Uuid::new_v4());
        service.on_payment_captured(&event, &context).await.unwrap();
        service.on_payment_captured(&event, &context).await.unwrap();
        service.on_payment_captured(&event, &context).await.unwrap();

        assert_eq!(ledger_store.entry_count().await, 2);
        assert_eq!(outbox_store.message_count().await, 1);
    }

    #[tokio::test]
    async fn distinct_payments_each_get_a_pair() {
        let ledger_store = InMemoryLedgerStore::new();
        let service =
            AccountingService::new(ledger_store.clone(), InMemoryOutboxStore::new());
        let context = MessageContext::root(Uuid::new_v4());

        service
            .on_payment_captured(&captured(100), &context)
            .await
            .unwrap();
        service
            .on_payment_captured(&captured(200), &context)
            .await
            .unwrap();

        assert_eq!(ledger_store.entry_count().await, 4);
    }
}
