//! Payment aggregate implementation.

use chrono::{DateTime, Utc};
use common::{AuditStamp, Currency, Money, OrderId, PaymentId, Version};
use messaging::events::{
    PaymentAuthorized, PaymentCancelled, PaymentCaptured, PaymentFailed, PaymentSettled,
};
use messaging::Event;

use super::{PaymentError, PaymentStatus};

/// Payment aggregate root: encapsulates the payment lifecycle.
///
/// The payment never talks to the provider; the application layer calls
/// the gateway and then records the outcome through these methods. The
/// provider's transaction reference is stored for reconciliation and
/// never leaves this service except inside integration events. No card
/// data exists anywhere in this type.
#[derive(Debug, Clone)]
pub struct Payment {
    id: PaymentId,
    order_id: OrderId,
    amount: Money,
    currency: Currency,
    status: PaymentStatus,
    idempotency_key: String,
    provider_transaction_id: Option<String>,
    failure_reason: Option<String>,
    failure_code: Option<String>,
    version: Version,
    audit: AuditStamp,
    pending: Vec<Event>,
}

/// Stored snapshot of a payment row, used to rehydrate the aggregate.
#[derive(Debug, Clone)]
pub struct PaymentRecord {
    pub id: PaymentId,
    pub order_id: OrderId,
    pub amount: Money,
    pub currency: Currency,
    pub status: PaymentStatus,
    pub idempotency_key: String,
    pub provider_transaction_id: Option<String>,
    pub failure_reason: Option<String>,
    pub failure_code: Option<String>,
    pub version: Version,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Payment {
    /// Creates a new payment in `Pending` state.
    ///
    /// Raises no event yet: nothing observable has happened until the
    /// provider answers and the payment moves to `Authorized` or
    /// `Failed`.
    pub fn create(
        order_id: OrderId,
        amount: Money,
        currency: Currency,
        idempotency_key: impl Into<String>,
    ) -> Result<Self, PaymentError> {
        if !amount.is_positive() {
            return Err(PaymentError::InvalidAmount {
                amount: amount.to_string(),
            });
        }

        Ok(Self {
            id: PaymentId::new(),
            order_id,
            amount,
            currency,
            status: PaymentStatus::Pending,
            idempotency_key: idempotency_key.into(),
            provider_transaction_id: None,
            failure_reason: None,
            failure_code: None,
            version: Version::initial(),
            audit: AuditStamp::now(),
            pending: Vec::new(),
        })
    }

    /// Rehydrates a payment from its stored row.
    pub fn from_record(record: PaymentRecord) -> Self {
        Self {
            id: record.id,
            order_id: record.order_id,
            amount: record.amount,
            currency: record.currency,
            status: record.status,
            idempotency_key: record.idempotency_key,
            provider_transaction_id: record.provider_transaction_id,
            failure_reason: record.failure_reason,
            failure_code: record.failure_code,
            version: record.version,
            audit: AuditStamp::from_stored(record.created_at, record.updated_at),
            pending: Vec::new(),
        }
    }

    /// Records a successful provider authorization.
    pub fn mark_authorized(
        &mut self,
        provider_transaction_id: impl Into<String>,
    ) -> Result<(), PaymentError> {
        if !self.status.can_authorize() {
            return Err(PaymentError::InvalidTransition {
                current: self.status,
                action: "authorize",
            });
        }

        let provider_transaction_id = provider_transaction_id.into();
        self.status = PaymentStatus::Authorized;
        self.provider_transaction_id = Some(provider_transaction_id.clone());
        self.audit.touch();
        self.raise(Event::PaymentAuthorized(PaymentAuthorized {
            payment_id: self.id,
            order_id: self.order_id,
            amount: self.amount,
            currency: self.currency.clone(),
            provider_transaction_id,
        }));
        Ok(())
    }

    /// Records a successful capture.
    pub fn mark_captured(&mut self) -> Result<(), PaymentError> {
        if !self.status.can_capture() {
            return Err(PaymentError::InvalidTransition {
                current: self.status,
                action: "capture",
            });
        }
        let provider_transaction_id =
            self.provider_transaction_id
                .clone()
                .ok_or(PaymentError::InvalidTransition {
                    current: self.status,
                    action: "capture",
                })?;

        self.status = PaymentStatus::Captured;
        self.audit.touch();
        self.raise(Event::PaymentCaptured(PaymentCaptured {
            payment_id: self.id,
            order_id: self.order_id,
            amount: self.amount,
            currency: self.currency.clone(),
            provider_transaction_id,
        }));
        Ok(())
    }

    /// Records a failure with the provider's reason and code.
    pub fn mark_failed(
        &mut self,
        reason: impl Into<String>,
        failure_code: impl Into<String>,
    ) -> Result<(), PaymentError> {
        if !self.status.can_fail() {
            return Err(PaymentError::InvalidTransition {
                current: self.status,
                action: "fail",
            });
        }

        let reason = reason.into();
        let failure_code = failure_code.into();
        self.status = PaymentStatus::Failed;
        self.failure_reason = Some(reason.clone());
        self.failure_code = Some(failure_code.clone());
        self.audit.touch();
        self.raise(Event::PaymentFailed(PaymentFailed {
            payment_id: self.id,
            order_id: self.order_id,
            reason,
            failure_code,
        }));
        Ok(())
    }

    /// Voids an authorized payment, releasing the hold.
    pub fn cancel(&mut self) -> Result<(), PaymentError> {
        if !self.status.can_cancel() {
            return Err(PaymentError::InvalidTransition {
                current: self.status,
                action: "cancel",
            });
        }

        self.status = PaymentStatus::Cancelled;
        self.audit.touch();
        self.raise(Event::PaymentCancelled(PaymentCancelled {
            payment_id: self.id,
            order_id: self.order_id,
        }));
        Ok(())
    }

    /// Records provider settlement of a captured payment.
    pub fn mark_settled(
        &mut self,
        provider_settlement_id: impl Into<String>,
    ) -> Result<(), PaymentError> {
        if !self.status.can_settle() {
            return Err(PaymentError::InvalidTransition {
                current: self.status,
                action: "settle",
            });
        }

        self.status = PaymentStatus::Settled;
        self.audit.touch();
        self.raise(Event::PaymentSettled(PaymentSettled {
            payment_id: self.id,
            order_id: self.order_id,
            amount: self.amount,
            currency: self.currency.clone(),
            provider_settlement_id: provider_settlement_id.into(),
        }));
        Ok(())
    }

    fn raise(&mut self, event: Event) {
        self.pending.push(event);
    }
}

// Query methods
impl Payment {
    /// Returns the payment ID.
    pub fn id(&self) -> PaymentId {
        self.id
    }

    /// Returns the order this payment belongs to.
    pub fn order_id(&self) -> OrderId {
        self.order_id
    }

    /// Returns the payment amount.
    pub fn amount(&self) -> Money {
        self.amount
    }

    /// Returns the payment currency.
    pub fn currency(&self) -> &Currency {
        &self.currency
    }

    /// Returns the current status.
    pub fn status(&self) -> PaymentStatus {
        self.status
    }

    /// Returns the caller-supplied idempotency key.
    pub fn idempotency_key(&self) -> &str {
        &self.idempotency_key
    }

    /// Returns the provider's transaction reference, once authorized.
    pub fn provider_transaction_id(&self) -> Option<&str> {
        self.provider_transaction_id.as_deref()
    }

    /// Returns why the payment failed, if it did.
    pub fn failure_reason(&self) -> Option<&str> {
        self.failure_reason.as_deref()
    }

    /// Returns the provider failure code, if any.
    pub fn failure_code(&self) -> Option<&str> {
        self.failure_code.as_deref()
    }

    /// Returns the persisted version for optimistic concurrency.
    pub fn version(&self) -> Version {
        self.version
    }

    /// Sets the version. Called by the storage layer after a commit.
    pub fn set_version(&mut self, version: Version) {
        self.version = version;
    }

    /// Returns the audit timestamps.
    pub fn audit(&self) -> &AuditStamp {
        &self.audit
    }

    /// Returns the buffered events not yet committed.
    pub fn pending_events(&self) -> &[Event] {
        &self.pending
    }

    /// Clears the event buffer after a successful commit.
    pub fn clear_pending_events(&mut self) {
        self.pending.clear();
    }
}
