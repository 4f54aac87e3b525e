//! Order aggregate implementation.

use chrono::{DateTime, Utc};
use common::{AuditStamp, Currency, CustomerId, Money, OrderId, PaymentId, Version};
use messaging::events::{
    OrderAuthorized, OrderCancelled, OrderCaptured, OrderCreated, OrderFailed,
    OrderPaymentAuthorizing,
};
use messaging::Event;

use super::{OrderError, OrderStatus};

/// Order aggregate root: the consistency boundary for order state.
///
/// Business rules enforced here:
/// 1. Amount is fixed at creation and must be positive.
/// 2. State moves only along the legal transition graph.
/// 3. A captured order can neither fail nor be cancelled.
/// 4. Every state change buffers the event describing the new fact.
///
/// The order knows nothing about payment providers or messaging
/// transports; it expresses intent through buffered events which the
/// storage layer commits atomically with the row change.
#[derive(Debug, Clone)]
pub struct Order {
    id: OrderId,
    customer_id: CustomerId,
    amount: Money,
    currency: Currency,
    status: OrderStatus,
    idempotency_key: String,
    payment_id: Option<PaymentId>,
    failure_reason: Option<String>,
    version: Version,
    audit: AuditStamp,
    pending: Vec<Event>,
}

/// Stored snapshot of an order row, used to rehydrate the aggregate.
#[derive(Debug, Clone)]
pub struct OrderRecord {
    pub id: OrderId,
    pub customer_id: CustomerId,
    pub amount: Money,
    pub currency: Currency,
    pub status: OrderStatus,
    pub idempotency_key: String,
    pub payment_id: Option<PaymentId>,
    pub failure_reason: Option<String>,
    pub version: Version,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Order {
    /// Creates a new order in `Created` state.
    pub fn create(
        customer_id: CustomerId,
        amount: Money,
        currency: Currency,
        idempotency_key: impl Into<String>,
    ) -> Result<Self, OrderError> {
        if !amount.is_positive() {
            return Err(OrderError::InvalidAmount {
                amount: amount.to_string(),
            });
        }
        if currency.is_empty() {
            return Err(OrderError::MissingCurrency);
        }
        let idempotency_key = idempotency_key.into();
        if idempotency_key.trim().is_empty() {
            return Err(OrderError::MissingIdempotencyKey);
        }

        let mut order = Self {
            id: OrderId::new(),
            customer_id,
            amount,
            currency,
            status: OrderStatus::Created,
            idempotency_key,
            payment_id: None,
            failure_reason: None,
            version: Version::initial(),
            audit: AuditStamp::now(),
            pending: Vec::new(),
        };

        order.raise(Event::OrderCreated(OrderCreated {
            order_id: order.id,
            customer_id,
            amount,
            currency: order.currency.clone(),
            idempotency_key: order.idempotency_key.clone(),
        }));

        Ok(order)
    }

    /// Rehydrates an order from its stored row. The event buffer starts
    /// empty; stored state has already been announced.
    pub fn from_record(record: OrderRecord) -> Self {
        Self {
            id: record.id,
            customer_id: record.customer_id,
            amount: record.amount,
            currency: record.currency,
            status: record.status,
            idempotency_key: record.idempotency_key,
            payment_id: record.payment_id,
            failure_reason: record.failure_reason,
            version: record.version,
            audit: AuditStamp::from_stored(record.created_at, record.updated_at),
            pending: Vec::new(),
        }
    }

    /// Moves the order into `PaymentAuthorizing`.
    pub fn start_payment_authorization(&mut self) -> Result<(), OrderError> {
        if !self.status.can_start_authorization() {
            return Err(OrderError::InvalidTransition {
                current: self.status,
                action: "start payment authorization",
            });
        }

        self.status = OrderStatus::PaymentAuthorizing;
        self.audit.touch();
        self.raise(Event::OrderPaymentAuthorizing(OrderPaymentAuthorizing {
            order_id: self.id,
        }));
        Ok(())
    }

    /// Records a successful payment authorization.
    pub fn mark_authorized(&mut self, payment_id: PaymentId) -> Result<(), OrderError> {
        if !self.status.can_mark_authorized() {
            return Err(OrderError::InvalidTransition {
                current: self.status,
                action: "mark authorized",
            });
        }

        self.status = OrderStatus::Authorized;
        self.payment_id = Some(payment_id);
        self.audit.touch();
        self.raise(Event::OrderAuthorized(OrderAuthorized {
            order_id: self.id,
            payment_id,
        }));
        Ok(())
    }

    /// Moves the order into `Capturing`.
    ///
    /// Raises no event: the capture command itself is the outbound
    /// message for this transition, and the outcome is announced by
    /// `mark_captured` or `mark_failed`.
    pub fn start_capture(&mut self) -> Result<(), OrderError> {
        if !self.status.can_start_capture() {
            return Err(OrderError::InvalidTransition {
                current: self.status,
                action: "start capture",
            });
        }

        self.status = OrderStatus::Capturing;
        self.audit.touch();
        Ok(())
    }

    /// Records a successful capture. Terminal happy path.
    pub fn mark_captured(&mut self) -> Result<(), OrderError> {
        if !self.status.can_mark_captured() {
            return Err(OrderError::InvalidTransition {
                current: self.status,
                action: "mark captured",
            });
        }
        let payment_id = self.payment_id.ok_or(OrderError::InvalidTransition {
            current: self.status,
            action: "mark captured",
        })?;

        self.status = OrderStatus::Captured;
        self.audit.touch();
        self.raise(Event::OrderCaptured(OrderCaptured {
            order_id: self.id,
            payment_id,
        }));
        Ok(())
    }

    /// Records a payment failure with its reason.
    pub fn mark_failed(&mut self, reason: impl Into<String>) -> Result<(), OrderError> {
        if self.status == OrderStatus::Captured {
            return Err(OrderError::AlreadyCaptured { action: "fail" });
        }
        if !self.status.can_fail() {
            return Err(OrderError::InvalidTransition {
                current: self.status,
                action: "fail",
            });
        }

        let reason = reason.into();
        self.status = OrderStatus::Failed;
        self.failure_reason = Some(reason.clone());
        self.audit.touch();
        self.raise(Event::OrderFailed(OrderFailed {
            order_id: self.id,
            reason,
        }));
        Ok(())
    }

    /// Cancels the order before capture.
    pub fn cancel(&mut self) -> Result<(), OrderError> {
        if self.status == OrderStatus::Captured {
            return Err(OrderError::AlreadyCaptured { action: "cancel" });
        }
        if matches!(self.status, OrderStatus::Cancelled | OrderStatus::Failed) {
            return Err(OrderError::AlreadyTerminal {
                current: self.status,
            });
        }

        self.status = OrderStatus::Cancelled;
        self.audit.touch();
        self.raise(Event::OrderCancelled(OrderCancelled { order_id: self.id }));
        Ok(())
    }

    fn raise(&mut self, event: Event) {
        self.pending.push(event);
    }
}

// Query methods
impl Order {
    /// Returns the order ID.
    pub fn id(&self) -> OrderId {
        self.id
    }

    /// Returns the customer who placed the order.
    pub fn customer_id(&self) -> CustomerId {
        self.customer_id
    }

    /// Returns the order amount, fixed at creation.
    pub fn amount(&self) -> Money {
        self.amount
    }

    /// Returns the order currency.
    pub fn currency(&self) -> &Currency {
        &self.currency
    }

    /// Returns the current status.
    pub fn status(&self) -> OrderStatus {
        self.status
    }

    /// Returns the caller-supplied idempotency key.
    pub fn idempotency_key(&self) -> &str {
        &self.idempotency_key
    }

    /// Returns the payment backing this order, once authorized.
    pub fn payment_id(&self) -> Option<PaymentId> {
        self.payment_id
    }

    /// Returns why the order failed, if it did.
    pub fn failure_reason(&self) -> Option<&str> {
        self.failure_reason.as_deref()
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

    /// Clears the event buffer. Called by the storage layer only after
    /// the events were committed alongside the state change.
    pub fn clear_pending_events(&mut self) {
        self.pending.clear();
    }
}
