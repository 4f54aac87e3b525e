//! Orders service: externally-triggered commands and reactions to
//! payment events.

use common::{Currency, CustomerId, Money, OrderId};
use domain::{Order, OrderStatus};
use messaging::events::{PaymentAuthorized, PaymentCaptured, PaymentFailed};
use messaging::{AuthorizePayment, CancelPayment, CapturePayment, Command, MessageContext};
use outbox::{OrderRepository, StoreError};

use crate::error::{ChoreographyError, Result};

/// Externally-supplied order creation request.
#[derive(Debug, Clone)]
pub struct CreateOrderRequest {
    pub customer_id: CustomerId,
    pub amount: Money,
    pub currency: Currency,
    pub idempotency_key: String,
}

/// What the caller gets back from an order command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderAck {
    pub order_id: OrderId,
    pub status: OrderStatus,
}

impl OrderAck {
    fn of(order: &Order) -> Self {
        Self {
            order_id: order.id(),
            status: order.status(),
        }
    }
}

/// The orders service.
pub struct OrdersService<R> {
    repository: R,
}

impl<R: OrderRepository> OrdersService<R> {
    /// Creates the service over its repository.
    pub fn new(repository: R) -> Self {
        Self { repository }
    }

    /// Creates an order and asks the payments service to authorize it.
    ///
    /// Idempotent: a repeated request with the same key returns the
    /// existing order without re-executing anything, whether the
    /// duplicate is detected by the lookup or by losing the uniqueness
    /// race at insert time.
    #[tracing::instrument(skip(self, request), fields(idempotency_key = %request.idempotency_key))]
    pub async fn create_order(&self, request: CreateOrderRequest) -> Result<OrderAck> {
        if let Some(existing) = self
            .repository
            .find_by_idempotency_key(&request.idempotency_key)
            .await?
        {
            tracing::info!(
                order_id = %existing.id(),
                "duplicate order creation, returning existing order"
            );
            return Ok(OrderAck::of(&existing));
        }

        let mut order = Order::create(
            request.customer_id,
            request.amount,
            request.currency.clone(),
            request.idempotency_key.clone(),
        )?;
        order.start_payment_authorization()?;

        let context = MessageContext::root(order.id().as_uuid());
        let authorize: Command = AuthorizePayment {
            order_id: order.id(),
            amount: request.amount,
            currency: request.currency,
            idempotency_key: request.idempotency_key.clone(),
        }
        .into();

        match self
            .repository
            .insert(&mut order, &context, std::slice::from_ref(&authorize))
            .await
        {
            Ok(()) => {}
            Err(StoreError::DuplicateIdempotencyKey { key }) => {
                // Lost the race to a concurrent identical submission;
                // the winner's row is the result.
                let winner = self
                    .repository
                    .find_by_idempotency_key(&key)
                    .await?
                    .ok_or_else(|| {
                        ChoreographyError::OrderNotReady(format!(
                            "order with idempotency key {key} vanished after uniqueness conflict"
                        ))
                    })?;
                tracing::info!(
                    order_id = %winner.id(),
                    "concurrent duplicate creation, returning winner"
                );
                return Ok(OrderAck::of(&winner));
            }
            Err(error) => return Err(error.into()),
        }

        metrics::counter!("orders_created").increment(1);
        tracing::info!(
            order_id = %order.id(),
            amount = %order.amount(),
            currency = %order.currency(),
            "order created, authorization requested"
        );

        Ok(OrderAck::of(&order))
    }

    /// Confirms an authorized order, triggering payment capture.
    #[tracing::instrument(skip(self))]
    pub async fn confirm_order(&self, order_id: OrderId) -> Result<OrderAck> {
        let mut order = self
            .repository
            .find(order_id)
            .await?
            .ok_or(ChoreographyError::OrderNotFound(order_id))?;

        order.start_capture()?;
        let payment_id = order.payment_id().ok_or_else(|| {
            ChoreographyError::OrderNotReady(format!("order {order_id} has no payment"))
        })?;

        let context = MessageContext::root(order_id.as_uuid());
        let capture: Command = CapturePayment {
            payment_id,
            order_id,
            idempotency_key: format!("capture-{order_id}"),
        }
        .into();

        self.repository
            .update(&mut order, &context, std::slice::from_ref(&capture))
            .await?;

        tracing::info!(%order_id, %payment_id, "order confirmed, capture requested");
        Ok(OrderAck::of(&order))
    }

    /// Cancels an order; if a payment exists its hold is released.
    #[tracing::instrument(skip(self))]
    pub async fn cancel_order(&self, order_id: OrderId) -> Result<OrderAck> {
        let mut order = self
            .repository
            .find(order_id)
            .await?
            .ok_or(ChoreographyError::OrderNotFound(order_id))?;

        order.cancel()?;

        let commands: Vec<Command> = order
            .payment_id()
            .map(|payment_id| {
                CancelPayment {
                    payment_id,
                    order_id,
                    idempotency_key: format!("cancel-{order_id}"),
                }
                .into()
            })
            .into_iter()
            .collect();

        let context = MessageContext::root(order_id.as_uuid());
        self.repository
            .update(&mut order, &context, &commands)
            .await?;

        metrics::counter!("orders_cancelled").increment(1);
        tracing::info!(%order_id, "order cancelled");
        Ok(OrderAck::of(&order))
    }

    /// Loads an order by ID.
    pub async fn get_order(&self, order_id: OrderId) -> Result<Option<Order>> {
        Ok(self.repository.find(order_id).await?)
    }

    /// Reacts to a successful payment authorization.
    #[tracing::instrument(skip(self, event, context), fields(order_id = %event.order_id))]
    pub async fn on_payment_authorized(
        &self,
        event: &PaymentAuthorized,
        context: &MessageContext,
    ) -> Result<()> {
        let Some(mut order) = self.repository.find(event.order_id).await? else {
            tracing::warn!(order_id = %event.order_id, "order not found for PaymentAuthorized");
            return Ok(());
        };

        if order.status() == OrderStatus::Authorized
            && order.payment_id() == Some(event.payment_id)
        {
            tracing::debug!(order_id = %event.order_id, "authorization already recorded");
            return Ok(());
        }

        order.mark_authorized(event.payment_id)?;
        let context = context.caused_by(event.payment_id.as_uuid());
        self.repository.update(&mut order, &context, &[]).await?;

        tracing::info!(order_id = %event.order_id, "order authorized");
        Ok(())
    }

    /// Reacts to a successful capture. Happy-path terminal state.
    #[tracing::instrument(skip(self, event, context), fields(order_id = %event.order_id))]
    pub async fn on_payment_captured(
        &self,
        event: &PaymentCaptured,
        context: &MessageContext,
    ) -> Result<()> {
        let Some(mut order) = self.repository.find(event.order_id).await? else {
            tracing::warn!(order_id = %event.order_id, "order not found for PaymentCaptured");
            return Ok(());
        };

        if order.status() == OrderStatus::Captured {
            tracing::debug!(order_id = %event.order_id, "capture already recorded");
            return Ok(());
        }

        order.mark_captured()?;
        let context = context.caused_by(event.payment_id.as_uuid());
        self.repository.update(&mut order, &context, &[]).await?;

        metrics::counter!("orders_captured").increment(1);
        tracing::info!(order_id = %event.order_id, "order captured");
        Ok(())
    }

    /// Reacts to a payment failure.
    ///
    /// No automatic retry: the failure is a fact. Retrying means a new
    /// order with a new idempotency key, decided by the caller.
    #[tracing::instrument(skip(self, event, context), fields(order_id = %event.order_id))]
    pub async fn on_payment_failed(
        &self,
        event: &PaymentFailed,
        context: &MessageContext,
    ) -> Result<()> {
        let Some(mut order) = self.repository.find(event.order_id).await? else {
            tracing::warn!(order_id = %event.order_id, "order not found for PaymentFailed");
            return Ok(());
        };

        if order.status() == OrderStatus::Failed {
            tracing::debug!(order_id = %event.order_id, "failure already recorded");
            return Ok(());
        }

        order.mark_failed(event.reason.clone())?;
        let context = context.caused_by(event.payment_id.as_uuid());
        self.repository.update(&mut order, &context, &[]).await?;

        metrics::counter!("orders_failed").increment(1);
        tracing::warn!(
            order_id = %event.order_id,
            reason = %event.reason,
            failure_code = %event.failure_code,
            "order failed"
        );
        Ok(())
    }
}
