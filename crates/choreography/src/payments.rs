//! Payments service: command handlers calling the provider gateway.

use domain::{
    AuthorizationOutcome, AuthorizationRequest, CaptureRequest, Payment, PaymentGateway,
    PaymentStatus,
};
use messaging::{AuthorizePayment, CancelPayment, CapturePayment, MessageContext};
use outbox::{PaymentRepository, StoreError};

use crate::error::Result;

/// Provider event name announcing settlement.
const WEBHOOK_SETTLED: &str = "payment.settled";

/// The payments service.
///
/// Gateway business failures (declines) and infrastructure failures
/// both end in an explicit `Failed` transition with a failure code,
/// never a silent retry, since retrying a declined charge could
/// double-charge the customer. Only storage errors escape the handlers,
/// into the broker layer's own retry/dead-letter policy.
pub struct PaymentsService<R, G> {
    repository: R,
    gateway: G,
}

impl<R: PaymentRepository, G: PaymentGateway> PaymentsService<R, G> {
    /// Creates the service over its repository and gateway adapter.
    pub fn new(repository: R, gateway: G) -> Self {
        Self { repository, gateway }
    }

    /// Handles `AuthorizePayment` from the orders service.
    #[tracing::instrument(skip(self, command, context), fields(order_id = %command.order_id))]
    pub async fn on_authorize_payment(
        &self,
        command: &AuthorizePayment,
        context: &MessageContext,
    ) -> Result<()> {
        if let Some(existing) = self
            .repository
            .find_by_idempotency_key(&command.idempotency_key)
            .await?
        {
            tracing::info!(
                payment_id = %existing.id(),
                "duplicate AuthorizePayment, payment already exists"
            );
            return Ok(());
        }

        let mut payment = Payment::create(
            command.order_id,
            command.amount,
            command.currency.clone(),
            command.idempotency_key.clone(),
        )?;

        let request = AuthorizationRequest {
            idempotency_key: command.idempotency_key.clone(),
            amount: command.amount,
            currency: command.currency.clone(),
        };

        match self.gateway.authorize(request).await {
            Ok(AuthorizationOutcome {
                success: true,
                transaction_id: Some(transaction_id),
                ..
            }) => {
                payment.mark_authorized(&transaction_id)?;
                metrics::counter!("payments_authorized").increment(1);
                tracing::info!(
                    payment_id = %payment.id(),
                    provider_transaction_id = %transaction_id,
                    "payment authorized by provider"
                );
            }
            Ok(outcome) => {
                let reason = outcome
                    .error_message
                    .unwrap_or_else(|| "authorization declined".to_string());
                let code = outcome
                    .error_code
                    .unwrap_or_else(|| "PROVIDER_DECLINE".to_string());
                tracing::warn!(
                    payment_id = %payment.id(),
                    reason = %reason,
                    failure_code = %code,
                    "authorization declined"
                );
                payment.mark_failed(reason, code)?;
                metrics::counter!("payments_failed").increment(1);
            }
            Err(error) => {
                // Provider unreachable or timed out. The charge may or
                // may not exist on the provider side; the payment is
                // failed explicitly and operators resolve any orphaned
                // authorization against the provider out of band.
                tracing::error!(payment_id = %payment.id(), %error, "authorization errored");
                payment.mark_failed(format!("provider error: {error}"), "PROVIDER_ERROR")?;
                metrics::counter!("payments_failed").increment(1);
            }
        }

        let context = context.caused_by(payment.id().as_uuid());
        match self.repository.insert(&mut payment, &context, &[]).await {
            Ok(()) => Ok(()),
            Err(StoreError::DuplicateIdempotencyKey { key }) => {
                tracing::info!(
                    idempotency_key = %key,
                    "concurrent duplicate AuthorizePayment, keeping winner"
                );
                Ok(())
            }
            Err(error) => Err(error.into()),
        }
    }

    /// Handles `CapturePayment`, the point where money actually moves.
    #[tracing::instrument(skip(self, command, context), fields(payment_id = %command.payment_id))]
    pub async fn on_capture_payment(
        &self,
        command: &CapturePayment,
        context: &MessageContext,
    ) -> Result<()> {
        let Some(mut payment) = self.repository.find(command.payment_id).await? else {
            tracing::warn!(payment_id = %command.payment_id, "payment not found for capture");
            return Ok(());
        };

        if matches!(
            payment.status(),
            PaymentStatus::Captured | PaymentStatus::Settled
        ) {
            tracing::debug!(payment_id = %payment.id(), "capture already recorded");
            return Ok(());
        }

        let Some(transaction_id) = payment.provider_transaction_id().map(str::to_string) else {
            tracing::warn!(
                payment_id = %payment.id(),
                status = %payment.status(),
                "capture requested for payment without provider transaction"
            );
            return Ok(());
        };

        let request = CaptureRequest {
            transaction_id,
            amount: payment.amount(),
        };

        match self.gateway.capture(request).await {
            Ok(outcome) if outcome.success => {
                payment.mark_captured()?;
                metrics::counter!("payments_captured").increment(1);
                tracing::info!(payment_id = %payment.id(), "payment captured");
            }
            Ok(outcome) => {
                let reason = outcome
                    .error_message
                    .unwrap_or_else(|| "capture failed".to_string());
                let code = outcome
                    .error_code
                    .unwrap_or_else(|| "CAPTURE_DECLINED".to_string());
                tracing::warn!(
                    payment_id = %payment.id(),
                    reason = %reason,
                    "capture declined"
                );
                payment.mark_failed(reason, code)?;
                metrics::counter!("payments_failed").increment(1);
            }
            Err(error) => {
                tracing::error!(payment_id = %payment.id(), %error, "capture errored");
                payment.mark_failed(format!("capture error: {error}"), "CAPTURE_ERROR")?;
                metrics::counter!("payments_failed").increment(1);
            }
        }

        let context = context.caused_by(payment.id().as_uuid());
        self.repository.update(&mut payment, &context, &[]).await?;
        Ok(())
    }

    /// Handles `CancelPayment`: voids an authorized payment.
    #[tracing::instrument(skip(self, command, context), fields(payment_id = %command.payment_id))]
    pub async fn on_cancel_payment(
        &self,
        command: &CancelPayment,
        context: &MessageContext,
    ) -> Result<()> {
        let Some(mut payment) = self.repository.find(command.payment_id).await? else {
            tracing::warn!(payment_id = %command.payment_id, "payment not found for cancellation");
            return Ok(());
        };

        if payment.status() == PaymentStatus::Cancelled {
            tracing::debug!(payment_id = %payment.id(), "cancellation already recorded");
            return Ok(());
        }

        payment.cancel()?;
        let context = context.caused_by(payment.id().as_uuid());
        self.repository.update(&mut payment, &context, &[]).await?;

        tracing::info!(payment_id = %payment.id(), "payment cancelled");
        Ok(())
    }

    /// Handles a provider webhook, settling the referenced payment.
    ///
    /// The gateway adapter verifies the signature; anything reaching
    /// the match below is trusted. Unknown event types are logged and
    /// dropped.
    #[tracing::instrument(skip(self, payload, signature))]
    pub async fn on_provider_webhook(&self, payload: &str, signature: &str) -> Result<()> {
        let webhook = self
            .gateway
            .handle_webhook(payload, signature)
            .await
            .map_err(|error| StoreError::InvalidRecord(format!("webhook rejected: {error}")))?;

        if webhook.event_type != WEBHOOK_SETTLED {
            tracing::info!(event_type = %webhook.event_type, "ignoring provider webhook");
            return Ok(());
        }

        let Some(mut payment) = self
            .repository
            .find_by_provider_transaction_id(&webhook.transaction_id)
            .await?
        else {
            tracing::warn!(
                provider_transaction_id = %webhook.transaction_id,
                "settlement webhook for unknown transaction"
            );
            return Ok(());
        };

        if payment.status() == PaymentStatus::Settled {
            tracing::debug!(payment_id = %payment.id(), "settlement already recorded");
            return Ok(());
        }

        let settlement_id = webhook
            .metadata
            .get("settlement_id")
            .cloned()
            .unwrap_or_else(|| webhook.transaction_id.clone());
        payment.mark_settled(settlement_id)?;

        let context = MessageContext::root(payment.id().as_uuid());
        self.repository.update(&mut payment, &context, &[]).await?;

        metrics::counter!("payments_settled").increment(1);
        tracing::info!(payment_id = %payment.id(), "payment settled");
        Ok(())
    }

    /// Loads a payment by ID.
    pub async fn get_payment(
        &self,
        payment_id: common::PaymentId,
    ) -> Result<Option<Payment>> {
        Ok(self.repository.find(payment_id).await?)
    }
}
