//! Payment provider abstraction.
//!
//! Providers have wildly different APIs; this trait normalizes them
//! into the operations the domain cares about, so an adapter can be
//! swapped without touching business logic. The adapter owns webhook
//! signature verification; consumers of [`WebhookEvent`] trust that
//! only validated data gets through.

use std::collections::HashMap;

use async_trait::async_trait;
use common::{Currency, Money};
use thiserror::Error;

/// Infrastructure failures talking to the provider.
///
/// These are *not* business declines: a decline arrives as a successful
/// call whose outcome has `success == false`. A [`GatewayError`] means
/// the call itself did not complete and the caller must decide whether
/// the operation may have happened on the provider side.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The provider could not be reached.
    #[error("provider unreachable: {0}")]
    Unreachable(String),

    /// The provider did not answer in time.
    #[error("provider timed out: {0}")]
    Timeout(String),

    /// A webhook carried an invalid signature.
    #[error("invalid webhook signature")]
    InvalidSignature,

    /// A webhook payload could not be understood.
    #[error("malformed webhook payload: {0}")]
    MalformedWebhook(String),
}

/// Request to reserve funds.
#[derive(Debug, Clone)]
pub struct AuthorizationRequest {
    pub idempotency_key: String,
    pub amount: Money,
    pub currency: Currency,
}

/// Provider answer to an authorization request.
#[derive(Debug, Clone)]
pub struct AuthorizationOutcome {
    pub success: bool,
    pub transaction_id: Option<String>,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
}

impl AuthorizationOutcome {
    /// A successful authorization with the provider's reference.
    pub fn approved(transaction_id: impl Into<String>) -> Self {
        Self {
            success: true,
            transaction_id: Some(transaction_id.into()),
            error_code: None,
            error_message: None,
        }
    }

    /// A business decline with the provider's code and message.
    pub fn declined(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            transaction_id: None,
            error_code: Some(code.into()),
            error_message: Some(message.into()),
        }
    }
}

/// Request to capture previously authorized funds.
#[derive(Debug, Clone)]
pub struct CaptureRequest {
    pub transaction_id: String,
    pub amount: Money,
}

/// Provider answer to a capture request.
#[derive(Debug, Clone)]
pub struct CaptureOutcome {
    pub success: bool,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
}

/// Request to refund captured funds.
#[derive(Debug, Clone)]
pub struct RefundRequest {
    pub transaction_id: String,
    pub amount: Money,
}

/// Provider answer to a refund request.
#[derive(Debug, Clone)]
pub struct RefundOutcome {
    pub success: bool,
    pub refund_id: Option<String>,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
}

/// A validated provider webhook notification.
#[derive(Debug, Clone)]
pub struct WebhookEvent {
    /// Provider event name, e.g. `payment.settled`.
    pub event_type: String,

    /// The provider transaction the notification refers to.
    pub transaction_id: String,

    /// Provider-specific extras.
    pub metadata: HashMap<String, String>,
}

/// Payment provider operations used by the payments service.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Reserves funds on the customer's instrument.
    async fn authorize(
        &self,
        request: AuthorizationRequest,
    ) -> Result<AuthorizationOutcome, GatewayError>;

    /// Transfers previously reserved funds.
    async fn capture(&self, request: CaptureRequest) -> Result<CaptureOutcome, GatewayError>;

    /// Returns captured funds to the customer.
    async fn refund(&self, request: RefundRequest) -> Result<RefundOutcome, GatewayError>;

    /// Verifies and decodes a provider webhook.
    async fn handle_webhook(
        &self,
        payload: &str,
        signature: &str,
    ) -> Result<WebhookEvent, GatewayError>;
}
