//! Deterministic simulated payment provider.
//!
//! Lets the full lifecycle run end-to-end without a real provider. The
//! decline and error rules are deterministic functions of the amount so
//! tests and demos behave the same every run:
//!
//! - amounts ending in .99 are declined (`INSUFFICIENT_FUNDS`)
//! - amounts above 10 000.00 fail with a provider timeout
//! - everything else authorizes with a `sim_auth_*` reference
//!
//! A real adapter (Stripe, Adyen, ...) replaces this type without any
//! change to the payments service.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use domain::{
    AuthorizationOutcome, AuthorizationRequest, CaptureOutcome, CaptureRequest, GatewayError,
    PaymentGateway, RefundOutcome, RefundRequest, WebhookEvent,
};
use serde::Deserialize;
use uuid::Uuid;

/// Amounts above this trigger a simulated provider timeout.
const TIMEOUT_THRESHOLD_CENTS: i64 = 1_000_000;

#[derive(Debug, Default)]
struct SimulatedGatewayState {
    fail_on_capture: bool,
    authorize_calls: u32,
    capture_calls: u32,
}

/// Simulated provider adapter.
#[derive(Debug, Clone, Default)]
pub struct SimulatedGateway {
    state: Arc<RwLock<SimulatedGatewayState>>,
}

#[derive(Debug, Deserialize)]
struct WebhookPayload {
    event_type: String,
    transaction_id: String,
    #[serde(default)]
    settlement_id: Option<String>,
}

impl SimulatedGateway {
    /// Creates a new simulated gateway.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes subsequent captures fail with `CAPTURE_FAILED`.
    pub fn set_fail_on_capture(&self, fail: bool) {
        self.state.write().unwrap().fail_on_capture = fail;
    }

    /// Returns how many authorize calls the provider has seen.
    pub fn authorize_calls(&self) -> u32 {
        self.state.read().unwrap().authorize_calls
    }

    /// Returns how many capture calls the provider has seen.
    pub fn capture_calls(&self) -> u32 {
        self.state.read().unwrap().capture_calls
    }
}

#[async_trait]
impl PaymentGateway for SimulatedGateway {
    async fn authorize(
        &self,
        request: AuthorizationRequest,
    ) -> Result<AuthorizationOutcome, GatewayError> {
        self.state.write().unwrap().authorize_calls += 1;

        tracing::info!(
            amount = %request.amount,
            currency = %request.currency,
            idempotency_key = %request.idempotency_key,
            "[simulated provider] authorizing"
        );

        if request.amount.cents() % 100 == 99 {
            tracing::warn!(amount = %request.amount, "[simulated provider] declining");
            return Ok(AuthorizationOutcome::declined(
                "INSUFFICIENT_FUNDS",
                "Simulated decline: insufficient funds",
            ));
        }

        if request.amount.cents() > TIMEOUT_THRESHOLD_CENTS {
            tracing::warn!(amount = %request.amount, "[simulated provider] timing out");
            return Err(GatewayError::Timeout(
                "simulated provider timeout for large amount".to_string(),
            ));
        }

        let transaction_id = format!("sim_auth_{}", Uuid::new_v4().simple());
        tracing::info!(%transaction_id, "[simulated provider] authorized");
        Ok(AuthorizationOutcome::approved(transaction_id))
    }

    async fn capture(&self, request: CaptureRequest) -> Result<CaptureOutcome, GatewayError> {
        let fail = {
            let mut state = self.state.write().unwrap();
            state.capture_calls += 1;
            state.fail_on_capture
        };

        tracing::info!(
            transaction_id = %request.transaction_id,
            amount = %request.amount,
            "[simulated provider] capturing"
        );

        if fail {
            tracing::warn!("[simulated provider] capture failure");
            return Ok(CaptureOutcome {
                success: false,
                error_code: Some("CAPTURE_FAILED".to_string()),
                error_message: Some("Simulated capture failure".to_string()),
            });
        }

        Ok(CaptureOutcome {
            success: true,
            error_code: None,
            error_message: None,
        })
    }

    async fn refund(&self, request: RefundRequest) -> Result<RefundOutcome, GatewayError> {
        tracing::info!(
            transaction_id = %request.transaction_id,
            amount = %request.amount,
            "[simulated provider] refunding"
        );

        Ok(RefundOutcome {
            success: true,
            refund_id: Some(format!("sim_ref_{}", Uuid::new_v4().simple())),
            error_code: None,
            error_message: None,
        })
    }

    async fn handle_webhook(
        &self,
        payload: &str,
        signature: &str,
    ) -> Result<WebhookEvent, GatewayError> {
        if signature.trim().is_empty() {
            return Err(GatewayError::InvalidSignature);
        }

        let decoded: WebhookPayload = serde_json::from_str(payload)
            .map_err(|e| GatewayError::MalformedWebhook(e.to_string()))?;

        let mut metadata = HashMap::new();
        metadata.insert("source".to_string(), "simulator".to_string());
        if let Some(settlement_id) = decoded.settlement_id {
            metadata.insert("settlement_id".to_string(), settlement_id);
        }

        Ok(WebhookEvent {
            event_type: decoded.event_type,
            transaction_id: decoded.transaction_id,
            metadata,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{Currency, Money};

    fn request(cents: i64) -> AuthorizationRequest {
        AuthorizationRequest {
            idempotency_key: "K1".to_string(),
            amount: Money::from_cents(cents),
            currency: Currency::new("USD"),
        }
    }

    #[tokio::test]
    async fn normal_amounts_authorize() {
        let gateway = SimulatedGateway::new();
        let outcome = gateway.authorize(request(25000)).await.unwrap();

        assert!(outcome.success);
        assert!(outcome.transaction_id.unwrap().starts_with("sim_auth_"));
        assert_eq!(gateway.authorize_calls(), 1);
    }

    #[tokio::test]
    async fn amounts_ending_in_99_are_declined() {
        let gateway = SimulatedGateway::new();
        let outcome = gateway.authorize(request(9999)).await.unwrap();

        assert!(!outcome.success);
        assert_eq!(outcome.error_code.as_deref(), Some("INSUFFICIENT_FUNDS"));
        assert!(outcome.transaction_id.is_none());
    }

    #[tokio::test]
    async fn large_amounts_time_out() {
        let gateway = SimulatedGateway::new();
        let result = gateway.authorize(request(1_000_001)).await;
        assert!(matches!(result, Err(GatewayError::Timeout(_))));
    }

    #[tokio::test]
    async fn capture_failure_is_switchable() {
        let gateway = SimulatedGateway::new();

        let ok = gateway
            .capture(CaptureRequest {
                transaction_id: "sim_auth_1".to_string(),
                amount: Money::from_cents(100),
            })
            .await
            .unwrap();
        assert!(ok.success);

        gateway.set_fail_on_capture(true);
        let failed = gateway
            .capture(CaptureRequest {
                transaction_id: "sim_auth_1".to_string(),
                amount: Money::from_cents(100),
            })
            .await
            .unwrap();
        assert!(!failed.success);
        assert_eq!(failed.error_code.as_deref(), Some("CAPTURE_FAILED"));
        assert_eq!(gateway.capture_calls(), 2);
    }

    #[tokio::test]
    async fn refund_returns_a_reference() {
        let gateway = SimulatedGateway::new();
        let outcome = gateway
            .refund(RefundRequest {
                transaction_id: "sim_auth_1".to_string(),
                amount: Money::from_cents(100),
            })
            .await
            .unwrap();

        assert!(outcome.success);
        assert!(outcome.refund_id.unwrap().starts_with("sim_ref_"));
    }

    #[tokio::test]
    async fn webhook_requires_signature() {
        let gateway = SimulatedGateway::new();
        let payload = r#"{"event_type":"payment.settled","transaction_id":"sim_auth_1"}"#;

        let result = gateway.handle_webhook(payload, "").await;
        assert!(matches!(result, Err(GatewayError::InvalidSignature)));

        let webhook = gateway.handle_webhook(payload, "sig").await.unwrap();
        assert_eq!(webhook.event_type, "payment.settled");
        assert_eq!(webhook.transaction_id, "sim_auth_1");
        assert_eq!(webhook.metadata.get("source").unwrap(), "simulator");
    }

    #[tokio::test]
    async fn malformed_webhook_is_rejected() {
        let gateway = SimulatedGateway::new();
        let result = gateway.handle_webhook("not json", "sig").await;
        assert!(matches!(result, Err(GatewayError::MalformedWebhook(_))));
    }
}
