//! Payment state machine.

use serde::{Deserialize, Serialize};

/// Payment lifecycle states.
///
/// ```text
/// Pending ──► Authorized ──► Captured ──► Settled
///    │            │
///    │            └──► Cancelled
///    └────────────┴──► Failed
/// ```
///
/// - Pending: payment created, awaiting the provider response
/// - Authorized: funds reserved on the customer's instrument
/// - Captured: funds transferred from the customer
/// - Settled: provider confirmed settlement to the merchant bank
/// - Failed: authorization or capture failed
/// - Cancelled: authorized payment voided before capture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum PaymentStatus {
    #[default]
    Pending,
    Authorized,
    Captured,
    Settled,
    Failed,
    Cancelled,
}

impl PaymentStatus {
    /// Returns true if the payment can be authorized in this state.
    pub fn can_authorize(&self) -> bool {
        matches!(self, PaymentStatus::Pending)
    }

    /// Returns true if the payment can be captured in this state.
    pub fn can_capture(&self) -> bool {
        matches!(self, PaymentStatus::Authorized)
    }

    /// Returns true if the payment can be failed from this state.
    ///
    /// Never true once money has moved: a captured or settled payment
    /// is reversed through refunds, not failure.
    pub fn can_fail(&self) -> bool {
        matches!(self, PaymentStatus::Pending | PaymentStatus::Authorized)
    }

    /// Returns true if the payment can be voided in this state.
    pub fn can_cancel(&self) -> bool {
        matches!(self, PaymentStatus::Authorized)
    }

    /// Returns true if the payment can be settled in this state.
    pub fn can_settle(&self) -> bool {
        matches!(self, PaymentStatus::Captured)
    }

    /// Returns true if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PaymentStatus::Settled | PaymentStatus::Failed | PaymentStatus::Cancelled
        )
    }

    /// Returns the state name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "Pending",
            PaymentStatus::Authorized => "Authorized",
            PaymentStatus::Captured => "Captured",
            PaymentStatus::Settled => "Settled",
            PaymentStatus::Failed => "Failed",
            PaymentStatus::Cancelled => "Cancelled",
        }
    }

    /// Parses a stored state name.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "Pending" => Some(PaymentStatus::Pending),
            "Authorized" => Some(PaymentStatus::Authorized),
            "Captured" => Some(PaymentStatus::Captured),
            "Settled" => Some(PaymentStatus::Settled),
            "Failed" => Some(PaymentStatus::Failed),
            "Cancelled" => Some(PaymentStatus::Cancelled),
            _ => None,
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_pending_can_authorize() {
        assert!(PaymentStatus::Pending.can_authorize());
        assert!(!PaymentStatus::Authorized.can_authorize());
        assert!(!PaymentStatus::Captured.can_authorize());
    }

    #[test]
    fn only_authorized_can_capture_or_cancel() {
        assert!(PaymentStatus::Authorized.can_capture());
        assert!(PaymentStatus::Authorized.can_cancel());
        assert!(!PaymentStatus::Pending.can_capture());
        assert!(!PaymentStatus::Captured.can_cancel());
    }

    #[test]
    fn moved_money_cannot_fail() {
        assert!(PaymentStatus::Pending.can_fail());
        assert!(PaymentStatus::Authorized.can_fail());
        assert!(!PaymentStatus::Captured.can_fail());
        assert!(!PaymentStatus::Settled.can_fail());
    }

    #[test]
    fn only_captured_can_settle() {
        assert!(PaymentStatus::Captured.can_settle());
        assert!(!PaymentStatus::Authorized.can_settle());
        assert!(!PaymentStatus::Settled.can_settle());
    }

    #[test]
    fn parse_roundtrips_every_state() {
        for status in [
            PaymentStatus::Pending,
            PaymentStatus::Authorized,
            PaymentStatus::Captured,
            PaymentStatus::Settled,
            PaymentStatus::Failed,
            PaymentStatus::Cancelled,
        ] {
            assert_eq!(PaymentStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(PaymentStatus::parse("Refunded"), None);
    }
}
