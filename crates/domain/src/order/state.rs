//! Order state machine.

use serde::{Deserialize, Serialize};

/// The state of an order in the payment pipeline.
///
/// State transitions:
/// ```text
/// Created ──► PaymentAuthorizing ──► Authorized ──► Capturing ──► Captured
///    │                │                  │              │
///    └────────────────┴──────────────────┴──────────────┴──► Failed
///
/// Created | PaymentAuthorizing | Authorized | Capturing ──► Cancelled
/// ```
///
/// A captured order can never fail or be cancelled; money has moved and
/// only a refund flow (out of scope here) can reverse it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum OrderStatus {
    /// Order accepted, nothing sent to the payments service yet.
    #[default]
    Created,

    /// Waiting for the payments service to authorize funds.
    PaymentAuthorizing,

    /// Funds reserved on the customer's instrument.
    Authorized,

    /// Capture command issued, waiting for the outcome.
    Capturing,

    /// Funds captured (terminal happy path).
    Captured,

    /// Payment failed at some stage (terminal).
    Failed,

    /// Order cancelled before capture (terminal).
    Cancelled,
}

impl OrderStatus {
    /// Returns true if payment authorization can start in this state.
    pub fn can_start_authorization(&self) -> bool {
        matches!(self, OrderStatus::Created)
    }

    /// Returns true if the order can be marked authorized in this state.
    pub fn can_mark_authorized(&self) -> bool {
        matches!(self, OrderStatus::PaymentAuthorizing)
    }

    /// Returns true if capture can start in this state.
    pub fn can_start_capture(&self) -> bool {
        matches!(self, OrderStatus::Authorized)
    }

    /// Returns true if the order can be marked captured in this state.
    pub fn can_mark_captured(&self) -> bool {
        matches!(self, OrderStatus::Capturing)
    }

    /// Returns true if the order can be failed from this state.
    pub fn can_fail(&self) -> bool {
        matches!(
            self,
            OrderStatus::Created
                | OrderStatus::PaymentAuthorizing
                | OrderStatus::Authorized
                | OrderStatus::Capturing
        )
    }

    /// Returns true if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Captured | OrderStatus::Failed | OrderStatus::Cancelled
        )
    }

    /// Returns the state name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Created => "Created",
            OrderStatus::PaymentAuthorizing => "PaymentAuthorizing",
            OrderStatus::Authorized => "Authorized",
            OrderStatus::Capturing => "Capturing",
            OrderStatus::Captured => "Captured",
            OrderStatus::Failed => "Failed",
            OrderStatus::Cancelled => "Cancelled",
        }
    }

    /// Parses a stored state name.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "Created" => Some(OrderStatus::Created),
            "PaymentAuthorizing" => Some(OrderStatus::PaymentAuthorizing),
            "Authorized" => Some(OrderStatus::Authorized),
            "Capturing" => Some(OrderStatus::Capturing),
            "Captured" => Some(OrderStatus::Captured),
            "Failed" => Some(OrderStatus::Failed),
            "Cancelled" => Some(OrderStatus::Cancelled),
            _ => None,
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_state_is_created() {
        assert_eq!(OrderStatus::default(), OrderStatus::Created);
    }

    #[test]
    fn only_created_can_start_authorization() {
        assert!(OrderStatus::Created.can_start_authorization());
        assert!(!OrderStatus::PaymentAuthorizing.can_start_authorization());
        assert!(!OrderStatus::Authorized.can_start_authorization());
        assert!(!OrderStatus::Captured.can_start_authorization());
    }

    #[test]
    fn only_authorized_can_start_capture() {
        assert!(OrderStatus::Authorized.can_start_capture());
        assert!(!OrderStatus::Created.can_start_capture());
        assert!(!OrderStatus::PaymentAuthorizing.can_start_capture());
        assert!(!OrderStatus::Capturing.can_start_capture());
    }

    #[test]
    fn captured_cannot_fail() {
        assert!(OrderStatus::Created.can_fail());
        assert!(OrderStatus::PaymentAuthorizing.can_fail());
        assert!(OrderStatus::Authorized.can_fail());
        assert!(OrderStatus::Capturing.can_fail());
        assert!(!OrderStatus::Captured.can_fail());
        assert!(!OrderStatus::Failed.can_fail());
        assert!(!OrderStatus::Cancelled.can_fail());
    }

    #[test]
    fn terminal_states() {
        assert!(OrderStatus::Captured.is_terminal());
        assert!(OrderStatus::Failed.is_terminal());
        assert!(OrderStatus::Cancelled.is_terminal());
        assert!(!OrderStatus::Created.is_terminal());
        assert!(!OrderStatus::Capturing.is_terminal());
    }

    #[test]
    fn parse_roundtrips_every_state() {
        for status in [
            OrderStatus::Created,
            OrderStatus::PaymentAuthorizing,
            OrderStatus::Authorized,
            OrderStatus::Capturing,
            OrderStatus::Captured,
            OrderStatus::Failed,
            OrderStatus::Cancelled,
        ] {
            assert_eq!(OrderStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(OrderStatus::parse("Shipped"), None);
    }
}
