//! Well-known account names.
//!
//! Constants keep account names consistent across postings; a typo in a
//! free-form string would silently split an account into two.

/// Asset account: money the customer owes us.
pub const CUSTOMER_RECEIVABLE: &str = "CustomerReceivable";

/// Revenue recognized from captured payments.
pub const REVENUE: &str = "Revenue";

/// Clearing account used while provider settlement is in flight.
pub const SETTLEMENT_CLEARING: &str = "SettlementClearing";

/// Expense account for reconciliation adjustments.
pub const ADJUSTMENT_EXPENSE: &str = "AdjustmentExpense";
