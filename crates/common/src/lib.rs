//! Shared value types for the payment workflow services.
//!
//! Every service crate depends on this one for identifier newtypes,
//! monetary amounts, and the audit/version bookkeeping embedded in
//! aggregates. Nothing here performs I/O.

pub mod audit;
pub mod ids;
pub mod money;
pub mod version;

pub use audit::AuditStamp;
pub use ids::{CustomerId, LedgerEntryId, OrderId, PaymentId, TransactionId};
pub use money::{Currency, Money};
pub use version::Version;
