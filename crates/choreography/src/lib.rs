//! The choreographed payment saga.
//!
//! There is no central coordinator: each service reacts to inbound
//! messages, mutates its own aggregates, and commits further outbound
//! messages through its outbox. The workflow emerges from the chain:
//!
//! ```text
//! CreateOrder ─► Order{PaymentAuthorizing} ─► AuthorizePayment
//!   ─► Payment{Authorized|Failed} ─► PaymentAuthorized|PaymentFailed
//!   ─► Order{Authorized|Failed}
//! ConfirmOrder ─► Order{Capturing} ─► CapturePayment
//!   ─► Payment{Captured|Failed} ─► PaymentCaptured|PaymentFailed
//!   ─► Order{Captured|Failed}; Accounting posts the ledger pair
//! CancelOrder ─► Order{Cancelled} ─► CancelPayment ─► Payment{Cancelled}
//! ```
//!
//! Every handler is idempotent under redelivery, and every gateway
//! business failure becomes an explicit `Failed` transition: failures
//! are facts, never silently retried.

pub mod accounting;
pub mod error;
pub mod gateway;
pub mod orders;
pub mod payments;

pub use accounting::AccountingService;
pub use error::ChoreographyError;
pub use gateway::SimulatedGateway;
pub use orders::{CreateOrderRequest, OrderAck, OrdersService};
pub use payments::PaymentsService;
