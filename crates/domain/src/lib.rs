//! Domain layer for the payment workflow.
//!
//! Aggregates are the consistency boundary: state changes only through
//! their named operations, and every legal transition buffers the event
//! announcing the new fact. Operations either succeed or return a
//! domain error leaving state and buffer untouched. No aggregate method
//! touches the network or storage; the application layer owns I/O.

pub mod gateway;
pub mod order;
pub mod payment;

pub use gateway::{
    AuthorizationOutcome, AuthorizationRequest, CaptureOutcome, CaptureRequest, GatewayError,
    PaymentGateway, RefundOutcome, RefundRequest, WebhookEvent,
};
pub use order::{Order, OrderError, OrderRecord, OrderStatus};
pub use payment::{Payment, PaymentError, PaymentRecord, PaymentStatus};
