//! The outbox store trait.

use async_trait::async_trait;

use crate::error::Result;
use crate::message::{MessageId, OutboxMessage};

/// Retry budget before a message is considered poison.
pub const MAX_RETRIES: i32 = 5;

/// Access to one service's outbox table.
///
/// Aggregate repositories write rows as part of their commit; services
/// without an aggregate of their own (accounting) enqueue directly. The
/// dispatcher is the only mutator afterwards, and each per-message
/// outcome is committed independently so one bad message never blocks
/// the rest of a batch.
#[async_trait]
pub trait OutboxStore: Send + Sync {
    /// Appends rows outside an aggregate commit.
    async fn enqueue(&self, messages: Vec<OutboxMessage>) -> Result<()>;

    /// Returns up to `limit` undispatched rows with retry budget left,
    /// ordered by `occurred_on` ascending.
    async fn pending(&self, limit: usize) -> Result<Vec<OutboxMessage>>;

    /// Marks a row successfully dispatched. Final: the row is never
    /// looked at again.
    async fn mark_processed(&self, id: MessageId) -> Result<()>;

    /// Records a failed dispatch attempt, spending one retry.
    async fn record_failure(&self, id: MessageId, error: &str) -> Result<()>;

    /// Permanently excludes a row from dispatch, recording why.
    async fn poison(&self, id: MessageId, error: &str) -> Result<()>;
}
