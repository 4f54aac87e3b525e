//! Correlation and causation tracking.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifies where a message sits in a causal chain.
///
/// The context is passed explicitly through every handler and outbound
/// call rather than living in task-local storage, so a handler can never
/// accidentally emit a message under the wrong correlation.
///
/// - `correlation_id` is shared by every message in one workflow run and
///   never changes after the initial command.
/// - `causation_id` names the aggregate or message that directly caused
///   this one, so an operator can rebuild the chain hop by hop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageContext {
    /// Shared by all messages of one workflow instance.
    pub correlation_id: Uuid,

    /// The direct cause of this message.
    pub causation_id: Uuid,
}

impl MessageContext {
    /// Creates a context with explicit correlation and causation.
    pub fn new(correlation_id: Uuid, causation_id: Uuid) -> Self {
        Self {
            correlation_id,
            causation_id,
        }
    }

    /// Starts a new causal chain; the originating id is both the
    /// correlation and the causation.
    pub fn root(origin: Uuid) -> Self {
        Self {
            correlation_id: origin,
            causation_id: origin,
        }
    }

    /// Derives the context for a message caused by `cause`, keeping the
    /// correlation of the current chain.
    pub fn caused_by(&self, cause: Uuid) -> Self {
        Self {
            correlation_id: self.correlation_id,
            causation_id: cause,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_uses_origin_for_both_ids() {
        let origin = Uuid::new_v4();
        let context = MessageContext::root(origin);
        assert_eq!(context.correlation_id, origin);
        assert_eq!(context.causation_id, origin);
    }

    #[test]
    fn caused_by_keeps_correlation() {
        let origin = Uuid::new_v4();
        let cause = Uuid::new_v4();
        let next = MessageContext::root(origin).caused_by(cause);
        assert_eq!(next.correlation_id, origin);
        assert_eq!(next.causation_id, cause);
    }
}
