//! Message envelope: payload plus delivery metadata.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::context::MessageContext;

/// A message together with its causal context and origin time.
///
/// `occurred_on` is stamped when the originating state change was
/// committed, not when the message is eventually delivered, so
/// consumers can order facts by when they actually happened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<M> {
    /// The wrapped command or event.
    pub message: M,

    /// Correlation/causation of this hop.
    pub context: MessageContext,

    /// When the underlying fact was recorded.
    pub occurred_on: DateTime<Utc>,
}

impl<M> Envelope<M> {
    /// Wraps a message, stamping the current time.
    pub fn new(message: impl Into<M>, context: MessageContext) -> Self {
        Self {
            message: message.into(),
            context,
            occurred_on: Utc::now(),
        }
    }

    /// Wraps a message with an explicit origin time.
    pub fn at(message: impl Into<M>, context: MessageContext, occurred_on: DateTime<Utc>) -> Self {
        Self {
            message: message.into(),
            context,
            occurred_on,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{Event, OrderCancelled};
    use common::OrderId;
    use uuid::Uuid;

    #[test]
    fn envelope_carries_context() {
        let context = MessageContext::root(Uuid::new_v4());
        let envelope: Envelope<Event> = Envelope::new(
            Event::OrderCancelled(OrderCancelled {
                order_id: OrderId::new(),
            }),
            context,
        );
        assert_eq!(envelope.context, context);
    }
}
