//! Compile-time message-type registry.
//!
//! Maps the stable wire tag stored in an outbox row to a decode
//! function. Resolution is explicit: every contract is registered here,
//! and renaming a Rust type cannot silently break replay of stored
//! messages because the tags are independent strings. A tag missing
//! from the registry is permanently undecodable; the dispatcher
//! poisons such rows on first sight, since no amount of retrying will
//! make an unknown tag resolvable without a code change.

use std::collections::HashMap;

use messaging::{
    AuthorizePayment, CancelPayment, CapturePayment, LedgerEntryCreated, Message, OrderAuthorized,
    OrderCancelled, OrderCaptured, OrderCreated, OrderFailed, OrderPaymentAuthorizing,
    PaymentAuthorized, PaymentCancelled, PaymentCaptured, PaymentFailed, PaymentSettled, tags,
};
use serde::de::DeserializeOwned;

/// Decodes a stored payload into a bus message.
pub type DecodeFn = fn(serde_json::Value) -> Result<Message, serde_json::Error>;

fn decode_as<T>(value: serde_json::Value) -> Result<Message, serde_json::Error>
where
    T: DeserializeOwned + Into<Message>,
{
    serde_json::from_value::<T>(value).map(Into::into)
}

/// Registry of known message contracts.
#[derive(Clone)]
pub struct MessageRegistry {
    decoders: HashMap<&'static str, DecodeFn>,
}

impl MessageRegistry {
    /// Creates an empty registry.
    pub fn empty() -> Self {
        Self {
            decoders: HashMap::new(),
        }
    }

    /// Registers a decoder under a wire tag.
    pub fn register(&mut self, tag: &'static str, decoder: DecodeFn) {
        self.decoders.insert(tag, decoder);
    }

    /// Resolves the decoder for a wire tag.
    pub fn resolve(&self, tag: &str) -> Option<DecodeFn> {
        self.decoders.get(tag).copied()
    }

    /// Returns how many tags are registered.
    pub fn len(&self) -> usize {
        self.decoders.len()
    }

    /// Returns true if no tags are registered.
    pub fn is_empty(&self) -> bool {
        self.decoders.is_empty()
    }
}

impl Default for MessageRegistry {
    /// Registry with every contract in the system.
    fn default() -> Self {
        let mut registry = Self::empty();

        registry.register(tags::AUTHORIZE_PAYMENT, decode_as::<AuthorizePayment>);
        registry.register(tags::CAPTURE_PAYMENT, decode_as::<CapturePayment>);
        registry.register(tags::CANCEL_PAYMENT, decode_as::<CancelPayment>);

        registry.register(tags::ORDER_CREATED, decode_as::<OrderCreated>);
        registry.register(
            tags::ORDER_PAYMENT_AUTHORIZING,
            decode_as::<OrderPaymentAuthorizing>,
        );
        registry.register(tags::ORDER_AUTHORIZED, decode_as::<OrderAuthorized>);
        registry.register(tags::ORDER_CAPTURED, decode_as::<OrderCaptured>);
        registry.register(tags::ORDER_FAILED, decode_as::<OrderFailed>);
        registry.register(tags::ORDER_CANCELLED, decode_as::<OrderCancelled>);

        registry.register(tags::PAYMENT_AUTHORIZED, decode_as::<PaymentAuthorized>);
        registry.register(tags::PAYMENT_CAPTURED, decode_as::<PaymentCaptured>);
        registry.register(tags::PAYMENT_FAILED, decode_as::<PaymentFailed>);
        registry.register(tags::PAYMENT_CANCELLED, decode_as::<PaymentCancelled>);
        registry.register(tags::PAYMENT_SETTLED, decode_as::<PaymentSettled>);

        registry.register(tags::LEDGER_ENTRY_CREATED, decode_as::<LedgerEntryCreated>);

        registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{Currency, Money, OrderId};

    #[test]
    fn default_registry_knows_all_contracts() {
        let registry = MessageRegistry::default();
        assert_eq!(registry.len(), 15);
        assert!(registry.resolve(tags::PAYMENT_CAPTURED).is_some());
        assert!(registry.resolve(tags::AUTHORIZE_PAYMENT).is_some());
        assert!(registry.resolve("orders.order-shipped.v1").is_none());
    }

    #[test]
    fn resolved_decoder_rebuilds_the_message() {
        let registry = MessageRegistry::default();
        let original = AuthorizePayment {
            order_id: OrderId::new(),
            amount: Money::from_cents(25000),
            currency: Currency::new("USD"),
            idempotency_key: "K1".to_string(),
        };
        let data = serde_json::to_value(&original).unwrap();

        let decoder = registry.resolve(tags::AUTHORIZE_PAYMENT).unwrap();
        let message = decoder(data).unwrap();
        assert_eq!(message, Message::from(original));
    }

    #[test]
    fn decoder_rejects_mismatched_payload() {
        let registry = MessageRegistry::default();
        let decoder = registry.resolve(tags::AUTHORIZE_PAYMENT).unwrap();
        let result = decoder(serde_json::json!({"unexpected": true}));
        assert!(result.is_err());
    }
}
