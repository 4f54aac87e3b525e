//! Outbox message rows.

use chrono::{DateTime, Utc};
use messaging::{Envelope, Message, MessageContext};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::store::MAX_RETRIES;

/// Unique identifier for an outbox message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(Uuid);

impl MessageId {
    /// Creates a new random message ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a message ID from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The serialized body stored in an outbox row: the causal context plus
/// the message payload, without any type information. The type lives in
/// the row's `message_type` column and is resolved through the registry
/// at dispatch time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboxPayload {
    /// Correlation/causation of the message.
    pub context: MessageContext,

    /// The message data, decoded via the registry.
    pub data: serde_json::Value,
}

/// One row of a service's outbox table.
///
/// Created in the same transaction as the state change it announces,
/// mutated only by the dispatcher afterwards, never deleted. Once
/// `processed_on` is set the row is done forever; a row whose `retries`
/// reached the cap without success is poisoned and skipped forever.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboxMessage {
    /// Unique identifier of this row.
    pub id: MessageId,

    /// When the originating fact was committed. Dispatch order key.
    pub occurred_on: DateTime<Utc>,

    /// Stable wire tag resolved through the registry.
    pub message_type: String,

    /// Serialized [`OutboxPayload`].
    pub payload: serde_json::Value,

    /// When the message was successfully handed to the bus.
    pub processed_on: Option<DateTime<Utc>>,

    /// Failed dispatch attempts so far.
    pub retries: i32,

    /// Last dispatch error, kept for operators.
    pub error: Option<String>,
}

impl OutboxMessage {
    /// Builds a row from an envelope, serializing context and data.
    pub fn from_envelope(envelope: &Envelope<Message>) -> Result<Self, serde_json::Error> {
        let payload = OutboxPayload {
            context: envelope.context,
            data: envelope.message.data()?,
        };

        Ok(Self {
            id: MessageId::new(),
            occurred_on: envelope.occurred_on,
            message_type: envelope.message.message_type().to_string(),
            payload: serde_json::to_value(&payload)?,
            processed_on: None,
            retries: 0,
            error: None,
        })
    }

    /// Returns true if the message was successfully dispatched.
    pub fn is_processed(&self) -> bool {
        self.processed_on.is_some()
    }

    /// Returns true if the message is permanently excluded from retry.
    pub fn is_poisoned(&self) -> bool {
        !self.is_processed() && self.retries >= MAX_RETRIES
    }
}
