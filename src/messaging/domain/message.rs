//! Queued message envelope.

use super::{MessageCodecError, MessageId, MessagingDomainError};
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// An opaque payload plus delivery metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    id: MessageId,
    body: Vec<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    deliver_at: Option<DateTime<Utc>>,
}

impl Message {
    /// Creates a message that is deliverable as soon as it is published.
    #[must_use]
    pub fn new(body: impl Into<Vec<u8>>) -> Self {
        Self {
            id: MessageId::new(),
            body: body.into(),
            deliver_at: None,
        }
    }

    /// Creates a message that must not be delivered before `delay` elapses.
    ///
    /// # Errors
    ///
    /// Returns [`MessagingDomainError::DelayOutOfRange`] when the delay cannot
    /// be added to the current time.
    pub fn delayed(
        body: impl Into<Vec<u8>>,
        delay: Duration,
        clock: &impl Clock,
    ) -> Result<Self, MessagingDomainError> {
        let offset = chrono::Duration::from_std(delay)
            .map_err(|_| MessagingDomainError::DelayOutOfRange(delay))?;
        let deliver_at = clock
            .utc()
            .checked_add_signed(offset)
            .ok_or(MessagingDomainError::DelayOutOfRange(delay))?;
        Ok(Self {
            id: MessageId::new(),
            body: body.into(),
            deliver_at: Some(deliver_at),
        })
    }

    /// Returns the message identifier.
    #[must_use]
    pub const fn id(&self) -> MessageId {
        self.id
    }

    /// Returns the opaque payload.
    #[must_use]
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Returns the earliest delivery time, if the message was delayed.
    #[must_use]
    pub const fn deliver_at(&self) -> Option<DateTime<Utc>> {
        self.deliver_at
    }

    /// Encodes the envelope for storage in a broker.
    ///
    /// # Errors
    ///
    /// Returns [`MessageCodecError`] when serialization fails.
    pub fn to_json(&self) -> Result<Vec<u8>, MessageCodecError> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decodes an envelope previously produced by [`Message::to_json`].
    ///
    /// # Errors
    ///
    /// Returns [`MessageCodecError`] when the bytes are not a valid envelope.
    pub fn from_json(bytes: &[u8]) -> Result<Self, MessageCodecError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}
