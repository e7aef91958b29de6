//! Redis key layout for one queue.

use crate::messaging::domain::{ConsumerId, QueueName};

/// Keys of the Redis structures backing one queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedisKeys {
    base: String,
}

impl RedisKeys {
    /// Builds the key layout for `queue` under an optional `prefix`.
    #[must_use]
    pub fn new(prefix: &str, queue: &QueueName) -> Self {
        Self {
            base: format!("{prefix}{}", queue.as_str()),
        }
    }

    /// List of message IDs ready to be claimed.
    #[must_use]
    pub fn pending(&self) -> String {
        format!("{}:pending", self.base)
    }

    /// Hash of message envelopes keyed by message ID.
    #[must_use]
    pub fn messages(&self) -> String {
        format!("{}:messages", self.base)
    }

    /// Sorted set of delayed message IDs scored by delivery time in epoch
    /// milliseconds.
    #[must_use]
    pub fn scheduled(&self) -> String {
        format!("{}:scheduled", self.base)
    }

    /// Hash of consumer IDs to their last heartbeat in epoch milliseconds.
    #[must_use]
    pub fn consumers(&self) -> String {
        format!("{}:consumers", self.base)
    }

    /// Prefix shared by every consumer's claimed list.
    #[must_use]
    pub fn claimed_prefix(&self) -> String {
        format!("{}:consumers:", self.base)
    }

    /// Suffix shared by every consumer's claimed list.
    #[must_use]
    pub const fn claimed_suffix() -> &'static str {
        ":active"
    }

    /// List of message IDs claimed by `consumer`.
    #[must_use]
    pub fn claimed(&self, consumer: ConsumerId) -> String {
        format!("{}{consumer}{}", self.claimed_prefix(), Self::claimed_suffix())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn keys_share_prefixed_base() {
        let queue = QueueName::new("my-project").expect("valid queue");
        let keys = RedisKeys::new("brignext:", &queue);

        assert_eq!(keys.pending(), "brignext:my-project:pending");
        assert_eq!(keys.messages(), "brignext:my-project:messages");
        assert_eq!(keys.scheduled(), "brignext:my-project:scheduled");
        assert_eq!(keys.consumers(), "brignext:my-project:consumers");
    }

    #[test]
    fn claimed_key_is_prefix_id_suffix() {
        let queue = QueueName::new("p").expect("valid queue");
        let keys = RedisKeys::new("", &queue);
        let consumer = ConsumerId::from_uuid(Uuid::nil());

        assert_eq!(
            keys.claimed(consumer),
            format!(
                "{}{}{}",
                keys.claimed_prefix(),
                Uuid::nil(),
                RedisKeys::claimed_suffix()
            )
        );
        assert_eq!(
            keys.claimed(consumer),
            "p:consumers:00000000-0000-0000-0000-000000000000:active"
        );
    }
}
