//! Redis implementation of [`MessageBroker`].

use super::{keys::RedisKeys, scripts};
use crate::messaging::{
    domain::{ConsumerId, Message, MessageId, QueueName},
    ports::{BrokerError, BrokerResult, MessageBroker, ReclaimScope, ReclaimedConsumer},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::aio::MultiplexedConnection;
use redis::Script;
use std::sync::Arc;

/// Redis-backed broker sharing one multiplexed connection.
#[derive(Clone)]
pub struct RedisBroker {
    connection: MultiplexedConnection,
    prefix: String,
    promote_script: Arc<Script>,
    reclaim_script: Arc<Script>,
}

impl RedisBroker {
    /// Creates a broker over an established connection.
    #[must_use]
    pub fn new(connection: MultiplexedConnection, prefix: impl Into<String>) -> Self {
        Self {
            connection,
            prefix: prefix.into(),
            promote_script: Arc::new(Script::new(scripts::PROMOTE_DUE)),
            reclaim_script: Arc::new(Script::new(scripts::RECLAIM)),
        }
    }

    /// Opens a multiplexed connection to `url` and creates a broker over it.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError::Backend`] when the URL is invalid or the server
    /// is unreachable.
    pub async fn connect(url: &str, prefix: impl Into<String>) -> BrokerResult<Self> {
        let client = redis::Client::open(url).map_err(BrokerError::backend)?;
        let connection = client
            .get_multiplexed_async_connection()
            .await
            .map_err(BrokerError::backend)?;
        Ok(Self::new(connection, prefix))
    }

    fn keys(&self, queue: &QueueName) -> RedisKeys {
        RedisKeys::new(&self.prefix, queue)
    }

    fn connection(&self) -> MultiplexedConnection {
        self.connection.clone()
    }

    async fn store_and_push(
        &self,
        queue: &QueueName,
        message: &Message,
        deliver_at: Option<DateTime<Utc>>,
    ) -> BrokerResult<()> {
        let keys = self.keys(queue);
        let id = message.id().to_string();
        let envelope = message
            .to_json()
            .map_err(|err| BrokerError::Corrupt(err.to_string()))?;
        let mut pipeline = redis::pipe();
        pipeline.atomic().hset(keys.messages(), &id, envelope).ignore();
        match deliver_at {
            Some(at) => pipeline
                .zadd(keys.scheduled(), &id, at.timestamp_millis())
                .ignore(),
            None => pipeline.lpush(keys.pending(), &id).ignore(),
        };
        let mut connection = self.connection();
        let (): () = pipeline
            .query_async(&mut connection)
            .await
            .map_err(BrokerError::backend)?;
        Ok(())
    }
}

impl std::fmt::Debug for RedisBroker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisBroker")
            .field("prefix", &self.prefix)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl MessageBroker for RedisBroker {
    async fn enqueue(&self, queue: &QueueName, message: &Message) -> BrokerResult<()> {
        self.store_and_push(queue, message, None).await
    }

    async fn schedule(
        &self,
        queue: &QueueName,
        message: &Message,
        deliver_at: DateTime<Utc>,
    ) -> BrokerResult<()> {
        self.store_and_push(queue, message, Some(deliver_at)).await
    }

    async fn promote_due(&self, queue: &QueueName, now: DateTime<Utc>) -> BrokerResult<usize> {
        let keys = self.keys(queue);
        let mut connection = self.connection();
        let promoted: usize = self
            .promote_script
            .key(keys.scheduled())
            .key(keys.pending())
            .arg(now.timestamp_millis())
            .invoke_async(&mut connection)
            .await
            .map_err(BrokerError::backend)?;
        Ok(promoted)
    }

    async fn claim_next(
        &self,
        queue: &QueueName,
        consumer: ConsumerId,
    ) -> BrokerResult<Option<MessageId>> {
        let keys = self.keys(queue);
        let mut connection = self.connection();
        let claimed: Option<String> = redis::cmd("RPOPLPUSH")
            .arg(keys.pending())
            .arg(keys.claimed(consumer))
            .query_async(&mut connection)
            .await
            .map_err(BrokerError::backend)?;
        claimed
            .map(|raw| {
                raw.parse::<MessageId>()
                    .map_err(|_| BrokerError::Corrupt(format!("invalid message id {raw:?}")))
            })
            .transpose()
    }

    async fn load(&self, queue: &QueueName, id: MessageId) -> BrokerResult<Option<Vec<u8>>> {
        let keys = self.keys(queue);
        let mut connection = self.connection();
        let envelope: Option<Vec<u8>> = redis::cmd("HGET")
            .arg(keys.messages())
            .arg(id.to_string())
            .query_async(&mut connection)
            .await
            .map_err(BrokerError::backend)?;
        Ok(envelope)
    }

    async fn acknowledge(
        &self,
        queue: &QueueName,
        consumer: ConsumerId,
        id: MessageId,
    ) -> BrokerResult<()> {
        let keys = self.keys(queue);
        let raw_id = id.to_string();
        let mut connection = self.connection();
        let (): () = redis::pipe()
            .atomic()
            .lrem(keys.claimed(consumer), -1, &raw_id)
            .ignore()
            .hdel(keys.messages(), &raw_id)
            .ignore()
            .query_async(&mut connection)
            .await
            .map_err(BrokerError::backend)?;
        Ok(())
    }

    async fn heartbeat(
        &self,
        queue: &QueueName,
        consumer: ConsumerId,
        now: DateTime<Utc>,
    ) -> BrokerResult<()> {
        let keys = self.keys(queue);
        let mut connection = self.connection();
        let (): () = redis::cmd("HSET")
            .arg(keys.consumers())
            .arg(consumer.to_string())
            .arg(now.timestamp_millis())
            .query_async(&mut connection)
            .await
            .map(|_: i64| ())
            .map_err(BrokerError::backend)?;
        Ok(())
    }

    async fn reclaim(
        &self,
        queue: &QueueName,
        scope: ReclaimScope,
    ) -> BrokerResult<Vec<ReclaimedConsumer>> {
        let keys = self.keys(queue);
        let cutoff = match scope {
            ReclaimScope::StaleSince(cutoff) => cutoff.timestamp_millis().to_string(),
            ReclaimScope::All => "all".to_owned(),
        };
        let mut connection = self.connection();
        let flat: Vec<String> = self
            .reclaim_script
            .key(keys.consumers())
            .key(keys.pending())
            .arg(cutoff)
            .arg(keys.claimed_prefix())
            .arg(RedisKeys::claimed_suffix())
            .invoke_async(&mut connection)
            .await
            .map_err(BrokerError::backend)?;
        parse_reclaimed(&flat)
    }
}

fn parse_reclaimed(flat: &[String]) -> BrokerResult<Vec<ReclaimedConsumer>> {
    flat.chunks(2)
        .map(|pair| match pair {
            [consumer, requeued] => Ok(ReclaimedConsumer {
                consumer: consumer.parse().map_err(|_| {
                    BrokerError::Corrupt(format!("invalid consumer id {consumer:?}"))
                })?,
                requeued: requeued.parse().map_err(|_| {
                    BrokerError::Corrupt(format!("invalid requeue count {requeued:?}"))
                })?,
            }),
            _ => Err(BrokerError::Corrupt(
                "reclaim script returned an odd-length reply".to_owned(),
            )),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn parses_consumer_count_pairs() {
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        let flat = vec![
            first.to_string(),
            "3".to_owned(),
            second.to_string(),
            "0".to_owned(),
        ];

        let reclaimed = parse_reclaimed(&flat).expect("valid reply");

        assert_eq!(
            reclaimed,
            vec![
                ReclaimedConsumer {
                    consumer: ConsumerId::from_uuid(first),
                    requeued: 3,
                },
                ReclaimedConsumer {
                    consumer: ConsumerId::from_uuid(second),
                    requeued: 0,
                },
            ]
        );
    }

    #[test]
    fn rejects_odd_length_reply() {
        let flat = vec![Uuid::new_v4().to_string()];
        assert!(matches!(
            parse_reclaimed(&flat),
            Err(BrokerError::Corrupt(_))
        ));
    }

    #[test]
    fn rejects_non_uuid_consumer() {
        let flat = vec!["not-a-uuid".to_owned(), "1".to_owned()];
        assert!(matches!(
            parse_reclaimed(&flat),
            Err(BrokerError::Corrupt(_))
        ));
    }
}
