//! Behavioural tests for the queue consumer.
//!
//! Tokio time is paused so loop intervals and retry backoff elapse instantly.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::messaging::{
    adapters::memory::InMemoryBroker,
    domain::{ConsumerId, ConsumerOptions, Message, MessageId, QueueName},
    ports::MessageBroker,
    services::{Consumer, ConsumerError, HandlerError, MessageHandler, Producer},
};
use async_trait::async_trait;
use chrono::{TimeDelta, Utc};
use mockable::DefaultClock;
use rstest::{fixture, rstest};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Default)]
struct RecordingHandler {
    handled: Mutex<Vec<MessageId>>,
    fail: bool,
}

impl RecordingHandler {
    fn failing() -> Self {
        Self {
            handled: Mutex::default(),
            fail: true,
        }
    }

    fn handled(&self) -> Vec<MessageId> {
        self.handled.lock().expect("handler lock").clone()
    }
}

#[async_trait]
impl MessageHandler for RecordingHandler {
    async fn handle(
        &self,
        _cancel: CancellationToken,
        message: Message,
    ) -> Result<(), HandlerError> {
        self.handled.lock().expect("handler lock").push(message.id());
        if self.fail {
            return Err("handler refused message".into());
        }
        Ok(())
    }
}

type TestConsumer = Consumer<InMemoryBroker, RecordingHandler, DefaultClock>;

struct Harness {
    queue: QueueName,
    broker: Arc<InMemoryBroker>,
    handler: Arc<RecordingHandler>,
}

impl Harness {
    fn with_handler(handler: RecordingHandler) -> Self {
        Self {
            queue: QueueName::new("work").expect("valid queue name"),
            broker: Arc::new(InMemoryBroker::new()),
            handler: Arc::new(handler),
        }
    }

    fn consumer(&self, options: &ConsumerOptions) -> Arc<TestConsumer> {
        Arc::new(Consumer::new(
            self.queue.clone(),
            Arc::clone(&self.broker),
            Arc::clone(&self.handler),
            Arc::new(DefaultClock),
            options,
        ))
    }

    async fn publish(&self, message: &Message) {
        Producer::new(self.queue.clone(), Arc::clone(&self.broker))
            .publish(message)
            .await
            .expect("publish");
    }

    /// Enqueues a message and claims it on behalf of `owner`.
    async fn claimed_by(&self, owner: ConsumerId) -> MessageId {
        let message = Message::new("orphan");
        self.publish(&message).await;
        let claimed = self
            .broker
            .claim_next(&self.queue, owner)
            .await
            .expect("claim");
        assert_eq!(claimed, Some(message.id()));
        message.id()
    }

    async fn wait_for_handled(&self, count: usize) {
        for _ in 0..600 {
            if self.handler.handled().len() >= count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        panic!("handler saw {} messages, expected {count}", self.handler.handled().len());
    }
}

fn start(
    consumer: &Arc<TestConsumer>,
    cancel: &CancellationToken,
) -> JoinHandle<Result<(), ConsumerError>> {
    let running = Arc::clone(consumer);
    let token = cancel.clone();
    tokio::spawn(async move { running.run(&token).await })
}

#[fixture]
fn harness() -> Harness {
    Harness::with_handler(RecordingHandler::default())
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn every_message_is_handled_once_and_acknowledged(harness: Harness) {
    let mut published = HashSet::new();
    for index in 0..7 {
        let message = Message::new(format!("message {index}"));
        published.insert(message.id());
        harness.publish(&message).await;
    }
    let options = ConsumerOptions::new()
        .with_concurrent_receivers(2)
        .with_concurrent_handlers(3);
    let consumer = harness.consumer(&options);
    let cancel = CancellationToken::new();
    let running = start(&consumer, &cancel);

    harness.wait_for_handled(7).await;
    // Give the receivers further empty polls before stopping.
    tokio::time::sleep(Duration::from_secs(20)).await;
    cancel.cancel();
    running.await.expect("join").expect("clean shutdown");

    let handled = harness.handler.handled();
    assert_eq!(handled.len(), 7);
    assert_eq!(handled.into_iter().collect::<HashSet<_>>(), published);
    assert_eq!(harness.broker.stored_messages(&harness.queue).expect("inspect"), 0);
    assert!(harness.broker.pending(&harness.queue).expect("inspect").is_empty());
    assert!(
        harness
            .broker
            .claimed_by(&harness.queue, consumer.id())
            .expect("inspect")
            .is_empty()
    );
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn failed_message_stays_claimed() {
    let harness = Harness::with_handler(RecordingHandler::failing());
    let message = Message::new("poison");
    harness.publish(&message).await;
    let consumer = harness.consumer(&ConsumerOptions::new());
    let cancel = CancellationToken::new();
    let running = start(&consumer, &cancel);

    harness.wait_for_handled(1).await;
    tokio::time::sleep(Duration::from_secs(10)).await;
    cancel.cancel();
    running.await.expect("join").expect("clean shutdown");

    assert_eq!(harness.handler.handled(), vec![message.id()]);
    assert_eq!(
        harness
            .broker
            .claimed_by(&harness.queue, consumer.id())
            .expect("inspect"),
        vec![message.id()]
    );
    assert_eq!(harness.broker.stored_messages(&harness.queue).expect("inspect"), 1);
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn heartbeat_is_recorded_before_work_starts(harness: Harness) {
    let consumer = harness.consumer(&ConsumerOptions::new());
    let cancel = CancellationToken::new();
    let running = start(&consumer, &cancel);

    tokio::time::sleep(Duration::from_secs(1)).await;
    let heartbeat = harness
        .broker
        .last_heartbeat(&harness.queue, consumer.id())
        .expect("inspect");
    cancel.cancel();
    running.await.expect("join").expect("clean shutdown");

    assert!(heartbeat.is_some());
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn cleaner_reclaims_dead_consumer_but_not_live_one(harness: Harness) {
    let dead = ConsumerId::new();
    let live = ConsumerId::new();
    harness
        .broker
        .heartbeat(&harness.queue, dead, Utc::now() - TimeDelta::minutes(10))
        .await
        .expect("dead heartbeat");
    harness
        .broker
        .heartbeat(&harness.queue, live, Utc::now())
        .await
        .expect("live heartbeat");
    let orphaned = harness.claimed_by(dead).await;
    let held = harness.claimed_by(live).await;

    let consumer = harness.consumer(&ConsumerOptions::new());
    let cancel = CancellationToken::new();
    let running = start(&consumer, &cancel);
    harness.wait_for_handled(1).await;
    tokio::time::sleep(Duration::from_secs(10)).await;
    cancel.cancel();
    running.await.expect("join").expect("clean shutdown");

    assert_eq!(harness.handler.handled(), vec![orphaned]);
    assert_eq!(
        harness.broker.claimed_by(&harness.queue, live).expect("inspect"),
        vec![held]
    );
    assert_eq!(
        harness.broker.last_heartbeat(&harness.queue, dead).expect("inspect"),
        None
    );
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn cleaner_spares_consumer_still_retrying_its_heartbeat(harness: Harness) {
    let options = ConsumerOptions::new()
        .with_heartbeat_interval(Duration::from_secs(5))
        .with_heartbeat_max_attempts(3)
        .with_dead_consumer_threshold(Duration::from_secs(5))
        .with_cleaner_interval(Duration::from_secs(5));
    // One missed interval plus the 2s and 4s backoff ceilings of two retries.
    let silence = TimeDelta::seconds(11);
    let dead = ConsumerId::new();
    let retrying = ConsumerId::new();
    harness
        .broker
        .heartbeat(&harness.queue, dead, Utc::now() - TimeDelta::minutes(10))
        .await
        .expect("dead heartbeat");
    harness
        .broker
        .heartbeat(&harness.queue, retrying, Utc::now() - silence)
        .await
        .expect("late heartbeat");
    let orphaned = harness.claimed_by(dead).await;
    let held = harness.claimed_by(retrying).await;

    let consumer = harness.consumer(&options);
    let cancel = CancellationToken::new();
    let running = start(&consumer, &cancel);
    harness.wait_for_handled(1).await;
    tokio::time::sleep(Duration::from_secs(12)).await;
    cancel.cancel();
    running.await.expect("join").expect("clean shutdown");

    assert_eq!(harness.handler.handled(), vec![orphaned]);
    assert_eq!(
        harness
            .broker
            .claimed_by(&harness.queue, retrying)
            .expect("inspect"),
        vec![held]
    );
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn lone_consumer_reclaims_every_claim_at_startup(harness: Harness) {
    let predecessor = ConsumerId::new();
    harness
        .broker
        .heartbeat(&harness.queue, predecessor, Utc::now())
        .await
        .expect("fresh heartbeat");
    let orphaned = harness.claimed_by(predecessor).await;

    let consumer = harness.consumer(&ConsumerOptions::new().with_lone_consumer(true));
    let cancel = CancellationToken::new();
    let running = start(&consumer, &cancel);
    harness.wait_for_handled(1).await;
    cancel.cancel();
    running.await.expect("join").expect("clean shutdown");

    assert_eq!(harness.handler.handled(), vec![orphaned]);
    assert!(
        harness
            .broker
            .claimed_by(&harness.queue, predecessor)
            .expect("inspect")
            .is_empty()
    );
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn due_scheduled_message_is_promoted_and_handled(harness: Harness) {
    let message = Message::delayed("soon", Duration::ZERO, &DefaultClock).expect("delay fits");
    harness.publish(&message).await;
    assert_eq!(harness.broker.scheduled_len(&harness.queue).expect("inspect"), 1);

    let consumer = harness.consumer(&ConsumerOptions::new());
    let cancel = CancellationToken::new();
    let running = start(&consumer, &cancel);
    harness.wait_for_handled(1).await;
    cancel.cancel();
    running.await.expect("join").expect("clean shutdown");

    assert_eq!(harness.handler.handled(), vec![message.id()]);
    assert_eq!(harness.broker.scheduled_len(&harness.queue).expect("inspect"), 0);
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn message_without_body_is_discarded(harness: Harness) {
    let message = Message::new("vanishing");
    harness.publish(&message).await;
    // Acknowledging on behalf of a stranger drops the body but not the ID.
    harness
        .broker
        .acknowledge(&harness.queue, ConsumerId::new(), message.id())
        .await
        .expect("drop body");

    let consumer = harness.consumer(&ConsumerOptions::new());
    let cancel = CancellationToken::new();
    let running = start(&consumer, &cancel);
    tokio::time::sleep(Duration::from_secs(10)).await;
    cancel.cancel();
    running.await.expect("join").expect("clean shutdown");

    assert!(harness.handler.handled().is_empty());
    assert!(harness.broker.pending(&harness.queue).expect("inspect").is_empty());
    assert!(
        harness
            .broker
            .claimed_by(&harness.queue, consumer.id())
            .expect("inspect")
            .is_empty()
    );
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn unreachable_broker_fails_start_up(harness: Harness) {
    harness.broker.set_unavailable(true).expect("toggle");
    let consumer = harness.consumer(&ConsumerOptions::new());

    let err = consumer
        .run(&CancellationToken::new())
        .await
        .expect_err("heartbeat cannot be sent");

    assert!(matches!(
        err,
        ConsumerError::Broker {
            operation: "send a heartbeat",
            ..
        }
    ));
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn broker_outage_while_running_is_fatal(harness: Harness) {
    let consumer = harness.consumer(&ConsumerOptions::new());
    let cancel = CancellationToken::new();
    let running = start(&consumer, &cancel);

    tokio::time::sleep(Duration::from_secs(1)).await;
    harness.broker.set_unavailable(true).expect("toggle");
    let outcome = running.await.expect("join");

    assert!(outcome.is_err());
    assert!(!cancel.is_cancelled());
}
