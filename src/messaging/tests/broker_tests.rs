//! Contract tests for the in-memory broker.

use crate::messaging::{
    adapters::memory::InMemoryBroker,
    domain::{ConsumerId, Message, QueueName},
    ports::{MessageBroker, ReclaimScope},
};
use chrono::{TimeDelta, Utc};
use rstest::{fixture, rstest};

#[fixture]
fn queue() -> QueueName {
    QueueName::new("work").expect("valid queue name")
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn messages_are_claimed_in_publication_order(queue: QueueName) {
    let broker = InMemoryBroker::new();
    let first = Message::new("one");
    let second = Message::new("two");
    broker.enqueue(&queue, &first).await.expect("enqueue first");
    broker.enqueue(&queue, &second).await.expect("enqueue second");

    let consumer = ConsumerId::new();
    let claimed_first = broker.claim_next(&queue, consumer).await.expect("claim");
    let claimed_second = broker.claim_next(&queue, consumer).await.expect("claim");
    let claimed_none = broker.claim_next(&queue, consumer).await.expect("claim");

    assert_eq!(claimed_first, Some(first.id()));
    assert_eq!(claimed_second, Some(second.id()));
    assert_eq!(claimed_none, None);
    assert_eq!(
        broker.claimed_by(&queue, consumer).expect("inspect").len(),
        2
    );
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn acknowledge_removes_claim_and_body(queue: QueueName) {
    let broker = InMemoryBroker::new();
    let message = Message::new("payload");
    broker.enqueue(&queue, &message).await.expect("enqueue");
    let consumer = ConsumerId::new();
    broker.claim_next(&queue, consumer).await.expect("claim");

    broker
        .acknowledge(&queue, consumer, message.id())
        .await
        .expect("acknowledge");

    assert!(broker.claimed_by(&queue, consumer).expect("inspect").is_empty());
    assert_eq!(broker.stored_messages(&queue).expect("inspect"), 0);
    assert_eq!(
        broker.load(&queue, message.id()).await.expect("load"),
        None
    );
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn promote_due_moves_only_due_messages(queue: QueueName) {
    let broker = InMemoryBroker::new();
    let now = Utc::now();
    let due = Message::new("due");
    let later = Message::new("later");
    broker
        .schedule(&queue, &due, now - TimeDelta::seconds(1))
        .await
        .expect("schedule due");
    broker
        .schedule(&queue, &later, now + TimeDelta::minutes(5))
        .await
        .expect("schedule later");

    let promoted = broker.promote_due(&queue, now).await.expect("promote");

    assert_eq!(promoted, 1);
    assert_eq!(broker.pending(&queue).expect("inspect"), vec![due.id()]);
    assert_eq!(broker.scheduled_len(&queue).expect("inspect"), 1);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn stale_reclaim_requeues_dead_consumers_only(queue: QueueName) {
    let broker = InMemoryBroker::new();
    let now = Utc::now();
    let dead = ConsumerId::new();
    let live = ConsumerId::new();
    broker
        .heartbeat(&queue, dead, now - TimeDelta::minutes(2))
        .await
        .expect("dead heartbeat");
    broker.heartbeat(&queue, live, now).await.expect("live heartbeat");
    for body in ["a", "b", "c"] {
        broker
            .enqueue(&queue, &Message::new(body))
            .await
            .expect("enqueue");
    }
    broker.claim_next(&queue, dead).await.expect("claim");
    broker.claim_next(&queue, dead).await.expect("claim");
    broker.claim_next(&queue, live).await.expect("claim");

    let reclaimed = broker
        .reclaim(&queue, ReclaimScope::StaleSince(now - TimeDelta::minutes(1)))
        .await
        .expect("reclaim");

    assert_eq!(reclaimed.len(), 1);
    let entry = reclaimed.first().expect("one reclaimed consumer");
    assert_eq!(entry.consumer, dead);
    assert_eq!(entry.requeued, 2);
    assert_eq!(broker.pending(&queue).expect("inspect").len(), 2);
    assert_eq!(broker.claimed_by(&queue, live).expect("inspect").len(), 1);
    assert_eq!(broker.last_heartbeat(&queue, dead).expect("inspect"), None);
    assert_eq!(broker.last_heartbeat(&queue, live).expect("inspect"), Some(now));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn reclaimed_messages_keep_their_claim_order(queue: QueueName) {
    let broker = InMemoryBroker::new();
    let dead = ConsumerId::new();
    broker.heartbeat(&queue, dead, Utc::now()).await.expect("heartbeat");
    let first = Message::new("first");
    let second = Message::new("second");
    broker.enqueue(&queue, &first).await.expect("enqueue");
    broker.enqueue(&queue, &second).await.expect("enqueue");
    broker.claim_next(&queue, dead).await.expect("claim");
    broker.claim_next(&queue, dead).await.expect("claim");

    broker
        .reclaim(&queue, ReclaimScope::All)
        .await
        .expect("reclaim");

    let successor = ConsumerId::new();
    assert_eq!(
        broker.claim_next(&queue, successor).await.expect("claim"),
        Some(first.id())
    );
    assert_eq!(
        broker.claim_next(&queue, successor).await.expect("claim"),
        Some(second.id())
    );
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn unavailable_broker_rejects_operations(queue: QueueName) {
    let broker = InMemoryBroker::new();
    broker.set_unavailable(true).expect("toggle");

    let result = broker.enqueue(&queue, &Message::new("x")).await;

    assert!(result.is_err());
}
