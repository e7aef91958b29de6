//! Consuming side of the reliable queue.
//!
//! [`Consumer::run`] sends one heartbeat synchronously and then runs, until
//! cancelled or a fatal error occurs:
//!
//! - receiver tasks that claim pending messages once a handler is idle
//! - handler tasks that invoke the [`MessageHandler`] and acknowledge success
//! - a heartbeat loop and a cleaner loop (skipped for a lone consumer)
//! - a promoter loop that moves due scheduled messages to the pending list
//!
//! Every broker operation goes through [`manage_retries`]; exhausting the
//! retries of any operation is fatal and ends `run` with that error.

use crate::messaging::{
    domain::{ConsumerId, ConsumerOptions, Message, QueueName},
    ports::{BrokerError, BrokerResult, MessageBroker, ReclaimScope},
};
use crate::retry::{Failure, RetryError, manage_retries};
use async_trait::async_trait;
use chrono::TimeDelta;
use mockable::Clock;
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Error type returned by message handlers.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Application callback invoked once per delivered message.
///
/// Handlers should be idempotent: a message may be delivered again if its
/// consumer dies before acknowledging it.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    /// Processes one message. Returning an error leaves the message claimed.
    async fn handle(&self, cancel: CancellationToken, message: Message)
    -> Result<(), HandlerError>;
}

/// Result type for consumer operations.
pub type ConsumerResult<T> = Result<T, ConsumerError>;

/// Fatal consumer failures.
#[derive(Debug, Error)]
pub enum ConsumerError {
    /// A broker operation failed after exhausting its retries.
    #[error("queue {queue} consumer {consumer} could not {operation}")]
    Broker {
        /// Queue being consumed.
        queue: QueueName,
        /// Consumer that failed.
        consumer: ConsumerId,
        /// The operation that failed.
        operation: &'static str,
        /// Retry outcome of the operation.
        #[source]
        source: RetryError<BrokerError>,
    },
}

impl ConsumerError {
    fn is_cancellation(&self) -> bool {
        match self {
            Self::Broker { source, .. } => source.is_cancelled(),
        }
    }
}

/// Reliable queue consumer for one queue.
pub struct Consumer<B, H, C>
where
    B: MessageBroker + ?Sized + 'static,
    H: MessageHandler + ?Sized + 'static,
    C: Clock + Send + Sync + 'static,
{
    id: ConsumerId,
    queue: QueueName,
    options: ConsumerOptions,
    broker: Arc<B>,
    handler: Arc<H>,
    clock: Arc<C>,
}

impl<B, H, C> Consumer<B, H, C>
where
    B: MessageBroker + ?Sized + 'static,
    H: MessageHandler + ?Sized + 'static,
    C: Clock + Send + Sync + 'static,
{
    /// Creates a consumer with a fresh identity. `options` are normalized.
    #[must_use]
    pub fn new(
        queue: QueueName,
        broker: Arc<B>,
        handler: Arc<H>,
        clock: Arc<C>,
        options: &ConsumerOptions,
    ) -> Self {
        Self {
            id: ConsumerId::new(),
            queue,
            options: options.normalized(),
            broker,
            handler,
            clock,
        }
    }

    /// Returns this consumer's identity.
    #[must_use]
    pub const fn id(&self) -> ConsumerId {
        self.id
    }

    /// Returns the queue this consumer reads.
    #[must_use]
    pub const fn queue(&self) -> &QueueName {
        &self.queue
    }

    /// Consumes messages until `cancel` fires or a fatal error occurs.
    ///
    /// Returns `Ok(())` after cancellation. Messages being handled when
    /// shutdown begins stay claimed.
    ///
    /// # Errors
    ///
    /// Returns [`ConsumerError`] when start-up reclamation or the initial
    /// heartbeat fails, or when any loop exhausts its retries.
    pub async fn run(&self, cancel: &CancellationToken) -> ConsumerResult<()> {
        let token = cancel.child_token();
        let (fatal_tx, mut fatal_rx) = mpsc::channel(1);
        let loops = Loops {
            consumer: self.id,
            queue: self.queue.clone(),
            options: self.options.clone(),
            broker: Arc::clone(&self.broker),
            handler: Arc::clone(&self.handler),
            clock: Arc::clone(&self.clock),
            token: token.clone(),
            fatal: fatal_tx,
        };

        if self.options.lone_consumer() {
            loops.reclaim(ReclaimScope::All).await?;
        }
        loops.heartbeat().await?;
        info!(
            queue = %self.queue,
            consumer = %self.id,
            lone = self.options.lone_consumer(),
            "consumer started"
        );

        let mut tasks = JoinSet::new();
        if !self.options.lone_consumer() {
            tasks.spawn(loops.clone().run_heart());
            tasks.spawn(loops.clone().run_cleaner());
        }
        tasks.spawn(loops.clone().run_promoter());

        let capacity = usize::from(self.options.concurrent_handlers());
        let (ready_tx, ready_rx) = mpsc::channel(capacity);
        let (message_tx, message_rx) = mpsc::channel(capacity);
        let shared_ready = Arc::new(Mutex::new(ready_rx));
        let shared_messages = Arc::new(Mutex::new(message_rx));
        for _ in 0..self.options.concurrent_receivers() {
            tasks.spawn(
                loops
                    .clone()
                    .receive(Arc::clone(&shared_ready), message_tx.clone()),
            );
        }
        for _ in 0..self.options.concurrent_handlers() {
            tasks.spawn(
                loops
                    .clone()
                    .handle(ready_tx.clone(), Arc::clone(&shared_messages)),
            );
        }
        drop(ready_tx);
        drop(message_tx);

        let outcome = tokio::select! {
            fatal = fatal_rx.recv() => fatal,
            () = cancel.cancelled() => None,
        };
        token.cancel();
        self.drain(tasks).await;

        match outcome {
            Some(err) => {
                error!(queue = %self.queue, consumer = %self.id, error = %err, "consumer failed");
                Err(err)
            }
            None => {
                info!(queue = %self.queue, consumer = %self.id, "consumer stopped");
                Ok(())
            }
        }
    }

    async fn drain(&self, mut tasks: JoinSet<()>) {
        let grace = self.options.shutdown_grace_period();
        let drained = tokio::time::timeout(grace, async {
            while let Some(joined) = tasks.join_next().await {
                if let Err(err) = joined {
                    if err.is_panic() {
                        error!(queue = %self.queue, consumer = %self.id, "consumer task panicked");
                    }
                }
            }
        })
        .await;
        if drained.is_err() {
            warn!(
                queue = %self.queue,
                consumer = %self.id,
                grace_ms = u64::try_from(grace.as_millis()).unwrap_or(u64::MAX),
                "shutdown grace period elapsed; abandoning consumer tasks"
            );
            tasks.abort_all();
        }
    }
}

struct Loops<B, H, C>
where
    B: ?Sized,
    H: ?Sized,
{
    consumer: ConsumerId,
    queue: QueueName,
    options: ConsumerOptions,
    broker: Arc<B>,
    handler: Arc<H>,
    clock: Arc<C>,
    token: CancellationToken,
    fatal: mpsc::Sender<ConsumerError>,
}

impl<B, H, C> Clone for Loops<B, H, C>
where
    B: ?Sized,
    H: ?Sized,
{
    fn clone(&self) -> Self {
        Self {
            consumer: self.consumer,
            queue: self.queue.clone(),
            options: self.options.clone(),
            broker: Arc::clone(&self.broker),
            handler: Arc::clone(&self.handler),
            clock: Arc::clone(&self.clock),
            token: self.token.clone(),
            fatal: self.fatal.clone(),
        }
    }
}

fn classify(err: BrokerError) -> Failure<BrokerError> {
    match err {
        BrokerError::Corrupt(_) => Failure::Abort(err),
        BrokerError::Backend(_) => Failure::Retry(err),
    }
}

impl<B, H, C> Loops<B, H, C>
where
    B: MessageBroker + ?Sized + 'static,
    H: MessageHandler + ?Sized + 'static,
    C: Clock + Send + Sync + 'static,
{
    async fn with_retries<T, F, Fut>(
        &self,
        operation: &'static str,
        max_attempts: u8,
        mut call: F,
    ) -> ConsumerResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = BrokerResult<T>>,
    {
        manage_retries(
            &self.token,
            operation,
            max_attempts,
            self.options.max_backoff(),
            || {
                let pending = call();
                async move { pending.await.map_err(classify) }
            },
        )
        .await
        .map_err(|source| ConsumerError::Broker {
            queue: self.queue.clone(),
            consumer: self.consumer,
            operation,
            source,
        })
    }

    fn report(&self, err: ConsumerError) {
        if self.token.is_cancelled() || err.is_cancellation() {
            debug!(queue = %self.queue, consumer = %self.consumer, error = %err, "consumer task stopped during shutdown");
            return;
        }
        if let Err(unsent) = self.fatal.try_send(err) {
            debug!(queue = %self.queue, consumer = %self.consumer, error = %unsent, "fatal error already reported");
        }
    }

    async fn heartbeat(&self) -> ConsumerResult<()> {
        self.with_retries("send a heartbeat", self.options.heartbeat_max_attempts(), || {
            self.broker
                .heartbeat(&self.queue, self.consumer, self.clock.utc())
        })
        .await
    }

    async fn reclaim(&self, scope: ReclaimScope) -> ConsumerResult<()> {
        let reclaimed = self
            .with_retries(
                "reclaim messages of dead consumers",
                self.options.cleaner_max_attempts(),
                || self.broker.reclaim(&self.queue, scope),
            )
            .await?;
        for entry in reclaimed {
            info!(
                queue = %self.queue,
                consumer = %self.consumer,
                dead_consumer = %entry.consumer,
                requeued = entry.requeued,
                "reclaimed messages of dead consumer"
            );
        }
        Ok(())
    }

    async fn run_heart(self) {
        let mut ticker = tokio::time::interval(self.options.heartbeat_interval());
        // The first tick completes immediately; the initial heartbeat is
        // already sent.
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                () = self.token.cancelled() => return,
            }
            if let Err(err) = self.heartbeat().await {
                self.report(err);
                return;
            }
        }
    }

    async fn run_cleaner(self) {
        let threshold =
            TimeDelta::from_std(self.options.dead_consumer_threshold()).unwrap_or(TimeDelta::MAX);
        let mut ticker = tokio::time::interval(self.options.cleaner_interval());
        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                () = self.token.cancelled() => return,
            }
            let now = self.clock.utc();
            let cutoff = now.checked_sub_signed(threshold).unwrap_or(now);
            if let Err(err) = self.reclaim(ReclaimScope::StaleSince(cutoff)).await {
                self.report(err);
                return;
            }
        }
    }

    async fn run_promoter(self) {
        let mut ticker = tokio::time::interval(self.options.scheduler_interval());
        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                () = self.token.cancelled() => return,
            }
            let promoted = self
                .with_retries(
                    "promote scheduled messages",
                    self.options.scheduler_max_attempts(),
                    || self.broker.promote_due(&self.queue, self.clock.utc()),
                )
                .await;
            match promoted {
                Ok(0) => {}
                Ok(count) => {
                    debug!(queue = %self.queue, consumer = %self.consumer, count, "promoted scheduled messages");
                }
                Err(err) => {
                    self.report(err);
                    return;
                }
            }
        }
    }

    async fn receive(
        self,
        ready: Arc<Mutex<mpsc::Receiver<()>>>,
        deliver: mpsc::Sender<Message>,
    ) {
        loop {
            // Claim nothing until some handler is idle.
            let handler_ready = {
                let mut signals = ready.lock().await;
                tokio::select! {
                    signal = signals.recv() => signal.is_some(),
                    () = self.token.cancelled() => false,
                }
            };
            if !handler_ready {
                return;
            }
            let Some(message) = self.next_message().await else {
                return;
            };
            tokio::select! {
                sent = deliver.send(message) => {
                    if sent.is_err() {
                        return;
                    }
                }
                () = self.token.cancelled() => return,
            }
        }
    }

    async fn next_message(&self) -> Option<Message> {
        let attempts = self.options.receiver_max_attempts();
        loop {
            let claimed = match self
                .with_retries("claim a pending message", attempts, || {
                    self.broker.claim_next(&self.queue, self.consumer)
                })
                .await
            {
                Ok(claimed) => claimed,
                Err(err) => {
                    self.report(err);
                    return None;
                }
            };
            let Some(id) = claimed else {
                if self.pause().await {
                    continue;
                }
                return None;
            };

            let stored = match self
                .with_retries("load a claimed message", attempts, || {
                    self.broker.load(&self.queue, id)
                })
                .await
            {
                Ok(stored) => stored,
                Err(err) => {
                    self.report(err);
                    return None;
                }
            };
            let Some(envelope) = stored else {
                warn!(queue = %self.queue, consumer = %self.consumer, message_id = %id, "claimed message has no stored body; discarding it");
                if let Err(err) = self
                    .with_retries("discard a message without a body", attempts, || {
                        self.broker.acknowledge(&self.queue, self.consumer, id)
                    })
                    .await
                {
                    self.report(err);
                    return None;
                }
                continue;
            };

            match Message::from_json(&envelope) {
                Ok(message) => return Some(message),
                Err(err) => {
                    error!(queue = %self.queue, consumer = %self.consumer, message_id = %id, error = %err, "failed to decode claimed message; leaving it claimed");
                }
            }
        }
    }

    /// Sleeps for the empty-queue pause; returns `false` if cancelled.
    async fn pause(&self) -> bool {
        tokio::select! {
            () = tokio::time::sleep(self.options.receiver_pause_interval()) => true,
            () = self.token.cancelled() => false,
        }
    }

    async fn handle(self, ready: mpsc::Sender<()>, inbox: Arc<Mutex<mpsc::Receiver<Message>>>) {
        loop {
            tokio::select! {
                sent = ready.send(()) => {
                    if sent.is_err() {
                        return;
                    }
                }
                () = self.token.cancelled() => return,
            }
            let received = {
                let mut messages = inbox.lock().await;
                tokio::select! {
                    message = messages.recv() => message,
                    () = self.token.cancelled() => None,
                }
            };
            let Some(message) = received else {
                return;
            };
            let id = message.id();
            let outcome = self.handler.handle(self.token.clone(), message).await;
            if self.token.is_cancelled() {
                debug!(queue = %self.queue, consumer = %self.consumer, message_id = %id, "consumer stopping; leaving message claimed");
                return;
            }
            if let Err(err) = outcome {
                error!(queue = %self.queue, consumer = %self.consumer, message_id = %id, error = %err, "handler failed; leaving message claimed");
                continue;
            }
            if let Err(err) = self
                .with_retries(
                    "acknowledge a handled message",
                    self.options.receiver_max_attempts(),
                    || self.broker.acknowledge(&self.queue, self.consumer, id),
                )
                .await
            {
                self.report(err);
                return;
            }
        }
    }
}
