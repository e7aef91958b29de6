//! Tunables for a queue consumer.

use crate::retry::max_cumulative_backoff;
use std::time::Duration;

const SECOND: Duration = Duration::from_secs(1);
const FIVE_SECONDS: Duration = Duration::from_secs(5);
const MINUTE: Duration = Duration::from_secs(60);
const FIVE_MINUTES: Duration = Duration::from_secs(300);

const MIN_ATTEMPTS: u8 = 1;
const MAX_ATTEMPTS: u8 = 10;
const DEFAULT_ATTEMPTS: u8 = 3;

/// Configuration for a [`Consumer`](crate::messaging::services::Consumer).
///
/// Values are clamped to their supported ranges by
/// [`ConsumerOptions::normalized`], which the consumer applies on
/// construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumerOptions {
    cleaner_interval: Duration,
    dead_consumer_threshold: Duration,
    cleaner_max_attempts: u8,
    heartbeat_interval: Duration,
    heartbeat_max_attempts: u8,
    receiver_pause_interval: Duration,
    receiver_max_attempts: u8,
    scheduler_interval: Duration,
    scheduler_max_attempts: u8,
    max_backoff: Duration,
    concurrent_receivers: u8,
    concurrent_handlers: u8,
    shutdown_grace_period: Duration,
    lone_consumer: bool,
}

impl Default for ConsumerOptions {
    fn default() -> Self {
        Self {
            cleaner_interval: MINUTE,
            dead_consumer_threshold: MINUTE,
            cleaner_max_attempts: DEFAULT_ATTEMPTS,
            heartbeat_interval: Duration::from_secs(30),
            heartbeat_max_attempts: DEFAULT_ATTEMPTS,
            receiver_pause_interval: FIVE_SECONDS,
            receiver_max_attempts: DEFAULT_ATTEMPTS,
            scheduler_interval: FIVE_SECONDS,
            scheduler_max_attempts: DEFAULT_ATTEMPTS,
            max_backoff: Duration::from_secs(30),
            concurrent_receivers: 5,
            concurrent_handlers: 5,
            shutdown_grace_period: Duration::from_secs(10),
            lone_consumer: false,
        }
    }
}

impl ConsumerOptions {
    /// Creates options with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets how often dead consumers are looked for.
    #[must_use]
    pub const fn with_cleaner_interval(mut self, interval: Duration) -> Self {
        self.cleaner_interval = interval;
        self
    }

    /// Sets how long a consumer may go without a heartbeat before its claimed
    /// messages are reclaimed.
    #[must_use]
    pub const fn with_dead_consumer_threshold(mut self, threshold: Duration) -> Self {
        self.dead_consumer_threshold = threshold;
        self
    }

    /// Sets the attempt limit for one cleaning pass.
    #[must_use]
    pub const fn with_cleaner_max_attempts(mut self, attempts: u8) -> Self {
        self.cleaner_max_attempts = attempts;
        self
    }

    /// Sets how often the consumer refreshes its heartbeat.
    #[must_use]
    pub const fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    /// Sets the attempt limit for one heartbeat.
    #[must_use]
    pub const fn with_heartbeat_max_attempts(mut self, attempts: u8) -> Self {
        self.heartbeat_max_attempts = attempts;
        self
    }

    /// Sets the pause after a receive attempt finds the pending list empty.
    #[must_use]
    pub const fn with_receiver_pause_interval(mut self, interval: Duration) -> Self {
        self.receiver_pause_interval = interval;
        self
    }

    /// Sets the attempt limit for claiming, loading, and acknowledging.
    #[must_use]
    pub const fn with_receiver_max_attempts(mut self, attempts: u8) -> Self {
        self.receiver_max_attempts = attempts;
        self
    }

    /// Sets how often due scheduled messages are promoted.
    #[must_use]
    pub const fn with_scheduler_interval(mut self, interval: Duration) -> Self {
        self.scheduler_interval = interval;
        self
    }

    /// Sets the attempt limit for one promotion pass.
    #[must_use]
    pub const fn with_scheduler_max_attempts(mut self, attempts: u8) -> Self {
        self.scheduler_max_attempts = attempts;
        self
    }

    /// Sets the ceiling for the delay between retried broker operations.
    #[must_use]
    pub const fn with_max_backoff(mut self, max_backoff: Duration) -> Self {
        self.max_backoff = max_backoff;
        self
    }

    /// Sets the number of concurrent receiver tasks.
    #[must_use]
    pub const fn with_concurrent_receivers(mut self, count: u8) -> Self {
        self.concurrent_receivers = count;
        self
    }

    /// Sets the number of concurrent handler tasks.
    #[must_use]
    pub const fn with_concurrent_handlers(mut self, count: u8) -> Self {
        self.concurrent_handlers = count;
        self
    }

    /// Sets how long `run` waits for its tasks after shutdown begins.
    #[must_use]
    pub const fn with_shutdown_grace_period(mut self, period: Duration) -> Self {
        self.shutdown_grace_period = period;
        self
    }

    /// Declares this consumer the only one reading its queue.
    ///
    /// A lone consumer reclaims every registered consumer's claimed messages
    /// at start-up and runs neither the heartbeat loop nor the cleaner loop.
    #[must_use]
    pub const fn with_lone_consumer(mut self, lone_consumer: bool) -> Self {
        self.lone_consumer = lone_consumer;
        self
    }

    /// Returns a copy with every value clamped to its supported range.
    #[must_use]
    pub fn normalized(&self) -> Self {
        let heartbeat_interval = self.heartbeat_interval.clamp(FIVE_SECONDS, FIVE_MINUTES);
        let heartbeat_max_attempts = clamp_attempts(self.heartbeat_max_attempts);
        let max_backoff = self.max_backoff.clamp(SECOND, FIVE_MINUTES);
        // A live consumer may go a full interval plus every heartbeat retry
        // without registering.
        let longest_live_silence = heartbeat_interval
            .saturating_add(max_cumulative_backoff(heartbeat_max_attempts, max_backoff));
        let dead_consumer_threshold = self
            .dead_consumer_threshold
            .clamp(FIVE_SECONDS, FIVE_MINUTES)
            .max(longest_live_silence.saturating_add(FIVE_SECONDS));
        Self {
            cleaner_interval: self.cleaner_interval.clamp(FIVE_SECONDS, FIVE_MINUTES),
            dead_consumer_threshold,
            cleaner_max_attempts: clamp_attempts(self.cleaner_max_attempts),
            heartbeat_interval,
            heartbeat_max_attempts,
            receiver_pause_interval: self.receiver_pause_interval.clamp(SECOND, MINUTE),
            receiver_max_attempts: clamp_attempts(self.receiver_max_attempts),
            scheduler_interval: self.scheduler_interval.clamp(FIVE_SECONDS, FIVE_MINUTES),
            scheduler_max_attempts: clamp_attempts(self.scheduler_max_attempts),
            max_backoff,
            concurrent_receivers: self.concurrent_receivers.max(1),
            concurrent_handlers: self.concurrent_handlers.max(1),
            shutdown_grace_period: self.shutdown_grace_period,
            lone_consumer: self.lone_consumer,
        }
    }

    /// Interval between cleaning passes.
    #[must_use]
    pub const fn cleaner_interval(&self) -> Duration {
        self.cleaner_interval
    }

    /// Heartbeat age after which a consumer counts as dead.
    #[must_use]
    pub const fn dead_consumer_threshold(&self) -> Duration {
        self.dead_consumer_threshold
    }

    /// Attempt limit for one cleaning pass.
    #[must_use]
    pub const fn cleaner_max_attempts(&self) -> u8 {
        self.cleaner_max_attempts
    }

    /// Interval between heartbeats.
    #[must_use]
    pub const fn heartbeat_interval(&self) -> Duration {
        self.heartbeat_interval
    }

    /// Attempt limit for one heartbeat.
    #[must_use]
    pub const fn heartbeat_max_attempts(&self) -> u8 {
        self.heartbeat_max_attempts
    }

    /// Pause after an empty receive.
    #[must_use]
    pub const fn receiver_pause_interval(&self) -> Duration {
        self.receiver_pause_interval
    }

    /// Attempt limit for claim, load, and acknowledgement operations.
    #[must_use]
    pub const fn receiver_max_attempts(&self) -> u8 {
        self.receiver_max_attempts
    }

    /// Interval between promotion passes.
    #[must_use]
    pub const fn scheduler_interval(&self) -> Duration {
        self.scheduler_interval
    }

    /// Attempt limit for one promotion pass.
    #[must_use]
    pub const fn scheduler_max_attempts(&self) -> u8 {
        self.scheduler_max_attempts
    }

    /// Ceiling for retry backoff.
    #[must_use]
    pub const fn max_backoff(&self) -> Duration {
        self.max_backoff
    }

    /// Number of receiver tasks.
    #[must_use]
    pub const fn concurrent_receivers(&self) -> u8 {
        self.concurrent_receivers
    }

    /// Number of handler tasks.
    #[must_use]
    pub const fn concurrent_handlers(&self) -> u8 {
        self.concurrent_handlers
    }

    /// Maximum wait for tasks to stop once shutdown begins.
    #[must_use]
    pub const fn shutdown_grace_period(&self) -> Duration {
        self.shutdown_grace_period
    }

    /// Whether this consumer is the only reader of its queue.
    #[must_use]
    pub const fn lone_consumer(&self) -> bool {
        self.lone_consumer
    }
}

const fn clamp_attempts(attempts: u8) -> u8 {
    if attempts < MIN_ATTEMPTS {
        MIN_ATTEMPTS
    } else if attempts > MAX_ATTEMPTS {
        MAX_ATTEMPTS
    } else {
        attempts
    }
}
