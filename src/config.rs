//! Environment-driven configuration for the controller binary.
//!
//! Every setting has a default; [`BrigNextConfig::from_env`] overrides them
//! from process environment variables and rejects malformed values with a
//! [`ConfigError`] naming the offending variable.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Redis connection URL.
pub const REDIS_URL: &str = "REDIS_URL";
/// Prefix for every Redis key the broker writes.
pub const REDIS_KEY_PREFIX: &str = "REDIS_KEY_PREFIX";
/// `PostgreSQL` connection URL.
pub const DATABASE_URL: &str = "DATABASE_URL";
/// Maximum pooled `PostgreSQL` connections.
pub const DATABASE_POOL_SIZE: &str = "DATABASE_POOL_SIZE";
/// Worker image used when a worker spec names none.
pub const CONTROLLER_DEFAULT_WORKER_IMAGE: &str = "CONTROLLER_DEFAULT_WORKER_IMAGE";
/// Worker image pull policy used when a worker spec names none.
pub const CONTROLLER_DEFAULT_WORKER_IMAGE_PULL_POLICY: &str =
    "CONTROLLER_DEFAULT_WORKER_IMAGE_PULL_POLICY";
/// Storage class of workspace volume claims.
pub const CONTROLLER_WORKSPACE_STORAGE_CLASS: &str = "CONTROLLER_WORKSPACE_STORAGE_CLASS";
/// Number of workers allowed to run at once.
pub const CONTROLLER_MAX_CONCURRENT_WORKERS: &str = "CONTROLLER_MAX_CONCURRENT_WORKERS";
/// Seconds between project reconciliations.
pub const CONTROLLER_PROJECT_SYNC_INTERVAL_SECS: &str = "CONTROLLER_PROJECT_SYNC_INTERVAL_SECS";
/// Seconds between event status polls.
pub const CONTROLLER_STATUS_POLL_INTERVAL_SECS: &str = "CONTROLLER_STATUS_POLL_INTERVAL_SECS";

/// Errors raised while reading configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A variable was set to a value that could not be parsed.
    #[error("invalid value {value:?} for {variable}: {reason}")]
    Invalid {
        /// Name of the environment variable.
        variable: &'static str,
        /// The rejected value.
        value: String,
        /// Why the value was rejected.
        reason: String,
    },
}

/// Redis broker settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedisConfig {
    /// Connection URL.
    pub url: String,
    /// Prefix for every key the broker writes.
    pub key_prefix: String,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://localhost:6379".to_owned(),
            key_prefix: "brignext:".to_owned(),
        }
    }
}

/// `PostgreSQL` settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Connection URL.
    pub url: String,
    /// Maximum pooled connections.
    pub pool_size: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgres://localhost/brignext".to_owned(),
            pool_size: 10,
        }
    }
}

/// Settings for the worker controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllerConfig {
    /// Worker image used when a worker spec names none.
    pub default_worker_image: String,
    /// Pull policy used when a worker spec names none.
    pub default_worker_image_pull_policy: String,
    /// Storage class of workspace volume claims.
    pub workspace_storage_class: String,
    /// Number of workers allowed to run at once.
    pub max_concurrent_workers: usize,
    /// Interval between project reconciliations.
    pub project_sync_interval: Duration,
    /// Interval between event status polls.
    pub status_poll_interval: Duration,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            default_worker_image: "brigadecore/brignext-worker:latest".to_owned(),
            default_worker_image_pull_policy: "IfNotPresent".to_owned(),
            workspace_storage_class: "nfs".to_owned(),
            max_concurrent_workers: 1,
            project_sync_interval: Duration::from_secs(60),
            status_poll_interval: Duration::from_secs(5),
        }
    }
}

impl ControllerConfig {
    /// Sets the default worker image.
    #[must_use]
    pub fn with_default_worker_image(mut self, image: impl Into<String>) -> Self {
        self.default_worker_image = image.into();
        self
    }

    /// Sets the number of workers allowed to run at once.
    #[must_use]
    pub const fn with_max_concurrent_workers(mut self, workers: usize) -> Self {
        self.max_concurrent_workers = workers;
        self
    }

    /// Sets the interval between project reconciliations.
    #[must_use]
    pub const fn with_project_sync_interval(mut self, interval: Duration) -> Self {
        self.project_sync_interval = interval;
        self
    }

    /// Sets the interval between event status polls.
    #[must_use]
    pub const fn with_status_poll_interval(mut self, interval: Duration) -> Self {
        self.status_poll_interval = interval;
        self
    }
}

/// Complete process configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BrigNextConfig {
    /// Redis broker settings.
    pub redis: RedisConfig,
    /// `PostgreSQL` settings.
    pub database: DatabaseConfig,
    /// Worker controller settings.
    pub controller: ControllerConfig,
}

impl BrigNextConfig {
    /// Reads configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when a numeric variable is malformed
    /// or zero where a positive value is required.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads configuration through `lookup`, which maps a variable name to
    /// its value. Unset and blank variables keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when a numeric variable is malformed
    /// or zero where a positive value is required.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Lookup(lookup);
        let mut config = Self::default();

        if let Some(url) = env.string(REDIS_URL) {
            config.redis.url = url;
        }
        if let Some(prefix) = env.string(REDIS_KEY_PREFIX) {
            config.redis.key_prefix = prefix;
        }
        if let Some(url) = env.string(DATABASE_URL) {
            config.database.url = url;
        }
        if let Some(size) = env.positive::<u32>(DATABASE_POOL_SIZE)? {
            config.database.pool_size = size;
        }
        if let Some(image) = env.string(CONTROLLER_DEFAULT_WORKER_IMAGE) {
            config.controller.default_worker_image = image;
        }
        if let Some(policy) = env.string(CONTROLLER_DEFAULT_WORKER_IMAGE_PULL_POLICY) {
            config.controller.default_worker_image_pull_policy = policy;
        }
        if let Some(class) = env.string(CONTROLLER_WORKSPACE_STORAGE_CLASS) {
            config.controller.workspace_storage_class = class;
        }
        if let Some(workers) = env.positive::<usize>(CONTROLLER_MAX_CONCURRENT_WORKERS)? {
            config.controller.max_concurrent_workers = workers;
        }
        if let Some(secs) = env.positive::<u64>(CONTROLLER_PROJECT_SYNC_INTERVAL_SECS)? {
            config.controller.project_sync_interval = Duration::from_secs(secs);
        }
        if let Some(secs) = env.positive::<u64>(CONTROLLER_STATUS_POLL_INTERVAL_SECS)? {
            config.controller.status_poll_interval = Duration::from_secs(secs);
        }
        Ok(config)
    }
}

struct Lookup<F>(F);

impl<F> Lookup<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn string(&self, variable: &str) -> Option<String> {
        (self.0)(variable)
            .map(|value| value.trim().to_owned())
            .filter(|value| !value.is_empty())
    }

    fn positive<T>(&self, variable: &'static str) -> Result<Option<T>, ConfigError>
    where
        T: FromStr + Default + PartialEq,
        T::Err: std::fmt::Display,
    {
        let Some(raw) = self.string(variable) else {
            return Ok(None);
        };
        let parsed = raw.parse::<T>().map_err(|err| ConfigError::Invalid {
            variable,
            value: raw.clone(),
            reason: err.to_string(),
        })?;
        if parsed == T::default() {
            return Err(ConfigError::Invalid {
                variable,
                value: raw,
                reason: "must be greater than zero".to_owned(),
            });
        }
        Ok(Some(parsed))
    }
}
