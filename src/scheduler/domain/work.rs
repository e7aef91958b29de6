//! Names and message bodies shared by the schedulers and the controller.

use crate::event::domain::EventId;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Name of the secret holding a project's secrets.
pub const PROJECT_SECRETS_NAME: &str = "project-secrets";

/// Service account and role name used by workers.
pub const WORKERS_PRINCIPAL: &str = "workers";

/// Service account and role name used by jobs.
pub const JOBS_PRINCIPAL: &str = "jobs";

/// Key of the event document inside the event secret.
pub const EVENT_DOCUMENT_KEY: &str = "event.json";

/// Key of the worker configuration inside the worker secret.
pub const WORKER_DOCUMENT_KEY: &str = "worker.json";

/// Key of the git SSH private key in project and worker secrets.
pub const GIT_SSH_KEY: &str = "gitSSHKey";

/// Key of the git SSH certificate in project and worker secrets.
pub const GIT_SSH_CERT: &str = "gitSSHCert";

/// Delay before a work message becomes visible, giving the event store
/// write time to land.
pub const WORKER_MESSAGE_DELAY: Duration = Duration::from_secs(5);

/// Returns the name of an event's description secret.
#[must_use]
pub fn event_secret_name(id: EventId) -> String {
    format!("event-{id}")
}

/// Returns the name of an event's worker configuration secret.
#[must_use]
pub fn worker_secret_name(id: EventId) -> String {
    format!("worker-{id}")
}

/// Body of the message announcing that an event's worker may run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerMessage {
    /// The event to run.
    pub event: EventId,
}

impl WorkerMessage {
    /// Creates a message for `event`.
    #[must_use]
    pub const fn new(event: EventId) -> Self {
        Self { event }
    }

    /// Encodes the message as JSON.
    ///
    /// # Errors
    ///
    /// Returns serialization errors.
    pub fn to_body(self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(&self)
    }

    /// Decodes a message body.
    ///
    /// # Errors
    ///
    /// Returns an error when the body is not a JSON object with an `event`
    /// identifier.
    pub fn from_body(body: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(body)
    }
}
