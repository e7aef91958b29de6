//! Diesel row models for event persistence.

use super::schema::events;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde_json::Value;
use uuid::Uuid;

/// Query result row for event records.
#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = events)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct EventRow {
    /// Event identifier.
    pub id: Uuid,
    /// Owning project identifier.
    pub project_id: String,
    /// Event source.
    pub source: String,
    /// Event type.
    pub event_type: String,
    /// Caller-supplied attributes as JSON.
    pub details: Value,
    /// Worker specification as JSON.
    pub worker: Value,
    /// Worker namespace.
    pub namespace: Option<String>,
    /// Worker phase.
    pub worker_phase: String,
    /// Worker start timestamp.
    pub worker_started: Option<DateTime<Utc>>,
    /// Worker end timestamp.
    pub worker_ended: Option<DateTime<Utc>>,
    /// Job statuses as JSON.
    pub job_statuses: Value,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Cancellation timestamp.
    pub canceled_at: Option<DateTime<Utc>>,
}

/// Changeset applied when a worker reports its status.
#[derive(Debug, Clone, AsChangeset)]
#[diesel(table_name = events)]
#[diesel(treat_none_as_null = true)]
pub struct WorkerStatusChangeset {
    /// New phase.
    pub worker_phase: String,
    /// Start timestamp.
    pub worker_started: Option<DateTime<Utc>>,
    /// End timestamp.
    pub worker_ended: Option<DateTime<Utc>>,
}
