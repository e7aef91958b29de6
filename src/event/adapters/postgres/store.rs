//! `PostgreSQL` store implementation for events.
//!
//! Phase gates are expressed as `WHERE worker_phase IN (...)` clauses so the
//! database's row locking serializes competing conditional updates.

use super::{
    models::{EventRow, WorkerStatusChangeset},
    schema::events,
    transaction::PostgresEventTransaction,
};
use crate::event::{
    domain::{
        Event, EventDetails, EventDomainError, EventId, EventListFilter, EventStatus, JobStatus,
        PersistedEventData, WorkerPhase, WorkerStatus,
    },
    ports::{EventStore, EventStoreError, EventStoreResult, EventTransaction},
};
use crate::project::domain::{ProjectId, WorkerSpec};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use std::collections::BTreeMap;
use std::sync::Arc;

/// `PostgreSQL` connection pool type used by event adapters.
pub type EventPgPool = Pool<ConnectionManager<PgConnection>>;

/// `PostgreSQL`-backed event store.
#[derive(Debug, Clone)]
pub struct PostgresEventStore {
    pool: EventPgPool,
}

impl PostgresEventStore {
    /// Creates a new store from a `PostgreSQL` connection pool.
    #[must_use]
    pub const fn new(pool: EventPgPool) -> Self {
        Self { pool }
    }

    async fn run_blocking<F, T>(&self, f: F) -> EventStoreResult<T>
    where
        F: FnOnce(&mut PgConnection) -> EventStoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut connection = pool.get().map_err(EventStoreError::persistence)?;
            f(&mut connection)
        })
        .await
        .map_err(EventStoreError::persistence)?
    }
}

#[async_trait]
impl EventStore for PostgresEventStore {
    async fn create(&self, event: &Event) -> EventStoreResult<()> {
        let event_id = event.id();
        let row = to_row(event)?;
        self.run_blocking(move |connection| {
            diesel::insert_into(events::table)
                .values(&row)
                .execute(connection)
                .map_err(|err| match err {
                    DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
                        EventStoreError::Duplicate(event_id)
                    }
                    _ => EventStoreError::persistence(err),
                })?;
            Ok(())
        })
        .await
    }

    async fn find_by_id(&self, id: EventId) -> EventStoreResult<Option<Event>> {
        self.run_blocking(move |connection| {
            let row = events::table
                .filter(events::id.eq(id.into_inner()))
                .select(EventRow::as_select())
                .first::<EventRow>(connection)
                .optional()
                .map_err(EventStoreError::persistence)?;
            row.map(row_to_event).transpose()
        })
        .await
    }

    async fn list(&self, filter: &EventListFilter) -> EventStoreResult<Vec<Event>> {
        let project = filter.project_id().map(|id| id.as_str().to_owned());
        let phases: Vec<&'static str> = filter
            .worker_phases()
            .iter()
            .map(|phase| phase.as_str())
            .collect();
        self.run_blocking(move |connection| {
            let mut query = events::table
                .select(EventRow::as_select())
                .order((events::created_at.desc(), events::id.asc()))
                .into_boxed();
            if let Some(project_id) = project {
                query = query.filter(events::project_id.eq(project_id));
            }
            if !phases.is_empty() {
                query = query.filter(events::worker_phase.eq_any(phases));
            }
            let rows = query
                .load::<EventRow>(connection)
                .map_err(EventStoreError::persistence)?;
            rows.into_iter().map(row_to_event).collect()
        })
        .await
    }

    async fn cancel(
        &self,
        id: EventId,
        cancel_running: bool,
        at: DateTime<Utc>,
    ) -> EventStoreResult<bool> {
        self.run_blocking(move |connection| {
            cancel_event(connection, id, cancel_running, at).map_err(EventStoreError::persistence)
        })
        .await
    }

    async fn delete(
        &self,
        id: EventId,
        delete_pending: bool,
        delete_running: bool,
    ) -> EventStoreResult<bool> {
        self.run_blocking(move |connection| {
            delete_event(connection, id, delete_pending, delete_running)
                .map_err(EventStoreError::persistence)
        })
        .await
    }

    async fn update_worker_status(
        &self,
        id: EventId,
        status: &WorkerStatus,
    ) -> EventStoreResult<()> {
        let next = status.phase;
        let sources: Vec<&'static str> = WorkerPhase::ALL
            .into_iter()
            .filter(|phase| phase.can_transition_to(next))
            .map(WorkerPhase::as_str)
            .collect();
        let changes = WorkerStatusChangeset {
            worker_phase: next.as_str().to_owned(),
            worker_started: status.started,
            worker_ended: status.ended,
        };
        self.run_blocking(move |connection| {
            let updated = diesel::update(
                events::table
                    .filter(events::id.eq(id.into_inner()))
                    .filter(events::worker_phase.eq_any(sources)),
            )
            .set(&changes)
            .execute(connection)
            .map_err(EventStoreError::persistence)?;
            if updated > 0 {
                return Ok(());
            }
            let current = events::table
                .filter(events::id.eq(id.into_inner()))
                .select(events::worker_phase)
                .first::<String>(connection)
                .optional()
                .map_err(EventStoreError::persistence)?
                .ok_or(EventStoreError::NotFound(id))?;
            let from =
                WorkerPhase::try_from(current.as_str()).map_err(EventStoreError::persistence)?;
            Err(EventStoreError::InvalidTransition(
                EventDomainError::InvalidWorkerTransition { from, to: next },
            ))
        })
        .await
    }

    async fn update_job_status(
        &self,
        id: EventId,
        job_name: &str,
        status: &JobStatus,
    ) -> EventStoreResult<()> {
        let mut patch = serde_json::Map::new();
        patch.insert(
            job_name.to_owned(),
            serde_json::to_value(status).map_err(EventStoreError::persistence)?,
        );
        let merged = serde_json::Value::Object(patch);
        self.run_blocking(move |connection| {
            let updated = diesel::update(events::table.filter(events::id.eq(id.into_inner())))
                .set(events::job_statuses.eq(events::job_statuses.concat(merged)))
                .execute(connection)
                .map_err(EventStoreError::persistence)?;
            if updated == 0 {
                return Err(EventStoreError::NotFound(id));
            }
            Ok(())
        })
        .await
    }

    async fn begin(&self) -> EventStoreResult<Arc<dyn EventTransaction>> {
        let pool = self.pool.clone();
        let transaction = tokio::task::spawn_blocking(move || PostgresEventTransaction::open(&pool))
            .await
            .map_err(EventStoreError::persistence)??;
        Ok(Arc::new(transaction))
    }
}

/// Moves a pending event to canceled, or a running one to aborted when
/// allowed. Returns whether a row changed.
pub(super) fn cancel_event(
    connection: &mut PgConnection,
    id: EventId,
    cancel_running: bool,
    at: DateTime<Utc>,
) -> QueryResult<bool> {
    let canceled = gated_cancel(
        connection,
        id,
        &[WorkerPhase::Pending],
        WorkerPhase::Canceled,
        at,
    )?;
    if canceled || !cancel_running {
        return Ok(canceled);
    }
    gated_cancel(
        connection,
        id,
        &[WorkerPhase::Running, WorkerPhase::Unknown],
        WorkerPhase::Aborted,
        at,
    )
}

fn gated_cancel(
    connection: &mut PgConnection,
    id: EventId,
    from: &[WorkerPhase],
    to: WorkerPhase,
    at: DateTime<Utc>,
) -> QueryResult<bool> {
    let sources: Vec<&'static str> = from.iter().map(|phase| phase.as_str()).collect();
    let updated = diesel::update(
        events::table
            .filter(events::id.eq(id.into_inner()))
            .filter(events::worker_phase.eq_any(sources)),
    )
    .set((
        events::worker_phase.eq(to.as_str()),
        events::worker_ended.eq(Some(at)),
        events::canceled_at.eq(Some(at)),
    ))
    .execute(connection)?;
    Ok(updated > 0)
}

/// Removes an event whose phase the flags allow. Returns whether a row was
/// removed.
pub(super) fn delete_event(
    connection: &mut PgConnection,
    id: EventId,
    delete_pending: bool,
    delete_running: bool,
) -> QueryResult<bool> {
    let deletable: Vec<&'static str> = WorkerPhase::ALL
        .into_iter()
        .filter(|phase| match phase {
            WorkerPhase::Pending => delete_pending,
            WorkerPhase::Running | WorkerPhase::Unknown => delete_running,
            _ => phase.is_terminal(),
        })
        .map(WorkerPhase::as_str)
        .collect();
    let removed = diesel::delete(
        events::table
            .filter(events::id.eq(id.into_inner()))
            .filter(events::worker_phase.eq_any(deletable)),
    )
    .execute(connection)?;
    Ok(removed > 0)
}

fn to_row(event: &Event) -> EventStoreResult<EventRow> {
    let status = event.status();
    Ok(EventRow {
        id: event.id().into_inner(),
        project_id: event.project_id().as_str().to_owned(),
        source: event.source().to_owned(),
        event_type: event.event_type().to_owned(),
        details: serde_json::to_value(event.details()).map_err(EventStoreError::persistence)?,
        worker: serde_json::to_value(event.worker()).map_err(EventStoreError::persistence)?,
        namespace: event.namespace().map(str::to_owned),
        worker_phase: status.worker_status.phase.as_str().to_owned(),
        worker_started: status.worker_status.started,
        worker_ended: status.worker_status.ended,
        job_statuses: serde_json::to_value(&status.job_statuses)
            .map_err(EventStoreError::persistence)?,
        created_at: event.created(),
        canceled_at: event.canceled(),
    })
}

fn row_to_event(row: EventRow) -> EventStoreResult<Event> {
    let EventRow {
        id,
        project_id: persisted_project,
        details: persisted_details,
        worker: persisted_worker,
        namespace,
        worker_phase,
        worker_started,
        worker_ended,
        job_statuses: persisted_jobs,
        created_at,
        canceled_at,
        ..
    } = row;

    let project_id = ProjectId::new(persisted_project).map_err(EventStoreError::persistence)?;
    let details = serde_json::from_value::<EventDetails>(persisted_details)
        .map_err(EventStoreError::persistence)?;
    let worker = serde_json::from_value::<WorkerSpec>(persisted_worker)
        .map_err(EventStoreError::persistence)?;
    let phase = WorkerPhase::try_from(worker_phase.as_str()).map_err(EventStoreError::persistence)?;
    let job_statuses = serde_json::from_value::<BTreeMap<String, JobStatus>>(persisted_jobs)
        .map_err(EventStoreError::persistence)?;

    Ok(Event::from_persisted(PersistedEventData {
        id: EventId::from_uuid(id),
        project_id,
        details,
        worker,
        namespace,
        status: EventStatus {
            worker_status: WorkerStatus {
                started: worker_started,
                ended: worker_ended,
                phase,
            },
            job_statuses,
        },
        created: created_at,
        canceled: canceled_at,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::domain::JobPhase;
    use mockable::DefaultClock;

    fn sample_event() -> Event {
        let mut event = Event::pending(
            ProjectId::new("blog").expect("valid id"),
            EventDetails::new("github", "push").with_label("branch", "main"),
            WorkerSpec::default(),
            &DefaultClock,
        )
        .with_namespace("brignext-blog-abc");
        event.replace_job_status(
            "build",
            JobStatus {
                started: None,
                ended: None,
                phase: JobPhase::Running,
            },
        );
        event
    }

    #[test]
    fn rows_round_trip_through_domain_conversion() {
        let event = sample_event();

        let row = to_row(&event).expect("row conversion");

        assert_eq!(row.worker_phase, "PENDING");
        assert_eq!(row.source, "github");
        assert_eq!(row_to_event(row).expect("domain conversion"), event);
    }

    #[test]
    fn unknown_phase_is_a_persistence_error() {
        let mut row = to_row(&sample_event()).expect("row conversion");
        row.worker_phase = "SLEEPING".to_owned();

        assert!(matches!(
            row_to_event(row),
            Err(EventStoreError::Persistence(_))
        ));
    }
}
