//! Diesel schema for event persistence.

diesel::table! {
    /// Event records.
    events (id) {
        /// Event identifier.
        id -> Uuid,
        /// Owning project; rows are removed with their project.
        #[max_length = 63]
        project_id -> Varchar,
        /// Event source.
        source -> Varchar,
        /// Event type.
        event_type -> Varchar,
        /// Caller-supplied attributes.
        details -> Jsonb,
        /// Resolved worker specification.
        worker -> Jsonb,
        /// Namespace the worker runs in.
        #[max_length = 63]
        namespace -> Nullable<Varchar>,
        /// Current worker phase.
        #[max_length = 16]
        worker_phase -> Varchar,
        /// When the worker started.
        worker_started -> Nullable<Timestamptz>,
        /// When the worker finished.
        worker_ended -> Nullable<Timestamptz>,
        /// Job statuses keyed by job name.
        job_statuses -> Jsonb,
        /// Creation timestamp.
        created_at -> Timestamptz,
        /// Cancellation timestamp.
        canceled_at -> Nullable<Timestamptz>,
    }
}
