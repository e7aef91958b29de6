//! Diesel schema for project persistence.

diesel::table! {
    /// Project records.
    projects (id) {
        /// Caller-chosen project identifier.
        #[max_length = 63]
        id -> Varchar,
        /// Human-readable description.
        description -> Text,
        /// Worker template and event subscriptions.
        spec -> Jsonb,
        /// Namespace assigned by the projects scheduler.
        #[max_length = 63]
        namespace -> Nullable<Varchar>,
        /// Creation timestamp.
        created_at -> Timestamptz,
    }
}
