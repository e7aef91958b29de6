//! Diesel row models for project persistence.

use super::schema::projects;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde_json::Value;

/// Query result row for project records.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = projects)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ProjectRow {
    /// Project identifier.
    pub id: String,
    /// Description.
    pub description: String,
    /// Specification JSON payload.
    pub spec: Value,
    /// Assigned namespace.
    pub namespace: Option<String>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// Insert model for project records.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = projects)]
pub struct NewProjectRow {
    /// Project identifier.
    pub id: String,
    /// Description.
    pub description: String,
    /// Specification JSON payload.
    pub spec: Value,
    /// Assigned namespace.
    pub namespace: Option<String>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}
