//! `PostgreSQL` store implementation for projects.

use super::{
    models::{NewProjectRow, ProjectRow},
    schema::projects,
};
use crate::project::{
    domain::{
        EventLabels, KubernetesConfig, PersistedProjectData, Project, ProjectId, ProjectSpec,
    },
    ports::{ProjectStore, ProjectStoreError, ProjectStoreResult},
};
use async_trait::async_trait;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::result::{DatabaseErrorKind, Error as DieselError};

/// `PostgreSQL` connection pool type used by project adapters.
pub type ProjectPgPool = Pool<ConnectionManager<PgConnection>>;

/// `PostgreSQL`-backed project store.
///
/// Subscription matching runs in process over the stored specifications so
/// the match rules live in one place.
#[derive(Debug, Clone)]
pub struct PostgresProjectStore {
    pool: ProjectPgPool,
}

impl PostgresProjectStore {
    /// Creates a new store from a `PostgreSQL` connection pool.
    #[must_use]
    pub const fn new(pool: ProjectPgPool) -> Self {
        Self { pool }
    }

    async fn run_blocking<F, T>(&self, f: F) -> ProjectStoreResult<T>
    where
        F: FnOnce(&mut PgConnection) -> ProjectStoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut connection = pool.get().map_err(ProjectStoreError::persistence)?;
            f(&mut connection)
        })
        .await
        .map_err(ProjectStoreError::persistence)?
    }

    async fn load_all(&self) -> ProjectStoreResult<Vec<Project>> {
        self.run_blocking(|connection| {
            let rows = projects::table
                .order(projects::id.asc())
                .select(ProjectRow::as_select())
                .load::<ProjectRow>(connection)
                .map_err(ProjectStoreError::persistence)?;
            rows.into_iter().map(row_to_project).collect()
        })
        .await
    }
}

#[async_trait]
impl ProjectStore for PostgresProjectStore {
    async fn create(&self, project: &Project) -> ProjectStoreResult<()> {
        let project_id = project.id().clone();
        let new_row = to_new_row(project)?;
        self.run_blocking(move |connection| {
            diesel::insert_into(projects::table)
                .values(&new_row)
                .execute(connection)
                .map_err(|err| match err {
                    DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
                        ProjectStoreError::Duplicate(project_id.clone())
                    }
                    _ => ProjectStoreError::persistence(err),
                })?;
            Ok(())
        })
        .await
    }

    async fn list(&self) -> ProjectStoreResult<Vec<Project>> {
        self.load_all().await
    }

    async fn list_subscribed(
        &self,
        source: &str,
        event_type: &str,
        labels: &EventLabels,
    ) -> ProjectStoreResult<Vec<Project>> {
        Ok(self
            .load_all()
            .await?
            .into_iter()
            .filter(|project| project.is_subscribed(source, event_type, labels))
            .collect())
    }

    async fn find_by_id(&self, id: &ProjectId) -> ProjectStoreResult<Option<Project>> {
        let lookup = id.as_str().to_owned();
        self.run_blocking(move |connection| {
            let row = projects::table
                .filter(projects::id.eq(lookup))
                .select(ProjectRow::as_select())
                .first::<ProjectRow>(connection)
                .optional()
                .map_err(ProjectStoreError::persistence)?;
            row.map(row_to_project).transpose()
        })
        .await
    }

    async fn delete(&self, id: &ProjectId) -> ProjectStoreResult<()> {
        let project_id = id.clone();
        self.run_blocking(move |connection| {
            let removed = diesel::delete(projects::table.filter(projects::id.eq(project_id.as_str())))
                .execute(connection)
                .map_err(ProjectStoreError::persistence)?;
            if removed == 0 {
                return Err(ProjectStoreError::NotFound(project_id));
            }
            Ok(())
        })
        .await
    }
}

fn to_new_row(project: &Project) -> ProjectStoreResult<NewProjectRow> {
    let spec = serde_json::to_value(project.spec()).map_err(ProjectStoreError::persistence)?;
    Ok(NewProjectRow {
        id: project.id().as_str().to_owned(),
        description: project.description().to_owned(),
        spec,
        namespace: project.namespace().map(str::to_owned),
        created_at: project.created_at(),
    })
}

fn row_to_project(row: ProjectRow) -> ProjectStoreResult<Project> {
    let ProjectRow {
        id: persisted_id,
        description,
        spec: persisted_spec,
        namespace,
        created_at,
    } = row;

    let id = ProjectId::new(persisted_id).map_err(ProjectStoreError::persistence)?;
    let spec = serde_json::from_value::<ProjectSpec>(persisted_spec)
        .map_err(ProjectStoreError::persistence)?;
    Ok(Project::from_persisted(PersistedProjectData {
        id,
        description,
        spec,
        kubernetes: namespace.map(|value| KubernetesConfig { namespace: value }),
        created_at,
    }))
}
