//! Explicit `PostgreSQL` transactions over one pooled connection.

use super::store::{cancel_event, delete_event, EventPgPool};
use crate::event::{
    domain::EventId,
    ports::{EventStoreError, EventStoreResult, EventTransaction},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::connection::{AnsiTransactionManager, TransactionManager};
use diesel::pg::PgConnection;
use diesel::r2d2::{ConnectionManager, PooledConnection};
use std::sync::{Arc, Mutex};

type PgPooled = PooledConnection<ConnectionManager<PgConnection>>;

/// Transaction holding a dedicated connection until commit or rollback.
///
/// Dropping it unfinished leaves the connection mid-transaction; the pool
/// discards such connections on check-in.
pub struct PostgresEventTransaction {
    connection: Arc<Mutex<Option<PgPooled>>>,
}

impl PostgresEventTransaction {
    /// Checks out a connection and issues `BEGIN`. Blocks the caller.
    pub(super) fn open(pool: &EventPgPool) -> EventStoreResult<Self> {
        let mut connection = pool.get().map_err(EventStoreError::persistence)?;
        AnsiTransactionManager::begin_transaction(&mut *connection)
            .map_err(EventStoreError::persistence)?;
        Ok(Self {
            connection: Arc::new(Mutex::new(Some(connection))),
        })
    }

    async fn with_connection<F, T>(&self, f: F) -> EventStoreResult<T>
    where
        F: FnOnce(&mut PgConnection) -> EventStoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let shared = Arc::clone(&self.connection);
        tokio::task::spawn_blocking(move || {
            let mut slot = shared
                .lock()
                .map_err(|err| EventStoreError::persistence(std::io::Error::other(err.to_string())))?;
            let connection = slot.as_mut().ok_or(EventStoreError::TransactionFinished)?;
            f(&mut **connection)
        })
        .await
        .map_err(EventStoreError::persistence)?
    }

    async fn finish<F>(&self, f: F) -> EventStoreResult<()>
    where
        F: FnOnce(&mut PgConnection) -> diesel::QueryResult<()> + Send + 'static,
    {
        let shared = Arc::clone(&self.connection);
        tokio::task::spawn_blocking(move || {
            let mut slot = shared
                .lock()
                .map_err(|err| EventStoreError::persistence(std::io::Error::other(err.to_string())))?;
            let mut connection = slot.take().ok_or(EventStoreError::TransactionFinished)?;
            f(&mut *connection).map_err(EventStoreError::persistence)
        })
        .await
        .map_err(EventStoreError::persistence)?
    }
}

#[async_trait]
impl EventTransaction for PostgresEventTransaction {
    async fn cancel(
        &self,
        id: EventId,
        cancel_running: bool,
        at: DateTime<Utc>,
    ) -> EventStoreResult<bool> {
        self.with_connection(move |connection| {
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
        self.with_connection(move |connection| {
            delete_event(connection, id, delete_pending, delete_running)
                .map_err(EventStoreError::persistence)
        })
        .await
    }

    async fn commit(&self) -> EventStoreResult<()> {
        self.finish(<AnsiTransactionManager as TransactionManager<PgConnection>>::commit_transaction)
            .await
    }

    async fn rollback(&self) -> EventStoreResult<()> {
        self.finish(<AnsiTransactionManager as TransactionManager<PgConnection>>::rollback_transaction)
            .await
    }
}
