//! [`Backend`] implementation over a Postgres pool.

use async_trait::async_trait;
use sqlx::{Postgres, Transaction as SqlxTransaction};
use weave_core::{Backend, BackendError, Transaction};

use crate::DbPool;

/// Postgres-protocol warehouse backend.
#[derive(Debug, Clone)]
pub struct PgBackend {
    pool: DbPool,
}

impl PgBackend {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

#[async_trait]
impl Backend for PgBackend {
    type Tx = PgTx;

    async fn ping(&self) -> Result<(), BackendError> {
        crate::health_check(&self.pool).await?;
        Ok(())
    }

    async fn begin(&self) -> Result<PgTx, BackendError> {
        let mut tx = self.pool.begin().await?;
        let (pid,): (i32,) = sqlx::query_as("SELECT pg_backend_pid()")
            .fetch_one(&mut *tx)
            .await?;
        Ok(PgTx {
            tx,
            pid,
            pool: self.pool.clone(),
        })
    }
}

/// An open Postgres transaction. Rolled back by sqlx if dropped unfinished.
pub struct PgTx {
    tx: SqlxTransaction<'static, Postgres>,
    /// Server process running this transaction, for `pg_cancel_backend`.
    pid: i32,
    pool: DbPool,
}

impl PgTx {
    pub fn backend_pid(&self) -> i32 {
        self.pid
    }
}

#[async_trait]
impl Transaction for PgTx {
    async fn execute(&mut self, sql: &str) -> Result<(), BackendError> {
        // Simple query protocol: the whole file runs as one batch.
        let conn: &mut sqlx::PgConnection = &mut self.tx;
        let result = sqlx::Executor::execute(conn, sqlx::raw_sql(sql)).await?;
        tracing::debug!(rows_affected = result.rows_affected(), "Statement batch finished");
        Ok(())
    }

    async fn commit(self) -> Result<(), BackendError> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self) -> Result<(), BackendError> {
        self.tx.rollback().await?;
        Ok(())
    }

    /// Cancel the abandoned statement server-side, then roll back.
    ///
    /// Without the cancel, ROLLBACK queues behind the running statement on
    /// the same connection.
    async fn abort(self) -> Result<(), BackendError> {
        let cancelled: Result<(bool,), sqlx::Error> =
            sqlx::query_as("SELECT pg_cancel_backend($1)")
                .bind(self.pid)
                .fetch_one(&self.pool)
                .await;
        match cancelled {
            Ok((true,)) => tracing::debug!(pid = self.pid, "Cancelled running statement"),
            Ok((false,)) => tracing::debug!(pid = self.pid, "No statement left to cancel"),
            Err(e) => tracing::warn!(pid = self.pid, error = %e, "Failed to cancel statement"),
        }

        self.tx.rollback().await?;
        Ok(())
    }
}
