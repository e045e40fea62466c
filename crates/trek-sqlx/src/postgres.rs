//! PostgreSQL backend.
//!
//! Every scope is a `SERIALIZABLE` transaction. With `advisory_lock` enabled
//! the scope also takes a transaction-level advisory lock keyed on the
//! revision table before touching it. Concurrent migrators wait on the lock
//! for at most `lock_timeout`.

use crate::config::{redact, BackendConfig};
use crate::error::{is_lock_timeout, BackendError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use sqlx::postgres::PgPoolOptions;
use sqlx::{Executor, PgConnection, PgPool, Postgres, Transaction};
use std::sync::Arc;
use tracing::{debug, info};
use trek_core::{AppliedRevision, Backend, BoxError, Operation, Revision, ScopedExecutor};

/// Backend over a PostgreSQL pool.
#[derive(Debug, Clone)]
pub struct PgBackend {
    pool: PgPool,
    config: Arc<BackendConfig>,
}

impl PgBackend {
    /// Validate `config` and open a pool.
    pub async fn new(config: BackendConfig) -> Result<Self> {
        config.validate()?;
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.connect_timeout)
            .connect(&config.database_url)
            .await
            .map_err(|e| BackendError::connect(&config.database_url, e))?;
        info!(url = %redact(&config.database_url), "Connected to PostgreSQL");
        Ok(Self::with_pool(pool, config))
    }

    /// Use an existing pool.
    #[must_use]
    pub fn with_pool(pool: PgPool, config: BackendConfig) -> Self {
        Self {
            pool,
            config: Arc::new(config),
        }
    }

    /// The underlying pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// The backend configuration.
    #[must_use]
    pub fn config(&self) -> &BackendConfig {
        &self.config
    }

    async fn acquire_lock(&self, tx: &mut PgConnection, table: &str) -> Result<()> {
        let key = lock_key(table);
        debug!(table, key, "Acquiring migration lock");
        let timeout = format!(
            "SET LOCAL lock_timeout = '{}ms'",
            self.config.lock_timeout.as_millis()
        );
        sqlx::query(&timeout).execute(&mut *tx).await?;
        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(key)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                if is_lock_timeout(&e) {
                    BackendError::LockTimeout {
                        table: table.to_string(),
                        timeout: self.config.lock_timeout,
                    }
                } else {
                    BackendError::from(e)
                }
            })?;
        // Scripts run under the session default.
        sqlx::query("SET LOCAL lock_timeout TO DEFAULT")
            .execute(&mut *tx)
            .await?;
        Ok(())
    }
}

/// Advisory lock key derived from the qualified table name.
fn lock_key(table: &str) -> i64 {
    let digest = Sha256::digest(format!("trek:{table}").as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    i64::from_be_bytes(bytes)
}

#[async_trait]
impl Backend for PgBackend {
    type Connection = PgConnection;
    type Scope = PgScope;

    async fn connect(&self) -> std::result::Result<PgScope, BoxError> {
        let mut tx = self.pool.begin().await.map_err(BackendError::from)?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE")
            .execute(&mut *tx)
            .await
            .map_err(BackendError::from)?;

        let table = self.config.full_table_name();
        if self.config.advisory_lock {
            self.acquire_lock(&mut tx, &table).await?;
        }

        Ok(PgScope {
            tx,
            schema: self.config.schema.clone(),
            index: format!("{}_applied_at_idx", self.config.table_name),
            table,
        })
    }
}

/// A transaction on a [`PgBackend`].
pub struct PgScope {
    tx: Transaction<'static, Postgres>,
    schema: String,
    table: String,
    index: String,
}

#[async_trait]
impl ScopedExecutor for PgScope {
    type Connection = PgConnection;

    async fn ensure_storage_ready(&mut self) -> std::result::Result<(), BoxError> {
        let ddl = format!(
            r"
            CREATE SCHEMA IF NOT EXISTS {schema};

            CREATE TABLE IF NOT EXISTS {table} (
                id BIGSERIAL PRIMARY KEY,
                from_revision TEXT,
                to_revision TEXT,
                applied_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            );

            CREATE INDEX IF NOT EXISTS {index} ON {table}(applied_at);
            ",
            schema = self.schema,
            table = self.table,
            index = self.index,
        );
        Executor::execute(&mut *self.tx, sqlx::raw_sql(&ddl))
            .await
            .map_err(BackendError::from)?;
        Ok(())
    }

    async fn current_revision(&mut self) -> std::result::Result<Option<Revision>, BoxError> {
        let sql = format!(
            "SELECT to_revision FROM {} ORDER BY id DESC LIMIT 1",
            self.table
        );
        let row: Option<(Option<String>,)> = sqlx::query_as(&sql)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(BackendError::from)?;
        Ok(row.map(|(to,)| Revision::from_stored(to)))
    }

    async fn record_migration(
        &mut self,
        from: &Revision,
        to: &Revision,
    ) -> std::result::Result<(), BoxError> {
        let sql = format!(
            "INSERT INTO {} (from_revision, to_revision) VALUES ($1, $2)",
            self.table
        );
        sqlx::query(&sql)
            .bind(from.as_str())
            .bind(to.as_str())
            .execute(&mut *self.tx)
            .await
            .map_err(BackendError::from)?;
        Ok(())
    }

    async fn run_operation(
        &mut self,
        operation: &dyn Operation<PgConnection>,
    ) -> std::result::Result<(), BoxError> {
        operation.run(&mut *self.tx).await
    }

    async fn history(&mut self) -> std::result::Result<Vec<AppliedRevision>, BoxError> {
        let sql = format!(
            "SELECT id, from_revision, to_revision, applied_at FROM {} ORDER BY id",
            self.table
        );
        let rows: Vec<(i64, Option<String>, Option<String>, DateTime<Utc>)> =
            sqlx::query_as(&sql)
                .fetch_all(&mut *self.tx)
                .await
                .map_err(BackendError::from)?;
        Ok(rows
            .into_iter()
            .map(|(id, from, to, applied_at)| AppliedRevision {
                id,
                from_revision: Revision::from_stored(from),
                to_revision: Revision::from_stored(to),
                applied_at,
            })
            .collect())
    }

    async fn commit(self) -> std::result::Result<(), BoxError> {
        self.tx.commit().await.map_err(BackendError::from)?;
        Ok(())
    }

    fn is_transactional(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_key_is_stable_per_table() {
        assert_eq!(lock_key("public.migrations"), lock_key("public.migrations"));
        assert_ne!(lock_key("public.migrations"), lock_key("app.migrations"));
    }
}
