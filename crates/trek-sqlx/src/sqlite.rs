//! SQLite backend.

use crate::config::BackendConfig;
use crate::error::{BackendError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::pool::PoolConnection;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Executor, Sqlite, SqliteConnection, SqlitePool, Transaction};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{info, warn};
use trek_core::{AppliedRevision, Backend, BoxError, Operation, Revision, ScopedExecutor};

/// Backend over a SQLite pool.
///
/// With `use_transactions` disabled every statement commits on its own and a
/// failed plan can leave the database between revisions.
#[derive(Debug, Clone)]
pub struct SqliteBackend {
    pool: SqlitePool,
    config: Arc<BackendConfig>,
}

impl SqliteBackend {
    /// Validate `config` and open a pool, creating the database file if needed.
    pub async fn new(config: BackendConfig) -> Result<Self> {
        config.validate()?;
        let options = SqliteConnectOptions::from_str(&config.database_url)?.create_if_missing(true);

        // Each connection to an in-memory database is a database of its own.
        let in_memory = config.database_url.contains(":memory:");
        let mut pool_options = SqlitePoolOptions::new()
            .max_connections(if in_memory { 1 } else { config.max_connections })
            .acquire_timeout(config.connect_timeout);
        if in_memory {
            pool_options = pool_options.idle_timeout(None).max_lifetime(None);
        }

        let pool = pool_options
            .connect_with(options)
            .await
            .map_err(|e| BackendError::connect(&config.database_url, e))?;
        info!(url = %config.database_url, "Connected to SQLite");
        Ok(Self::with_pool(pool, config))
    }

    /// Use an existing pool.
    #[must_use]
    pub fn with_pool(pool: SqlitePool, config: BackendConfig) -> Self {
        Self {
            pool,
            config: Arc::new(config),
        }
    }

    /// The underlying pool.
    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// The backend configuration.
    #[must_use]
    pub fn config(&self) -> &BackendConfig {
        &self.config
    }
}

#[async_trait]
impl Backend for SqliteBackend {
    type Connection = SqliteConnection;
    type Scope = SqliteScope;

    async fn connect(&self) -> std::result::Result<SqliteScope, BoxError> {
        let handle = if self.config.use_transactions {
            Handle::Transaction(self.pool.begin().await.map_err(BackendError::from)?)
        } else {
            warn!("SQLite scope is not transactional; a failed migration may leave partial changes");
            Handle::Autocommit(self.pool.acquire().await.map_err(BackendError::from)?)
        };
        Ok(SqliteScope {
            handle,
            table: self.config.table_name.clone(),
        })
    }
}

enum Handle {
    Transaction(Transaction<'static, Sqlite>),
    Autocommit(PoolConnection<Sqlite>),
}

/// A scope on a [`SqliteBackend`].
pub struct SqliteScope {
    handle: Handle,
    table: String,
}

impl SqliteScope {
    fn conn(&mut self) -> &mut SqliteConnection {
        match &mut self.handle {
            Handle::Transaction(tx) => &mut **tx,
            Handle::Autocommit(conn) => &mut **conn,
        }
    }
}

#[async_trait]
impl ScopedExecutor for SqliteScope {
    type Connection = SqliteConnection;

    async fn ensure_storage_ready(&mut self) -> std::result::Result<(), BoxError> {
        let ddl = format!(
            r"
            CREATE TABLE IF NOT EXISTS {table} (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                from_revision TEXT,
                to_revision TEXT,
                applied_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            );

            CREATE INDEX IF NOT EXISTS {table}_applied_at_idx ON {table}(applied_at);
            ",
            table = self.table,
        );
        Executor::execute(self.conn(), sqlx::raw_sql(&ddl))
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
            .fetch_optional(self.conn())
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
            "INSERT INTO {} (from_revision, to_revision) VALUES (?, ?)",
            self.table
        );
        sqlx::query(&sql)
            .bind(from.as_str())
            .bind(to.as_str())
            .execute(self.conn())
            .await
            .map_err(BackendError::from)?;
        Ok(())
    }

    async fn run_operation(
        &mut self,
        operation: &dyn Operation<SqliteConnection>,
    ) -> std::result::Result<(), BoxError> {
        operation.run(self.conn()).await
    }

    async fn history(&mut self) -> std::result::Result<Vec<AppliedRevision>, BoxError> {
        let sql = format!(
            "SELECT id, from_revision, to_revision, applied_at FROM {} ORDER BY id",
            self.table
        );
        let rows: Vec<(i64, Option<String>, Option<String>, String)> = sqlx::query_as(&sql)
            .fetch_all(self.conn())
            .await
            .map_err(BackendError::from)?;

        let mut history = Vec::with_capacity(rows.len());
        for (id, from, to, applied_at) in rows {
            history.push(AppliedRevision {
                id,
                from_revision: Revision::from_stored(from),
                to_revision: Revision::from_stored(to),
                applied_at: DateTime::parse_from_rfc3339(&applied_at)?.with_timezone(&Utc),
            });
        }
        Ok(history)
    }

    async fn commit(self) -> std::result::Result<(), BoxError> {
        match self.handle {
            Handle::Transaction(tx) => tx.commit().await.map_err(BackendError::from)?,
            Handle::Autocommit(_) => {}
        }
        Ok(())
    }

    fn is_transactional(&self) -> bool {
        matches!(self.handle, Handle::Transaction(_))
    }
}
