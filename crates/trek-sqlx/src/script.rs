//! SQL script operations.

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use sqlx::{Executor, PgConnection, SqliteConnection};
use std::path::{Path, PathBuf};
use trek_core::{BoxError, Operation};

/// A SQL file body, loaded once and run as a single multi-statement batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlScript {
    path: PathBuf,
    sql: String,
    checksum: String,
}

impl SqlScript {
    /// Wrap an in-memory script.
    pub fn new(path: impl Into<PathBuf>, sql: impl Into<String>) -> Self {
        let sql = sql.into();
        let checksum = Self::compute_checksum(&sql);
        Self {
            path: path.into(),
            sql,
            checksum,
        }
    }

    /// Read a script from disk.
    pub fn load(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        let sql = std::fs::read_to_string(path)?;
        Ok(Self::new(path, sql))
    }

    /// Compute checksum for SQL content.
    #[must_use]
    pub fn compute_checksum(sql: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(sql.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Source path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Script body.
    #[must_use]
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Hex SHA-256 of the body.
    #[must_use]
    pub fn checksum(&self) -> &str {
        &self.checksum
    }

    fn label(&self) -> String {
        let name = self
            .path
            .file_name()
            .map_or_else(|| self.path.display().to_string(), |n| n.to_string_lossy().into_owned());
        format!("{name} ({})", &self.checksum[..12])
    }
}

#[async_trait]
impl Operation<PgConnection> for SqlScript {
    async fn run(&self, conn: &mut PgConnection) -> Result<(), BoxError> {
        Executor::execute(conn, sqlx::raw_sql(&self.sql)).await?;
        Ok(())
    }

    fn describe(&self) -> String {
        self.label()
    }
}

#[async_trait]
impl Operation<SqliteConnection> for SqlScript {
    async fn run(&self, conn: &mut SqliteConnection) -> Result<(), BoxError> {
        Executor::execute(conn, sqlx::raw_sql(&self.sql)).await?;
        Ok(())
    }

    fn describe(&self) -> String {
        self.label()
    }
}
