//! Backend errors.

use std::time::Duration;

/// Result type for backend setup.
pub type Result<T> = std::result::Result<T, BackendError>;

/// Failures raised by the SQL backends.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// A configuration value was rejected.
    #[error("Invalid backend configuration: {0}")]
    InvalidConfig(String),

    /// The URL names no supported database.
    #[error("Cannot infer a database type from {0}")]
    UnsupportedUrl(String),

    /// The pool could not open its first connection.
    #[error("Failed to connect to {url}: {source}")]
    Connect {
        /// Redacted URL.
        url: String,
        /// Driver error.
        #[source]
        source: sqlx::Error,
    },

    /// Another migrator held the lock for longer than `lock_timeout`.
    #[error("Timed out after {timeout:?} waiting for the migration lock on {table}")]
    LockTimeout {
        /// Qualified revision table the lock guards.
        table: String,
        /// Configured wait.
        timeout: Duration,
    },

    /// No pooled connection became available.
    #[error("Connection pool unavailable: {0}")]
    Pool(#[source] sqlx::Error),

    /// Any other driver failure.
    #[error(transparent)]
    Database(sqlx::Error),
}

/// Postgres `lock_not_available`, raised when `lock_timeout` expires.
const LOCK_NOT_AVAILABLE: &str = "55P03";

impl BackendError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    pub(crate) fn connect(url: &str, source: sqlx::Error) -> Self {
        Self::Connect {
            url: crate::config::redact(url),
            source,
        }
    }
}

/// Whether `err` is Postgres giving up on a lock wait.
pub(crate) fn is_lock_timeout(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(e) if e.code().as_deref() == Some(LOCK_NOT_AVAILABLE))
}

impl From<sqlx::Error> for BackendError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => Self::Pool(err),
            other => Self::Database(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_errors_are_separated() {
        assert!(matches!(
            BackendError::from(sqlx::Error::PoolTimedOut),
            BackendError::Pool(_)
        ));
        assert!(matches!(
            BackendError::from(sqlx::Error::RowNotFound),
            BackendError::Database(_)
        ));
        assert!(!is_lock_timeout(&sqlx::Error::RowNotFound));
    }

    #[test]
    fn test_lock_timeout_message() {
        let err = BackendError::LockTimeout {
            table: "public.migrations".to_string(),
            timeout: Duration::from_secs(5),
        };
        assert_eq!(
            err.to_string(),
            "Timed out after 5s waiting for the migration lock on public.migrations"
        );
    }
}
