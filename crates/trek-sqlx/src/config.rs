//! Backend configuration.
//!
//! A [`BackendConfig`] deserializes from the `[database]` table of a settings
//! file, with durations written in humantime form (`"30s"`, `"2m"`). Fields
//! left out fall back to the defaults below.

use crate::error::{BackendError, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Names that can be interpolated into DDL unquoted.
static IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]{0,62}$").expect("valid identifier pattern"));

const DEFAULT_SCHEMA: &str = "public";
const DEFAULT_TABLE: &str = "migrations";
const DEFAULT_MAX_CONNECTIONS: u32 = 5;
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(60);

/// Supported databases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseType {
    /// PostgreSQL.
    #[serde(alias = "postgres")]
    PostgreSQL,
    /// SQLite.
    SQLite,
}

impl DatabaseType {
    /// Infer the database from a URL scheme.
    #[must_use]
    pub fn from_url(url: &str) -> Option<Self> {
        let (scheme, _) = url.split_once(':')?;
        match scheme {
            "postgres" | "postgresql" => Some(Self::PostgreSQL),
            "sqlite" => Some(Self::SQLite),
            _ => None,
        }
    }

    /// Lowercase name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PostgreSQL => "postgresql",
            Self::SQLite => "sqlite",
        }
    }
}

impl fmt::Display for DatabaseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Connection and revision-table settings shared by both backends.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Connection URL.
    pub database_url: String,

    /// Explicit database; inferred from `database_url` when absent.
    pub database_type: Option<DatabaseType>,

    /// Schema holding the revision table. Ignored by SQLite.
    pub schema: String,

    /// Revision table name.
    pub table_name: String,

    /// How long to wait for the first connection.
    #[serde(with = "humantime_serde")]
    pub connect_timeout: Duration,

    /// Pool size.
    pub max_connections: u32,

    /// Run each scope inside a transaction.
    ///
    /// Only SQLite honours `false`; PostgreSQL scopes are always transactional.
    pub use_transactions: bool,

    /// Serialize concurrent migrators with an advisory lock. PostgreSQL only.
    pub advisory_lock: bool,

    /// How long to wait for the advisory lock.
    #[serde(with = "humantime_serde")]
    pub lock_timeout: Duration,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            database_url: String::new(),
            database_type: None,
            schema: DEFAULT_SCHEMA.to_string(),
            table_name: DEFAULT_TABLE.to_string(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            max_connections: DEFAULT_MAX_CONNECTIONS,
            use_transactions: true,
            advisory_lock: true,
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        }
    }
}

impl BackendConfig {
    /// Start a builder from the defaults.
    #[must_use]
    pub fn builder() -> BackendConfigBuilder {
        BackendConfigBuilder::default()
    }

    /// The explicit database type, or the one named by the URL scheme.
    pub fn resolved_database_type(&self) -> Result<DatabaseType> {
        self.database_type
            .or_else(|| DatabaseType::from_url(&self.database_url))
            .ok_or_else(|| BackendError::UnsupportedUrl(redact(&self.database_url)))
    }

    /// Reject settings no backend can work with.
    pub fn validate(&self) -> Result<()> {
        if self.database_url.is_empty() {
            return Err(BackendError::invalid("database_url is empty"));
        }
        if self.max_connections == 0 {
            return Err(BackendError::invalid("max_connections must be at least 1"));
        }
        check_identifier("table_name", &self.table_name)?;
        check_identifier("schema", &self.schema)?;
        self.resolved_database_type().map(|_| ())
    }

    /// Table name as used in SQL: `schema.table` on PostgreSQL, bare on SQLite.
    #[must_use]
    pub fn full_table_name(&self) -> String {
        match self.resolved_database_type() {
            Ok(DatabaseType::SQLite) => self.table_name.clone(),
            _ => format!("{}.{}", self.schema, self.table_name),
        }
    }
}

fn check_identifier(field: &str, value: &str) -> Result<()> {
    if IDENTIFIER.is_match(value) {
        Ok(())
    } else {
        Err(BackendError::invalid(format!(
            "{field} {value:?} is not a plain SQL identifier"
        )))
    }
}

/// `url` with its password masked.
#[must_use]
pub fn redact(url: &str) -> String {
    let Some((scheme, rest)) = url.split_once("://") else {
        return url.to_string();
    };
    let Some((credentials, host)) = rest.rsplit_once('@') else {
        return url.to_string();
    };
    match credentials.split_once(':') {
        Some((user, _)) => format!("{scheme}://{user}:***@{host}"),
        None => url.to_string(),
    }
}

/// Builds a validated [`BackendConfig`].
#[derive(Debug, Default)]
pub struct BackendConfigBuilder {
    config: BackendConfig,
}

impl BackendConfigBuilder {
    /// Start from `config` instead of the defaults.
    #[must_use]
    pub fn from_config(config: BackendConfig) -> Self {
        Self { config }
    }

    /// Connection URL.
    #[must_use]
    pub fn database_url(mut self, url: impl Into<String>) -> Self {
        self.config.database_url = url.into();
        self
    }

    /// Explicit database type.
    #[must_use]
    pub fn database_type(mut self, database_type: DatabaseType) -> Self {
        self.config.database_type = Some(database_type);
        self
    }

    /// Schema for the revision table.
    #[must_use]
    pub fn schema(mut self, schema: impl Into<String>) -> Self {
        self.config.schema = schema.into();
        self
    }

    /// Revision table name.
    #[must_use]
    pub fn table_name(mut self, table_name: impl Into<String>) -> Self {
        self.config.table_name = table_name.into();
        self
    }

    /// First-connection timeout.
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    /// Pool size.
    #[must_use]
    pub fn max_connections(mut self, max: u32) -> Self {
        self.config.max_connections = max;
        self
    }

    /// Transactional scopes on or off.
    #[must_use]
    pub fn use_transactions(mut self, enabled: bool) -> Self {
        self.config.use_transactions = enabled;
        self
    }

    /// Advisory lock on or off.
    #[must_use]
    pub fn advisory_lock(mut self, enabled: bool) -> Self {
        self.config.advisory_lock = enabled;
        self
    }

    /// Advisory lock wait.
    #[must_use]
    pub fn lock_timeout(mut self, timeout: Duration) -> Self {
        self.config.lock_timeout = timeout;
        self
    }

    /// Validate and pin the database type.
    pub fn build(self) -> Result<BackendConfig> {
        let mut config = self.config;
        config.validate()?;
        config.database_type = Some(config.resolved_database_type()?);
        Ok(config)
    }
}
