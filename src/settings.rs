//! Settings resolution: flags and environment over the config file over defaults.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use trek_sqlx::{BackendConfig, BackendConfigBuilder};

use crate::cli::GlobalArgs;

/// Default migration directory.
pub const DEFAULT_DIR: &str = "migrations";

/// Contents of a `trek.toml` file.
///
/// ```toml
/// dir = "db/revisions"
///
/// [database]
/// database_url = "postgres://localhost/app"
/// schema = "app"
/// lock_timeout = "30s"
/// ```
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileSettings {
    /// Migration directory.
    pub dir: Option<PathBuf>,
    /// Backend configuration.
    pub database: BackendConfig,
}

impl FileSettings {
    /// Read and parse a settings file.
    pub async fn load(path: &Path) -> Result<Self> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        toml::from_str(&raw).with_context(|| format!("Failed to parse {}", path.display()))
    }
}

/// Fully resolved settings.
#[derive(Debug)]
pub struct Settings {
    /// Migration directory.
    pub dir: PathBuf,
    /// Validated backend configuration.
    pub backend: BackendConfig,
}

impl Settings {
    /// Load the config file named in `args`, if any, and apply the overrides.
    pub async fn load(args: &GlobalArgs) -> Result<Self> {
        let file = match &args.config {
            Some(path) => FileSettings::load(path).await?,
            None => FileSettings::default(),
        };
        Self::resolve(args, file)
    }

    /// Merge `args` over `file`.
    pub fn resolve(args: &GlobalArgs, file: FileSettings) -> Result<Self> {
        let mut backend = file.database;
        if let Some(url) = &args.database_url {
            backend.database_url.clone_from(url);
        }
        if let Some(schema) = &args.schema {
            backend.schema.clone_from(schema);
        }
        if let Some(table) = &args.table {
            backend.table_name.clone_from(table);
        }
        if args.no_transactions {
            backend.use_transactions = false;
        }
        if args.no_lock {
            backend.advisory_lock = false;
        }
        if backend.database_url.is_empty() {
            anyhow::bail!("DATABASE_URL environment variable or --database-url required");
        }

        let backend = BackendConfigBuilder::from_config(backend)
            .build()
            .context("Invalid database configuration")?;
        let dir = args
            .dir
            .clone()
            .or(file.dir)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DIR));
        Ok(Self { dir, backend })
    }
}
