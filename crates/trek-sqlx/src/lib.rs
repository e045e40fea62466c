//! # Trek SQLx
//!
//! PostgreSQL and SQLite backends for trek.
//!
//! This crate provides:
//! - Connection scopes over `sqlx` pools, transactional by default
//! - A revision table per database, optionally schema-qualified
//! - SQL script operations with SHA-256 checksums
//! - Discovery of edge and linear migration files from a directory
//!
//! ## Example
//!
//! ```rust,no_run
//! use trek_sqlx::sqlx::SqliteConnection;
//! use trek_core::{Direction, Migrator, Target};
//! use trek_sqlx::{collect_migrations, BackendConfig, SqliteBackend};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = BackendConfig::builder()
//!         .database_url("sqlite://app.db")
//!         .build()?;
//!
//!     let migrations = collect_migrations::<SqliteConnection>("migrations")?;
//!     let migrator = Migrator::new(SqliteBackend::new(config).await?, migrations);
//!     migrator.migrate(&Target::Head, Direction::Up).await?;
//!
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod collect;
pub mod config;
pub mod error;
pub mod postgres;
pub mod script;
pub mod sqlite;

pub use collect::collect_migrations;
pub use config::{BackendConfig, BackendConfigBuilder, DatabaseType};
pub use error::{BackendError, Result};
pub use postgres::{PgBackend, PgScope};
pub use script::SqlScript;
pub use sqlite::{SqliteBackend, SqliteScope};

/// Re-export sqlx types for convenience
pub use sqlx;
