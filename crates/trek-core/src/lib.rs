//! # Trek Core
//!
//! Revision graph resolution and transactional migration execution.
//!
//! This crate provides:
//! - Migration edges between named revisions, each carrying an executable operation
//! - Shortest-path resolution from the current revision to a target
//! - Plan execution through a backend's connection scope
//! - An in-memory backend for tests and dry runs
//!
//! Database backends live in `trek-sqlx`.
//!
//! ## Example
//!
//! ```rust
//! use trek_core::{Direction, MemoryBackend, MemoryStatement, Migrations, Migrator, RevisionSpec, Target};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), trek_core::TrekError> {
//! let migrations = Migrations::from_linear(vec![
//!     RevisionSpec::new("1").with_upgrade(MemoryStatement::shared("CREATE TABLE people")),
//! ]);
//! let migrator = Migrator::new(MemoryBackend::new(), migrations);
//! migrator.migrate(&Target::Head, Direction::Up).await?;
//! assert_eq!(migrator.current_revision().await?.as_str(), "1");
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod backend;
pub mod error;
pub mod executor;
pub mod graph;
pub mod memory;
pub mod migration;
pub mod migrator;
pub mod operation;
pub mod plan;
pub mod resolver;
pub mod revision;

pub use backend::{AppliedRevision, Backend, ScopedExecutor};
pub use error::{BoxError, ExecutionPhase, Result, StoragePhase, TrekError};
pub use executor::execute;
pub use graph::RevisionGraph;
pub use memory::{MemoryBackend, MemoryConnection, MemoryScope, MemoryStatement};
pub use migration::{Migration, Migrations, RevisionSpec};
pub use migrator::Migrator;
pub use operation::{FnOperation, Operation};
pub use plan::{Plan, PlannedStep};
pub use resolver::resolve;
pub use revision::{Direction, Revision, Target, HEAD, INITIAL_REVISION};
