//! Capability interface implemented by database backends.

use crate::error::BoxError;
use crate::operation::Operation;
use crate::revision::Revision;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One entry of the applied-revision log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedRevision {
    /// Monotonic log position.
    pub id: i64,
    /// Revision the database moved from.
    pub from_revision: Revision,
    /// Revision the database moved to.
    pub to_revision: Revision,
    /// When the entry was written.
    pub applied_at: DateTime<Utc>,
}

/// Source of connection scopes.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Connection type operations run against.
    type Connection: Send + ?Sized;

    /// Scope handed out by [`Backend::connect`].
    type Scope: ScopedExecutor<Connection = Self::Connection>;

    /// Open a scope. Everything done through it is discarded unless
    /// [`ScopedExecutor::commit`] is called, provided the scope is
    /// transactional.
    async fn connect(&self) -> Result<Self::Scope, BoxError>;
}

/// A connection enclosed by the backend's durability boundary.
#[async_trait]
pub trait ScopedExecutor: Send {
    /// Connection type operations run against.
    type Connection: Send + ?Sized;

    /// Idempotently provision the applied-revision log.
    async fn ensure_storage_ready(&mut self) -> Result<(), BoxError>;

    /// `to_revision` of the newest log entry, `None` when the log is empty.
    async fn current_revision(&mut self) -> Result<Option<Revision>, BoxError>;

    /// Append a log entry.
    async fn record_migration(&mut self, from: &Revision, to: &Revision) -> Result<(), BoxError>;

    /// Run an edge operation on the scoped connection.
    async fn run_operation(&mut self, operation: &dyn Operation<Self::Connection>)
        -> Result<(), BoxError>;

    /// The full log, oldest first.
    async fn history(&mut self) -> Result<Vec<AppliedRevision>, BoxError>;

    /// Make everything done through the scope durable.
    async fn commit(self) -> Result<(), BoxError>;

    /// Whether a failure inside the scope discards every effect made through it.
    ///
    /// Non-transactional scopes only offer per-statement durability.
    fn is_transactional(&self) -> bool;
}
