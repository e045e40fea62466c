//! In-memory backend.
//!
//! Keeps the revision log and a list of applied statements behind a shared
//! lock. Scopes work on a private copy; a transactional scope publishes it on
//! commit, a non-transactional one after every call.

use crate::backend::{AppliedRevision, Backend, ScopedExecutor};
use crate::error::BoxError;
use crate::operation::Operation;
use crate::revision::Revision;
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::warn;

/// Connection handed to operations run against a [`MemoryBackend`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryConnection {
    statements: Vec<String>,
}

impl MemoryConnection {
    /// Apply a statement.
    pub fn execute(&mut self, statement: impl Into<String>) {
        self.statements.push(statement.into());
    }

    /// Statements applied so far, oldest first.
    #[must_use]
    pub fn statements(&self) -> &[String] {
        &self.statements
    }
}

/// Operation that applies a fixed statement.
#[derive(Debug, Clone)]
pub struct MemoryStatement(pub String);

impl MemoryStatement {
    /// Shared operation applying `statement`.
    pub fn shared(statement: impl Into<String>) -> Arc<dyn Operation<MemoryConnection>> {
        Arc::new(Self(statement.into()))
    }
}

#[async_trait]
impl Operation<MemoryConnection> for MemoryStatement {
    async fn run(&self, conn: &mut MemoryConnection) -> Result<(), BoxError> {
        conn.execute(self.0.clone());
        Ok(())
    }

    fn describe(&self) -> String {
        self.0.clone()
    }
}

#[derive(Debug, Clone, Default)]
struct MemoryState {
    connection: MemoryConnection,
    records: Vec<AppliedRevision>,
    storage_ready: bool,
}

/// Backend keeping all state in process memory.
#[derive(Debug, Clone)]
pub struct MemoryBackend {
    shared: Arc<Mutex<MemoryState>>,
    transactional: bool,
    reject_records_to: Option<Revision>,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    /// Backend whose scopes are all-or-nothing.
    #[must_use]
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Mutex::new(MemoryState::default())),
            transactional: true,
            reject_records_to: None,
        }
    }

    /// Backend whose scopes persist every call immediately.
    #[must_use]
    pub fn non_transactional() -> Self {
        Self {
            transactional: false,
            ..Self::new()
        }
    }

    /// Make log writes moving to `revision` fail, as a constraint violation would.
    #[must_use]
    pub fn reject_records_to(mut self, revision: impl Into<Revision>) -> Self {
        self.reject_records_to = Some(revision.into());
        self
    }

    /// Committed statements.
    #[must_use]
    pub fn statements(&self) -> Vec<String> {
        self.shared.lock().connection.statements.clone()
    }

    /// Committed log entries.
    #[must_use]
    pub fn records(&self) -> Vec<AppliedRevision> {
        self.shared.lock().records.clone()
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    type Connection = MemoryConnection;
    type Scope = MemoryScope;

    async fn connect(&self) -> Result<Self::Scope, BoxError> {
        if !self.transactional {
            warn!("Memory backend scope is not transactional; failures may leave partial changes");
        }
        let working = self.shared.lock().clone();
        Ok(MemoryScope {
            working,
            shared: Arc::clone(&self.shared),
            transactional: self.transactional,
            reject_records_to: self.reject_records_to.clone(),
        })
    }
}

/// Scope over a [`MemoryBackend`].
#[derive(Debug)]
pub struct MemoryScope {
    shared: Arc<Mutex<MemoryState>>,
    working: MemoryState,
    transactional: bool,
    reject_records_to: Option<Revision>,
}

impl MemoryScope {
    fn autocommit(&self) {
        if !self.transactional {
            *self.shared.lock() = self.working.clone();
        }
    }
}

#[async_trait]
impl ScopedExecutor for MemoryScope {
    type Connection = MemoryConnection;

    async fn ensure_storage_ready(&mut self) -> Result<(), BoxError> {
        self.working.storage_ready = true;
        self.autocommit();
        Ok(())
    }

    async fn current_revision(&mut self) -> Result<Option<Revision>, BoxError> {
        if !self.working.storage_ready {
            return Err("revision log does not exist".into());
        }
        Ok(self.working.records.last().map(|r| r.to_revision.clone()))
    }

    async fn record_migration(&mut self, from: &Revision, to: &Revision) -> Result<(), BoxError> {
        if !self.working.storage_ready {
            return Err("revision log does not exist".into());
        }
        if self.reject_records_to.as_ref() == Some(to) {
            return Err(format!("log entry to {to} rejected").into());
        }
        let id = self.working.records.last().map_or(1, |r| r.id + 1);
        self.working.records.push(AppliedRevision {
            id,
            from_revision: from.clone(),
            to_revision: to.clone(),
            applied_at: Utc::now(),
        });
        self.autocommit();
        Ok(())
    }

    async fn run_operation(
        &mut self,
        operation: &dyn Operation<MemoryConnection>,
    ) -> Result<(), BoxError> {
        let result = operation.run(&mut self.working.connection).await;
        self.autocommit();
        result
    }

    async fn history(&mut self) -> Result<Vec<AppliedRevision>, BoxError> {
        if !self.working.storage_ready {
            return Ok(Vec::new());
        }
        Ok(self.working.records.clone())
    }

    async fn commit(self) -> Result<(), BoxError> {
        *self.shared.lock() = self.working;
        Ok(())
    }

    fn is_transactional(&self) -> bool {
        self.transactional
    }
}
