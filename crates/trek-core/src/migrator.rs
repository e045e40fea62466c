//! Migration runner.

use crate::backend::{AppliedRevision, Backend, ScopedExecutor};
use crate::error::{Result, StoragePhase, TrekError};
use crate::executor;
use crate::migration::Migrations;
use crate::plan::Plan;
use crate::resolver;
use crate::revision::{Direction, Revision, Target};
use tracing::{debug, info};

/// Ties an edge collection to a backend.
///
/// Every public method opens exactly one connection scope and commits it
/// only when everything inside succeeded.
pub struct Migrator<B: Backend> {
    backend: B,
    migrations: Migrations<B::Connection>,
}

impl<B: Backend> Migrator<B> {
    /// Create a migrator.
    pub fn new(backend: B, migrations: Migrations<B::Connection>) -> Self {
        debug!(edges = migrations.len(), "Collected migrations");
        Self {
            backend,
            migrations,
        }
    }

    /// The edge collection.
    #[must_use]
    pub fn migrations(&self) -> &Migrations<B::Connection> {
        &self.migrations
    }

    /// The backend.
    #[must_use]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Resolve a plan without applying anything.
    pub async fn plan(&self, target: &Target, direction: Direction) -> Result<Plan<B::Connection>> {
        let mut scope = self.connect().await?;
        let current = read_current(&mut scope).await?;
        let plan = resolver::resolve(&self.migrations, &current, target, direction)?;
        commit(scope).await?;
        log_plan(&plan);
        Ok(plan)
    }

    /// Apply a plan produced by [`Migrator::plan`].
    ///
    /// Fails with [`TrekError::StalePlan`] when the current revision moved
    /// since the plan was resolved.
    pub async fn execute(&self, plan: &Plan<B::Connection>) -> Result<()> {
        if plan.is_empty() {
            info!("No migrations necessary");
            return Ok(());
        }
        let mut scope = self.connect().await?;
        let current = read_current(&mut scope).await?;
        if current != *plan.start() {
            return Err(TrekError::StalePlan {
                expected: plan.start().clone(),
                actual: current,
            });
        }
        executor::execute(plan, &mut scope).await?;
        commit(scope).await?;
        info!(revision = %plan.target(), "Migration complete");
        Ok(())
    }

    /// Resolve and apply inside a single scope.
    pub async fn migrate(
        &self,
        target: &Target,
        direction: Direction,
    ) -> Result<Plan<B::Connection>> {
        let mut scope = self.connect().await?;
        let current = read_current(&mut scope).await?;
        let plan = resolver::resolve(&self.migrations, &current, target, direction)?;
        log_plan(&plan);
        if plan.is_empty() {
            commit(scope).await?;
            return Ok(plan);
        }
        executor::execute(&plan, &mut scope).await?;
        commit(scope).await?;
        info!(revision = %plan.target(), "Migration complete");
        Ok(plan)
    }

    /// The current revision, the initial sentinel when nothing was applied.
    pub async fn current_revision(&self) -> Result<Revision> {
        let mut scope = self.connect().await?;
        let current = read_current(&mut scope).await?;
        commit(scope).await?;
        Ok(current)
    }

    /// The applied-revision log, oldest first.
    pub async fn history(&self) -> Result<Vec<AppliedRevision>> {
        let mut scope = self.connect().await?;
        ensure_ready(&mut scope).await?;
        let history = scope
            .history()
            .await
            .map_err(|e| TrekError::storage(StoragePhase::ReadHistory, e))?;
        commit(scope).await?;
        Ok(history)
    }

    async fn connect(&self) -> Result<B::Scope> {
        self.backend
            .connect()
            .await
            .map_err(|e| TrekError::storage(StoragePhase::Connect, e))
    }
}

async fn ensure_ready<S: ScopedExecutor>(scope: &mut S) -> Result<()> {
    debug!("Creating migrations table");
    scope
        .ensure_storage_ready()
        .await
        .map_err(|e| TrekError::storage(StoragePhase::Provision, e))
}

async fn read_current<S: ScopedExecutor>(scope: &mut S) -> Result<Revision> {
    ensure_ready(scope).await?;
    debug!("Getting current revision");
    let current = scope
        .current_revision()
        .await
        .map_err(|e| TrekError::storage(StoragePhase::ReadCurrent, e))?;
    match current {
        Some(revision) => {
            info!(revision = %revision, "Current revision is {revision}");
            Ok(revision)
        }
        None => {
            info!("No existing revisions found, starting from scratch");
            Ok(Revision::initial())
        }
    }
}

async fn commit<S: ScopedExecutor>(scope: S) -> Result<()> {
    scope
        .commit()
        .await
        .map_err(|e| TrekError::storage(StoragePhase::Commit, e))
}

fn log_plan<C: Send + ?Sized>(plan: &Plan<C>) {
    if plan.is_empty() {
        info!("No migrations necessary");
    } else {
        let verb = match plan.direction() {
            Direction::Up => "Upgrade",
            Direction::Down => "Downgrade",
        };
        info!(steps = plan.len(), "{verb} path calculated: {plan}");
    }
}
