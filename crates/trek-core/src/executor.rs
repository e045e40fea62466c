//! Applies a resolved plan through a connection scope.

use crate::backend::ScopedExecutor;
use crate::error::{ExecutionPhase, Result, TrekError};
use crate::plan::{Plan, PlannedStep};
use tracing::{error, info};

/// Apply every step of `plan`, in order, through `scope`.
///
/// In a transactional scope each step is recorded before its operation runs.
/// In a non-transactional scope the operation runs first and is recorded once
/// it succeeded, so the newest log entry names the last operation that ran.
///
/// The first failure stops execution and is returned tagged with the step.
/// Nothing is retried or compensated here.
pub async fn execute<S>(plan: &Plan<S::Connection>, scope: &mut S) -> Result<()>
where
    S: ScopedExecutor,
{
    let transactional = scope.is_transactional();
    for step in plan {
        info!(
            from = %step.from_rev(),
            to = %step.to_rev(),
            direction = %step.direction(),
            operation = %step.operation().describe(),
            "Running {step}"
        );
        if transactional {
            record(scope, step, false).await?;
            run(scope, step).await?;
        } else {
            run(scope, step).await?;
            record(scope, step, true).await?;
        }
        info!("{step} OK");
    }
    Ok(())
}

async fn record<S>(scope: &mut S, step: &PlannedStep<S::Connection>, operation_applied: bool) -> Result<()>
where
    S: ScopedExecutor,
{
    scope
        .record_migration(step.from_rev(), step.to_rev())
        .await
        .map_err(|source| {
            error!(error = %source, "Failed to record {step}");
            TrekError::Execution {
                from: step.from_rev().clone(),
                to: step.to_rev().clone(),
                direction: step.direction(),
                phase: ExecutionPhase::Record,
                operation_applied,
                source,
            }
        })
}

async fn run<S>(scope: &mut S, step: &PlannedStep<S::Connection>) -> Result<()>
where
    S: ScopedExecutor,
{
    scope
        .run_operation(step.operation())
        .await
        .map_err(|source| {
            error!(error = %source, "Failed to run {step}");
            TrekError::Execution {
                from: step.from_rev().clone(),
                to: step.to_rev().clone(),
                direction: step.direction(),
                phase: ExecutionPhase::Operation,
                operation_applied: false,
                source,
            }
        })
}
