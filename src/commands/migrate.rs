//! Up and down commands - apply a migration path.

use anyhow::{Context, Result};
use clap::Args;
use trek_core::{Backend, Direction, Migrator, Target};

use crate::commands::plan;
use crate::output::OutputFormat;

/// Arguments for the up command.
#[derive(Args, Debug)]
pub struct UpArgs {
    /// Target revision: HEAD, or a revision id
    #[arg(default_value = "HEAD")]
    pub target: Target,

    /// Dry run - show what would be done
    #[arg(long)]
    pub dry_run: bool,
}

/// Arguments for the down command.
#[derive(Args, Debug)]
pub struct DownArgs {
    /// Target revision: initial, or a revision id
    pub target: Target,

    /// Dry run - show what would be done
    #[arg(long)]
    pub dry_run: bool,
}

/// Execute the up command.
pub async fn up<B: Backend>(args: UpArgs, migrator: &Migrator<B>, format: OutputFormat) -> Result<()> {
    apply(&args.target, Direction::Up, args.dry_run, migrator, format).await
}

/// Execute the down command.
pub async fn down<B: Backend>(
    args: DownArgs,
    migrator: &Migrator<B>,
    format: OutputFormat,
) -> Result<()> {
    apply(&args.target, Direction::Down, args.dry_run, migrator, format).await
}

async fn apply<B: Backend>(
    target: &Target,
    direction: Direction,
    dry_run: bool,
    migrator: &Migrator<B>,
    format: OutputFormat,
) -> Result<()> {
    if dry_run {
        let plan = migrator
            .plan(target, direction)
            .await
            .context("Failed to plan migration")?;
        return plan::report(&plan, false, format);
    }

    let plan = migrator
        .migrate(target, direction)
        .await
        .with_context(|| format!("Failed to {} to {target}", direction.verb()))?;
    plan::report(&plan, true, format)
}
