//! Plan command - resolve a migration path without applying it.

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;
use trek_core::{Backend, Direction, Migrator, Plan, Revision, Target};

use crate::output::{self, Envelope, OutputFormat};

/// Arguments for the plan command.
#[derive(Args, Debug)]
pub struct PlanArgs {
    /// Target revision: HEAD, initial, or a revision id
    pub target: Target,

    /// Plan a downgrade instead of an upgrade
    #[arg(long)]
    pub down: bool,
}

/// Plan output.
#[derive(Debug, Serialize)]
pub struct PlanOutput {
    pub start: Revision,
    pub target: Revision,
    pub direction: Direction,
    pub applied: bool,
    pub steps: Vec<StepOutput>,
}

/// One plan step.
#[derive(Debug, Serialize)]
pub struct StepOutput {
    pub from: Revision,
    pub to: Revision,
    pub operation: String,
}

impl PlanOutput {
    fn new<C: Send + ?Sized>(plan: &Plan<C>, applied: bool) -> Self {
        Self {
            start: plan.start().clone(),
            target: plan.target().clone(),
            direction: plan.direction(),
            applied,
            steps: plan
                .iter()
                .map(|step| StepOutput {
                    from: step.from_rev().clone(),
                    to: step.to_rev().clone(),
                    operation: step.operation().describe(),
                })
                .collect(),
        }
    }
}

/// Execute the plan command.
pub async fn execute<B: Backend>(
    args: PlanArgs,
    migrator: &Migrator<B>,
    format: OutputFormat,
) -> Result<()> {
    let direction = if args.down {
        Direction::Down
    } else {
        Direction::Up
    };
    let plan = migrator
        .plan(&args.target, direction)
        .await
        .context("Failed to plan migration")?;
    report(&plan, false, format)
}

fn title(direction: Direction) -> &'static str {
    match direction {
        Direction::Up => "Upgrade",
        Direction::Down => "Downgrade",
    }
}

/// Print a plan, either as resolved or as just applied.
pub fn report<C: Send + ?Sized>(plan: &Plan<C>, applied: bool, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            let envelope = Envelope::ok(PlanOutput::new(plan, applied));
            if applied {
                envelope
                    .with_message(format!("{} complete", title(plan.direction())))
                    .emit()
            } else {
                envelope.emit()
            }
        }
        OutputFormat::Text => {
            if plan.is_empty() {
                output::done(&format!("Already at {}, nothing to do", plan.target()));
                return Ok(());
            }
            let title = title(plan.direction());
            if applied {
                output::done(&format!("{title} complete: {plan}"));
            } else {
                output::note(&format!(
                    "{title} plan ({} step(s)): {plan}",
                    plan.len()
                ));
            }
            for (i, step) in plan.iter().enumerate() {
                output::step(i + 1, &step.to_string(), &step.operation().describe());
            }
            Ok(())
        }
    }
}
