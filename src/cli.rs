//! CLI argument definitions using clap.

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::commands;

/// trek - revision graph migrations for PostgreSQL and SQLite
#[derive(Parser, Debug)]
#[command(name = "trek")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase output verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Connection and discovery options shared by every command.
#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// Database URL (postgres:// or sqlite://)
    #[arg(short = 'd', long, env = "DATABASE_URL", global = true)]
    pub database_url: Option<String>,

    /// Directory holding the migration files
    #[arg(long, env = "TREK_DIR", global = true)]
    pub dir: Option<PathBuf>,

    /// Configuration file (TOML)
    #[arg(short, long, env = "TREK_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Schema for the revision table (PostgreSQL only)
    #[arg(long, global = true)]
    pub schema: Option<String>,

    /// Revision table name
    #[arg(long, global = true)]
    pub table: Option<String>,

    /// Run each statement in autocommit mode (SQLite only)
    #[arg(long, global = true)]
    pub no_transactions: bool,

    /// Skip the advisory lock (PostgreSQL only)
    #[arg(long, global = true)]
    pub no_lock: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show the steps needed to reach a revision without applying them
    Plan(commands::plan::PlanArgs),

    /// Upgrade to a revision (HEAD by default)
    Up(commands::migrate::UpArgs),

    /// Downgrade to a revision
    Down(commands::migrate::DownArgs),

    /// Show the current revision
    Current,

    /// Show the applied-revision log
    History,
}

impl Commands {
    /// Whether the command resolves plans and so needs the migration files.
    pub fn needs_migrations(&self) -> bool {
        matches!(self, Self::Plan(_) | Self::Up(_) | Self::Down(_))
    }
}

impl Cli {
    /// Execute the CLI command.
    pub async fn execute(self) -> Result<()> {
        commands::execute(self.command, &self.global, self.json).await
    }
}
