//! CLI commands module.

pub mod current;
pub mod history;
pub mod migrate;
pub mod plan;

use anyhow::{Context, Result};
use std::path::Path;
use tracing::debug;
use trek_core::{Backend, Migrations, Migrator, Operation};
use trek_sqlx::config::redact;
use trek_sqlx::sqlx::{PgConnection, SqliteConnection};
use trek_sqlx::{collect_migrations, DatabaseType, PgBackend, SqlScript, SqliteBackend};

use crate::cli::{Commands, GlobalArgs};
use crate::output::{self, Envelope, OutputFormat};
use crate::settings::Settings;

/// Execute a command and report a failure in the requested format.
pub async fn execute(command: Commands, global: &GlobalArgs, json: bool) -> Result<()> {
    let format = OutputFormat::from_json_flag(json);
    let result = dispatch(command, global, format).await;
    if let Err(e) = &result {
        match format {
            OutputFormat::Json => Envelope::<()>::err(format!("{e:#}")).emit()?,
            OutputFormat::Text => output::failed(&format!("{e:#}")),
        }
    }
    result
}

async fn dispatch(command: Commands, global: &GlobalArgs, format: OutputFormat) -> Result<()> {
    let settings = Settings::load(global).await?;
    let database_type = settings.backend.resolved_database_type()?;
    debug!(
        dir = %settings.dir.display(),
        database = %redact(&settings.backend.database_url),
        %database_type,
        "Resolved settings"
    );

    match database_type {
        DatabaseType::PostgreSQL => {
            let migrations = load_migrations::<PgConnection>(&command, &settings.dir)?;
            let backend = PgBackend::new(settings.backend)
                .await
                .context("Failed to connect")?;
            run(command, &Migrator::new(backend, migrations), format).await
        }
        DatabaseType::SQLite => {
            let migrations = load_migrations::<SqliteConnection>(&command, &settings.dir)?;
            let backend = SqliteBackend::new(settings.backend)
                .await
                .context("Failed to connect")?;
            run(command, &Migrator::new(backend, migrations), format).await
        }
    }
}

fn load_migrations<C>(command: &Commands, dir: &Path) -> Result<Migrations<C>>
where
    C: Send + ?Sized,
    SqlScript: Operation<C>,
{
    if !command.needs_migrations() {
        return Ok(Migrations::new());
    }
    collect_migrations(dir)
        .with_context(|| format!("Failed to collect migrations from {}", dir.display()))
}

async fn run<B: Backend>(
    command: Commands,
    migrator: &Migrator<B>,
    format: OutputFormat,
) -> Result<()> {
    match command {
        Commands::Plan(args) => plan::execute(args, migrator, format).await,
        Commands::Up(args) => migrate::up(args, migrator, format).await,
        Commands::Down(args) => migrate::down(args, migrator, format).await,
        Commands::Current => current::execute(migrator, format).await,
        Commands::History => history::execute(migrator, format).await,
    }
}
