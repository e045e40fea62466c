//! History command - show the applied-revision log.

use anyhow::{Context, Result};
use trek_core::{Backend, Migrator};

use crate::output::{self, Envelope, OutputFormat};

/// Execute the history command.
pub async fn execute<B: Backend>(migrator: &Migrator<B>, format: OutputFormat) -> Result<()> {
    let history = migrator
        .history()
        .await
        .context("Failed to read revision history")?;

    match format {
        OutputFormat::Json => Envelope::ok(history).emit(),
        OutputFormat::Text => {
            if history.is_empty() {
                output::note("No revisions applied yet");
                return Ok(());
            }
            for entry in &history {
                output::field(
                    &format!("#{}", entry.id),
                    &format!(
                        "{} -> {} ({})",
                        entry.from_revision,
                        entry.to_revision,
                        output::timestamp(&entry.applied_at)
                    ),
                );
            }
            Ok(())
        }
    }
}
