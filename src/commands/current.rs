//! Current command - show the current revision.

use anyhow::{Context, Result};
use serde::Serialize;
use trek_core::{Backend, Migrator, Revision};

use crate::output::{self, Envelope, OutputFormat};

/// Current revision output.
#[derive(Debug, Serialize)]
pub struct CurrentOutput {
    pub revision: Revision,
    pub initial: bool,
}

/// Execute the current command.
pub async fn execute<B: Backend>(migrator: &Migrator<B>, format: OutputFormat) -> Result<()> {
    let revision = migrator
        .current_revision()
        .await
        .context("Failed to read current revision")?;

    match format {
        OutputFormat::Json => {
            let initial = revision.is_initial();
            Envelope::ok(CurrentOutput { revision, initial }).emit()
        }
        OutputFormat::Text => {
            if revision.is_initial() {
                output::note("No revisions applied yet");
            } else {
                output::field("Current revision", revision.as_str());
            }
            Ok(())
        }
    }
}
