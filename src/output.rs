//! Terminal and JSON reporting.

use anyhow::Result;
use chrono::{DateTime, Utc};
use colored::{ColoredString, Colorize};
use serde::Serialize;

/// How command results are written to stdout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Colored lines for a terminal.
    Text,
    /// One pretty-printed JSON envelope.
    Json,
}

impl OutputFormat {
    /// `Json` when `--json` was given.
    pub fn from_json_flag(json: bool) -> Self {
        if json {
            Self::Json
        } else {
            Self::Text
        }
    }
}

#[derive(Clone, Copy)]
enum Mark {
    Done,
    Note,
    Failed,
}

impl Mark {
    fn glyph(self) -> ColoredString {
        match self {
            Self::Done => "✓".green().bold(),
            Self::Note => "•".cyan().bold(),
            Self::Failed => "✗".red().bold(),
        }
    }
}

/// A finished action.
pub fn done(message: &str) {
    println!("{} {message}", Mark::Done.glyph());
}

/// Neutral information.
pub fn note(message: &str) {
    println!("{} {message}", Mark::Note.glyph());
}

/// A failure, on stderr.
pub fn failed(message: &str) {
    eprintln!("{} {message}", Mark::Failed.glyph());
}

/// An indented `name: value` line.
pub fn field(name: &str, value: &str) {
    println!("    {}: {value}", name.bold());
}

/// One edge of a plan, numbered from 1.
pub fn step(index: usize, edge: &str, operation: &str) {
    println!("  {index:>3}. {} {}", edge.bold(), operation.dimmed());
}

/// Human-readable UTC timestamp.
pub fn timestamp(at: &DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

/// Outcome of a JSON-mode command.
#[derive(Debug, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// The command did what it was asked.
    Ok,
    /// The command failed; `error` says why.
    Error,
}

/// JSON document written for every command under `--json`.
#[derive(Debug, Serialize)]
pub struct Envelope<T: Serialize> {
    /// Outcome.
    pub status: Status,
    /// Command payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    /// Failure description, including its cause chain.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Summary line.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T: Serialize> Envelope<T> {
    /// A successful envelope carrying `data`.
    pub fn ok(data: T) -> Self {
        Self {
            status: Status::Ok,
            data: Some(data),
            error: None,
            message: None,
        }
    }

    /// A failed envelope.
    pub fn err(error: impl Into<String>) -> Self {
        Self {
            status: Status::Error,
            data: None,
            error: Some(error.into()),
            message: None,
        }
    }

    /// Attach a summary line.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Write the envelope to stdout.
    pub fn emit(&self) -> Result<()> {
        println!("{}", serde_json::to_string_pretty(self)?);
        Ok(())
    }
}
