//! Trek error types.

use crate::revision::{Direction, Revision};
use std::fmt;

/// Boxed error used at the operation and backend seams.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result type for trek operations.
pub type Result<T> = std::result::Result<T, TrekError>;

/// Storage call that failed outside of an edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoragePhase {
    /// Opening the connection scope.
    Connect,
    /// Provisioning the revision log.
    Provision,
    /// Reading the current revision.
    ReadCurrent,
    /// Reading the revision log.
    ReadHistory,
    /// Committing the connection scope.
    Commit,
}

impl fmt::Display for StoragePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connect => write!(f, "open connection scope"),
            Self::Provision => write!(f, "provision revision log"),
            Self::ReadCurrent => write!(f, "read current revision"),
            Self::ReadHistory => write!(f, "read revision history"),
            Self::Commit => write!(f, "commit connection scope"),
        }
    }
}

/// Step of an edge that failed while applying a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionPhase {
    /// Appending the applied-revision record.
    Record,
    /// Running the edge operation.
    Operation,
}

impl fmt::Display for ExecutionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Record => write!(f, "record"),
            Self::Operation => write!(f, "run"),
        }
    }
}

/// Trek error type.
#[derive(Debug, thiserror::Error)]
pub enum TrekError {
    /// Two edges share the same `(from, to, direction)` key.
    #[error("Duplicate migration {from} -> {to} ({direction})")]
    DuplicateMigration {
        /// Source revision.
        from: Revision,
        /// Destination revision.
        to: Revision,
        /// Direction of both edges.
        direction: Direction,
    },

    /// A current or target identifier is not a node of the revision graph.
    #[error("Unknown revision: {revision}")]
    UnknownRevision {
        /// The offending identifier.
        revision: Revision,
    },

    /// No edges exist to resolve the newest revision from.
    #[error("No revisions available to resolve {direction} target {target}")]
    NoRevisions {
        /// Requested target, as given.
        target: String,
        /// Requested direction.
        direction: Direction,
    },

    /// The graph holds no path between two known revisions.
    #[error("No {direction} path found from {from} to {to}")]
    NoPath {
        /// Starting revision.
        from: Revision,
        /// Target revision.
        to: Revision,
        /// Requested direction.
        direction: Direction,
    },

    /// An edge on the resolved path has no operation body.
    #[error("{}", no_operation_message(.direction, .from, .to))]
    NoOperation {
        /// Source revision of the edge.
        from: Revision,
        /// Destination revision of the edge.
        to: Revision,
        /// Direction of the edge.
        direction: Direction,
    },

    /// The current revision moved between planning and execution.
    #[error("Plan starts at {expected} but the current revision is {actual}")]
    StalePlan {
        /// Revision the plan was resolved from.
        expected: Revision,
        /// Revision found when executing.
        actual: Revision,
    },

    /// A storage call failed outside of an edge.
    #[error("Failed to {phase}: {source}")]
    Storage {
        /// Storage call that failed.
        phase: StoragePhase,
        /// Underlying backend error.
        #[source]
        source: BoxError,
    },

    /// Applying an edge failed.
    #[error("Failed to {phase} {from} -> {to} ({direction}){}: {source}", divergence_note(.operation_applied))]
    Execution {
        /// Source revision of the edge.
        from: Revision,
        /// Destination revision of the edge.
        to: Revision,
        /// Direction of the edge.
        direction: Direction,
        /// Step of the edge that failed.
        phase: ExecutionPhase,
        /// Whether the operation ran and persisted without its record.
        operation_applied: bool,
        /// Underlying error.
        #[source]
        source: BoxError,
    },

    /// Migration discovery failed.
    #[error("Discovery error: {0}")]
    Discovery(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn no_operation_message(direction: &Direction, from: &Revision, to: &Revision) -> String {
    match direction {
        Direction::Up => format!("Cannot upgrade to {to}: revision has no upgrade (edge {from} -> {to})"),
        Direction::Down => format!(
            "Cannot downgrade from {from}: revision has no downgrade (edge {from} -> {to})"
        ),
    }
}

fn divergence_note(operation_applied: &bool) -> &'static str {
    if *operation_applied {
        " after its operation was applied without a transaction; record it manually"
    } else {
        ""
    }
}

impl TrekError {
    /// Create a storage error.
    pub fn storage(phase: StoragePhase, source: impl Into<BoxError>) -> Self {
        Self::Storage {
            phase,
            source: source.into(),
        }
    }

    /// Create a discovery error.
    pub fn discovery(msg: impl Into<String>) -> Self {
        Self::Discovery(msg.into())
    }

    /// Create a config error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Whether the error was raised before any plan was produced.
    #[must_use]
    pub fn is_resolution_error(&self) -> bool {
        matches!(
            self,
            Self::DuplicateMigration { .. }
                | Self::UnknownRevision { .. }
                | Self::NoRevisions { .. }
                | Self::NoPath { .. }
                | Self::NoOperation { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TrekError::UnknownRevision {
            revision: "foo".into(),
        };
        assert_eq!(err.to_string(), "Unknown revision: foo");

        let err = TrekError::NoPath {
            from: "1".into(),
            to: "3".into(),
            direction: Direction::Up,
        };
        assert!(err.to_string().contains("No up path found from 1 to 3"));
    }

    #[test]
    fn test_no_operation_names_revision_and_direction() {
        let err = TrekError::NoOperation {
            from: "2".into(),
            to: "1".into(),
            direction: Direction::Down,
        };
        assert!(err.to_string().starts_with("Cannot downgrade from 2"));

        let err = TrekError::NoOperation {
            from: Revision::initial(),
            to: "1".into(),
            direction: Direction::Up,
        };
        assert!(err.to_string().starts_with("Cannot upgrade to 1"));
    }

    #[test]
    fn test_execution_error_tags_edge() {
        let err = TrekError::Execution {
            from: "1".into(),
            to: "2".into(),
            direction: Direction::Up,
            phase: ExecutionPhase::Operation,
            operation_applied: false,
            source: "syntax error".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("Failed to run 1 -> 2 (up)"));
        assert!(msg.contains("syntax error"));
        assert!(!msg.contains("manually"));
    }

    #[test]
    fn test_resolution_error_classification() {
        assert!(TrekError::NoRevisions {
            target: "HEAD".to_string(),
            direction: Direction::Up,
        }
        .is_resolution_error());
        assert!(!TrekError::config("bad").is_resolution_error());
    }
}
