//! Core error types for cyclotrips.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// ============================================================================
// Failure Kind
// ============================================================================

/// Coarse classification of a pipeline failure.
///
/// Every error type in the workspace maps onto exactly one kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The provider rejected the credentials or the session is not logged in.
    Auth,
    /// Network-level failure (timeout, DNS, connection refused).
    Transport,
    /// The response body had an unrecognized envelope.
    Shape,
    /// Non-success HTTP status that is not an authentication rejection.
    Status,
    /// A single trip record could not be normalized.
    Record,
    /// The dataset could not be read or written.
    Io,
    /// Browser automation failed (driver, session, element lookup).
    Automation,
    /// Missing or invalid configuration.
    Config,
}

impl FailureKind {
    /// Returns a short human-readable label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Auth => "authentication",
            Self::Transport => "transport",
            Self::Shape => "response shape",
            Self::Status => "HTTP status",
            Self::Record => "record",
            Self::Io => "I/O",
            Self::Automation => "browser automation",
            Self::Config => "configuration",
        }
    }

    /// Returns true if a failure of this kind aborts the run.
    ///
    /// Record failures are recovered locally by dropping the record.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::Record)
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ============================================================================
// Core Error
// ============================================================================

/// Core error type for cyclotrips operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A raw trip record could not be mapped to the output schema.
    #[error("Invalid trip record at index {index}: {reason}")]
    InvalidRecord {
        /// Position of the record in the provider response.
        index: usize,
        /// What was wrong with it.
        reason: String,
    },

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CoreError {
    /// Returns the failure classification for this error.
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            Self::InvalidRecord { .. } => FailureKind::Record,
            Self::InvalidConfig(_) => FailureKind::Config,
            Self::Serialization(_) => FailureKind::Shape,
        }
    }
}
