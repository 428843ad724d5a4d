/// Core types shared across the scriptbox pipeline
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Output integrity classification for a captured stream
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum OutputIntegrity {
    #[default]
    #[serde(rename = "complete")]
    Complete,
    #[serde(rename = "truncated_by_collector_limit")]
    TruncatedByCollectorLimit,
    #[serde(rename = "truncated_by_program_close")]
    TruncatedByProgramClose,
    #[serde(rename = "read_error")]
    ReadError,
}

impl OutputIntegrity {
    /// Combine two stream states, keeping the most severe one
    pub fn worst(self, other: OutputIntegrity) -> OutputIntegrity {
        fn rank(state: OutputIntegrity) -> u8 {
            match state {
                OutputIntegrity::Complete => 0,
                OutputIntegrity::TruncatedByProgramClose => 1,
                OutputIntegrity::TruncatedByCollectorLimit => 2,
                OutputIntegrity::ReadError => 3,
            }
        }
        if rank(other) > rank(self) {
            other
        } else {
            self
        }
    }
}

impl std::fmt::Display for OutputIntegrity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputIntegrity::Complete => write!(f, "complete"),
            OutputIntegrity::TruncatedByCollectorLimit => write!(f, "truncated_by_collector_limit"),
            OutputIntegrity::TruncatedByProgramClose => write!(f, "truncated_by_program_close"),
            OutputIntegrity::ReadError => write!(f, "read_error"),
        }
    }
}

/// Custom error types for scriptbox
#[derive(Error, Debug)]
pub enum ScriptboxError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Workspace error: {0}")]
    Workspace(String),

    #[error("Process error: {0}")]
    Process(String),

    #[error("Filesystem error: {0}")]
    Filesystem(String),
}

impl From<nix::errno::Errno> for ScriptboxError {
    fn from(err: nix::errno::Errno) -> Self {
        ScriptboxError::Process(err.to_string())
    }
}

/// Result type alias for scriptbox operations
pub type Result<T> = std::result::Result<T, ScriptboxError>;
