//! Fatal error taxonomy for simulation runs.

use agora_core::{ArtifactError, ScheduleError};
use agora_env::SetupError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that abort a run or a CLI command.
///
/// Per-action failures never surface here; they are recorded as outcomes
/// in the action log.
#[derive(Debug, Error)]
pub enum SimError {
    /// Invalid scenario, unknown agent type, failed pack setup
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Artifact error: {0}")]
    Artifact(#[from] ArtifactError),

    /// The pack panicked, so the world state is no longer trustworthy
    #[error("Internal error: {0}")]
    Internal(String),
}

impl SimError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Process exit code for a run that failed with this error.
    pub fn exit_code(&self) -> i32 {
        2
    }
}

impl From<SetupError> for SimError {
    fn from(err: SetupError) -> Self {
        Self::Configuration(err.to_string())
    }
}

impl From<ScheduleError> for SimError {
    fn from(err: ScheduleError) -> Self {
        Self::Configuration(err.to_string())
    }
}

pub type SimResult<T> = Result<T, SimError>;
