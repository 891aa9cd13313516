//! Error types for the Agora environment abstraction.

use thiserror::Error;

use crate::rng::RngError;

/// Errors raised by an agent's decision logic.
///
/// These never abort a run: the engine isolates them to the agent's turn
/// and records them in the action log.
#[derive(Debug, Error)]
pub enum AgentError {
    /// The agent could not read something it expected from the snapshot
    #[error("Missing world value: {0}")]
    MissingValue(String),

    /// A sampling helper rejected its input
    #[error("Sampling error: {0}")]
    Rng(#[from] RngError),

    /// Any other decision failure
    #[error("Agent failure: {0}")]
    Other(String),
}

impl AgentError {
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }
}

/// Errors raised while constructing agents or initializing a pack.
///
/// Both are configuration-class failures and abort the run before any
/// tick executes.
#[derive(Debug, Error)]
pub enum SetupError {
    /// A parameter was missing or had the wrong shape
    #[error("Invalid parameter '{name}': {reason}")]
    InvalidParam { name: String, reason: String },

    /// Roster names an agent type nobody registered
    #[error("Unknown agent type: {0}")]
    UnknownAgentType(String),

    /// Pack could not build its initial world
    #[error("Pack initialization failed: {0}")]
    PackInit(String),
}

impl SetupError {
    pub fn invalid_param(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidParam {
            name: name.into(),
            reason: reason.into(),
        }
    }
}
