//! Error types for the engine

use thiserror::Error;

/// Errors that can occur while evaluating elements and decision trees
#[derive(Error, Debug)]
pub enum EngineError {
    /// Unknown element, terminal, or inconsistent definition; fatal for the score
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Provider kept failing transiently until the retry budget ran out
    #[error("Transient provider failure after {attempts} attempts: {message}")]
    TransientProvider {
        /// Attempts made, including the first
        attempts: u32,
        /// Last provider error
        message: String,
    },

    /// Provider failed in a way retrying will not fix
    #[error("Provider error: {0}")]
    Provider(String),

    /// Structured answer could not be parsed, even after repair
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// Anything else
    #[error("Evaluation error: {0}")]
    Evaluation(#[from] anyhow::Error),
}

impl From<tokio::task::JoinError> for EngineError {
    fn from(e: tokio::task::JoinError) -> Self {
        EngineError::Evaluation(anyhow::anyhow!("worker task failed: {}", e))
    }
}
