//! Error types for scheduling

use scorecard_engine::EngineError;
use thiserror::Error;

/// Errors that can occur while resolving and scheduling scores
#[derive(Error, Debug)]
pub enum SchedulerError {
    /// Invalid scheduler or scorecard configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// The configuration source failed
    #[error("Configuration source error: {0}")]
    Source(String),

    /// A requested score does not exist
    #[error("Unknown score: {0}")]
    UnknownScore(String),

    /// A declared dependency cannot be found
    #[error("Score '{score}' depends on '{dependency}', which cannot be resolved")]
    DependencyUnresolved {
        /// Dependent score
        score: String,
        /// Identifier that failed to resolve
        dependency: String,
    },

    /// Scores that cannot be ordered because they depend on each other
    #[error("Dependency cycle involving: {}", .0.join(", "))]
    Cycle(Vec<String>),

    /// Evaluation of a score failed
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// Worker task failed
    #[error("Worker error: {0}")]
    Worker(String),
}

impl From<std::io::Error> for SchedulerError {
    fn from(e: std::io::Error) -> Self {
        SchedulerError::Config(format!("I/O error: {}", e))
    }
}

impl From<toml::de::Error> for SchedulerError {
    fn from(e: toml::de::Error) -> Self {
        SchedulerError::Config(format!("Failed to parse TOML: {}", e))
    }
}
