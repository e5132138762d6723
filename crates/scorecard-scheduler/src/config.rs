//! Configuration for the scheduler

use crate::error::SchedulerError;
use scorecard_engine::EngineConfig;
use serde::{Deserialize, Serialize};

/// Scheduler configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Maximum scores evaluated concurrently
    #[serde(default = "default_score_concurrency")]
    pub score_concurrency: usize,

    /// Levels of transitive dependencies discovered before the graph is cut off
    #[serde(default = "default_max_dependency_depth")]
    pub max_dependency_depth: usize,

    /// Element and decision-tree evaluation settings
    #[serde(default)]
    pub engine: EngineConfig,
}

fn default_score_concurrency() -> usize {
    25
}

fn default_max_dependency_depth() -> usize {
    10
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            score_concurrency: default_score_concurrency(),
            max_dependency_depth: default_max_dependency_depth(),
            engine: EngineConfig::default(),
        }
    }
}

impl SchedulerConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), SchedulerError> {
        if self.score_concurrency == 0 {
            return Err(SchedulerError::Config(
                "score_concurrency must be greater than 0".to_string(),
            ));
        }
        if self.max_dependency_depth == 0 {
            return Err(SchedulerError::Config(
                "max_dependency_depth must be greater than 0".to_string(),
            ));
        }
        self.engine.validate().map_err(SchedulerError::Config)
    }

    /// Load configuration from TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self, SchedulerError> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Serialize configuration to TOML string
    pub fn to_toml(&self) -> Result<String, SchedulerError> {
        toml::to_string_pretty(self)
            .map_err(|e| SchedulerError::Config(format!("Failed to serialize to TOML: {}", e)))
    }
}
