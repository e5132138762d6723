//! Configuration for the engine

use scorecard_domain::{CompletionParams, ModelPricing};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Retry policy for transient provider failures
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts per provider call, including the first
    pub max_attempts: u32,

    /// Delay before the first retry (milliseconds); doubles per attempt
    pub base_delay_ms: u64,

    /// Upper bound on a single delay (milliseconds)
    pub max_delay_ms: u64,

    /// Randomize each delay within [delay/2, delay]
    #[serde(default = "default_jitter")]
    pub jitter: bool,
}

fn default_jitter() -> bool {
    true
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_ms: 500,
            max_delay_ms: 10_000,
            jitter: true,
        }
    }
}

impl RetryConfig {
    /// Delay cap as a Duration
    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }
}

/// Configuration for element and decision-tree evaluation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Maximum chunk evaluations in flight per element
    pub chunk_concurrency: usize,

    /// Chunk size used when a score does not set one (bytes)
    pub default_max_chunk_size: usize,

    /// Delimiter preferred for chunk boundaries
    pub chunk_delimiter: String,

    /// System prompt prepended to every conversation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,

    /// Retry policy for transient provider failures
    #[serde(default)]
    pub retry: RetryConfig,

    /// Prices used for the cost ledger
    #[serde(default)]
    pub pricing: ModelPricing,

    /// Sampling parameters for every completion
    #[serde(default)]
    pub completion: CompletionParams,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            chunk_concurrency: 20,
            default_max_chunk_size: 5_000,
            chunk_delimiter: "\n".to_string(),
            system_prompt: None,
            retry: RetryConfig::default(),
            pricing: ModelPricing::default(),
            completion: CompletionParams::default(),
        }
    }
}

impl EngineConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.chunk_concurrency == 0 {
            return Err("chunk_concurrency must be greater than 0".to_string());
        }
        if self.default_max_chunk_size == 0 {
            return Err("default_max_chunk_size must be greater than 0".to_string());
        }
        if self.chunk_delimiter.is_empty() {
            return Err("chunk_delimiter must not be empty".to_string());
        }
        if self.retry.max_attempts == 0 {
            return Err("retry.max_attempts must be greater than 0".to_string());
        }
        if self.retry.base_delay_ms > self.retry.max_delay_ms {
            return Err("retry.base_delay_ms cannot exceed retry.max_delay_ms".to_string());
        }
        if self.pricing.input_cost_per_million < 0.0 || self.pricing.output_cost_per_million < 0.0 {
            return Err("pricing must not be negative".to_string());
        }
        Ok(())
    }

    /// Load configuration from TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self, String> {
        toml::from_str(toml_str).map_err(|e| format!("Failed to parse TOML: {}", e))
    }

    /// Serialize configuration to TOML string
    pub fn to_toml(&self) -> Result<String, String> {
        toml::to_string_pretty(self).map_err(|e| format!("Failed to serialize to TOML: {}", e))
    }
}
