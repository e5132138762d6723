//! Trait definitions for external interactions
//!
//! These traits define the boundaries between scoring logic and infrastructure.
//! Infrastructure implementations live in other crates.

use crate::conversation::{Completion, CompletionParams, Message};
use crate::definition::ScoreDefinition;

/// Classification of provider failures for retry decisions
pub trait ProviderFailure {
    /// Whether retrying the same request may succeed (timeout, rate limit,
    /// dropped connection)
    fn is_transient(&self) -> bool;
}

/// Trait for model provider operations
///
/// Implemented by the infrastructure layer (scorecard-llm). Calls are blocking;
/// the engine issues them from worker threads.
pub trait ModelProvider {
    /// Error type for provider operations
    type Error: ProviderFailure + std::fmt::Display;

    /// Issue one completion request for a conversation
    fn complete(
        &self,
        conversation: &[Message],
        params: &CompletionParams,
    ) -> Result<Completion, Self::Error>;

    /// Name of the model serving requests
    fn model_name(&self) -> &str;
}

/// Trait for looking up score definitions
///
/// May be backed by local files or a remote API; the scheduler is agnostic to the source.
pub trait ConfigurationSource {
    /// Error type for lookups
    type Error: std::fmt::Display;

    /// Resolve a score of a scorecard by any alias (id, key, external id, name).
    /// Returns `Ok(None)` when no score answers to the identifier.
    fn score_definition(
        &self,
        scorecard: &str,
        identifier: &str,
    ) -> Result<Option<ScoreDefinition>, Self::Error>;
}
