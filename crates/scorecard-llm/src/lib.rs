//! Scorecard LLM Provider Layer
//!
//! Pluggable implementations of the `ModelProvider` trait from `scorecard-domain`.
//!
//! # Providers
//!
//! - `MockProvider`: Deterministic, scripted mock for testing
//! - `OllamaProvider`: Local Ollama chat API integration
//!
//! # Examples
//!
//! ```
//! use scorecard_llm::MockProvider;
//! use scorecard_domain::{CompletionParams, Message, ModelProvider};
//!
//! let provider = MockProvider::new(r#"{"answer": "no"}"#);
//! provider.add_response("greet", r#"{"answer": "yes"}"#);
//!
//! let reply = provider
//!     .complete(&[Message::user("Did the agent greet the caller?")], &CompletionParams::default())
//!     .unwrap();
//! assert_eq!(reply.content, r#"{"answer": "yes"}"#);
//! ```

#![warn(missing_docs)]

pub mod mock;
pub mod ollama;

use scorecard_domain::ProviderFailure;
use thiserror::Error;

pub use mock::MockProvider;
pub use ollama::OllamaProvider;

/// Errors that can occur during LLM operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LlmError {
    /// Request timed out
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// Could not reach the provider
    #[error("Connection error: {0}")]
    Connection(String),

    /// Rate limit exceeded
    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    /// Provider answered with an HTTP error status
    #[error("HTTP {status}: {message}")]
    Http {
        /// Status code
        status: u16,
        /// Response body or reason
        message: String,
    },

    /// Network or API communication error
    #[error("Communication error: {0}")]
    Communication(String),

    /// Invalid response from LLM
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Model not available
    #[error("Model not available: {0}")]
    ModelNotAvailable(String),

    /// Generic error
    #[error("LLM error: {0}")]
    Other(String),
}

impl ProviderFailure for LlmError {
    fn is_transient(&self) -> bool {
        match self {
            LlmError::Timeout(_) | LlmError::Connection(_) | LlmError::RateLimitExceeded => true,
            LlmError::Http { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(LlmError::Timeout("30s".into()).is_transient());
        assert!(LlmError::Connection("refused".into()).is_transient());
        assert!(LlmError::RateLimitExceeded.is_transient());
        assert!(LlmError::Http { status: 503, message: "busy".into() }.is_transient());

        assert!(!LlmError::Http { status: 400, message: "bad".into() }.is_transient());
        assert!(!LlmError::ModelNotAvailable("m".into()).is_transient());
        assert!(!LlmError::InvalidResponse("x".into()).is_transient());
        assert!(!LlmError::Other("x".into()).is_transient());
    }
}
