//! Ollama Provider Implementation
//!
//! Provides integration with Ollama's local chat API.
//!
//! # Features
//!
//! - Blocking HTTP communication, suited to worker threads
//! - JSON mode for structured answers
//! - Token usage from `prompt_eval_count` / `eval_count`
//! - Errors classified for the engine's retry policy (429, 5xx, timeouts and
//!   connection failures are transient)
//!
//! Retries are not performed here; the engine retries transient failures with
//! backoff around every provider call.
//!
//! # Examples
//!
//! ```no_run
//! use scorecard_llm::OllamaProvider;
//!
//! let provider = OllamaProvider::new("http://localhost:11434", "llama3.1").unwrap();
//! ```

use crate::LlmError;
use scorecard_domain::{Completion, CompletionParams, FinishReason, Message, ModelProvider};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Default Ollama API endpoint
pub const DEFAULT_ENDPOINT: &str = "http://localhost:11434";

/// Default timeout for LLM requests (60 seconds)
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Ollama API provider for local LLM inference
pub struct OllamaProvider {
    endpoint: String,
    model: String,
    client: reqwest::blocking::Client,
}

/// Request body for Ollama chat API
#[derive(Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<&'static str>,
    options: OllamaOptions,
}

#[derive(Serialize)]
struct OllamaOptions {
    temperature: f32,
    num_predict: u32,
}

/// Response from Ollama chat API
#[derive(Deserialize)]
struct OllamaChatResponse {
    message: OllamaMessage,
    #[serde(default)]
    done_reason: Option<String>,
    #[serde(default)]
    prompt_eval_count: u64,
    #[serde(default)]
    eval_count: u64,
}

#[derive(Deserialize)]
struct OllamaMessage {
    content: String,
}

impl OllamaProvider {
    /// Create a new Ollama provider
    ///
    /// # Parameters
    ///
    /// - `endpoint`: Ollama API endpoint (e.g., "http://localhost:11434")
    /// - `model`: Model to use (e.g., "llama3.1", "mistral")
    pub fn new(endpoint: impl Into<String>, model: impl Into<String>) -> Result<Self, LlmError> {
        Self::with_timeout(endpoint, model, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    /// Create a provider with an explicit request timeout
    pub fn with_timeout(
        endpoint: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, LlmError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LlmError::Other(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            model: model.into(),
            client,
        })
    }

    /// Create a new Ollama provider against `http://localhost:11434`
    pub fn default_endpoint(model: impl Into<String>) -> Result<Self, LlmError> {
        Self::new(DEFAULT_ENDPOINT, model)
    }

    fn classify(error: reqwest::Error) -> LlmError {
        if error.is_timeout() {
            LlmError::Timeout(error.to_string())
        } else if error.is_connect() {
            LlmError::Connection(error.to_string())
        } else {
            LlmError::Communication(format!("Request failed: {}", error))
        }
    }
}

fn finish_reason(done_reason: Option<&str>) -> FinishReason {
    match done_reason {
        None | Some("stop") => FinishReason::Stop,
        Some("length") => FinishReason::Length,
        Some("content_filter") => FinishReason::ContentFilter,
        Some(other) => FinishReason::Other(other.to_string()),
    }
}

impl ModelProvider for OllamaProvider {
    type Error = LlmError;

    fn complete(
        &self,
        conversation: &[Message],
        params: &CompletionParams,
    ) -> Result<Completion, Self::Error> {
        let url = format!("{}/api/chat", self.endpoint);
        let body = OllamaChatRequest {
            model: &self.model,
            messages: conversation,
            stream: false,
            format: params.json_mode.then_some("json"),
            options: OllamaOptions {
                temperature: params.temperature,
                num_predict: params.max_tokens,
            },
        };

        let response = self.client.post(&url).json(&body).send().map_err(Self::classify)?;
        let status = response.status();

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(LlmError::ModelNotAvailable(self.model.clone()));
        }
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(LlmError::RateLimitExceeded);
        }
        if !status.is_success() {
            let message = response.text().unwrap_or_else(|_| "Unknown error".to_string());
            return Err(LlmError::Http {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: OllamaChatResponse = response
            .json()
            .map_err(|e| LlmError::InvalidResponse(format!("Failed to parse response: {}", e)))?;

        debug!(
            model = %self.model,
            prompt_tokens = parsed.prompt_eval_count,
            completion_tokens = parsed.eval_count,
            "ollama completion"
        );

        Ok(Completion {
            content: parsed.message.content,
            prompt_tokens: parsed.prompt_eval_count,
            completion_tokens: parsed.eval_count,
            finish_reason: finish_reason(parsed.done_reason.as_deref()),
        })
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scorecard_domain::ProviderFailure;

    #[test]
    fn test_ollama_provider_creation() {
        let provider = OllamaProvider::new("http://localhost:11434/", "llama3.1").unwrap();
        assert_eq!(provider.endpoint, "http://localhost:11434");
        assert_eq!(provider.model_name(), "llama3.1");
    }

    #[test]
    fn test_ollama_provider_default_endpoint() {
        let provider = OllamaProvider::default_endpoint("mistral").unwrap();
        assert_eq!(provider.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(provider.model, "mistral");
    }

    #[test]
    fn test_request_body_shape() {
        let messages = vec![Message::system("s"), Message::user("u")];
        let body = OllamaChatRequest {
            model: "m",
            messages: &messages,
            stream: false,
            format: Some("json"),
            options: OllamaOptions { temperature: 0.0, num_predict: 64 },
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["messages"][1]["role"], "user");
        assert_eq!(json["format"], "json");
        assert_eq!(json["options"]["num_predict"], 64);
    }

    #[test]
    fn test_response_parsing() {
        let parsed: OllamaChatResponse = serde_json::from_str(
            r#"{"message": {"role": "assistant", "content": "{}"}, "done": true,
                "done_reason": "length", "prompt_eval_count": 42, "eval_count": 7}"#,
        )
        .unwrap();
        assert_eq!(parsed.prompt_eval_count, 42);
        assert_eq!(finish_reason(parsed.done_reason.as_deref()), FinishReason::Length);
        assert_eq!(finish_reason(None), FinishReason::Stop);
    }

    #[test]
    #[ignore] // Only run when Ollama is available
    fn test_ollama_complete_integration() {
        let provider = OllamaProvider::default_endpoint("llama3.1").unwrap();
        let reply = provider.complete(
            &[Message::user(r#"Reply with {"answer": "yes"}"#)],
            &CompletionParams::default(),
        );
        if let Ok(reply) = reply {
            assert!(!reply.content.is_empty());
        }
    }

    #[test]
    fn test_ollama_error_handling() {
        // Nothing listens on port 9 (discard) on test machines
        let provider =
            OllamaProvider::with_timeout("http://127.0.0.1:9", "llama3.1", Duration::from_secs(2))
                .unwrap();

        let result = provider.complete(&[Message::user("test")], &CompletionParams::default());
        match result {
            Err(e @ LlmError::Connection(_)) | Err(e @ LlmError::Timeout(_)) => {
                assert!(e.is_transient())
            }
            Err(LlmError::Communication(_)) => {}
            other => panic!("Expected a communication failure, got {:?}", other),
        }
    }
}
