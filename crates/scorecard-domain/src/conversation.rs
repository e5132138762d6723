//! Conversation and completion types exchanged with model providers

use serde::{Deserialize, Serialize};

/// Speaker of a conversation message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System instructions
    System,
    /// Caller-supplied prompt
    User,
    /// Model reply
    Assistant,
}

/// One message of a conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Speaker
    pub role: Role,
    /// Text content
    pub content: String,
}

impl Message {
    /// System message
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into() }
    }

    /// User message
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    /// Assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }
}

/// Sampling parameters for one completion request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionParams {
    /// Sampling temperature
    pub temperature: f32,

    /// Upper bound on completion tokens
    pub max_tokens: u32,

    /// Ask the provider for a JSON object response
    #[serde(default = "default_json_mode")]
    pub json_mode: bool,
}

fn default_json_mode() -> bool {
    true
}

impl Default for CompletionParams {
    fn default() -> Self {
        Self {
            temperature: 0.0,
            max_tokens: 512,
            json_mode: true,
        }
    }
}

/// Why the provider stopped generating
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// Natural end of the reply
    Stop,
    /// Hit the token limit
    Length,
    /// The provider withheld content
    ContentFilter,
    /// Anything else the provider reports
    Other(String),
}

/// Raw reply of one completion request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Completion {
    /// Text content of the reply; the engine parses it into a structured answer
    pub content: String,

    /// Prompt tokens consumed
    pub prompt_tokens: u64,

    /// Completion tokens produced
    pub completion_tokens: u64,

    /// Stop reason
    pub finish_reason: FinishReason,
}

impl Completion {
    /// Whether the provider filtered the reply
    pub fn is_content_filtered(&self) -> bool {
        self.finish_reason == FinishReason::ContentFilter
    }
}
