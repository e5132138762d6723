//! Deterministic mock provider
//!
//! Replies are scripted by substring of the last user message; the first matching
//! rule wins, otherwise the default response is returned. No network calls are made.

use crate::LlmError;
use scorecard_domain::{Completion, CompletionParams, FinishReason, Message, ModelProvider, Role};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

/// Default token usage reported for every call
pub const DEFAULT_USAGE: (u64, u64) = (100, 20);

#[derive(Debug, Clone)]
enum MockReply {
    Content(String),
    Filtered,
    Error(LlmError),
}

#[derive(Debug, Clone)]
struct MockRule {
    pattern: String,
    reply: MockReply,
    delay: Option<Duration>,
    transient_failures: usize,
}

/// Mock LLM provider for deterministic testing
///
/// # Examples
///
/// ```
/// use scorecard_llm::MockProvider;
/// use scorecard_domain::{CompletionParams, Message, ModelProvider};
///
/// let provider = MockProvider::new("fallback");
/// provider.add_response("refund", "refund reply");
///
/// let params = CompletionParams::default();
/// let reply = provider.complete(&[Message::user("about the refund")], &params).unwrap();
/// assert_eq!(reply.content, "refund reply");
/// assert_eq!(provider.complete(&[Message::user("other")], &params).unwrap().content, "fallback");
/// assert_eq!(provider.call_count(), 2);
/// ```
#[derive(Debug, Clone)]
pub struct MockProvider {
    default_response: String,
    rules: Arc<Mutex<Vec<MockRule>>>,
    conversations: Arc<Mutex<Vec<Vec<Message>>>>,
    usage: (u64, u64),
    model: String,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MockProvider {
    /// Create a new MockProvider with a fixed response for all prompts
    pub fn new(response: impl Into<String>) -> Self {
        Self {
            default_response: response.into(),
            rules: Arc::new(Mutex::new(Vec::new())),
            conversations: Arc::new(Mutex::new(Vec::new())),
            usage: DEFAULT_USAGE,
            model: "mock".to_string(),
        }
    }

    /// Report fixed token usage for every call
    pub fn with_usage(mut self, prompt_tokens: u64, completion_tokens: u64) -> Self {
        self.usage = (prompt_tokens, completion_tokens);
        self
    }

    /// Reply with `content` when the last user message contains `pattern`
    pub fn add_response(&self, pattern: impl Into<String>, content: impl Into<String>) {
        self.push(pattern.into(), MockReply::Content(content.into()), None, 0);
    }

    /// Like [`add_response`](Self::add_response), sleeping for `delay` before replying
    pub fn add_delayed_response(
        &self,
        pattern: impl Into<String>,
        content: impl Into<String>,
        delay: Duration,
    ) {
        self.push(pattern.into(), MockReply::Content(content.into()), Some(delay), 0);
    }

    /// Fail with `error` when the last user message contains `pattern`
    pub fn add_error(&self, pattern: impl Into<String>, error: LlmError) {
        self.push(pattern.into(), MockReply::Error(error), None, 0);
    }

    /// Report a content-filtered completion when the last user message contains `pattern`
    pub fn add_content_filter(&self, pattern: impl Into<String>) {
        self.push(pattern.into(), MockReply::Filtered, None, 0);
    }

    /// Fail `failures` times with a rate-limit error, then reply with `content`
    pub fn add_transient_failures(
        &self,
        pattern: impl Into<String>,
        failures: usize,
        content: impl Into<String>,
    ) {
        self.push(pattern.into(), MockReply::Content(content.into()), None, failures);
    }

    /// Get the number of times complete was called
    pub fn call_count(&self) -> usize {
        lock(&self.conversations).len()
    }

    /// Reset the recorded calls
    pub fn reset_call_count(&self) {
        lock(&self.conversations).clear();
    }

    /// Conversations received so far, in call order
    pub fn conversations(&self) -> Vec<Vec<Message>> {
        lock(&self.conversations).clone()
    }

    fn push(
        &self,
        pattern: String,
        reply: MockReply,
        delay: Option<Duration>,
        transient_failures: usize,
    ) {
        lock(&self.rules).push(MockRule {
            pattern,
            reply,
            delay,
            transient_failures,
        });
    }

    /// Pick the reply for a prompt, consuming one scripted failure if any remain
    fn resolve(&self, prompt: &str) -> (Result<MockReply, LlmError>, Option<Duration>) {
        let mut rules = lock(&self.rules);
        match rules.iter_mut().find(|rule| prompt.contains(&rule.pattern)) {
            Some(rule) if rule.transient_failures > 0 => {
                rule.transient_failures -= 1;
                (Err(LlmError::RateLimitExceeded), rule.delay)
            }
            Some(rule) => (Ok(rule.reply.clone()), rule.delay),
            None => (Ok(MockReply::Content(self.default_response.clone())), None),
        }
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new(r#"{"answer": "no", "explanation": "Default mock response", "quote": ""}"#)
    }
}

impl ModelProvider for MockProvider {
    type Error = LlmError;

    fn complete(
        &self,
        conversation: &[Message],
        _params: &CompletionParams,
    ) -> Result<Completion, Self::Error> {
        lock(&self.conversations).push(conversation.to_vec());

        let prompt = conversation
            .iter()
            .rev()
            .find(|message| message.role == Role::User)
            .map(|message| message.content.as_str())
            .unwrap_or_default();

        let (reply, delay) = self.resolve(prompt);
        if let Some(delay) = delay {
            thread::sleep(delay);
        }

        let (prompt_tokens, completion_tokens) = self.usage;
        match reply? {
            MockReply::Content(content) => Ok(Completion {
                content,
                prompt_tokens,
                completion_tokens,
                finish_reason: FinishReason::Stop,
            }),
            MockReply::Filtered => Ok(Completion {
                content: String::new(),
                prompt_tokens,
                completion_tokens: 0,
                finish_reason: FinishReason::ContentFilter,
            }),
            MockReply::Error(error) => Err(error),
        }
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
