//! Conversation construction for element prompts and clarification rules

use scorecard_domain::{Message, Metadata};

/// Default system prompt when the engine configuration sets none
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a careful quality analyst. You read an \
    excerpt of a conversation transcript and answer one yes/no question about it, citing the \
    excerpt.";

/// Appended to every question so replies parse as a structured answer
pub const OUTPUT_FORMAT_REMINDER: &str = concat!(
    "Respond with a single JSON object and nothing else:\n",
    r#"{"answer": "yes" | "no" | "na", "explanation": "<one or two sentences>", "#,
    r#""quote": "<verbatim supporting excerpt, or empty>"}"#,
);

/// Placeholder names bound to the chunk text
const TEXT_PLACEHOLDERS: &[&str] = &["text", "transcript", "chunk"];

/// Builds the conversations sent to the model for one chunk
pub struct PromptBuilder<'a> {
    system_prompt: &'a str,
    chunk: &'a str,
    metadata: &'a Metadata,
}

impl<'a> PromptBuilder<'a> {
    /// Create a builder for one chunk
    pub fn new(system_prompt: Option<&'a str>, chunk: &'a str, metadata: &'a Metadata) -> Self {
        Self {
            system_prompt: system_prompt.unwrap_or(DEFAULT_SYSTEM_PROMPT),
            chunk,
            metadata,
        }
    }

    /// Conversation asking the element's primary question
    pub fn primary(&self, template: &str) -> Vec<Message> {
        vec![Message::system(self.system_prompt), Message::user(self.question(template))]
    }

    /// Extend a primary conversation with the model's reply and the clarification rule
    pub fn clarification(
        &self,
        mut conversation: Vec<Message>,
        primary_reply: &str,
        rule: &str,
    ) -> Vec<Message> {
        conversation.push(Message::assistant(primary_reply));
        let mut content = render_template(rule, self.chunk, self.metadata);
        content.push_str("\n\n");
        content.push_str(OUTPUT_FORMAT_REMINDER);
        conversation.push(Message::user(content));
        conversation
    }

    fn question(&self, template: &str) -> String {
        let mut prompt = String::new();

        // The chunk goes ahead of the question unless the template places it itself
        if !references_text(template) {
            prompt.push_str("Transcript excerpt:\n");
            prompt.push_str("---\n");
            prompt.push_str(self.chunk);
            prompt.push_str("\n---\n\n");
        }

        prompt.push_str(&render_template(template, self.chunk, self.metadata));
        prompt.push_str("\n\n");
        prompt.push_str(OUTPUT_FORMAT_REMINDER);
        prompt
    }
}

fn references_text(template: &str) -> bool {
    placeholders(template).any(|name| TEXT_PLACEHOLDERS.contains(&name))
}

fn placeholders(template: &str) -> impl Iterator<Item = &str> {
    template
        .split("{{")
        .skip(1)
        .filter_map(|rest| rest.split_once("}}").map(|(name, _)| name.trim()))
}

/// Substitute `{{text}}` with the chunk and `{{key}}` with metadata values.
/// Unknown placeholders are left untouched.
pub fn render_template(template: &str, chunk: &str, metadata: &Metadata) -> String {
    let mut rendered = String::with_capacity(template.len() + chunk.len());
    let mut rest = template;

    while let Some(open) = rest.find("{{") {
        rendered.push_str(&rest[..open]);
        let after_open = &rest[open + 2..];
        let Some(close) = after_open.find("}}") else {
            rendered.push_str(&rest[open..]);
            return rendered;
        };

        let name = after_open[..close].trim();
        if TEXT_PLACEHOLDERS.contains(&name) {
            rendered.push_str(chunk);
        } else if let Some(value) = metadata.get(name) {
            rendered.push_str(value);
        } else {
            rendered.push_str(&rest[open..open + 2 + close + 2]);
        }
        rest = &after_open[close + 2..];
    }

    rendered.push_str(rest);
    rendered
}
