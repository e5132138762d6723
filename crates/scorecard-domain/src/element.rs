//! Element module - a single yes/no/na question asked of the input

use serde::{Deserialize, Deserializer, Serialize};

/// Names that evaluate against the filtered input directly, without a model call.
pub const BUILTIN_PREDICATES: &[&str] =
    &["input_is_empty", "transcript_is_empty", "is_input_empty"];

/// A named sub-question evaluated against every chunk of the filtered input
///
/// Identity is the normalized name. Elements are created once per score
/// definition and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Element {
    /// Normalized element name
    #[serde(deserialize_with = "deserialize_normalized")]
    pub name: String,

    /// Prompt template asked of each chunk
    pub prompt: String,

    /// Follow-up template asked only when the primary answer is affirmative
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clarification_rule: Option<String>,
}

impl Element {
    /// Create a new element, normalizing its name
    ///
    /// # Examples
    ///
    /// ```
    /// use scorecard_domain::Element;
    ///
    /// let element = Element::new("Agent Greeting?", "Did the agent greet the caller?");
    /// assert_eq!(element.name, "agent_greeting");
    /// ```
    pub fn new(name: &str, prompt: impl Into<String>) -> Self {
        Self {
            name: normalize_element_name(name),
            prompt: prompt.into(),
            clarification_rule: None,
        }
    }

    /// Attach a clarification rule
    pub fn with_clarification(mut self, rule: impl Into<String>) -> Self {
        self.clarification_rule = Some(rule.into());
        self
    }

    /// Whether a normalized name refers to a builtin predicate
    pub fn is_builtin(name: &str) -> bool {
        BUILTIN_PREDICATES.contains(&name)
    }
}

/// Normalize an element name: runs of non-word characters collapse to `_`,
/// letters are lower-cased, and leading/trailing separators are trimmed.
///
/// # Examples
///
/// ```
/// use scorecard_domain::normalize_element_name;
///
/// assert_eq!(
///     normalize_element_name("  Proper Closing -- Offered Help "),
///     "proper_closing_offered_help"
/// );
/// assert_eq!(normalize_element_name("already_normal"), "already_normal");
/// ```
pub fn normalize_element_name(name: &str) -> String {
    let mut normalized = String::with_capacity(name.len());
    let mut pending_separator = false;

    for c in name.trim().chars() {
        if c.is_alphanumeric() || c == '_' {
            if pending_separator && !normalized.is_empty() {
                normalized.push('_');
            }
            pending_separator = false;
            normalized.extend(c.to_lowercase());
        } else {
            pending_separator = true;
        }
    }

    normalized.trim_matches('_').to_string()
}

fn deserialize_normalized<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    Ok(normalize_element_name(&raw))
}
