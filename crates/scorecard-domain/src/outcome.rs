//! Element outcomes and score results

use crate::conversation::Message;
use crate::cost::CostSnapshot;
use crate::tree::DecisionNode;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Three-valued answer to an element question
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Answer {
    /// Affirmative
    Yes,
    /// Negative
    No,
    /// Not applicable
    Na,
}

impl Answer {
    /// Parse a free-form answer token (`yes`, `No`, `N/A`, `true`, ...)
    pub fn parse(token: &str) -> Option<Self> {
        let lowered = token
            .trim()
            .trim_matches(|c: char| !c.is_alphanumeric() && c != '/')
            .to_lowercase();
        match lowered.as_str() {
            "yes" | "y" | "true" => Some(Answer::Yes),
            "no" | "n" | "false" => Some(Answer::No),
            "na" | "n/a" | "not applicable" | "none" => Some(Answer::Na),
            _ => None,
        }
    }

    /// Display value used in score results (`Yes`, `No`, `NA`)
    pub fn as_value(&self) -> &'static str {
        match self {
            Answer::Yes => ScoreResult::YES,
            Answer::No => ScoreResult::NO,
            Answer::Na => ScoreResult::NA,
        }
    }
}

impl fmt::Display for Answer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_value())
    }
}

/// Outcome of evaluating one element over the filtered input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementOutcome {
    /// Normalized element name
    pub element: String,

    /// Answer for the representative chunk
    pub value: Answer,

    /// Model explanation (the clarification's when it overrode the primary answer)
    pub explanation: String,

    /// Supporting quote from the input
    pub quote: String,

    /// Primary explanation retained when a clarification overrode it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_explanation: Option<String>,

    /// Whether a clarification call was made for this chunk
    pub clarified: bool,

    /// Index of the representative chunk, `None` for builtin predicates
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_index: Option<usize>,

    /// Conversation that produced the answer
    #[serde(default)]
    pub chat_history_excerpt: Vec<Message>,

    /// Cost of the calls that produced this outcome
    pub cost_delta: CostSnapshot,
}

impl ElementOutcome {
    /// Whether the answer is affirmative
    pub fn is_affirmative(&self) -> bool {
        self.value == Answer::Yes
    }
}

/// Result of evaluating one score
///
/// Created once per terminal reached; immutable afterwards. `element_results`
/// holds the outcome of every branch node visited, in evaluation order, so the
/// decision path can be reconstructed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreResult {
    /// Score (or sub-score) name
    pub name: String,

    /// Result value (`Yes`, `No`, `NA`, a custom terminal value, or `Error`)
    pub value: String,

    /// Explanation for the value
    pub explanation: String,

    /// Supporting quote
    pub quote: String,

    /// Visited element outcomes, in evaluation order
    pub element_results: Vec<ElementOutcome>,

    /// Tree used to produce the result
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decision_tree: Option<Arc<DecisionNode>>,

    /// Cost of the score evaluation at the time the result was created
    pub cost: CostSnapshot,

    /// Failure description for error-valued results
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ScoreResult {
    /// Affirmative terminal value
    pub const YES: &'static str = "Yes";
    /// Negative terminal value
    pub const NO: &'static str = "No";
    /// Not-applicable terminal value
    pub const NA: &'static str = "NA";
    /// Value of degraded results
    pub const ERROR: &'static str = "Error";

    /// Degraded result for a score whose evaluation failed
    pub fn error(name: impl Into<String>, error: impl Into<String>) -> Self {
        let error = error.into();
        Self {
            name: name.into(),
            value: Self::ERROR.to_string(),
            explanation: error.clone(),
            quote: String::new(),
            element_results: Vec::new(),
            decision_tree: None,
            cost: CostSnapshot::default(),
            error: Some(error),
        }
    }

    /// Whether this is a degraded result
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Element names along the decision path, in evaluation order
    pub fn decision_path(&self) -> Vec<(&str, Answer)> {
        self.element_results
            .iter()
            .map(|outcome| (outcome.element.as_str(), outcome.value))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_answer_parse() {
        assert_eq!(Answer::parse("Yes"), Some(Answer::Yes));
        assert_eq!(Answer::parse(" NO. "), Some(Answer::No));
        assert_eq!(Answer::parse("N/A"), Some(Answer::Na));
        assert_eq!(Answer::parse("true"), Some(Answer::Yes));
        assert_eq!(Answer::parse("maybe"), None);
    }

    #[test]
    fn test_answer_values() {
        assert_eq!(Answer::Yes.as_value(), "Yes");
        assert_eq!(Answer::Na.to_string(), "NA");
    }

    #[test]
    fn test_error_result() {
        let result = ScoreResult::error("Greeting", "unknown element 'x'");
        assert!(result.is_error());
        assert_eq!(result.value, "Error");
        assert!(result.cost.is_zero());

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["error"], "unknown element 'x'");
        assert!(json.get("decision_tree").is_none());
    }
}
