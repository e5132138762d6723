//! Score definitions: the immutable, data-driven description of one score
//!
//! A definition is parsed from configuration once per evaluation run and read by a
//! single generic evaluator. Nothing here is generated or registered at runtime.

use crate::element::{normalize_element_name, Element};
use crate::tree::DecisionNode;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Free-form key/value context passed alongside the input text
pub type Metadata = BTreeMap<String, String>;

/// Everything needed to evaluate one score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreDefinition {
    /// Stable identifier
    pub id: String,

    /// Human-readable name
    pub name: String,

    /// Optional short key alias
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,

    /// Optional identifier in an external system
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,

    /// Scores that must be evaluated first, in any alias form
    #[serde(default)]
    pub depends_on: Vec<Dependency>,

    /// Predicate over an upstream score's value gating this score
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<Condition>,

    /// Tree interpreted by the engine
    pub decision_tree: Arc<DecisionNode>,

    /// Elements referenced by the tree
    #[serde(default)]
    pub elements: Vec<Element>,

    /// Named terminals beyond `yes`, `no` and `na`
    #[serde(default)]
    pub terminals: BTreeMap<String, Terminal>,

    /// Chunking policy for element evaluation
    #[serde(default)]
    pub chunking: ChunkingPolicy,

    /// Filters applied to the raw input before evaluation, in order
    #[serde(default)]
    pub filters: Vec<InputFilter>,
}

/// A declared dependency, by identifier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Dependency {
    /// Bare identifier
    Name(String),
    /// Table form `{ score = "..." }`
    Table {
        /// Identifier of the upstream score
        score: String,
    },
}

impl Dependency {
    /// Identifier of the upstream score
    pub fn identifier(&self) -> &str {
        match self {
            Dependency::Name(name) => name,
            Dependency::Table { score } => score,
        }
    }
}

/// Comparison applied by a [`Condition`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    /// Upstream value equals the operand
    #[serde(alias = "==", alias = "eq")]
    Equals,
    /// Upstream value differs from the operand
    #[serde(alias = "!=", alias = "ne")]
    NotEquals,
    /// Upstream value is one of the operands
    #[serde(alias = "in_set")]
    In,
    /// Upstream value is none of the operands
    #[serde(alias = "not_in_set")]
    NotIn,
}

/// Operand of a condition: one value or a set of values
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConditionValue {
    /// Single value
    One(String),
    /// Set of values
    Many(Vec<String>),
}

impl ConditionValue {
    fn values(&self) -> Vec<&str> {
        match self {
            ConditionValue::One(value) => vec![value.as_str()],
            ConditionValue::Many(values) => values.iter().map(String::as_str).collect(),
        }
    }
}

/// Gate on an upstream score's value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    /// Identifier of the upstream score
    pub score: String,

    /// Comparison
    #[serde(alias = "operator")]
    pub op: Operator,

    /// Operand(s)
    pub value: ConditionValue,
}

impl Condition {
    /// Evaluate against an upstream value. Comparison ignores case and surrounding
    /// whitespace.
    ///
    /// # Examples
    ///
    /// ```
    /// use scorecard_domain::{Condition, ConditionValue, Operator};
    ///
    /// let condition = Condition {
    ///     score: "Greeting".to_string(),
    ///     op: Operator::In,
    ///     value: ConditionValue::Many(vec!["Yes".to_string(), "NA".to_string()]),
    /// };
    /// assert!(condition.is_met("yes"));
    /// assert!(!condition.is_met("No"));
    /// ```
    pub fn is_met(&self, upstream_value: &str) -> bool {
        let actual = upstream_value.trim();
        let hit = self
            .value
            .values()
            .iter()
            .any(|candidate| candidate.trim().eq_ignore_ascii_case(actual));

        match self.op {
            Operator::Equals | Operator::In => hit,
            Operator::NotEquals | Operator::NotIn => !hit,
        }
    }
}

/// Named terminal materializing a fixed value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Terminal {
    /// Result value
    pub value: String,

    /// Explanation used instead of the last element's explanation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

/// Whether and how element evaluation splits the filtered input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkingPolicy {
    /// Split the input into bounded chunks
    #[serde(default = "default_chunking_enabled")]
    pub enabled: bool,

    /// Maximum chunk size in bytes; falls back to the engine default
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_chunk_size: Option<usize>,
}

fn default_chunking_enabled() -> bool {
    true
}

impl Default for ChunkingPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            max_chunk_size: None,
        }
    }
}

/// Preprocessing applied to the raw input, producing the filtered input
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InputFilter {
    /// Remove `Speaker:` prefixes from every line
    StripSpeakerLabels,

    /// Keep only lines spoken by the listed speakers
    KeepSpeakers {
        /// Speaker labels, compared case-insensitively
        speakers: Vec<String>,
    },

    /// Keep lines within a window around any keyword hit
    KeywordWindow {
        /// Keywords, matched case-insensitively as substrings
        keywords: Vec<String>,
        /// Lines kept before each hit
        #[serde(default)]
        lines_before: usize,
        /// Lines kept after each hit
        #[serde(default)]
        lines_after: usize,
    },

    /// Collapse runs of whitespace within each line and drop blank lines
    CollapseWhitespace,
}

impl ScoreDefinition {
    /// Every identifier this definition can be referred to by
    pub fn aliases(&self) -> Vec<&str> {
        let mut aliases = vec![self.id.as_str(), self.name.as_str()];
        aliases.extend(self.key.as_deref());
        aliases.extend(self.external_id.as_deref());
        aliases
    }

    /// Whether `identifier` refers to this definition
    pub fn answers_to(&self, identifier: &str) -> bool {
        let identifier = identifier.trim();
        self.aliases().iter().any(|alias| *alias == identifier)
    }

    /// Identifiers of all upstream scores: declared dependencies plus the
    /// condition's upstream, without duplicates, in declaration order
    pub fn upstream_identifiers(&self) -> Vec<&str> {
        let mut upstream: Vec<&str> = Vec::new();
        let declared = self.depends_on.iter().map(Dependency::identifier);
        let conditional = self.condition.as_ref().map(|c| c.score.as_str());
        for identifier in declared.chain(conditional) {
            if !upstream.contains(&identifier) {
                upstream.push(identifier);
            }
        }
        upstream
    }

    /// Look up an element by (possibly unnormalized) name
    pub fn element(&self, name: &str) -> Option<&Element> {
        let normalized = normalize_element_name(name);
        self.elements.iter().find(|element| element.name == normalized)
    }

    /// Look up a custom terminal by name (case-insensitive)
    pub fn terminal(&self, name: &str) -> Option<&Terminal> {
        let wanted = name.trim();
        self.terminals
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(wanted))
            .map(|(_, terminal)| terminal)
    }

    /// Validate internal consistency
    pub fn validate(&self) -> Result<(), String> {
        if self.id.trim().is_empty() {
            return Err(format!("score '{}' has an empty id", self.name));
        }
        if self.name.trim().is_empty() {
            return Err(format!("score '{}' has an empty name", self.id));
        }
        if self.chunking.max_chunk_size == Some(0) {
            return Err(format!("score '{}': max_chunk_size must be greater than 0", self.name));
        }

        for element in &self.elements {
            if element.name.is_empty() {
                return Err(format!("score '{}' has an element with an empty name", self.name));
            }
        }

        for name in self.decision_tree.branch_elements() {
            let normalized = normalize_element_name(name);
            if !Element::is_builtin(&normalized) && self.element(name).is_none() {
                return Err(format!("score '{}': unknown element '{}'", self.name, name));
            }
        }

        for name in self.decision_tree.terminal_names() {
            let builtin = matches!(name.trim().to_lowercase().as_str(), "yes" | "no" | "na");
            if !builtin && self.terminal(name).is_none() {
                return Err(format!("score '{}': unknown terminal '{}'", self.name, name));
            }
        }

        if let DecisionNode::Fixed(entries) = self.decision_tree.as_ref() {
            if entries.is_empty() {
                return Err(format!("score '{}': fixed outcome list is empty", self.name));
            }
        }

        Ok(())
    }
}
