//! Decision tree shapes
//!
//! A tree is read from configuration and interpreted by the engine. Three shapes
//! are supported, and they deserialize untagged so configuration can write them
//! naturally:
//!
//! ```toml
//! [decision_tree]
//! element = "agent_greeting"
//! on_true = "yes"
//!
//! [decision_tree.on_false]
//! element = "caller_hung_up"
//! on_true = "na"
//! on_false = "no"
//! ```
//!
//! Branching is strictly binary: a branch node has exactly one `on_true` and one
//! `on_false` child.

use serde::{Deserialize, Serialize};

/// A node of a score's decision tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DecisionNode {
    /// Terminal method name (`yes`, `no`, `na`, or a custom terminal)
    Terminal(String),

    /// Fixed multi-outcome leaf: one result per entry, in order
    Fixed(Vec<FixedOutcome>),

    /// Binary branch on an element outcome
    Branch(BranchNode),
}

/// Binary branch on one element
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchNode {
    /// Element (or builtin predicate) name; normalized at evaluation time
    pub element: String,

    /// Followed when the element outcome is affirmative
    #[serde(alias = "true")]
    pub on_true: Box<DecisionNode>,

    /// Followed otherwise
    #[serde(alias = "false")]
    pub on_false: Box<DecisionNode>,
}

/// One entry of a fixed multi-outcome leaf
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixedOutcome {
    /// Name of the sub-score this entry materializes
    #[serde(alias = "score")]
    pub sub_score_name: String,

    /// Literal value carried by the result
    pub value: String,
}

impl DecisionNode {
    /// Build a branch node
    pub fn branch(
        element: impl Into<String>,
        on_true: DecisionNode,
        on_false: DecisionNode,
    ) -> Self {
        DecisionNode::Branch(BranchNode {
            element: element.into(),
            on_true: Box::new(on_true),
            on_false: Box::new(on_false),
        })
    }

    /// Build a terminal node
    pub fn terminal(name: impl Into<String>) -> Self {
        DecisionNode::Terminal(name.into())
    }

    /// Visit every branch element name in depth-first order
    pub fn branch_elements(&self) -> Vec<&str> {
        let mut names = Vec::new();
        self.collect(&mut names, &mut Vec::new());
        names
    }

    /// Visit every terminal name in depth-first order
    pub fn terminal_names(&self) -> Vec<&str> {
        let mut names = Vec::new();
        self.collect(&mut Vec::new(), &mut names);
        names
    }

    fn collect<'a>(&'a self, elements: &mut Vec<&'a str>, terminals: &mut Vec<&'a str>) {
        match self {
            DecisionNode::Terminal(name) => terminals.push(name),
            DecisionNode::Fixed(_) => {}
            DecisionNode::Branch(branch) => {
                elements.push(&branch.element);
                branch.on_true.collect(elements, terminals);
                branch.on_false.collect(elements, terminals);
            }
        }
    }
}
