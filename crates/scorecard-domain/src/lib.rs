//! Scorecard Domain Layer
//!
//! Core value objects and trait interfaces for scoring free-text input against
//! configurable yes/no/na elements combined through decision trees.
//!
//! ## Key Concepts
//!
//! - **Element**: a single yes/no/na sub-question with its own prompt
//! - **Decision Tree**: binary branching over element outcomes, ending in a terminal
//! - **Score Definition**: one named score, its elements, tree, dependencies and condition
//! - **Score Result**: the immutable outcome of evaluating a score
//! - **Cost Snapshot**: token and dollar accounting attached to every result
//!
//! ## Architecture
//!
//! This crate holds no behaviour that talks to the outside world. Model providers and
//! configuration sources are described by the traits in [`traits`]; infrastructure
//! implementations live in other crates.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod conversation;
pub mod cost;
pub mod definition;
pub mod element;
pub mod outcome;
pub mod traits;
pub mod tree;

// Re-exports for convenience
pub use conversation::{Completion, CompletionParams, FinishReason, Message, Role};
pub use cost::{CallKind, CostLedgerEntry, CostSnapshot, ModelPricing};
pub use definition::{
    ChunkingPolicy, Condition, ConditionValue, Dependency, InputFilter, Metadata, Operator,
    ScoreDefinition, Terminal,
};
pub use element::{normalize_element_name, Element};
pub use outcome::{Answer, ElementOutcome, ScoreResult};
pub use traits::{ConfigurationSource, ModelProvider, ProviderFailure};
pub use tree::{BranchNode, DecisionNode, FixedOutcome};
