//! Scorecard Engine
//!
//! Evaluates one score's decision tree against free-text input.
//!
//! # Overview
//!
//! Each branch node of a tree names an element: a yes/no/na question asked of every
//! chunk of the filtered input. The engine splits the input into bounded chunks, asks
//! the model about each chunk in parallel, and decides the element as soon as one
//! chunk answers yes. An element may carry a clarification rule, a follow-up asked in
//! the same conversation that can turn a yes into a no.
//!
//! # Architecture
//!
//! ```text
//! Input → Filters → ChunkSplitter → ElementEvaluator → ModelProvider
//!                                        ↓                  ↓
//!                        DecisionTreeEvaluator          CostLedger
//!                                        ↓
//!                                  ScoreResult(s)
//! ```
//!
//! # Key Features
//!
//! - **Short-circuit**: the first affirmative chunk decides the element
//! - **Clarification override**: a follow-up question can veto an affirmative answer
//! - **Cost accounting**: every model call is priced and recorded, including calls
//!   that finish after the element was decided
//! - **Resilience**: transient provider failures are retried with backoff, malformed
//!   replies get a single repair attempt
//!
//! # Example Usage
//!
//! ```no_run
//! use scorecard_domain::{Metadata, ScoreDefinition};
//! use scorecard_engine::{CostLedger, DecisionTreeEvaluator, EngineConfig, EvaluationContext};
//! use scorecard_llm::MockProvider;
//! use std::sync::Arc;
//!
//! # async fn example(definition: ScoreDefinition) -> Result<(), Box<dyn std::error::Error>> {
//! let evaluator = DecisionTreeEvaluator::new(
//!     Arc::new(MockProvider::default()),
//!     Arc::new(EngineConfig::default()),
//! );
//!
//! let ledger = CostLedger::new();
//! let ctx = EvaluationContext::for_score(
//!     &definition,
//!     "Agent: Hello, thanks for calling.",
//!     Arc::new(Metadata::new()),
//!     ledger.clone(),
//! );
//!
//! for result in evaluator.compute_result(&definition, &ctx).await? {
//!     println!("{} = {}", result.name, result.value);
//! }
//! println!("Cost: ${:.6}", ledger.snapshot().total_cost);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

mod chunking;
mod config;
mod element;
mod error;
mod filter;
mod ledger;
mod parser;
mod prompt;
mod retry;
mod tree;

#[cfg(test)]
mod tests;

pub use chunking::{ChunkSplitter, DEFAULT_DELIMITER};
pub use config::{EngineConfig, RetryConfig};
pub use element::{ElementEvaluator, EvaluationContext, CONTENT_FILTERED_EXPLANATION};
pub use error::EngineError;
pub use filter::apply_filters;
pub use ledger::CostLedger;
pub use parser::{parse_response, ParsedResponse, RepairableResponse, StructuredAnswer};
pub use prompt::{render_template, PromptBuilder, DEFAULT_SYSTEM_PROMPT, OUTPUT_FORMAT_REMINDER};
pub use retry::{backoff_delay, call_with_retry};
pub use tree::DecisionTreeEvaluator;
