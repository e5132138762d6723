//! Scorecard Scheduler
//!
//! Runs a requested subset of a scorecard's scores against one input, together with
//! every score they transitively depend on.
//!
//! # Overview
//!
//! Scores may depend on other scores and may be gated by a condition on an upstream
//! score's value. The scheduler resolves definitions through a
//! [`ConfigurationSource`](scorecard_domain::ConfigurationSource), builds the
//! dependency graph, and evaluates scores concurrently as soon as their dependencies
//! have finished. A score whose condition is not met is marked SKIPPED and never
//! reaches the model.
//!
//! # Architecture
//!
//! ```text
//! requested ids → DependencyGraphBuilder ⇄ ScoreRegistry ⇄ ConfigurationSource
//!                        ↓
//!                 DependencyGraph → execution order
//!                        ↓
//!                 ScoreScheduler → gate → DecisionTreeEvaluator (per score)
//!                        ↓
//!                 ScorecardOutput (results, cost, metrics)
//! ```
//!
//! # Failure model
//!
//! A run never fails as a whole. Unknown requested scores, failed evaluations and
//! scores caught in a dependency cycle each produce an error-valued result; the
//! remaining scores are unaffected.

#![warn(missing_docs)]

mod condition;
mod config;
mod error;
mod graph;
mod metrics;
mod output;
mod registry;
mod scheduler;
mod source;

pub use condition::{gate, Gate, UpstreamValue, UpstreamValues, SKIPPED};
pub use config::SchedulerConfig;
pub use error::SchedulerError;
pub use graph::{DependencyGraph, DependencyGraphBuilder, ExecutionOrder, RequestedScore};
pub use metrics::RunMetrics;
pub use output::{ScoreOutcome, ScorecardOutput};
pub use registry::ScoreRegistry;
pub use scheduler::ScoreScheduler;
pub use source::TomlScorecard;
