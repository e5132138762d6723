//! Metrics collection for scheduling runs

use crate::output::ScoreOutcome;
use serde::Serialize;
use std::time::Duration;

/// Metrics collected during one scheduling run
///
/// Tracks how many scores were computed, skipped and failed, plus wall time.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunMetrics {
    /// Scores evaluated successfully
    pub computed: usize,

    /// Scores skipped by a condition
    pub skipped: usize,

    /// Scores that produced an error-valued result
    pub errored: usize,

    /// Dependencies that could not be resolved
    pub unresolved_dependencies: usize,

    /// Model calls made during the run
    pub request_count: u64,

    /// Wall time of the run in milliseconds
    pub elapsed_ms: u64,
}

impl RunMetrics {
    /// Create new empty metrics
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a finished score
    pub fn record(&mut self, outcome: &ScoreOutcome) {
        if outcome.is_skipped() {
            self.skipped += 1;
        } else if outcome.is_error() {
            self.errored += 1;
        } else {
            self.computed += 1;
        }
    }

    /// Set the run's wall time
    pub fn set_elapsed(&mut self, elapsed: Duration) {
        self.elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
    }

    /// Get total scores across all outcomes
    pub fn total_scores(&self) -> usize {
        self.computed + self.skipped + self.errored
    }

    /// Generate a summary report of metrics
    pub fn summary(&self) -> String {
        let mut lines = vec![
            "Scorecard Run Summary".to_string(),
            "=====================".to_string(),
            format!("Scores: {}", self.total_scores()),
            format!("  Computed: {}", self.computed),
            format!("  Skipped: {}", self.skipped),
            format!("  Errored: {}", self.errored),
            format!("Model calls: {}", self.request_count),
            format!("Elapsed: {}ms", self.elapsed_ms),
        ];

        if self.unresolved_dependencies > 0 {
            lines.push(format!("Unresolved dependencies: {}", self.unresolved_dependencies));
        }

        lines.join("\n")
    }
}
