//! Scorecard output

use crate::condition::SKIPPED;
use crate::metrics::RunMetrics;
use scorecard_domain::{CostSnapshot, ScoreResult};
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use std::collections::BTreeMap;
use uuid::Uuid;

/// What the scheduler produced for one score
#[derive(Debug, Clone, PartialEq)]
pub enum ScoreOutcome {
    /// The tree was evaluated (or failed, as an error-valued result)
    Computed(Vec<ScoreResult>),
    /// The score's condition was not met; nothing was evaluated
    Skipped {
        /// Why the score was skipped
        reason: String,
    },
}

impl ScoreOutcome {
    /// Build a SKIPPED outcome
    pub fn skipped(reason: impl Into<String>) -> Self {
        ScoreOutcome::Skipped { reason: reason.into() }
    }

    /// Single error-valued result
    pub fn error(name: impl Into<String>, error: impl Into<String>) -> Self {
        ScoreOutcome::Computed(vec![ScoreResult::error(name, error)])
    }

    /// Value of the first result, or `SKIPPED`
    pub fn value(&self) -> &str {
        match self {
            ScoreOutcome::Computed(results) => results
                .first()
                .map_or(ScoreResult::ERROR, |result| result.value.as_str()),
            ScoreOutcome::Skipped { .. } => SKIPPED,
        }
    }

    /// Results of a computed score; empty when skipped
    pub fn results(&self) -> &[ScoreResult] {
        match self {
            ScoreOutcome::Computed(results) => results,
            ScoreOutcome::Skipped { .. } => &[],
        }
    }

    /// First result of a computed score
    pub fn primary(&self) -> Option<&ScoreResult> {
        self.results().first()
    }

    /// Whether the score was skipped
    pub fn is_skipped(&self) -> bool {
        matches!(self, ScoreOutcome::Skipped { .. })
    }

    /// Whether any result is error-valued
    pub fn is_error(&self) -> bool {
        self.results().iter().any(ScoreResult::is_error)
    }
}

impl Serialize for ScoreOutcome {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ScoreOutcome::Computed(results) => results.serialize(serializer),
            ScoreOutcome::Skipped { reason } => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("value", SKIPPED)?;
                map.serialize_entry("reason", reason)?;
                map.end()
            }
        }
    }
}

/// Everything one scheduling run produced
///
/// `results` is keyed by score name and holds an entry for every requested score
/// plus every dependency evaluated on the way.
#[derive(Debug, Clone, Serialize)]
pub struct ScorecardOutput {
    /// Identifier of the run
    pub run_id: Uuid,
    /// Outcome per score name
    pub results: BTreeMap<String, ScoreOutcome>,
    /// Score name to stable id
    pub name_to_id: BTreeMap<String, String>,
    /// Cost of every model call made during the run
    pub cost: CostSnapshot,
    /// Run statistics
    pub metrics: RunMetrics,
}

impl ScorecardOutput {
    /// Outcome by score name or id
    pub fn get(&self, identifier: &str) -> Option<&ScoreOutcome> {
        let identifier = identifier.trim();
        self.results.get(identifier).or_else(|| {
            self.name_to_id
                .iter()
                .find(|(_, id)| id.as_str() == identifier)
                .and_then(|(name, _)| self.results.get(name))
        })
    }

    /// Value by score name or id: the first result's value, or `SKIPPED`
    pub fn value(&self, identifier: &str) -> Option<&str> {
        self.get(identifier).map(ScoreOutcome::value)
    }

    /// Result of a sub-score produced by a fixed multi-outcome leaf
    pub fn sub_score(&self, name: &str) -> Option<&ScoreResult> {
        self.results
            .values()
            .flat_map(|outcome| outcome.results())
            .find(|result| result.name == name)
    }

    /// Id of a score by name
    pub fn id_of(&self, name: &str) -> Option<&str> {
        self.name_to_id.get(name).map(String::as_str)
    }

    /// Render the run as pretty-printed JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
