//! TOML-backed scorecard configuration

use crate::error::SchedulerError;
use scorecard_domain::{ConfigurationSource, ScoreDefinition};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

/// A scorecard: a named set of score definitions
///
/// ```toml
/// name = "Customer Service"
///
/// [[scores]]
/// id = "101"
/// name = "Greeting"
///
/// [scores.decision_tree]
/// element = "greeting"
/// on_true = "yes"
/// on_false = "no"
///
/// [[scores.elements]]
/// name = "greeting"
/// prompt = "Did the agent greet the caller?"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TomlScorecard {
    /// Scorecard name
    pub name: String,

    /// Score definitions
    #[serde(default)]
    pub scores: Vec<ScoreDefinition>,
}

impl TomlScorecard {
    /// Build a scorecard from definitions, checking that ids are unique
    pub fn new(
        name: impl Into<String>,
        scores: Vec<ScoreDefinition>,
    ) -> Result<Self, SchedulerError> {
        let scorecard = Self {
            name: name.into(),
            scores,
        };
        scorecard.validate()?;
        Ok(scorecard)
    }

    /// Parse a scorecard from a TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self, SchedulerError> {
        let scorecard: Self = toml::from_str(toml_str)?;
        scorecard.validate()?;
        Ok(scorecard)
    }

    /// Load a scorecard from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SchedulerError> {
        let path = path.as_ref();
        debug!("Loading scorecard from {}", path.display());
        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Score ids are unique
    ///
    /// An inconsistent definition is only logged here; it fails on its own when
    /// scheduled, without taking the rest of the scorecard with it.
    pub fn validate(&self) -> Result<(), SchedulerError> {
        let mut ids = BTreeSet::new();
        for score in &self.scores {
            if !ids.insert(score.id.as_str()) {
                return Err(SchedulerError::Config(format!(
                    "scorecard '{}' declares score id '{}' twice",
                    self.name, score.id
                )));
            }
            if let Err(message) = score.validate() {
                warn!("Scorecard '{}': {}", self.name, message);
            }
        }
        Ok(())
    }

    /// Definitions that fail their own consistency checks, with the reason
    pub fn invalid_scores(&self) -> Vec<(&str, String)> {
        self.scores
            .iter()
            .filter_map(|score| {
                let message = score.validate().err()?;
                Some((score.name.as_str(), message))
            })
            .collect()
    }

    /// Names of all scores, in declaration order
    pub fn score_names(&self) -> Vec<&str> {
        self.scores.iter().map(|score| score.name.as_str()).collect()
    }
}

impl ConfigurationSource for TomlScorecard {
    type Error = SchedulerError;

    fn score_definition(
        &self,
        scorecard: &str,
        identifier: &str,
    ) -> Result<Option<ScoreDefinition>, Self::Error> {
        if !scorecard.trim().eq_ignore_ascii_case(self.name.trim()) {
            return Err(SchedulerError::Source(format!(
                "scorecard '{}' is not loaded (have '{}')",
                scorecard, self.name
            )));
        }

        let identifier = identifier.trim();
        let found = self
            .scores
            .iter()
            .find(|score| score.id == identifier)
            .or_else(|| self.scores.iter().find(|score| score.answers_to(identifier)));
        Ok(found.cloned())
    }
}
