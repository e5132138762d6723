//! Condition gating against upstream score values

use crate::output::ScoreOutcome;
use scorecard_domain::{Condition, ScoreDefinition};
use std::collections::BTreeMap;

/// Value of the SKIPPED sentinel as seen by conditions
pub const SKIPPED: &str = "SKIPPED";

/// What an upstream score produced, as seen by its dependents
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpstreamValue {
    /// Value of the first result
    Value(String),
    /// The upstream score was skipped
    Skipped,
}

impl UpstreamValue {
    /// Value compared by conditions
    pub fn as_str(&self) -> &str {
        match self {
            UpstreamValue::Value(value) => value,
            UpstreamValue::Skipped => SKIPPED,
        }
    }
}

/// Values of the scores finished so far, addressable by any alias
///
/// Sub-scores produced by a fixed leaf are registered under their own names.
#[derive(Debug, Clone, Default)]
pub struct UpstreamValues {
    aliases: BTreeMap<String, String>,
    values: BTreeMap<String, UpstreamValue>,
}

impl UpstreamValues {
    /// Create an empty set of values
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a finished score
    pub fn record(&mut self, definition: &ScoreDefinition, outcome: &ScoreOutcome) {
        for alias in definition.aliases() {
            self.aliases.insert(alias.to_string(), definition.id.clone());
        }

        let value = match outcome {
            ScoreOutcome::Skipped { .. } => UpstreamValue::Skipped,
            ScoreOutcome::Computed(_) => UpstreamValue::Value(outcome.value().to_string()),
        };
        self.values.insert(definition.id.clone(), value);

        for result in outcome.results().iter().filter(|result| result.name != definition.name) {
            self.aliases.entry(result.name.clone()).or_insert_with(|| result.name.clone());
            self.values
                .entry(result.name.clone())
                .or_insert_with(|| UpstreamValue::Value(result.value.clone()));
        }
    }

    /// Value of an upstream score by any alias
    pub fn get(&self, identifier: &str) -> Option<&UpstreamValue> {
        self.values.get(self.key(identifier)?)
    }

    /// Whether two identifiers refer to the same recorded score
    pub fn same_score(&self, a: &str, b: &str) -> bool {
        match (self.key(a), self.key(b)) {
            (Some(a), Some(b)) => a == b,
            _ => a.trim() == b.trim(),
        }
    }

    fn key(&self, identifier: &str) -> Option<&String> {
        self.aliases.get(identifier.trim())
    }
}

/// Decision taken before evaluating a score
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Gate {
    /// Evaluate the score
    Run,
    /// Mark the score SKIPPED without evaluating it
    Skip(String),
}

/// Decide whether a score runs, given the values of its finished upstream scores
///
/// A skipped dependency skips the score, unless the score's condition is on that
/// dependency and accepts `SKIPPED`. A condition whose upstream has no value skips
/// the score.
pub fn gate(definition: &ScoreDefinition, upstream: &UpstreamValues) -> Gate {
    let condition = definition.condition.as_ref();

    for dependency in definition.depends_on.iter().map(|d| d.identifier()) {
        if upstream.get(dependency) != Some(&UpstreamValue::Skipped) {
            continue;
        }
        let tolerated = condition
            .is_some_and(|c| upstream.same_score(&c.score, dependency) && c.is_met(SKIPPED));
        if !tolerated {
            return Gate::Skip(format!("dependency '{}' was skipped", dependency));
        }
    }

    match condition {
        Some(condition) => check_condition(condition, upstream),
        None => Gate::Run,
    }
}

fn check_condition(condition: &Condition, upstream: &UpstreamValues) -> Gate {
    match upstream.get(&condition.score) {
        None => Gate::Skip(format!("condition upstream '{}' has no result", condition.score)),
        Some(value) if condition.is_met(value.as_str()) => Gate::Run,
        Some(value) => Gate::Skip(format!(
            "condition on '{}' not met (value '{}')",
            condition.score,
            value.as_str()
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scorecard_domain::{
        ChunkingPolicy, ConditionValue, DecisionNode, Dependency, Operator, ScoreResult,
    };
    use std::sync::Arc;

    fn score(id: &str, name: &str) -> ScoreDefinition {
        ScoreDefinition {
            id: id.to_string(),
            name: name.to_string(),
            key: Some(name.to_lowercase()),
            external_id: None,
            depends_on: Vec::new(),
            condition: None,
            decision_tree: Arc::new(DecisionNode::terminal("yes")),
            elements: Vec::new(),
            terminals: BTreeMap::new(),
            chunking: ChunkingPolicy::default(),
            filters: Vec::new(),
        }
    }

    fn computed(name: &str, value: &str) -> ScoreOutcome {
        let mut result = ScoreResult::error(name, "unused");
        result.value = value.to_string();
        result.error = None;
        ScoreOutcome::Computed(vec![result])
    }

    fn gated(op: Operator, value: &str) -> ScoreDefinition {
        let mut definition = score("2", "Resolution");
        definition.depends_on = vec![Dependency::Name("greeting".to_string())];
        definition.condition = Some(Condition {
            score: "Greeting".to_string(),
            op,
            value: ConditionValue::One(value.to_string()),
        });
        definition
    }

    #[test]
    fn test_condition_met_runs() {
        let mut upstream = UpstreamValues::new();
        upstream.record(&score("1", "Greeting"), &computed("Greeting", "Yes"));
        assert_eq!(gate(&gated(Operator::Equals, "yes"), &upstream), Gate::Run);
    }

    #[test]
    fn test_condition_unmet_skips() {
        let mut upstream = UpstreamValues::new();
        upstream.record(&score("1", "Greeting"), &computed("Greeting", "No"));
        let gate = gate(&gated(Operator::Equals, "Yes"), &upstream);
        assert!(matches!(gate, Gate::Skip(reason) if reason.contains("not met")));
    }

    #[test]
    fn test_missing_condition_upstream_skips() {
        let gate = gate(&gated(Operator::NotEquals, "Yes"), &UpstreamValues::new());
        assert!(matches!(gate, Gate::Skip(reason) if reason.contains("no result")));
    }

    #[test]
    fn test_skipped_dependency_propagates() {
        let mut upstream = UpstreamValues::new();
        upstream.record(&score("1", "Greeting"), &ScoreOutcome::skipped("gated"));

        let mut plain = score("3", "Closing");
        plain.depends_on = vec![Dependency::Name("1".to_string())];
        assert!(matches!(gate(&plain, &upstream), Gate::Skip(_)));
        assert!(matches!(gate(&gated(Operator::Equals, "Yes"), &upstream), Gate::Skip(_)));
    }

    #[test]
    fn test_condition_can_tolerate_skipped_upstream() {
        let mut upstream = UpstreamValues::new();
        upstream.record(&score("1", "Greeting"), &ScoreOutcome::skipped("gated"));

        // The dependency is declared by key, the condition by name
        assert_eq!(gate(&gated(Operator::Equals, "skipped"), &upstream), Gate::Run);
        assert_eq!(gate(&gated(Operator::NotEquals, "Yes"), &upstream), Gate::Run);
    }

    #[test]
    fn test_error_upstream_value_is_compared() {
        let mut upstream = UpstreamValues::new();
        let failed = ScoreOutcome::Computed(vec![ScoreResult::error("Greeting", "boom")]);
        upstream.record(&score("1", "Greeting"), &failed);
        assert_eq!(gate(&gated(Operator::Equals, "Error"), &upstream), Gate::Run);
    }

    #[test]
    fn test_sub_scores_are_addressable() {
        let mut parent = ScoreResult::error("Empathy", "unused");
        parent.value = "4".to_string();
        parent.error = None;
        let mut sibling = parent.clone();
        sibling.name = "Accuracy".to_string();
        sibling.value = "2".to_string();

        let mut upstream = UpstreamValues::new();
        upstream.record(&score("9", "Quality"), &ScoreOutcome::Computed(vec![parent, sibling]));

        assert_eq!(upstream.get("Quality").map(UpstreamValue::as_str), Some("4"));
        assert_eq!(upstream.get("Empathy").map(UpstreamValue::as_str), Some("4"));
        assert_eq!(upstream.get("Accuracy").map(UpstreamValue::as_str), Some("2"));
        assert_eq!(upstream.get("quality").map(UpstreamValue::as_str), Some("4"));
    }
}
