//! Decision tree interpretation

use crate::config::EngineConfig;
use crate::element::{ElementEvaluator, EvaluationContext};
use crate::error::EngineError;
use scorecard_domain::{
    normalize_element_name, DecisionNode, Element, ElementOutcome, ModelProvider, ScoreDefinition,
    ScoreResult,
};
use std::borrow::Cow;
use std::sync::Arc;
use tracing::{debug, error};

/// Walks a score's decision tree, evaluating one element per branch node visited
pub struct DecisionTreeEvaluator<P> {
    elements: ElementEvaluator<P>,
}

impl<P> DecisionTreeEvaluator<P>
where
    P: ModelProvider + Send + Sync + 'static,
{
    /// Create a new evaluator
    pub fn new(provider: Arc<P>, config: Arc<EngineConfig>) -> Self {
        Self {
            elements: ElementEvaluator::new(provider, config),
        }
    }

    /// Element evaluator used for branch nodes
    pub fn element_evaluator(&self) -> &ElementEvaluator<P> {
        &self.elements
    }

    /// Evaluate the definition's tree
    ///
    /// Returns one result for a terminal and one per entry for a fixed leaf. Every
    /// result carries the outcomes of the visited branch nodes in evaluation order.
    pub async fn compute_result(
        &self,
        definition: &ScoreDefinition,
        ctx: &EvaluationContext,
    ) -> Result<Vec<ScoreResult>, EngineError> {
        self.walk(definition, ctx).await.map_err(|failure| failure.error)
    }

    /// Evaluate the definition's tree, degrading a failure into an error-valued result
    ///
    /// The degraded result keeps the outcomes of the branch nodes visited before
    /// the failure, so the partial decision path can still be reported.
    pub async fn score(
        &self,
        definition: &ScoreDefinition,
        ctx: &EvaluationContext,
    ) -> Vec<ScoreResult> {
        match self.walk(definition, ctx).await {
            Ok(results) => results,
            Err(TreeFailure { error, visited }) => {
                error!("Score '{}' failed: {}", definition.name, error);
                let mut result = ScoreResult::error(definition.name.clone(), error.to_string());
                result.element_results = visited;
                result.decision_tree = Some(Arc::clone(&definition.decision_tree));
                result.cost = ctx.ledger.snapshot();
                vec![result]
            }
        }
    }

    async fn walk(
        &self,
        definition: &ScoreDefinition,
        ctx: &EvaluationContext,
    ) -> Result<Vec<ScoreResult>, TreeFailure> {
        let tree = Arc::clone(&definition.decision_tree);
        let mut node = tree.as_ref();
        let mut visited: Vec<ElementOutcome> = Vec::new();

        loop {
            match node {
                DecisionNode::Branch(branch) => {
                    let outcome = match resolve_element(definition, &branch.element) {
                        Ok(element) => self.elements.evaluate(&element, ctx).await,
                        Err(e) => Err(e),
                    };
                    let outcome = match outcome {
                        Ok(outcome) => outcome,
                        Err(error) => return Err(TreeFailure { error, visited }),
                    };
                    debug!(
                        "Score '{}': element '{}' answered {}",
                        definition.name, outcome.element, outcome.value
                    );

                    node = if outcome.is_affirmative() {
                        branch.on_true.as_ref()
                    } else {
                        branch.on_false.as_ref()
                    };
                    visited.push(outcome);
                }

                DecisionNode::Terminal(name) => {
                    return match terminal_result(definition, name, &visited, ctx, &tree) {
                        Ok(result) => Ok(vec![result]),
                        Err(error) => Err(TreeFailure { error, visited }),
                    };
                }

                DecisionNode::Fixed(entries) => {
                    let (explanation, quote) = last_explanation(&visited);
                    let cost = ctx.ledger.snapshot();
                    return Ok(entries
                        .iter()
                        .map(|entry| ScoreResult {
                            name: entry.sub_score_name.clone(),
                            value: entry.value.clone(),
                            explanation: explanation.clone(),
                            quote: quote.clone(),
                            element_results: visited.clone(),
                            decision_tree: Some(Arc::clone(&tree)),
                            cost: cost.clone(),
                            error: None,
                        })
                        .collect());
                }
            }
        }
    }
}

/// A failed walk, with the outcomes gathered before the failure
struct TreeFailure {
    error: EngineError,
    visited: Vec<ElementOutcome>,
}

/// Declared element, or a synthesized one for builtin predicates
fn resolve_element<'a>(
    definition: &'a ScoreDefinition,
    name: &str,
) -> Result<Cow<'a, Element>, EngineError> {
    if let Some(element) = definition.element(name) {
        return Ok(Cow::Borrowed(element));
    }

    let normalized = normalize_element_name(name);
    if Element::is_builtin(&normalized) {
        return Ok(Cow::Owned(Element::new(&normalized, String::new())));
    }

    Err(EngineError::Configuration(format!(
        "score '{}' references unknown element '{}'",
        definition.name, name
    )))
}

fn terminal_result(
    definition: &ScoreDefinition,
    name: &str,
    visited: &[ElementOutcome],
    ctx: &EvaluationContext,
    tree: &Arc<DecisionNode>,
) -> Result<ScoreResult, EngineError> {
    let (mut explanation, quote) = last_explanation(visited);

    let value = match name.trim().to_lowercase().as_str() {
        "yes" => ScoreResult::YES.to_string(),
        "no" => ScoreResult::NO.to_string(),
        "na" => ScoreResult::NA.to_string(),
        _ => {
            let terminal = definition.terminal(name).ok_or_else(|| {
                EngineError::Configuration(format!(
                    "score '{}' references unknown terminal '{}'",
                    definition.name, name
                ))
            })?;
            if let Some(custom) = &terminal.explanation {
                explanation = custom.clone();
            }
            terminal.value.clone()
        }
    };

    Ok(ScoreResult {
        name: definition.name.clone(),
        value,
        explanation,
        quote,
        element_results: visited.to_vec(),
        decision_tree: Some(Arc::clone(tree)),
        cost: ctx.ledger.snapshot(),
        error: None,
    })
}

fn last_explanation(visited: &[ElementOutcome]) -> (String, String) {
    visited
        .last()
        .map(|outcome| (outcome.explanation.clone(), outcome.quote.clone()))
        .unwrap_or_default()
}
