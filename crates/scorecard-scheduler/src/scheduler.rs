//! Dependency-aware scheduling of score evaluations

use crate::condition::{gate, Gate, UpstreamValues};
use crate::config::SchedulerConfig;
use crate::error::SchedulerError;
use crate::graph::{DependencyGraph, DependencyGraphBuilder};
use crate::metrics::RunMetrics;
use crate::output::{ScoreOutcome, ScorecardOutput};
use crate::registry::ScoreRegistry;
use scorecard_domain::{
    ConfigurationSource, CostSnapshot, Metadata, ModelProvider, ScoreDefinition, ScoreResult,
};
use scorecard_engine::{CostLedger, DecisionTreeEvaluator, EngineError, EvaluationContext};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinSet;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

/// Evaluates a requested set of scores, and everything they depend on, against one input
///
/// Scores run concurrently up to `score_concurrency`, each as soon as all of its
/// dependencies have finished. Conditions are checked here, on the scheduling task,
/// before a score is dispatched; a score whose condition is not met is marked
/// SKIPPED and costs nothing.
///
/// # Examples
///
/// ```no_run
/// use scorecard_domain::Metadata;
/// use scorecard_llm::MockProvider;
/// use scorecard_scheduler::{SchedulerConfig, ScoreScheduler, TomlScorecard};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let scorecard = TomlScorecard::load("scorecard.toml")?;
/// let name = scorecard.name.clone();
/// let config = SchedulerConfig::default();
/// let scheduler = ScoreScheduler::new(MockProvider::default(), scorecard, name, config)?;
///
/// let output = scheduler
///     .score_entire_input("Agent: Hello!", &Metadata::new(), &["Greeting", "Resolution"])
///     .await;
/// println!("Greeting = {:?}", output.value("Greeting"));
/// println!("{}", output.metrics.summary());
/// # Ok(())
/// # }
/// ```
pub struct ScoreScheduler<P, C> {
    engine: Arc<DecisionTreeEvaluator<P>>,
    source: C,
    scorecard: String,
    registry: ScoreRegistry,
    config: SchedulerConfig,
}

impl<P, C> ScoreScheduler<P, C>
where
    P: ModelProvider + Send + Sync + 'static,
    C: ConfigurationSource,
{
    /// Create a new scheduler
    pub fn new(
        provider: P,
        source: C,
        scorecard: impl Into<String>,
        config: SchedulerConfig,
    ) -> Result<Self, SchedulerError> {
        Self::with_shared_provider(Arc::new(provider), source, scorecard, config)
    }

    /// Create a scheduler around a provider shared with other components
    pub fn with_shared_provider(
        provider: Arc<P>,
        source: C,
        scorecard: impl Into<String>,
        config: SchedulerConfig,
    ) -> Result<Self, SchedulerError> {
        config.validate()?;
        let engine = DecisionTreeEvaluator::new(provider, Arc::new(config.engine.clone()));
        Ok(Self {
            engine: Arc::new(engine),
            source,
            scorecard: scorecard.into(),
            registry: ScoreRegistry::new(),
            config,
        })
    }

    /// Scheduler configuration
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Definitions resolved so far
    pub fn registry(&self) -> &ScoreRegistry {
        &self.registry
    }

    /// Forget resolved definitions so the next run reads the source again
    pub fn refresh(&self) {
        self.registry.clear();
    }

    /// Discover the requested scores and their transitive dependencies
    pub fn build_graph(&self, requested: &[&str]) -> DependencyGraph {
        DependencyGraphBuilder::new(
            &self.source,
            &self.scorecard,
            &self.registry,
            self.config.max_dependency_depth,
        )
        .build(requested)
    }

    /// Evaluate the requested scores against `text`
    ///
    /// Never fails as a whole: every requested score gets an entry, holding its
    /// results, a SKIPPED marker, or an error-valued result.
    pub async fn score_entire_input(
        &self,
        text: &str,
        metadata: &Metadata,
        requested: &[&str],
    ) -> ScorecardOutput {
        let run_id = Uuid::now_v7();
        let span = info_span!("scorecard_run", %run_id, scorecard = %self.scorecard);
        self.run(run_id, text, metadata, requested).instrument(span).await
    }

    async fn run(
        &self,
        run_id: Uuid,
        text: &str,
        metadata: &Metadata,
        requested: &[&str],
    ) -> ScorecardOutput {
        let started = Instant::now();
        info!("Scoring {} requested score(s), input length {}", requested.len(), text.len());

        let graph = self.build_graph(requested);
        let order = graph.execution_order();
        if !order.cyclic.is_empty() {
            warn!("{}", SchedulerError::Cycle(order.cyclic.clone()));
        }

        let text: Arc<str> = Arc::from(text);
        let metadata = Arc::new(metadata.clone());

        let mut outcomes: BTreeMap<String, ScoreOutcome> = BTreeMap::new();
        let mut ledgers: Vec<CostLedger> = Vec::new();
        let mut upstream = UpstreamValues::new();
        let mut metrics = RunMetrics::new();
        let mut pending: Vec<String> = order.order;
        let mut in_flight: BTreeSet<String> = BTreeSet::new();
        let mut running: JoinSet<(String, ScoreOutcome)> = JoinSet::new();

        loop {
            let mut index = 0;
            while index < pending.len() && running.len() < self.config.score_concurrency {
                let ready = graph
                    .dependencies(&pending[index])
                    .iter()
                    .all(|dependency| outcomes.contains_key(dependency));
                if !ready {
                    index += 1;
                    continue;
                }

                let id = pending.remove(index);
                let Some(definition) = graph.definition(&id).cloned() else {
                    continue;
                };

                match gate(&definition, &upstream) {
                    Gate::Skip(reason) => {
                        info!("Skipping score '{}': {}", definition.name, reason);
                        let outcome = ScoreOutcome::skipped(reason);
                        upstream.record(&definition, &outcome);
                        metrics.record(&outcome);
                        outcomes.insert(id, outcome);
                        // A skip can unblock scores earlier in the pending list
                        index = 0;
                    }
                    Gate::Run => {
                        let ledger = CostLedger::new();
                        ledgers.push(ledger.clone());
                        in_flight.insert(id.clone());
                        spawn_score(
                            &mut running,
                            Arc::clone(&self.engine),
                            definition,
                            Arc::clone(&text),
                            Arc::clone(&metadata),
                            ledger,
                        );
                    }
                }
            }

            match running.join_next().await {
                Some(Ok((id, outcome))) => {
                    in_flight.remove(&id);
                    if let Some(definition) = graph.definition(&id) {
                        upstream.record(definition, &outcome);
                    }
                    metrics.record(&outcome);
                    outcomes.insert(id, outcome);
                }
                Some(Err(e)) => error!("Score task failed: {}", e),
                None => break,
            }
        }

        // Anything without an outcome was on a cycle or lost with its task
        let cyclic: BTreeSet<&String> = order.cyclic.iter().collect();
        for id in graph.nodes() {
            if outcomes.contains_key(id) {
                continue;
            }
            let name = graph.id_to_name().get(id).cloned().unwrap_or_else(|| id.clone());
            let reason = if cyclic.contains(id) {
                SchedulerError::Cycle(order.cyclic.clone()).to_string()
            } else if in_flight.contains(id) {
                let message = format!("evaluation of '{}' did not complete", name);
                SchedulerError::Worker(message).to_string()
            } else {
                SchedulerError::Worker(format!("'{}' was never scheduled", name)).to_string()
            };
            let outcome = ScoreOutcome::error(name, reason);
            metrics.record(&outcome);
            outcomes.insert(id.clone(), outcome);
        }

        let mut results: BTreeMap<String, ScoreOutcome> = BTreeMap::new();
        for (id, outcome) in outcomes {
            let name = graph.id_to_name().get(&id).cloned().unwrap_or(id);
            results.insert(name, outcome);
        }
        for request in graph.requested().iter().filter(|request| request.id.is_none()) {
            let outcome = ScoreOutcome::error(
                request.identifier.clone(),
                SchedulerError::UnknownScore(request.identifier.clone()).to_string(),
            );
            metrics.record(&outcome);
            results.insert(request.identifier.clone(), outcome);
        }

        // Ledgers are read last so calls that finished after a short-circuit still count
        let mut cost = CostSnapshot::default();
        for ledger in &ledgers {
            cost.merge(&ledger.snapshot());
        }

        metrics.unresolved_dependencies = graph.unresolved().len();
        metrics.request_count = cost.request_count;
        metrics.set_elapsed(started.elapsed());
        info!("Scorecard run finished:\n{}", metrics.summary());

        ScorecardOutput {
            run_id,
            results,
            name_to_id: graph.name_to_id().clone(),
            cost,
            metrics,
        }
    }
}

fn spawn_score<P>(
    running: &mut JoinSet<(String, ScoreOutcome)>,
    engine: Arc<DecisionTreeEvaluator<P>>,
    definition: Arc<ScoreDefinition>,
    text: Arc<str>,
    metadata: Arc<Metadata>,
    ledger: CostLedger,
) where
    P: ModelProvider + Send + Sync + 'static,
{
    let span = info_span!("score", score = %definition.name, id = %definition.id);
    let id = definition.id.clone();
    let name = definition.name.clone();

    let evaluation =
        tokio::spawn(evaluate_score(engine, definition, text, metadata, ledger).instrument(span));

    // The inner task isolates panics, so a failure still maps back to its score
    running.spawn(async move {
        let outcome = match evaluation.await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("Score '{}' panicked: {}", name, e);
                ScoreOutcome::error(name, EngineError::from(e).to_string())
            }
        };
        (id, outcome)
    });
}

async fn evaluate_score<P>(
    engine: Arc<DecisionTreeEvaluator<P>>,
    definition: Arc<ScoreDefinition>,
    text: Arc<str>,
    metadata: Arc<Metadata>,
    ledger: CostLedger,
) -> ScoreOutcome
where
    P: ModelProvider + Send + Sync + 'static,
{
    if let Err(message) = definition.validate() {
        let error = EngineError::Configuration(message);
        error!("Score '{}' is misconfigured: {}", definition.name, error);
        return ScoreOutcome::error(definition.name.clone(), error.to_string());
    }

    let ctx = EvaluationContext::for_score(&definition, &text, metadata, ledger.clone());
    let results = engine.score(&definition, &ctx).await;
    info!(
        "Score '{}' = {} ({} model call(s))",
        definition.name,
        results.first().map_or(ScoreResult::ERROR, |r| r.value.as_str()),
        ledger.len()
    );
    ScoreOutcome::Computed(results)
}
