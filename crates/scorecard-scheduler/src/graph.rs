//! Dependency discovery and execution ordering
//!
//! The builder resolves the requested scores, then walks their dependencies level by
//! level. Scores already in the graph are not expanded again, so cycles terminate;
//! the depth bound cuts off chains that keep discovering new scores.

use crate::error::SchedulerError;
use crate::registry::ScoreRegistry;
use scorecard_domain::{ConfigurationSource, ScoreDefinition};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, warn};

/// A requested identifier and the score it resolved to, if any
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestedScore {
    /// Identifier as requested
    pub identifier: String,
    /// Id of the resolved score
    pub id: Option<String>,
}

/// Scores needed for one scheduling request and the depends-on relation between them
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    nodes: Vec<String>,
    definitions: BTreeMap<String, Arc<ScoreDefinition>>,
    edges: BTreeMap<String, Vec<String>>,
    aliases: BTreeMap<String, String>,
    name_to_id: BTreeMap<String, String>,
    id_to_name: BTreeMap<String, String>,
    requested: Vec<RequestedScore>,
    unresolved: Vec<(String, String)>,
    truncated: bool,
}

/// Topological order of a graph
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionOrder {
    /// Ids such that every score follows its dependencies
    pub order: Vec<String>,
    /// Ids that cannot be ordered because they are on, or depend on, a cycle
    pub cyclic: Vec<String>,
}

impl DependencyGraph {
    /// Ids of all scores, in discovery order
    pub fn nodes(&self) -> &[String] {
        &self.nodes
    }

    /// Whether the graph holds a score with this id
    pub fn contains(&self, id: &str) -> bool {
        self.definitions.contains_key(id)
    }

    /// Definition of a score
    pub fn definition(&self, id: &str) -> Option<&Arc<ScoreDefinition>> {
        self.definitions.get(id)
    }

    /// Ids of the scores `id` depends on
    pub fn dependencies(&self, id: &str) -> &[String] {
        self.edges.get(id).map(Vec::as_slice).unwrap_or_default()
    }

    /// Ids of the scores depending on `id`
    pub fn dependents(&self, id: &str) -> Vec<&str> {
        self.edges
            .iter()
            .filter(|(_, upstream)| upstream.iter().any(|u| u == id))
            .map(|(dependent, _)| dependent.as_str())
            .collect()
    }

    /// Every `(dependent, dependency)` edge
    pub fn edges(&self) -> Vec<(&str, &str)> {
        self.edges
            .iter()
            .flat_map(|(dependent, upstream)| {
                upstream.iter().map(move |u| (dependent.as_str(), u.as_str()))
            })
            .collect()
    }

    /// Resolve any alias (id, key, external id, name) to a score id
    pub fn resolve(&self, identifier: &str) -> Option<&str> {
        let identifier = identifier.trim();
        if self.definitions.contains_key(identifier) {
            return Some(self.definitions.get_key_value(identifier)?.0.as_str());
        }
        self.aliases.get(identifier).map(String::as_str)
    }

    /// Score name to id
    pub fn name_to_id(&self) -> &BTreeMap<String, String> {
        &self.name_to_id
    }

    /// Score id to name
    pub fn id_to_name(&self) -> &BTreeMap<String, String> {
        &self.id_to_name
    }

    /// Requested identifiers, in request order
    pub fn requested(&self) -> &[RequestedScore] {
        &self.requested
    }

    /// `(score id, identifier)` pairs of dependencies that could not be resolved
    pub fn unresolved(&self) -> &[(String, String)] {
        &self.unresolved
    }

    /// Whether discovery stopped at the depth bound
    pub fn truncated(&self) -> bool {
        self.truncated
    }

    /// Number of scores
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the graph holds no score
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Order scores so that dependencies come first
    ///
    /// Ties are broken by discovery order, so the result is deterministic.
    pub fn execution_order(&self) -> ExecutionOrder {
        let mut placed: BTreeSet<&str> = BTreeSet::new();
        let mut order = Vec::with_capacity(self.nodes.len());

        loop {
            let ready: Vec<&String> = self
                .nodes
                .iter()
                .filter(|id| !placed.contains(id.as_str()))
                .filter(|id| self.dependencies(id).iter().all(|dep| placed.contains(dep.as_str())))
                .collect();
            if ready.is_empty() {
                break;
            }
            for id in ready {
                placed.insert(id);
                order.push(id.clone());
            }
        }

        let cyclic = self
            .nodes
            .iter()
            .filter(|id| !placed.contains(id.as_str()))
            .cloned()
            .collect();

        ExecutionOrder { order, cyclic }
    }

    fn insert(&mut self, definition: Arc<ScoreDefinition>) -> bool {
        if self.definitions.contains_key(&definition.id) {
            return false;
        }

        for alias in definition.aliases() {
            self.aliases.entry(alias.to_string()).or_insert_with(|| definition.id.clone());
        }
        self.name_to_id.insert(definition.name.clone(), definition.id.clone());
        self.id_to_name.insert(definition.id.clone(), definition.name.clone());
        self.nodes.push(definition.id.clone());
        self.edges.entry(definition.id.clone()).or_default();
        self.definitions.insert(definition.id.clone(), definition);
        true
    }

    fn add_edge(&mut self, dependent: &str, dependency: &str) {
        let upstream = self.edges.entry(dependent.to_string()).or_default();
        if !upstream.iter().any(|existing| existing == dependency) {
            upstream.push(dependency.to_string());
        }
    }
}

/// Discovers the transitive dependencies of requested scores
pub struct DependencyGraphBuilder<'a, C> {
    source: &'a C,
    scorecard: &'a str,
    registry: &'a ScoreRegistry,
    max_depth: usize,
}

impl<'a, C> DependencyGraphBuilder<'a, C>
where
    C: ConfigurationSource,
{
    /// Create a builder resolving definitions from `source`, caching them in `registry`
    pub fn new(
        source: &'a C,
        scorecard: &'a str,
        registry: &'a ScoreRegistry,
        max_depth: usize,
    ) -> Self {
        Self {
            source,
            scorecard,
            registry,
            max_depth,
        }
    }

    /// Build the graph for the requested identifiers
    ///
    /// Never fails: unknown requested scores are recorded in
    /// [`DependencyGraph::requested`], unresolved dependencies are logged and
    /// left out, and hitting the depth bound keeps the partial graph.
    pub fn build(&self, requested: &[&str]) -> DependencyGraph {
        let mut graph = DependencyGraph::default();
        let mut frontier: Vec<(String, Option<String>)> = requested
            .iter()
            .map(|identifier| (identifier.trim().to_string(), None))
            .collect();
        let mut depth = 0;

        while !frontier.is_empty() {
            if depth > self.max_depth {
                // Past the bound no new scores are added, but edges between known ones still are
                let mut cut = 0;
                for (identifier, dependent) in &frontier {
                    let known = graph.resolve(identifier).map(str::to_string);
                    match (known, dependent) {
                        (Some(id), Some(dependent)) => graph.add_edge(dependent, &id),
                        _ => cut += 1,
                    }
                }
                if cut > 0 {
                    warn!(
                        "Dependency depth bound {} reached; continuing with a partial graph \
                         ({} cut)",
                        self.max_depth, cut
                    );
                    graph.truncated = true;
                }
                break;
            }

            let mut next = Vec::new();
            for (identifier, dependent) in frontier {
                let resolved = self.lookup(&identifier);

                match (&resolved, &dependent) {
                    (Some(definition), Some(dependent)) => {
                        graph.add_edge(dependent, &definition.id)
                    }
                    (Some(definition), None) => graph.requested.push(RequestedScore {
                        identifier: identifier.clone(),
                        id: Some(definition.id.clone()),
                    }),
                    (None, Some(dependent)) => {
                        let name = graph
                            .id_to_name
                            .get(dependent)
                            .cloned()
                            .unwrap_or_else(|| dependent.clone());
                        let error = SchedulerError::DependencyUnresolved {
                            score: name,
                            dependency: identifier.clone(),
                        };
                        warn!("{}", error);
                        graph.unresolved.push((dependent.clone(), identifier.clone()));
                    }
                    (None, None) => {
                        warn!("{}", SchedulerError::UnknownScore(identifier.clone()));
                        graph.requested.push(RequestedScore {
                            identifier: identifier.clone(),
                            id: None,
                        });
                    }
                }

                if let Some(definition) = resolved {
                    let id = definition.id.clone();
                    let upstream: Vec<String> = definition
                        .upstream_identifiers()
                        .into_iter()
                        .map(str::to_string)
                        .collect();
                    if graph.insert(definition) {
                        debug!(
                            "Discovered score '{}' at depth {} ({} upstream)",
                            id,
                            depth,
                            upstream.len()
                        );
                        next.extend(
                            upstream
                                .into_iter()
                                .map(|identifier| (identifier, Some(id.clone()))),
                        );
                    }
                }
            }

            frontier = next;
            depth += 1;
        }

        graph
    }

    fn lookup(&self, identifier: &str) -> Option<Arc<ScoreDefinition>> {
        if let Some(definition) = self.registry.resolve(identifier) {
            return Some(definition);
        }

        match self.source.score_definition(self.scorecard, identifier) {
            Ok(Some(definition)) => Some(self.registry.register(definition)),
            Ok(None) => None,
            Err(e) => {
                let message = format!("lookup of '{}' failed: {}", identifier, e);
                warn!("{}", SchedulerError::Source(message));
                None
            }
        }
    }
}
