//! Registry of resolved score definitions.
//!
//! Owned by one scheduler and passed by reference to the graph builder; nothing is
//! registered globally. Lookups accept any alias of a score.

use scorecard_domain::ScoreDefinition;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Score definitions resolved so far, in registration order
#[derive(Debug, Default)]
pub struct ScoreRegistry {
    definitions: RwLock<Vec<Arc<ScoreDefinition>>>,
}

impl ScoreRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry from definitions
    pub fn from_definitions(definitions: Vec<ScoreDefinition>) -> Self {
        let registry = Self::new();
        for definition in definitions {
            registry.register(definition);
        }
        registry
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<Arc<ScoreDefinition>>> {
        self.definitions.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<Arc<ScoreDefinition>>> {
        self.definitions.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a definition, replacing any previous one with the same id
    pub fn register(&self, definition: ScoreDefinition) -> Arc<ScoreDefinition> {
        let definition = Arc::new(definition);
        let mut definitions = self.write();
        definitions.retain(|existing| existing.id != definition.id);
        definitions.push(Arc::clone(&definition));
        definition
    }

    /// Look up a definition by id, key, external id or name
    pub fn resolve(&self, identifier: &str) -> Option<Arc<ScoreDefinition>> {
        let identifier = identifier.trim();
        let definitions = self.read();

        // An exact id match wins over other aliases
        definitions
            .iter()
            .find(|definition| definition.id == identifier)
            .or_else(|| definitions.iter().find(|definition| definition.answers_to(identifier)))
            .cloned()
    }

    /// Ids of all registered definitions
    pub fn ids(&self) -> Vec<String> {
        self.read().iter().map(|definition| definition.id.clone()).collect()
    }

    /// Drop every registered definition
    pub fn clear(&self) {
        self.write().clear();
    }

    /// Get definition count
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Whether nothing is registered
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
