//! Thread-safe facade over the registry, discovery and the resolver
//!
//! Readers share the registry lock; mutations take it exclusively. Query
//! results are stamped with the registry generation, so a query issued after
//! a mutation returns never sees the state from before it.

use anyhow::Result;
use serde_json::Value;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio_util::sync::CancellationToken;

use crate::classifier::Classifier;
use crate::config::{Config, RelationshipConfig};
use crate::discovery::DiscoveryEngine;
use crate::error::{DiscoveryError, RegistryError};
use crate::models::{AnalysisResult, FieldDefinition, Manifest, RenderContext};
use crate::registry::{Registration, Registry};
use crate::relationships::{self, RelationshipGraph, RelationshipIssue};

pub struct Engine {
    registry: RwLock<Registry>,
    discovery: DiscoveryEngine,
    classifier: Classifier,
    relationships: RelationshipConfig,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    pub fn new() -> Self {
        Self {
            registry: RwLock::new(Registry::new()),
            discovery: DiscoveryEngine::default(),
            classifier: Classifier::new(),
            relationships: RelationshipConfig::default(),
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            registry: RwLock::new(Registry::new()),
            discovery: DiscoveryEngine::new(config.discovery.cache_capacity),
            classifier: Classifier::from_config(&config.classifier)?,
            relationships: config.relationships.clone(),
        })
    }

    fn read(&self) -> RwLockReadGuard<'_, Registry> {
        self.registry.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Registry> {
        self.registry.write().unwrap_or_else(PoisonError::into_inner)
    }

    // Writers

    pub fn register(&self, manifest: Manifest) -> Result<Registration, RegistryError> {
        self.write().register(manifest)
    }

    pub fn register_value(&self, document: Value) -> Result<Registration, RegistryError> {
        self.write().register_value(document)
    }

    pub fn unregister(&self, id: &str) -> bool {
        self.write().unregister(id)
    }

    pub fn clear(&self) {
        self.write().clear();
    }

    pub fn apply_patch(
        &self,
        id: &str,
        patch: &json_patch::Patch,
    ) -> Result<Registration, RegistryError> {
        self.write().apply_patch(id, patch)
    }

    // Readers

    pub fn get(&self, id: &str) -> Option<Arc<Manifest>> {
        self.read().get(id).cloned()
    }

    pub fn has(&self, id: &str) -> bool {
        self.read().has(id)
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Snapshot of every manifest in registry order
    pub fn manifests(&self) -> Vec<Arc<Manifest>> {
        self.read().iter().cloned().collect()
    }

    /// Run `f` against the registry under the read lock
    pub fn with_registry<R>(&self, f: impl FnOnce(&Registry) -> R) -> R {
        f(&self.read())
    }

    pub fn find(&self, query: &Value) -> Vec<Arc<Manifest>> {
        self.discovery.find(&self.read(), query)
    }

    pub fn find_cancellable(
        &self,
        query: &Value,
        token: &CancellationToken,
    ) -> Result<Vec<Arc<Manifest>>, DiscoveryError> {
        self.discovery.find_cancellable(&self.read(), query, token)
    }

    pub fn clear_query_cache(&self) {
        self.discovery.clear_cache();
    }

    /// Manifests `id` references under `key`; empty when `id` is unknown
    pub fn resolve_relationships(&self, id: &str, key: &str) -> Vec<Arc<Manifest>> {
        let registry = self.read();
        match registry.get(id) {
            Some(manifest) => relationships::resolve_relationships(&registry, manifest, key),
            None => Vec::new(),
        }
    }

    pub fn detect_circular_relationships(&self, id: &str, key: &str) -> Option<Vec<String>> {
        let registry = self.read();
        let manifest = registry.get(id)?;
        relationships::detect_circular_relationships(&registry, manifest, key)
    }

    /// Graph over the configured relation keys
    pub fn relationship_graph(&self) -> RelationshipGraph {
        self.relationship_graph_for(self.relationships.graph_keys.as_slice())
    }

    pub fn relationship_graph_for<S: AsRef<str>>(&self, keys: &[S]) -> RelationshipGraph {
        relationships::build_relationship_graph(&self.read(), keys)
    }

    /// Orphans and cycles along the configured cycle key
    pub fn validate_relationships(&self) -> Vec<RelationshipIssue> {
        let registry = self.read();
        relationships::validate_relationships_along(&registry, &self.relationships.cycle_key)
    }

    // Classification

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    pub fn analyze(&self, field: &FieldDefinition, context: RenderContext) -> AnalysisResult {
        self.classifier.analyze(field, context)
    }
}
