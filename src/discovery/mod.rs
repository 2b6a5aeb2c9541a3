//! Query evaluation over a registry

pub mod cache;
pub mod query;

pub use cache::{QueryCache, Stamp};
pub use query::{Clause, Glob, Predicate, Query};

use serde_json::Value;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::DiscoveryError;
use crate::models::Manifest;
use crate::registry::Registry;

/// Cached query results kept by default
pub const DEFAULT_CACHE_CAPACITY: usize = 256;

/// Manifests scanned between cancellation checks
const CANCEL_CHECK_INTERVAL: usize = 256;

/// Runs queries against a registry and memoizes the results
#[derive(Debug)]
pub struct DiscoveryEngine {
    cache: Mutex<QueryCache>,
}

impl Default for DiscoveryEngine {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}

impl DiscoveryEngine {
    pub fn new(cache_capacity: usize) -> Self {
        Self {
            cache: Mutex::new(QueryCache::new(cache_capacity)),
        }
    }

    /// All manifests matching `query`, in registry order.
    ///
    /// A malformed query yields an empty result and a warning.
    pub fn find(&self, registry: &Registry, query: &Value) -> Vec<Arc<Manifest>> {
        let parsed = match Query::parse(query) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(error = %e, "malformed discovery query");
                return Vec::new();
            }
        };

        // object keys are sorted, so this is canonical
        let key = query.to_string();
        let stamp = Stamp::of(registry);

        if let Some(hit) = self.lock().get(stamp, &key) {
            debug!(query = %key, results = hit.len(), "discovery cache hit");
            return hit;
        }

        let results = scan(registry, &parsed);
        debug!(query = %key, results = results.len(), "discovery cache miss");
        self.lock().insert(stamp, key, results.clone());
        results
    }

    /// Evaluate an already parsed query, bypassing the cache
    pub fn find_query(&self, registry: &Registry, query: &Query) -> Vec<Arc<Manifest>> {
        scan(registry, query)
    }

    /// Like [`find`](Self::find), but gives up once `token` is cancelled.
    /// Results of a cancellable scan are never cached.
    pub fn find_cancellable(
        &self,
        registry: &Registry,
        query: &Value,
        token: &CancellationToken,
    ) -> Result<Vec<Arc<Manifest>>, DiscoveryError> {
        let parsed = match Query::parse(query) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(error = %e, "malformed discovery query");
                return Ok(Vec::new());
            }
        };

        let mut results = Vec::new();
        for (scanned, entry) in registry.entries().enumerate() {
            if scanned % CANCEL_CHECK_INTERVAL == 0 && token.is_cancelled() {
                debug!(scanned, "discovery scan cancelled");
                return Err(DiscoveryError::Cancelled { scanned });
            }
            if parsed.matches(entry.document()) {
                results.push(Arc::clone(entry.manifest()));
            }
        }
        Ok(results)
    }

    pub fn clear_cache(&self) {
        self.lock().clear();
    }

    pub fn cache_len(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> MutexGuard<'_, QueryCache> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn scan(registry: &Registry, query: &Query) -> Vec<Arc<Manifest>> {
    registry
        .entries()
        .filter(|entry| query.matches(entry.document()))
        .map(|entry| Arc::clone(entry.manifest()))
        .collect()
}
