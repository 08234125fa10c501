//! Memoized subgraph results.
//!
//! Entries are keyed by the full request (scope, name, drill target) and
//! tagged with the generation of the graph they were computed from. A lookup
//! with a different generation misses, so a reload can never serve a stale
//! subgraph even if invalidation races with an insert.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::subgraph::{Subgraph, SubgraphRequest};

/// Default number of cached subgraphs
pub const DEFAULT_CACHE_CAPACITY: usize = 256;

/// Bounded cache of subgraph results.
#[derive(Debug)]
pub struct SubgraphCache {
    entries: Mutex<HashMap<SubgraphRequest, (u64, Arc<Subgraph>)>>,
    capacity: usize,
}

impl Default for SubgraphCache {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CACHE_CAPACITY)
    }
}

impl SubgraphCache {
    /// Cache holding at most `capacity` results.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            capacity,
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<SubgraphRequest, (u64, Arc<Subgraph>)>>> {
        self.entries
            .lock()
            .map_err(|e| Error::Internal(format!("subgraph cache lock poisoned: {e}")))
    }

    /// Cached result for `request` computed from graph `generation`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Internal`] if the cache lock is poisoned.
    pub fn get(&self, request: &SubgraphRequest, generation: u64) -> Result<Option<Arc<Subgraph>>> {
        let entries = self.lock()?;
        let hit = entries
            .get(request)
            .filter(|(cached_generation, _)| *cached_generation == generation)
            .map(|(_, subgraph)| Arc::clone(subgraph));
        trace!(scope = %request.scope, name = %request.name, hit = hit.is_some(), "Subgraph cache lookup");
        Ok(hit)
    }

    /// Store a result. Returns `false` if the cache is full and the request
    /// is not already cached.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Internal`] if the cache lock is poisoned.
    pub fn insert(
        &self,
        request: SubgraphRequest,
        generation: u64,
        subgraph: Arc<Subgraph>,
    ) -> Result<bool> {
        let mut entries = self.lock()?;
        if entries.len() >= self.capacity && !entries.contains_key(&request) {
            entries.retain(|_, (cached_generation, _)| *cached_generation == generation);
            if entries.len() >= self.capacity {
                debug!(capacity = self.capacity, "Subgraph cache full");
                return Ok(false);
            }
        }
        entries.insert(request, (generation, subgraph));
        Ok(true)
    }

    /// Drop every entry.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Internal`] if the cache lock is poisoned.
    pub fn invalidate(&self) -> Result<usize> {
        let mut entries = self.lock()?;
        let dropped = entries.len();
        entries.clear();
        Ok(dropped)
    }

    /// Number of cached results.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Internal`] if the cache lock is poisoned.
    pub fn len(&self) -> Result<usize> {
        Ok(self.lock()?.len())
    }

    /// Whether nothing is cached.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Internal`] if the cache lock is poisoned.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.lock()?.is_empty())
    }
}
