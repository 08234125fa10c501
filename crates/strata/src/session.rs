//! A shared, reloadable graph for concurrent readers.
//!
//! Readers take a cheap [`Arc`] snapshot of the current index and query it
//! without holding any lock. A reload builds the new index first, then swaps
//! it in under a short write lock and bumps the generation, so a reader sees
//! either the old graph or the new one, never a mix.

use std::sync::{Arc, RwLock};

use tracing::{debug, info};

use crate::cache::SubgraphCache;
use crate::error::{Error, Result};
use crate::index::GraphIndex;
use crate::model::{DependencyGraph, NodeId};
use crate::query::{GraphQueries, PathLimits, PathSearch};
use crate::subgraph::{
    program_chain, ProgramChain, Subgraph, SubgraphRequest, DEFAULT_MAX_CALL_DEPTH,
};

#[derive(Debug)]
struct Loaded {
    index: Arc<GraphIndex>,
    generation: u64,
}

/// Query settings carried by a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSettings {
    /// Program hops followed by drill-downs and program chains
    pub max_call_depth: usize,
    /// Path search bounds
    pub path_limits: PathLimits,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
            path_limits: PathLimits::default(),
        }
    }
}

/// The loaded graph, its generation and memoized subgraphs.
#[derive(Debug)]
pub struct GraphSession {
    loaded: RwLock<Loaded>,
    cache: SubgraphCache,
    settings: SessionSettings,
}

impl GraphSession {
    /// Session over `graph` with default settings.
    #[must_use]
    pub fn new(graph: DependencyGraph) -> Self {
        Self::with_settings(graph, SessionSettings::default())
    }

    /// Session over `graph`.
    #[must_use]
    pub fn with_settings(graph: DependencyGraph, settings: SessionSettings) -> Self {
        Self {
            loaded: RwLock::new(Loaded {
                index: Arc::new(GraphIndex::new(graph)),
                generation: 1,
            }),
            cache: SubgraphCache::default(),
            settings,
        }
    }

    /// Settings in effect.
    #[must_use]
    pub fn settings(&self) -> SessionSettings {
        self.settings
    }

    /// The current index and its generation.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Internal`] if the session lock is poisoned.
    pub fn snapshot_with_generation(&self) -> Result<(Arc<GraphIndex>, u64)> {
        let loaded = self
            .loaded
            .read()
            .map_err(|e| Error::Internal(format!("graph session lock poisoned: {e}")))?;
        Ok((Arc::clone(&loaded.index), loaded.generation))
    }

    /// The current index.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Internal`] if the session lock is poisoned.
    pub fn snapshot(&self) -> Result<Arc<GraphIndex>> {
        Ok(self.snapshot_with_generation()?.0)
    }

    /// Generation of the current index. Starts at 1 and grows by one per reload.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Internal`] if the session lock is poisoned.
    pub fn generation(&self) -> Result<u64> {
        Ok(self.snapshot_with_generation()?.1)
    }

    /// Replace the graph, returning the new generation. Cached subgraphs are
    /// dropped. Snapshots taken earlier keep the old graph alive.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Internal`] if the session or cache lock is poisoned.
    pub fn reload(&self, graph: DependencyGraph) -> Result<u64> {
        let index = Arc::new(GraphIndex::new(graph));
        let generation = {
            let mut loaded = self
                .loaded
                .write()
                .map_err(|e| Error::Internal(format!("graph session lock poisoned: {e}")))?;
            loaded.index = index;
            loaded.generation += 1;
            loaded.generation
        };
        let dropped = self.cache.invalidate()?;
        info!(generation, dropped_subgraphs = dropped, "Reloaded graph");
        Ok(generation)
    }

    /// Answer a subgraph request, from the cache when possible.
    ///
    /// # Errors
    ///
    /// See [`SubgraphRequest::run`].
    pub fn subgraph(&self, request: &SubgraphRequest) -> Result<Arc<Subgraph>> {
        let (index, generation) = self.snapshot_with_generation()?;
        if let Some(hit) = self.cache.get(request, generation)? {
            return Ok(hit);
        }
        let subgraph = Arc::new(request.run(&index, self.settings.max_call_depth)?);
        if !self.cache.insert(request.clone(), generation, Arc::clone(&subgraph))? {
            debug!(scope = %request.scope, name = %request.name, "Subgraph not cached");
        }
        Ok(subgraph)
    }

    /// Program chain of `seed` in the current graph.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the seed does not exist.
    pub fn program_chain(&self, seed: &NodeId) -> Result<ProgramChain> {
        let index = self.snapshot()?;
        program_chain(&index, seed, self.settings.max_call_depth)
    }

    /// Paths from `from` to `to` in the current graph, within the session's
    /// path limits.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Internal`] if the session lock is poisoned.
    pub fn find_paths(&self, from: &NodeId, to: &NodeId) -> Result<PathSearch> {
        let index = self.snapshot()?;
        Ok(index.find_paths_bounded(from, to, self.settings.path_limits))
    }

    /// Number of cached subgraphs.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Internal`] if the cache lock is poisoned.
    pub fn cached_subgraphs(&self) -> Result<usize> {
        self.cache.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{EstateRecords, GraphBuilder};
    use crate::model::NodeType;
    use crate::subgraph::Scope;
    use strata_records::{JobRecord, SchedulerExport};

    fn graph_with(jobs: &[&str]) -> DependencyGraph {
        let records = EstateRecords {
            scheduler: SchedulerExport::from_jobs(
                jobs.iter()
                    .map(|name| JobRecord::new(*name).placed(Some("A"), Some("S"), Some("F1"))),
            ),
            ..EstateRecords::default()
        };
        GraphBuilder::new().build(&records, Vec::new()).graph
    }

    #[test]
    fn repeated_requests_hit_the_cache() {
        let session = GraphSession::new(graph_with(&["J1"]));
        let request = SubgraphRequest::new(Scope::Folder, "F1");

        let first = session.subgraph(&request).unwrap();
        let second = session.subgraph(&request).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(session.cached_subgraphs().unwrap(), 1);
    }

    #[test]
    fn reload_swaps_graph_and_clears_cache() {
        let session = GraphSession::new(graph_with(&["J1"]));
        let request = SubgraphRequest::new(Scope::Folder, "F1");
        let before = session.subgraph(&request).unwrap();
        let old_snapshot = session.snapshot().unwrap();

        assert_eq!(session.reload(graph_with(&["J1", "J2"])).unwrap(), 2);

        assert_eq!(session.cached_subgraphs().unwrap(), 0);
        let after = session.subgraph(&request).unwrap();
        assert_eq!(before.job_count, 1);
        assert_eq!(after.job_count, 2);
        assert!(!old_snapshot.contains(&NodeId::new(NodeType::ControlmJob, "J2")));
    }

    #[test]
    fn readers_see_whole_generations_during_reload() {
        let session = GraphSession::new(graph_with(&["J1"]));
        let small = session.snapshot().unwrap().stats().fingerprint;
        let large = GraphIndex::new(graph_with(&["J1", "J2", "J3"]))
            .stats()
            .fingerprint;

        std::thread::scope(|scope| {
            for _ in 0..4 {
                scope.spawn(|| {
                    for _ in 0..50 {
                        let index = session.snapshot().unwrap();
                        let fingerprint = index.stats().fingerprint;
                        assert!(fingerprint == small || fingerprint == large);
                        assert_eq!(index.graph().fingerprint(), fingerprint);
                    }
                });
            }
            scope.spawn(|| {
                session.reload(graph_with(&["J1", "J2", "J3"])).unwrap();
            });
        });

        assert_eq!(session.generation().unwrap(), 2);
    }

    #[test]
    fn path_search_uses_session_limits() {
        let settings = SessionSettings {
            path_limits: PathLimits {
                max_hops: 1,
                ..PathLimits::default()
            },
            ..SessionSettings::default()
        };
        let session = GraphSession::with_settings(graph_with(&["J1"]), settings);
        let app = NodeId::new(NodeType::Application, "A");
        let job = NodeId::new(NodeType::ControlmJob, "J1");

        assert!(session.find_paths(&app, &job).unwrap().paths.is_empty());
        assert_eq!(session.reload(graph_with(&["J1"])).unwrap(), 2);
        let direct = NodeId::new(NodeType::Folder, "F1");
        assert_eq!(session.find_paths(&direct, &job).unwrap().paths.len(), 1);
    }

    #[test]
    fn program_chain_of_unknown_seed_is_not_found() {
        let session = GraphSession::new(graph_with(&["J1"]));
        let err = session
            .program_chain(&NodeId::new(NodeType::Pl1Program, "NOPE"))
            .unwrap_err();
        assert!(err.is_not_found());
    }
}
