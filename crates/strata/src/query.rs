//! Read-only queries over a [`GraphIndex`].
//!
//! Direction convention: an edge `from → to` means `to` depends on `from`.
//! The dependencies of a node are the sources of its incoming edges; its
//! dependents are the targets of its outgoing edges.
//!
//! Closures are iterative breadth-first walks with a visited set. Path
//! enumeration is an iterative depth-first search bounded by a hop cap and an
//! expansion budget, since its worst case is exponential on dense graphs.

use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};

use petgraph::algo::tarjan_scc;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::Result;
use crate::index::GraphIndex;
use crate::model::{Edge, EdgeType, GraphMetadata, Node, NodeId, NodeType};

/// Default hop cap for path enumeration.
pub const DEFAULT_MAX_PATH_HOPS: usize = 50;

/// Default number of edge expansions a single path search may perform.
pub const DEFAULT_PATH_SEARCH_BUDGET: usize = 1_000_000;

/// Bounds for [`GraphQueries::find_paths_bounded`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathLimits {
    /// Longest path returned, in edges
    pub max_hops: usize,
    /// Edge expansions before the search gives up
    pub budget: usize,
}

impl Default for PathLimits {
    fn default() -> Self {
        Self {
            max_hops: DEFAULT_MAX_PATH_HOPS,
            budget: DEFAULT_PATH_SEARCH_BUDGET,
        }
    }
}

/// Paths found by a bounded search.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PathSearch {
    /// Every simple path found, each from origin to target
    pub paths: Vec<Vec<NodeId>>,
    /// Whether the search stopped early on its expansion budget
    pub budget_exhausted: bool,
}

/// What breaks if a node changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImpactReport {
    /// The analysed node
    pub node: Node,
    /// Number of transitive dependents
    pub total_impacted: usize,
    /// Transitive dependents grouped by node type
    pub impacted_by_type: BTreeMap<NodeType, BTreeSet<NodeId>>,
}

impl ImpactReport {
    /// Number of impacted nodes of one type.
    #[must_use]
    pub fn count(&self, node_type: NodeType) -> usize {
        self.impacted_by_type.get(&node_type).map_or(0, BTreeSet::len)
    }
}

/// Direct and transitive neighbourhood of a node in both directions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DependencyChain {
    /// The analysed node
    pub node: Node,
    /// Sources of incoming edges
    pub direct_dependencies: BTreeSet<NodeId>,
    /// Full dependency closure
    pub all_dependencies: BTreeSet<NodeId>,
    /// Targets of outgoing edges
    pub direct_dependents: BTreeSet<NodeId>,
    /// Full dependent closure
    pub all_dependents: BTreeSet<NodeId>,
}

/// Side of a condition a job sits on relative to another job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowDirection {
    /// The job produces a condition the other job requires
    Outgoing,
    /// The other job produces a condition the job requires
    Incoming,
}

/// A condition link between jobs in different folders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CrossFolderDependency {
    /// Which side of the condition the inspected job is on
    pub direction: FlowDirection,
    /// Name of the job on the other side
    pub job: String,
    /// Id of the job on the other side
    pub job_id: NodeId,
    /// Folder of the job on the other side
    pub folder: Option<String>,
    /// Condition name
    pub condition: String,
}

/// A node with its direct edges.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeView {
    /// The node
    pub node: Node,
    /// Outgoing edges, capped
    pub outgoing: Vec<Edge>,
    /// Incoming edges, capped
    pub incoming: Vec<Edge>,
    /// Outgoing edges before the cap
    pub total_outgoing: usize,
    /// Incoming edges before the cap
    pub total_incoming: usize,
    /// For jobs, condition links to jobs in other folders
    pub cross_folder: Vec<CrossFolderDependency>,
}

/// One entry of the lazily expanded hierarchy tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TreeEntry {
    /// Node id
    pub id: NodeId,
    /// Display name
    pub name: String,
    /// Node type
    #[serde(rename = "type")]
    pub node_type: NodeType,
    /// Number of `contains` children
    pub child_count: usize,
    /// Jobs are leaves
    pub leaf: bool,
}

/// Read-only operations over a loaded graph.
///
/// Every operation is a pure read, safe to call concurrently.
pub trait GraphQueries: Send + Sync {
    /// Direct lookup.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`](crate::Error::NotFound) if the id is absent.
    fn get_node(&self, id: &NodeId) -> Result<&Node>;

    /// What `id` depends on: sources of incoming edges, or their closure.
    /// The origin is never part of the result.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`](crate::Error::NotFound) if the id is absent.
    fn dependencies(&self, id: &NodeId, recursive: bool) -> Result<BTreeSet<NodeId>>;

    /// What depends on `id`: targets of outgoing edges, or their closure.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`](crate::Error::NotFound) if the id is absent.
    fn dependents(&self, id: &NodeId, recursive: bool) -> Result<BTreeSet<NodeId>>;

    /// Every simple path from `from` to `to` within the default limits.
    /// Empty if either endpoint is absent.
    fn find_paths(&self, from: &NodeId, to: &NodeId) -> Vec<Vec<NodeId>> {
        self.find_paths_bounded(from, to, PathLimits::default()).paths
    }

    /// Every simple path from `from` to `to` within `limits`.
    fn find_paths_bounded(&self, from: &NodeId, to: &NodeId, limits: PathLimits) -> PathSearch;

    /// Cyclic paths through `id`, each starting and ending at `id`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`](crate::Error::NotFound) if the id is absent.
    fn find_cycles(&self, id: &NodeId) -> Result<Vec<Vec<NodeId>>>;

    /// Transitive dependents grouped by type.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`](crate::Error::NotFound) if the id is absent.
    fn impact_analysis(&self, id: &NodeId) -> Result<ImpactReport>;

    /// Ids whose node name contains `needle`, ignoring case.
    fn search_by_name(&self, needle: &str, node_type: Option<NodeType>) -> Vec<NodeId>;

    /// Direct and transitive dependencies and dependents.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`](crate::Error::NotFound) if the id is absent.
    fn dependency_chain(&self, id: &NodeId) -> Result<DependencyChain>;

    /// The node, its direct edges (at most `edge_limit` per direction) and,
    /// for jobs, cross-folder condition links.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`](crate::Error::NotFound) if the id is absent.
    fn node_detail(&self, id: &NodeId, edge_limit: usize) -> Result<NodeView>;

    /// Every strongly connected component with more than one member or a
    /// self-loop, estate wide.
    fn detect_cycles(&self) -> Vec<Vec<NodeId>>;

    /// Top of the hierarchy tree: application nodes.
    fn hierarchy_roots(&self) -> Vec<TreeEntry>;

    /// `contains` children of a node.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`](crate::Error::NotFound) if the id is absent.
    fn children(&self, id: &NodeId) -> Result<Vec<TreeEntry>>;

    /// Counts by type and the missing-reference report.
    fn stats(&self) -> GraphMetadata;
}

#[derive(Debug, Clone, Copy)]
enum Walk {
    Dependencies,
    Dependents,
}

/// Result of a breadth-first closure.
struct Closure<'a> {
    reached: HashSet<&'a NodeId>,
    reached_origin: bool,
}

impl GraphIndex {
    fn neighbours<'a>(&'a self, id: &NodeId, walk: Walk) -> Vec<&'a NodeId> {
        let mut neighbours: Vec<&NodeId> = match walk {
            Walk::Dependencies => self.incoming(id).map(|e| &e.from).collect(),
            Walk::Dependents => self.outgoing(id).map(|e| &e.to).collect(),
        };
        neighbours.sort_unstable();
        neighbours.dedup();
        neighbours
    }

    fn closure<'a>(&'a self, origin: &NodeId, walk: Walk) -> Closure<'a> {
        let mut reached: HashSet<&NodeId> = HashSet::new();
        let mut queue: VecDeque<&NodeId> = VecDeque::from([origin]);
        while let Some(current) = queue.pop_front() {
            for next in self.neighbours(current, walk) {
                if reached.insert(next) {
                    queue.push_back(next);
                }
            }
        }
        let reached_origin = reached.contains(origin);
        Closure {
            reached,
            reached_origin,
        }
    }

    fn walk(&self, id: &NodeId, walk: Walk, recursive: bool) -> Result<BTreeSet<NodeId>> {
        self.require(id)?;
        // Closures exclude the origin; direct neighbours keep a self-loop.
        if recursive {
            Ok(self
                .closure(id, walk)
                .reached
                .into_iter()
                .filter(|n| *n != id)
                .cloned()
                .collect())
        } else {
            Ok(self.neighbours(id, walk).into_iter().cloned().collect())
        }
    }

    fn tree_entry(&self, id: &NodeId) -> Option<TreeEntry> {
        let node = self.node(id)?;
        Some(TreeEntry {
            id: node.id.clone(),
            name: node.name.clone(),
            node_type: node.node_type(),
            child_count: self.contained(id).len(),
            leaf: node.node_type() == NodeType::ControlmJob,
        })
    }

    fn cross_folder(&self, job: &Node) -> Vec<CrossFolderDependency> {
        let Some(attributes) = job.job() else {
            return Vec::new();
        };
        let own_folder = attributes.folder.as_deref();

        let sides = [
            (EdgeType::Produces, EdgeType::Requires, FlowDirection::Outgoing),
            (EdgeType::Requires, EdgeType::Produces, FlowDirection::Incoming),
        ];
        let mut links = Vec::new();
        for (own, other, direction) in sides {
            for edge in self.outgoing_of(&job.id, own) {
                let condition = self
                    .node(&edge.to)
                    .map_or_else(|| edge.to.name().to_string(), |n| n.name.clone());
                for link in self.incoming_of(&edge.to, other) {
                    let Some(other_job) = self.node(&link.from) else {
                        continue;
                    };
                    let folder = other_job.job().and_then(|j| j.folder.clone());
                    if folder.as_deref() == own_folder {
                        continue;
                    }
                    links.push(CrossFolderDependency {
                        direction,
                        job: other_job.name.clone(),
                        job_id: other_job.id.clone(),
                        folder,
                        condition: condition.clone(),
                    });
                }
            }
        }
        links
    }
}

impl GraphQueries for GraphIndex {
    fn get_node(&self, id: &NodeId) -> Result<&Node> {
        self.require(id)
    }

    fn dependencies(&self, id: &NodeId, recursive: bool) -> Result<BTreeSet<NodeId>> {
        self.walk(id, Walk::Dependencies, recursive)
    }

    fn dependents(&self, id: &NodeId, recursive: bool) -> Result<BTreeSet<NodeId>> {
        self.walk(id, Walk::Dependents, recursive)
    }

    fn find_paths_bounded(&self, from: &NodeId, to: &NodeId, limits: PathLimits) -> PathSearch {
        let mut search = PathSearch::default();
        if !self.contains(from) || !self.contains(to) || limits.max_hops == 0 {
            return search;
        }

        // A path must leave the origin before it may end, so `from == to`
        // yields the cycles through the node rather than the node alone.
        let mut path: Vec<&NodeId> = vec![from];
        let mut on_path: HashSet<&NodeId> = HashSet::from([from]);
        let mut stack = vec![self.neighbours(from, Walk::Dependents).into_iter()];
        let mut expansions = 0usize;

        while let Some(frontier) = stack.last_mut() {
            let Some(next) = frontier.next() else {
                stack.pop();
                if let Some(done) = path.pop() {
                    on_path.remove(done);
                }
                continue;
            };

            expansions += 1;
            if expansions > limits.budget {
                search.budget_exhausted = true;
                warn!(
                    from = %from,
                    to = %to,
                    budget = limits.budget,
                    found = search.paths.len(),
                    "Path search budget exhausted"
                );
                break;
            }

            if next == to {
                let mut found: Vec<NodeId> = path.iter().map(|id| (*id).clone()).collect();
                found.push(next.clone());
                search.paths.push(found);
                continue;
            }
            if on_path.contains(next) || path.len() >= limits.max_hops {
                continue;
            }
            path.push(next);
            on_path.insert(next);
            stack.push(self.neighbours(next, Walk::Dependents).into_iter());
        }

        debug!(from = %from, to = %to, paths = search.paths.len(), expansions, "Path search finished");
        search
    }

    fn find_cycles(&self, id: &NodeId) -> Result<Vec<Vec<NodeId>>> {
        self.require(id)?;
        if !self.closure(id, Walk::Dependencies).reached_origin {
            return Ok(Vec::new());
        }
        Ok(self.find_paths(id, id))
    }

    fn impact_analysis(&self, id: &NodeId) -> Result<ImpactReport> {
        let node = self.require(id)?.clone();
        let dependents = self.dependents(id, true)?;

        let mut impacted_by_type: BTreeMap<NodeType, BTreeSet<NodeId>> = BTreeMap::new();
        for dependent in &dependents {
            if let Some(found) = self.node(dependent) {
                impacted_by_type
                    .entry(found.node_type())
                    .or_default()
                    .insert(dependent.clone());
            }
        }

        Ok(ImpactReport {
            node,
            total_impacted: dependents.len(),
            impacted_by_type,
        })
    }

    fn search_by_name(&self, needle: &str, node_type: Option<NodeType>) -> Vec<NodeId> {
        let needle = needle.trim().to_lowercase();
        if needle.is_empty() {
            return Vec::new();
        }
        self.graph()
            .nodes()
            .filter(|n| node_type.is_none_or(|t| n.node_type() == t))
            .filter(|n| n.name.to_lowercase().contains(&needle))
            .map(|n| n.id.clone())
            .collect()
    }

    fn dependency_chain(&self, id: &NodeId) -> Result<DependencyChain> {
        Ok(DependencyChain {
            node: self.require(id)?.clone(),
            direct_dependencies: self.dependencies(id, false)?,
            all_dependencies: self.dependencies(id, true)?,
            direct_dependents: self.dependents(id, false)?,
            all_dependents: self.dependents(id, true)?,
        })
    }

    fn node_detail(&self, id: &NodeId, edge_limit: usize) -> Result<NodeView> {
        let node = self.require(id)?;
        Ok(NodeView {
            node: node.clone(),
            outgoing: self.outgoing(id).take(edge_limit).cloned().collect(),
            incoming: self.incoming(id).take(edge_limit).cloned().collect(),
            total_outgoing: self.out_degree(id),
            total_incoming: self.in_degree(id),
            cross_folder: self.cross_folder(node),
        })
    }

    fn detect_cycles(&self) -> Vec<Vec<NodeId>> {
        let (digraph, _) = self.to_digraph();
        let mut cycles: Vec<Vec<NodeId>> = tarjan_scc(&digraph)
            .into_iter()
            .filter(|component| {
                component.len() > 1
                    || component
                        .first()
                        .is_some_and(|&n| digraph.find_edge(n, n).is_some())
            })
            .map(|component| {
                let mut members: Vec<NodeId> =
                    component.into_iter().map(|n| digraph[n].clone()).collect();
                members.sort_unstable();
                members
            })
            .collect();
        cycles.sort_unstable();
        cycles
    }

    fn hierarchy_roots(&self) -> Vec<TreeEntry> {
        self.nodes_of_type(NodeType::Application)
            .iter()
            .filter_map(|id| self.tree_entry(id))
            .collect()
    }

    fn children(&self, id: &NodeId) -> Result<Vec<TreeEntry>> {
        self.require(id)?;
        Ok(self
            .contained(id)
            .into_iter()
            .filter_map(|child| self.tree_entry(child))
            .collect())
    }

    fn stats(&self) -> GraphMetadata {
        self.graph().metadata.clone()
    }
}
