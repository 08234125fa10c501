//! Adjacency indices over a loaded [`DependencyGraph`].
//!
//! Built once per load and read-only afterwards. Any change to the
//! collection means building a new index; there is no incremental
//! maintenance.

use std::collections::{BTreeMap, HashMap};

use petgraph::graph::{DiGraph, NodeIndex};
use tracing::debug;

use crate::error::{Error, Result};
use crate::model::{DependencyGraph, Edge, EdgeType, Node, NodeId, NodeType};

/// A loaded graph plus outgoing, incoming and by-type indices.
#[derive(Debug, Clone, Default)]
pub struct GraphIndex {
    graph: DependencyGraph,
    /// Node id → positions of its outgoing edges in `graph.edges()`
    outgoing: HashMap<NodeId, Vec<usize>>,
    /// Node id → positions of its incoming edges
    incoming: HashMap<NodeId, Vec<usize>>,
    /// Node type → ids of that type, sorted
    by_type: BTreeMap<NodeType, Vec<NodeId>>,
}

impl GraphIndex {
    /// Index a graph, taking ownership of it.
    #[must_use]
    pub fn new(graph: DependencyGraph) -> Self {
        let mut outgoing: HashMap<NodeId, Vec<usize>> = HashMap::new();
        let mut incoming: HashMap<NodeId, Vec<usize>> = HashMap::new();
        for (position, edge) in graph.edges().iter().enumerate() {
            outgoing.entry(edge.from.clone()).or_default().push(position);
            incoming.entry(edge.to.clone()).or_default().push(position);
        }

        let mut by_type: BTreeMap<NodeType, Vec<NodeId>> = BTreeMap::new();
        for node in graph.nodes() {
            by_type
                .entry(node.node_type())
                .or_default()
                .push(node.id.clone());
        }

        debug!(
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            "Built graph index"
        );

        Self {
            graph,
            outgoing,
            incoming,
            by_type,
        }
    }

    /// The indexed graph.
    #[must_use]
    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    /// Give back the indexed graph.
    #[must_use]
    pub fn into_graph(self) -> DependencyGraph {
        self.graph
    }

    /// Look up a node.
    #[must_use]
    pub fn node(&self, id: &NodeId) -> Option<&Node> {
        self.graph.node(id)
    }

    /// Look up a node, failing with [`Error::NotFound`] if it is absent.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if no node has this id.
    pub fn require(&self, id: &NodeId) -> Result<&Node> {
        self.graph
            .node(id)
            .ok_or_else(|| Error::NotFound(id.to_string()))
    }

    /// Whether the node exists.
    #[must_use]
    pub fn contains(&self, id: &NodeId) -> bool {
        self.graph.contains(id)
    }

    /// Edges leaving `id`, in build order.
    pub fn outgoing(&self, id: &NodeId) -> impl Iterator<Item = &Edge> {
        self.edges_at(self.outgoing.get(id))
    }

    /// Edges entering `id`, in build order.
    pub fn incoming(&self, id: &NodeId) -> impl Iterator<Item = &Edge> {
        self.edges_at(self.incoming.get(id))
    }

    /// Edges leaving `id` of one type.
    pub fn outgoing_of(&self, id: &NodeId, edge_type: EdgeType) -> impl Iterator<Item = &Edge> {
        self.outgoing(id).filter(move |e| e.edge_type() == edge_type)
    }

    /// Edges entering `id` of one type.
    pub fn incoming_of(&self, id: &NodeId, edge_type: EdgeType) -> impl Iterator<Item = &Edge> {
        self.incoming(id).filter(move |e| e.edge_type() == edge_type)
    }

    /// Number of edges leaving `id`.
    #[must_use]
    pub fn out_degree(&self, id: &NodeId) -> usize {
        self.outgoing.get(id).map_or(0, Vec::len)
    }

    /// Number of edges entering `id`.
    #[must_use]
    pub fn in_degree(&self, id: &NodeId) -> usize {
        self.incoming.get(id).map_or(0, Vec::len)
    }

    /// Ids of every node of `node_type`, sorted.
    #[must_use]
    pub fn nodes_of_type(&self, node_type: NodeType) -> &[NodeId] {
        self.by_type.get(&node_type).map_or(&[], Vec::as_slice)
    }

    /// Targets of the `contains` edges leaving `id`, sorted and distinct.
    #[must_use]
    pub fn contained(&self, id: &NodeId) -> Vec<&NodeId> {
        let mut children: Vec<&NodeId> = self
            .outgoing_of(id, EdgeType::Contains)
            .map(|e| &e.to)
            .collect();
        children.sort_unstable();
        children.dedup();
        children
    }

    /// The whole graph as a petgraph `DiGraph`, one graph node per graph
    /// node and one graph edge per edge, with a lookup from id to index.
    #[must_use]
    pub fn to_digraph(&self) -> (DiGraph<&NodeId, EdgeType>, HashMap<&NodeId, NodeIndex>) {
        let mut digraph = DiGraph::with_capacity(self.graph.node_count(), self.graph.edge_count());
        let mut node_map = HashMap::with_capacity(self.graph.node_count());
        for node in self.graph.nodes() {
            node_map.insert(&node.id, digraph.add_node(&node.id));
        }
        for edge in self.graph.edges() {
            if let (Some(&from), Some(&to)) = (node_map.get(&edge.from), node_map.get(&edge.to)) {
                digraph.add_edge(from, to, edge.edge_type());
            }
        }
        (digraph, node_map)
    }

    fn edges_at<'a>(&'a self, positions: Option<&'a Vec<usize>>) -> impl Iterator<Item = &'a Edge> {
        let edges = self.graph.edges();
        positions
            .into_iter()
            .flatten()
            .filter_map(move |&position| edges.get(position))
    }
}

impl From<DependencyGraph> for GraphIndex {
    fn from(graph: DependencyGraph) -> Self {
        Self::new(graph)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{GraphMetadata, NodeDetail, Relation};

    fn sample() -> GraphIndex {
        let nodes = vec![
            Node::new(
                "F1",
                NodeDetail::Folder {
                    datacenter: String::new(),
                    platform: String::new(),
                },
            ),
            Node::new("J1", NodeDetail::ControlmJob(Default::default())),
            Node::new("J2", NodeDetail::ControlmJob(Default::default())),
        ];
        let f1 = NodeId::new(NodeType::Folder, "F1");
        let j1 = NodeId::new(NodeType::ControlmJob, "J1");
        let j2 = NodeId::new(NodeType::ControlmJob, "J2");
        let edges = vec![
            Edge::new(f1.clone(), j2.clone(), Relation::Contains),
            Edge::new(f1, j1.clone(), Relation::Contains),
            Edge::new(j1, j2, Relation::Executes),
        ];
        GraphIndex::new(DependencyGraph::from_parts(nodes, edges, GraphMetadata::default()))
    }

    #[test]
    fn outgoing_and_incoming_are_symmetric() {
        let index = sample();
        for edge in index.graph().edges() {
            assert!(index.outgoing(&edge.from).any(|e| e == edge));
            assert!(index.incoming(&edge.to).any(|e| e == edge));
        }
        assert_eq!(index.out_degree(&NodeId::new(NodeType::Folder, "F1")), 2);
        assert_eq!(index.in_degree(&NodeId::new(NodeType::ControlmJob, "J2")), 2);
    }

    #[test]
    fn nodes_of_type_are_sorted() {
        let index = sample();
        let jobs: Vec<_> = index
            .nodes_of_type(NodeType::ControlmJob)
            .iter()
            .map(NodeId::as_str)
            .collect();
        assert_eq!(jobs, ["CONTROLM::J1", "CONTROLM::J2"]);
        assert!(index.nodes_of_type(NodeType::DbTable).is_empty());
    }

    #[test]
    fn contained_follows_only_contains_edges() {
        let index = sample();
        let children: Vec<_> = index
            .contained(&NodeId::new(NodeType::Folder, "F1"))
            .into_iter()
            .map(NodeId::as_str)
            .collect();
        assert_eq!(children, ["CONTROLM::J1", "CONTROLM::J2"]);
        assert!(index.contained(&NodeId::new(NodeType::ControlmJob, "J1")).is_empty());
    }

    #[test]
    fn require_reports_missing_ids() {
        let index = sample();
        let err = index.require(&NodeId::from("CONTROLM::NOPE")).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn digraph_mirrors_the_collection() {
        let index = sample();
        let (digraph, node_map) = index.to_digraph();
        assert_eq!(digraph.node_count(), 3);
        assert_eq!(digraph.edge_count(), 3);
        assert_eq!(node_map.len(), 3);
    }
}
