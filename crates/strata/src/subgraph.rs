//! Visualization-ready subgraphs for one hierarchy scope.
//!
//! A scope (folder, sub-application or application) resolves to the jobs
//! under it. The subgraph holds one node per in-scope job, one
//! `job_dependency` edge per (producer, consumer, condition) triple, and an
//! external node for every consumer outside the scope. Groups cluster jobs
//! for display, each with a stable colour index.
//!
//! A drill-down expands one job into the programs it runs, their bounded
//! call chain, and the tables and include files they touch.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize, Serializer};
use tracing::debug;

use crate::error::{Error, Result};
use crate::index::GraphIndex;
use crate::model::{Edge, EdgeType, Node, NodeId, NodeType};

/// Call hops followed past the seed during a drill-down.
pub const DEFAULT_MAX_CALL_DEPTH: usize = 2;

/// Edge types a drill-down follows.
pub const DRILL_EDGE_TYPES: [EdgeType; 5] = [
    EdgeType::Executes,
    EdgeType::CallsProgram,
    EdgeType::Calls,
    EdgeType::DbAccess,
    EdgeType::Includes,
];

/// Hierarchy level bounding a subgraph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Scope {
    /// One folder
    #[serde(rename = "folder")]
    Folder,
    /// One sub-application
    #[serde(rename = "subapp")]
    SubApplication,
    /// One application
    #[serde(rename = "app")]
    Application,
}

impl Scope {
    /// Short name used in requests.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Folder => "folder",
            Self::SubApplication => "subapp",
            Self::Application => "app",
        }
    }

    /// Type of the node naming the scope.
    #[must_use]
    pub fn node_type(&self) -> NodeType {
        match self {
            Self::Folder => NodeType::Folder,
            Self::SubApplication => NodeType::SubApplication,
            Self::Application => NodeType::Application,
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scope {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "folder" => Ok(Self::Folder),
            "subapp" | "sub_application" => Ok(Self::SubApplication),
            "app" | "application" => Ok(Self::Application),
            other => Err(Error::InvalidQuery(format!("unknown scope '{other}'"))),
        }
    }
}

/// Kind of a visual edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VisualEdgeKind {
    /// Producer → consumer through a condition
    JobDependency,
    /// A graph edge reached by a drill-down
    Graph(EdgeType),
}

impl VisualEdgeKind {
    /// Stored string form.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::JobDependency => "job_dependency",
            Self::Graph(edge_type) => edge_type.as_str(),
        }
    }
}

impl Serialize for VisualEdgeKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// A node as drawn: the graph node plus display annotations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VisualNode {
    /// The graph node
    #[serde(flatten)]
    pub node: Node,
    /// Display label
    pub label: String,
    /// Outside the requested scope
    pub external: bool,
    /// Cluster key
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,
    /// Cluster label
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_label: Option<String>,
    /// Cluster colour
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color_index: Option<usize>,
}

impl VisualNode {
    fn local(node: &Node) -> Self {
        Self {
            node: node.clone(),
            label: node.name.clone(),
            external: false,
            group_id: None,
            group_label: None,
            color_index: None,
        }
    }

    fn external(node: &Node) -> Self {
        let label = match node.job().and_then(|j| j.folder.as_deref()) {
            Some(folder) if !folder.is_empty() => format!("[{folder}]\n{}", node.name),
            _ => node.name.clone(),
        };
        Self {
            label,
            external: true,
            ..Self::local(node)
        }
    }
}

/// An edge as drawn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VisualEdge {
    /// Stable edge id
    pub id: String,
    /// Source node
    pub source: NodeId,
    /// Target node
    pub target: NodeId,
    /// Edge kind
    #[serde(rename = "type")]
    pub kind: VisualEdgeKind,
    /// Condition linking the jobs, for job dependencies
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    /// Display label, for drill-down edges
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Target lies outside the requested scope
    pub external: bool,
}

impl VisualEdge {
    fn drill(edge: &Edge) -> Self {
        let edge_type = edge.edge_type();
        Self {
            id: format!("drill_{}__{}__{}", edge.from, edge.to, edge_type),
            source: edge.from.clone(),
            target: edge.to.clone(),
            kind: VisualEdgeKind::Graph(edge_type),
            condition: None,
            label: Some(edge.label().to_string()),
            external: false,
        }
    }

    fn key(&self) -> (NodeId, NodeId, VisualEdgeKind) {
        (self.source.clone(), self.target.clone(), self.kind)
    }
}

/// Display cluster of jobs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Group {
    /// Cluster key, the id of the grouping node
    pub id: String,
    /// Display label
    pub label: String,
    /// Type of the grouping node
    #[serde(rename = "type")]
    pub group_type: NodeType,
    /// Assigned in order of first appearance
    pub color_index: usize,
    /// Member jobs
    pub job_ids: Vec<NodeId>,
}

/// Nodes and edges with de-duplication by node id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VisualGraph {
    nodes: Vec<VisualNode>,
    edges: Vec<VisualEdge>,
    #[serde(skip)]
    positions: HashMap<NodeId, usize>,
}

impl VisualGraph {
    /// Nodes in insertion order.
    #[must_use]
    pub fn nodes(&self) -> &[VisualNode] {
        &self.nodes
    }

    /// Edges in insertion order.
    #[must_use]
    pub fn edges(&self) -> &[VisualEdge] {
        &self.edges
    }

    /// Look up a node.
    #[must_use]
    pub fn node(&self, id: &NodeId) -> Option<&VisualNode> {
        self.positions.get(id).and_then(|&p| self.nodes.get(p))
    }

    /// Whether a node is present.
    #[must_use]
    pub fn contains(&self, id: &NodeId) -> bool {
        self.positions.contains_key(id)
    }

    /// Number of nodes of one type.
    #[must_use]
    pub fn count(&self, node_type: NodeType) -> usize {
        self.nodes
            .iter()
            .filter(|n| n.node.node_type() == node_type)
            .count()
    }

    fn push_node(&mut self, node: VisualNode) {
        if self.positions.contains_key(&node.node.id) {
            return;
        }
        self.positions.insert(node.node.id.clone(), self.nodes.len());
        self.nodes.push(node);
    }

    /// Breadth-first expansion from `seed` along [`DRILL_EDGE_TYPES`].
    ///
    /// Programs are expanded while fewer than `max_call_depth` program hops
    /// separate them from the seed; JCL members are expanded at the depth
    /// they were reached; tables and include files are leaves. A node reached
    /// again at a shallower depth is expanded again from there. Edges already
    /// present (same source, target and kind) are not added again.
    fn expand(&mut self, index: &GraphIndex, seed: &NodeId, max_call_depth: usize) {
        let mut seen: HashSet<(NodeId, NodeId, VisualEdgeKind)> =
            self.edges.iter().map(VisualEdge::key).collect();
        // Shallowest depth each node was expanded at.
        let mut expanded: HashMap<&NodeId, usize> = HashMap::new();
        let mut queue: VecDeque<(&NodeId, usize)> = VecDeque::from([(seed, 0)]);

        while let Some((current, depth)) = queue.pop_front() {
            if expanded.get(current).is_some_and(|&seen| seen <= depth) {
                continue;
            }
            expanded.insert(current, depth);
            for edge in index
                .outgoing(current)
                .filter(|e| DRILL_EDGE_TYPES.contains(&e.edge_type()))
            {
                let Some(target) = index.node(&edge.to) else {
                    continue;
                };
                self.push_node(VisualNode::local(target));

                let visual = VisualEdge::drill(edge);
                if seen.insert(visual.key()) {
                    self.edges.push(visual);
                }

                match target.node_type() {
                    NodeType::Pl1Program if depth < max_call_depth => {
                        queue.push_back((&target.id, depth + 1));
                    }
                    NodeType::Jcl => queue.push_front((&target.id, depth)),
                    _ => {}
                }
            }
        }
    }
}

/// A flattened subgraph for one scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Subgraph {
    /// Requested scope level
    pub scope: Scope,
    /// Requested scope name
    pub name: String,
    /// Nodes and edges
    #[serde(flatten)]
    pub graph: VisualGraph,
    /// Display clusters
    pub groups: Vec<Group>,
    /// Number of jobs in the scope
    pub job_count: usize,
    /// Job expanded by a drill-down, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub drill: Option<NodeId>,
    #[serde(skip)]
    jobs: BTreeSet<NodeId>,
}

impl Subgraph {
    /// Jobs in the scope.
    #[must_use]
    pub fn jobs(&self) -> &BTreeSet<NodeId> {
        &self.jobs
    }

    /// Expand `job` in place.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidQuery`] if `job` is not one of the scope's jobs.
    pub fn drill_down(
        &mut self,
        index: &GraphIndex,
        job: &NodeId,
        max_call_depth: usize,
    ) -> Result<()> {
        if !self.jobs.contains(job) {
            return Err(Error::InvalidQuery(format!(
                "{job} is not in {} '{}'",
                self.scope, self.name
            )));
        }
        let before = (self.graph.nodes.len(), self.graph.edges.len());
        self.graph.expand(index, job, max_call_depth);
        self.drill = Some(job.clone());
        debug!(
            job = %job,
            nodes_added = self.graph.nodes.len() - before.0,
            edges_added = self.graph.edges.len() - before.1,
            "Drilled into job"
        );
        Ok(())
    }
}

/// A subgraph request: scope, name and optional drill-down job name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SubgraphRequest {
    /// Scope level
    pub scope: Scope,
    /// Scope name
    pub name: String,
    /// Job name to drill into
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub drill: Option<String>,
}

impl SubgraphRequest {
    /// Request without drill-down.
    pub fn new(scope: Scope, name: impl Into<String>) -> Self {
        Self {
            scope,
            name: name.into(),
            drill: None,
        }
    }

    /// Request a drill-down into the job named `job`.
    #[must_use]
    pub fn drilling(mut self, job: impl Into<String>) -> Self {
        self.drill = Some(job.into());
        self
    }

    /// Answer the request.
    ///
    /// # Errors
    ///
    /// See [`extract`] and [`Subgraph::drill_down`].
    pub fn run(&self, index: &GraphIndex, max_call_depth: usize) -> Result<Subgraph> {
        let mut subgraph = extract(index, self.scope, &self.name)?;
        if let Some(job) = self.drill.as_deref() {
            subgraph.drill_down(index, &NodeId::new(NodeType::ControlmJob, job), max_call_depth)?;
        }
        Ok(subgraph)
    }
}

/// Jobs under a scope, found by walking `contains` edges down.
///
/// # Errors
///
/// Returns [`Error::NotFound`] if the scope node does not exist.
pub fn jobs_in_scope(index: &GraphIndex, scope: Scope, name: &str) -> Result<BTreeSet<NodeId>> {
    let root = NodeId::new(scope.node_type(), name);
    index.require(&root)?;

    let mut level: Vec<&NodeId> = vec![&root];
    let descend = match scope {
        Scope::Folder => 0,
        Scope::SubApplication => 1,
        Scope::Application => 2,
    };
    for _ in 0..descend {
        level = level
            .into_iter()
            .flat_map(|id| index.contained(id))
            .collect();
    }

    Ok(level
        .into_iter()
        .flat_map(|folder| index.contained(folder))
        .filter(|id| id.node_type() == Some(NodeType::ControlmJob))
        .cloned()
        .collect())
}

/// Subgraph for every job under `scope` named `name`.
///
/// # Errors
///
/// Returns [`Error::NotFound`] if the scope node does not exist.
pub fn extract(index: &GraphIndex, scope: Scope, name: &str) -> Result<Subgraph> {
    let jobs = jobs_in_scope(index, scope, name)?;
    let mut graph = VisualGraph::default();
    let mut groups: BTreeMap<String, Group> = BTreeMap::new();

    for job_id in &jobs {
        let Some(job) = index.node(job_id) else {
            continue;
        };
        let mut visual = VisualNode::local(job);
        if let Some((key, label, group_type)) = group_key(scope, job) {
            let next_color = groups.len();
            let group = groups.entry(key.clone()).or_insert_with(|| Group {
                id: key.clone(),
                label: label.clone(),
                group_type,
                color_index: next_color,
                job_ids: Vec::new(),
            });
            group.job_ids.push(job_id.clone());
            visual.color_index = Some(group.color_index);
            visual.group_id = Some(key);
            visual.group_label = Some(label);
        }
        graph.push_node(visual);
    }

    let mut seen: HashSet<(&NodeId, &NodeId, String)> = HashSet::new();
    for job_id in &jobs {
        for produced in index.outgoing_of(job_id, EdgeType::Produces) {
            let condition = index
                .node(&produced.to)
                .map_or_else(|| produced.to.name().to_string(), |n| n.name.clone());
            for required in index.incoming_of(&produced.to, EdgeType::Requires) {
                let consumer = &required.from;
                if consumer == job_id {
                    continue;
                }
                let external = !jobs.contains(consumer);
                if external && !graph.contains(consumer) {
                    if let Some(node) = index.node(consumer) {
                        graph.push_node(VisualNode::external(node));
                    }
                }
                if seen.insert((job_id, consumer, condition.clone())) {
                    graph.edges.push(VisualEdge {
                        id: format!("e_{job_id}__{consumer}__{condition}"),
                        source: job_id.clone(),
                        target: consumer.clone(),
                        kind: VisualEdgeKind::JobDependency,
                        condition: Some(condition.clone()),
                        label: None,
                        external,
                    });
                }
            }
        }
    }

    let mut groups: Vec<Group> = groups.into_values().collect();
    groups.sort_by_key(|g| g.color_index);

    debug!(
        scope = %scope,
        name,
        jobs = jobs.len(),
        nodes = graph.nodes.len(),
        edges = graph.edges.len(),
        groups = groups.len(),
        "Extracted subgraph"
    );

    Ok(Subgraph {
        scope,
        name: name.to_string(),
        graph,
        groups,
        job_count: jobs.len(),
        drill: None,
        jobs,
    })
}

/// Cluster key, label and type for a job: the sub-application for folder
/// scope, the folder for sub-application scope, and the sub-application
/// (else the folder) for application scope.
fn group_key(scope: Scope, job: &Node) -> Option<(String, String, NodeType)> {
    let attributes = job.job()?;
    let folder = attributes.folder.as_deref().filter(|s| !s.is_empty());
    let sub_app = attributes
        .sub_application
        .as_deref()
        .filter(|s| !s.is_empty());

    let (group_type, label) = match scope {
        Scope::Folder => (NodeType::SubApplication, sub_app?),
        Scope::SubApplication => (NodeType::Folder, folder?),
        Scope::Application => match (sub_app, folder) {
            (Some(sub_app), _) => (NodeType::SubApplication, sub_app),
            (None, Some(folder)) => (NodeType::Folder, folder),
            (None, None) => return None,
        },
    };
    Some((
        NodeId::new(group_type, label).to_string(),
        label.to_string(),
        group_type,
    ))
}

/// Counts of a program chain by node type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ChainStats {
    /// Programs reached
    pub pl1_count: usize,
    /// Tables reached
    pub db_count: usize,
    /// Include files reached
    pub include_count: usize,
}

/// Drill-down from any node, seeded with the node itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgramChain {
    /// Starting node
    pub seed: NodeId,
    /// Nodes and edges
    #[serde(flatten)]
    pub graph: VisualGraph,
    /// Counts by type, the seed included
    pub stats: ChainStats,
}

/// Program chain of a job or program: what it runs, what those call (bounded
/// by `max_call_depth`) and the tables and includes they touch.
///
/// # Errors
///
/// Returns [`Error::NotFound`] if the seed does not exist.
pub fn program_chain(index: &GraphIndex, seed: &NodeId, max_call_depth: usize) -> Result<ProgramChain> {
    let node = index.require(seed)?;
    let mut graph = VisualGraph::default();
    graph.push_node(VisualNode::local(node));
    graph.expand(index, seed, max_call_depth);

    let stats = ChainStats {
        pl1_count: graph.count(NodeType::Pl1Program),
        db_count: graph.count(NodeType::DbTable),
        include_count: graph.count(NodeType::IncludeFile),
    };
    Ok(ProgramChain {
        seed: seed.clone(),
        graph,
        stats,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        DependencyGraph, GraphMetadata, JclAttributes, JobAttributes, NodeDetail, ProgramAttributes,
        Relation,
    };
    use rstest::rstest;

    fn job(name: &str, sub: &str, folder: &str) -> Node {
        Node::new(
            name,
            NodeDetail::ControlmJob(JobAttributes {
                folder: Some(folder.to_string()),
                sub_application: Some(sub.to_string()),
                ..JobAttributes::default()
            }),
        )
    }

    fn contains(from: NodeId, to: NodeId) -> Edge {
        Edge::new(from, to, Relation::Contains)
    }

    fn jid(name: &str) -> NodeId {
        NodeId::new(NodeType::ControlmJob, name)
    }

    fn estate() -> GraphIndex {
        let folder = |name: &str| {
            Node::new(
                name,
                NodeDetail::Folder {
                    datacenter: String::new(),
                    platform: String::new(),
                },
            )
        };
        let nodes = vec![
            Node::new("APP", NodeDetail::Application),
            Node::new("SUB1", NodeDetail::SubApplication),
            Node::new("SUB2", NodeDetail::SubApplication),
            folder("F1"),
            folder("F2"),
            folder("F3"),
            job("J1", "SUB1", "F1"),
            job("J2", "SUB1", "F2"),
            job("J3", "SUB2", "F3"),
        ];
        let app = NodeId::new(NodeType::Application, "APP");
        let sub = |n: &str| NodeId::new(NodeType::SubApplication, n);
        let fold = |n: &str| NodeId::new(NodeType::Folder, n);
        let edges = vec![
            contains(app.clone(), sub("SUB1")),
            contains(app, sub("SUB2")),
            contains(sub("SUB1"), fold("F1")),
            contains(sub("SUB1"), fold("F2")),
            contains(sub("SUB2"), fold("F3")),
            contains(fold("F1"), jid("J1")),
            contains(fold("F2"), jid("J2")),
            contains(fold("F3"), jid("J3")),
        ];
        GraphIndex::new(DependencyGraph::from_parts(
            nodes,
            edges,
            GraphMetadata::default(),
        ))
    }

    #[rstest]
    #[case::folder(Scope::Folder, "F1", &["J1"])]
    #[case::sub_application(Scope::SubApplication, "SUB1", &["J1", "J2"])]
    #[case::application(Scope::Application, "APP", &["J1", "J2", "J3"])]
    fn scope_resolution(#[case] scope: Scope, #[case] name: &str, #[case] expected: &[&str]) {
        let jobs = jobs_in_scope(&estate(), scope, name).unwrap();
        let names: Vec<&str> = jobs.iter().map(NodeId::name).collect();
        assert_eq!(names, expected);
    }

    #[test]
    fn unknown_scope_is_not_found() {
        let err = extract(&estate(), Scope::Folder, "NOPE").unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn groups_follow_scope_and_colour_in_order() {
        let index = estate();

        let by_subapp = extract(&index, Scope::Application, "APP").unwrap();
        let labels: Vec<(&str, usize)> = by_subapp
            .groups
            .iter()
            .map(|g| (g.label.as_str(), g.color_index))
            .collect();
        assert_eq!(labels, [("SUB1", 0), ("SUB2", 1)]);
        assert_eq!(by_subapp.groups[0].job_ids, vec![jid("J1"), jid("J2")]);

        let by_folder = extract(&index, Scope::SubApplication, "SUB1").unwrap();
        let j2 = by_folder.graph.node(&jid("J2")).unwrap();
        assert_eq!(j2.group_id.as_deref(), Some("FOLDER::F2"));
        assert_eq!(j2.color_index, Some(1));
    }

    #[rstest]
    #[case::scope_keywords("subapp", Scope::SubApplication)]
    #[case::long_form("application", Scope::Application)]
    #[case::uppercase("FOLDER", Scope::Folder)]
    fn scope_parsing(#[case] input: &str, #[case] expected: Scope) {
        assert_eq!(input.parse::<Scope>().unwrap(), expected);
    }

    #[test]
    fn programs_reached_through_jcl_keep_the_shallower_depth() {
        let program =
            |name: &str| Node::new(name, NodeDetail::Pl1Program(ProgramAttributes::default()));
        let pid = |name: &str| NodeId::new(NodeType::Pl1Program, name);
        let jcl = NodeId::new(NodeType::Jcl, "X");
        let nodes = vec![
            job("J", "SUB1", "F1"),
            Node::new("X", NodeDetail::Jcl(JclAttributes::default())),
            program("P"),
            program("Q"),
            program("R"),
            program("S"),
        ];
        // J runs P directly and also runs X, which runs Q one hop sooner than P does.
        let edges = vec![
            Edge::new(jid("J"), pid("P"), Relation::Executes),
            Edge::new(jid("J"), jcl.clone(), Relation::Executes),
            Edge::new(pid("P"), pid("Q"), Relation::Calls),
            Edge::new(jcl, pid("Q"), Relation::CallsProgram),
            Edge::new(pid("Q"), pid("R"), Relation::Calls),
            Edge::new(pid("R"), pid("S"), Relation::Calls),
        ];
        let index = GraphIndex::new(DependencyGraph::from_parts(
            nodes,
            edges,
            GraphMetadata::default(),
        ));

        let chain = program_chain(&index, &jid("J"), 2).unwrap();

        assert!(chain.graph.node(&pid("S")).is_some());
        assert_eq!(chain.stats.pl1_count, 4);
    }

    #[test]
    fn visual_edges_serialize_with_kind_strings() {
        let edge = VisualEdge {
            id: "e".to_string(),
            source: jid("A"),
            target: jid("B"),
            kind: VisualEdgeKind::Graph(EdgeType::CallsProgram),
            condition: None,
            label: None,
            external: false,
        };
        let json = serde_json::to_value(&edge).unwrap();
        assert_eq!(json["type"], "calls_program");
        assert!(json.get("condition").is_none());
    }
}
