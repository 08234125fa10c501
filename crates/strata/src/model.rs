//! The dependency graph model: typed nodes, typed edges and build metadata.
//!
//! Node attributes are a closed sum type, one shape per node type, so every
//! consumer gets compile-time coverage of the type-specific fields.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::warn;

use strata_records::{JclRecord, JobRecord, ProgramRecord, SqlOperation};

/// Separator between the type prefix and the name in a node id.
pub const ID_SEPARATOR: &str = "::";

/// Kind of node in the dependency graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    /// Scheduler folder
    Folder,
    /// Scheduler application
    Application,
    /// Scheduler sub-application
    SubApplication,
    /// Scheduler job
    ControlmJob,
    /// Named scheduler condition
    Condition,
    /// Batch job control member
    Jcl,
    /// Procedural source program
    Pl1Program,
    /// Database table
    DbTable,
    /// Shared include fragment
    IncludeFile,
}

impl NodeType {
    /// Every node type.
    pub const ALL: [NodeType; 9] = [
        Self::Folder,
        Self::Application,
        Self::SubApplication,
        Self::ControlmJob,
        Self::Condition,
        Self::Jcl,
        Self::Pl1Program,
        Self::DbTable,
        Self::IncludeFile,
    ];

    /// Convert to the stored string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Folder => "folder",
            Self::Application => "application",
            Self::SubApplication => "sub_application",
            Self::ControlmJob => "controlm_job",
            Self::Condition => "condition",
            Self::Jcl => "jcl",
            Self::Pl1Program => "pl1_program",
            Self::DbTable => "db_table",
            Self::IncludeFile => "include_file",
        }
    }

    /// Id prefix for nodes of this type.
    #[must_use]
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::Folder => "FOLDER",
            Self::Application => "APP",
            Self::SubApplication => "SUBAPP",
            Self::ControlmJob => "CONTROLM",
            Self::Condition => "COND",
            Self::Jcl => "JCL",
            Self::Pl1Program => "PL1",
            Self::DbTable => "DB",
            Self::IncludeFile => "INCLUDE",
        }
    }

    /// Node type owning an id prefix.
    #[must_use]
    pub fn from_prefix(prefix: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.prefix() == prefix)
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeType {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| crate::Error::InvalidQuery(format!("unknown node type '{s}'")))
    }
}

/// Kind of edge in the dependency graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeType {
    /// Static hierarchy: application, sub-application, folder, job
    Contains,
    /// Job sets a condition
    Produces,
    /// Job waits on a condition
    Requires,
    /// Job runs a program or JCL member
    Executes,
    /// JCL member runs a program
    CallsProgram,
    /// Program calls a program
    Calls,
    /// Program includes a fragment
    Includes,
    /// Program touches a table
    DbAccess,
}

impl EdgeType {
    /// Every edge type.
    pub const ALL: [EdgeType; 8] = [
        Self::Contains,
        Self::Produces,
        Self::Requires,
        Self::Executes,
        Self::CallsProgram,
        Self::Calls,
        Self::Includes,
        Self::DbAccess,
    ];

    /// Convert to the stored string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Contains => "contains",
            Self::Produces => "produces",
            Self::Requires => "requires",
            Self::Executes => "executes",
            Self::CallsProgram => "calls_program",
            Self::Calls => "calls",
            Self::Includes => "includes",
            Self::DbAccess => "db_access",
        }
    }
}

impl fmt::Display for EdgeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EdgeType {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| crate::Error::InvalidQuery(format!("unknown edge type '{s}'")))
    }
}

/// Globally unique node identity: `<PREFIX>::<NAME>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    /// Build the id of a node of `node_type` named `name`.
    #[must_use]
    pub fn new(node_type: NodeType, name: &str) -> Self {
        Self(format!("{}{ID_SEPARATOR}{name}", node_type.prefix()))
    }

    /// The raw id string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Node type encoded in the prefix, if the prefix is known.
    #[must_use]
    pub fn node_type(&self) -> Option<NodeType> {
        self.0
            .split_once(ID_SEPARATOR)
            .and_then(|(prefix, _)| NodeType::from_prefix(prefix))
    }

    /// Name part of the id (everything after the first separator).
    #[must_use]
    pub fn name(&self) -> &str {
        self.0
            .split_once(ID_SEPARATOR)
            .map_or(self.0.as_str(), |(_, name)| name)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for NodeId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl AsRef<str> for NodeId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Attributes of a scheduler job node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobAttributes {
    /// Owning folder
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub folder: Option<String>,
    /// Owning application
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub application: Option<String>,
    /// Owning sub-application
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_application: Option<String>,
    /// Member the job submits
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memname: Option<String>,
    /// Library holding the member
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memlib: Option<String>,
    /// Scheduler task type
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tasktype: Option<String>,
    /// Free-text description
    #[serde(default)]
    pub description: String,
}

impl From<&JobRecord> for JobAttributes {
    fn from(job: &JobRecord) -> Self {
        Self {
            folder: job.folder.clone(),
            application: job.application.clone(),
            sub_application: job.sub_application.clone(),
            memname: job.memname.clone(),
            memlib: job.memlib.clone(),
            tasktype: job.tasktype.clone(),
            description: job.description.clone(),
        }
    }
}

/// Attributes of a JCL member node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JclAttributes {
    /// Source file
    pub file_path: PathBuf,
    /// Programs executed
    #[serde(default)]
    pub programs_called: BTreeSet<String>,
    /// Procedures executed
    #[serde(default)]
    pub procs_called: BTreeSet<String>,
    /// DD names
    #[serde(default)]
    pub datasets: BTreeSet<String>,
    /// Step names
    #[serde(default)]
    pub steps: BTreeSet<String>,
}

impl From<&JclRecord> for JclAttributes {
    fn from(jcl: &JclRecord) -> Self {
        Self {
            file_path: jcl.file_path.clone(),
            programs_called: jcl.programs_called.clone(),
            procs_called: jcl.procs_called.clone(),
            datasets: jcl.datasets.clone(),
            steps: jcl.steps.clone(),
        }
    }
}

/// Attributes of a program node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramAttributes {
    /// Source file
    pub file_path: PathBuf,
    /// Internal procedures
    #[serde(default)]
    pub procedures: BTreeSet<String>,
    /// Outbound call tokens, resolved or not
    #[serde(default)]
    pub calls: BTreeSet<String>,
    /// Included fragment tokens, resolved or not
    #[serde(default)]
    pub includes: BTreeSet<String>,
    /// Declared external entries
    #[serde(default)]
    pub entries: BTreeSet<String>,
    /// Table to operations
    #[serde(default)]
    pub sql_operations: BTreeMap<String, BTreeSet<SqlOperation>>,
    /// Source lines
    #[serde(default)]
    pub line_count: usize,
}

impl From<&ProgramRecord> for ProgramAttributes {
    fn from(program: &ProgramRecord) -> Self {
        Self {
            file_path: program.file_path.clone(),
            procedures: program.procedures.clone(),
            calls: program.calls.clone(),
            includes: program.includes.clone(),
            entries: program.entries.clone(),
            sql_operations: program.sql_operations.clone(),
            line_count: program.line_count,
        }
    }
}

/// Type-specific node attributes, tagged by node type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NodeDetail {
    /// Scheduler folder
    Folder {
        /// Data center
        #[serde(default)]
        datacenter: String,
        /// Platform
        #[serde(default)]
        platform: String,
    },
    /// Scheduler application
    Application,
    /// Scheduler sub-application
    SubApplication,
    /// Scheduler job
    ControlmJob(JobAttributes),
    /// Named condition with the jobs on either side of it
    Condition {
        /// Jobs that set the condition
        #[serde(default)]
        producer_jobs: BTreeSet<String>,
        /// Jobs that wait on the condition
        #[serde(default)]
        consuming_jobs: BTreeSet<String>,
    },
    /// JCL member
    Jcl(JclAttributes),
    /// Program
    Pl1Program(ProgramAttributes),
    /// Database table
    DbTable,
    /// Include fragment
    IncludeFile {
        /// Fragment location
        file_path: PathBuf,
    },
}

impl NodeDetail {
    /// Node type of this detail.
    #[must_use]
    pub fn node_type(&self) -> NodeType {
        match self {
            Self::Folder { .. } => NodeType::Folder,
            Self::Application => NodeType::Application,
            Self::SubApplication => NodeType::SubApplication,
            Self::ControlmJob(_) => NodeType::ControlmJob,
            Self::Condition { .. } => NodeType::Condition,
            Self::Jcl(_) => NodeType::Jcl,
            Self::Pl1Program(_) => NodeType::Pl1Program,
            Self::DbTable => NodeType::DbTable,
            Self::IncludeFile { .. } => NodeType::IncludeFile,
        }
    }
}

/// A node in the dependency graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    /// Unique id
    pub id: NodeId,
    /// Display name
    pub name: String,
    /// Type and type-specific attributes
    #[serde(flatten)]
    pub detail: NodeDetail,
}

impl Node {
    /// Create a node; the id is derived from the detail's type and `name`.
    pub fn new(name: impl Into<String>, detail: NodeDetail) -> Self {
        let name = name.into();
        Self {
            id: NodeId::new(detail.node_type(), &name),
            name,
            detail,
        }
    }

    /// Node type.
    #[must_use]
    pub fn node_type(&self) -> NodeType {
        self.detail.node_type()
    }

    /// Job attributes, if this is a job.
    #[must_use]
    pub fn job(&self) -> Option<&JobAttributes> {
        match &self.detail {
            NodeDetail::ControlmJob(job) => Some(job),
            _ => None,
        }
    }
}

/// Edge type plus its type-specific qualifiers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Relation {
    /// Hierarchy membership
    Contains,
    /// Job sets a condition
    Produces {
        /// `+` or `-`
        sign: String,
        /// Date qualifier
        odate: String,
    },
    /// Job waits on a condition
    Requires {
        /// `A` or `O`
        and_or: String,
        /// Date qualifier
        odate: String,
    },
    /// Job runs a program or JCL member
    Executes,
    /// JCL member runs a program
    CallsProgram,
    /// Program calls a program
    Calls,
    /// Program includes a fragment
    Includes,
    /// Program touches a table
    DbAccess {
        /// Operation kind
        operation: SqlOperation,
    },
}

impl Relation {
    /// Edge type of this relation.
    #[must_use]
    pub fn edge_type(&self) -> EdgeType {
        match self {
            Self::Contains => EdgeType::Contains,
            Self::Produces { .. } => EdgeType::Produces,
            Self::Requires { .. } => EdgeType::Requires,
            Self::Executes => EdgeType::Executes,
            Self::CallsProgram => EdgeType::CallsProgram,
            Self::Calls => EdgeType::Calls,
            Self::Includes => EdgeType::Includes,
            Self::DbAccess { .. } => EdgeType::DbAccess,
        }
    }
}

/// A directed, typed edge.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Edge {
    /// Source node
    pub from: NodeId,
    /// Target node
    pub to: NodeId,
    /// Type and qualifiers
    #[serde(flatten)]
    pub relation: Relation,
}

impl Edge {
    /// Create an edge.
    #[must_use]
    pub fn new(from: NodeId, to: NodeId, relation: Relation) -> Self {
        Self { from, to, relation }
    }

    /// Edge type.
    #[must_use]
    pub fn edge_type(&self) -> EdgeType {
        self.relation.edge_type()
    }

    /// Short display label.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match &self.relation {
            Relation::Executes if self.to.node_type() == Some(NodeType::Jcl) => "runs",
            Relation::Executes | Relation::CallsProgram => "executes",
            Relation::Calls => "CALL",
            Relation::Includes => "%INCLUDE",
            Relation::DbAccess { operation } => operation.as_str(),
            other => other.edge_type().as_str(),
        }
    }
}

/// Declared links whose target could not be resolved. Never fatal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissingReferences {
    /// Program tokens from job descriptions or JCL members with no matching program
    #[serde(default)]
    pub programs: BTreeSet<String>,
    /// Program call tokens with no matching program
    #[serde(default)]
    pub calls: BTreeSet<String>,
    /// Include tokens with no discovered fragment
    #[serde(default)]
    pub includes: BTreeSet<String>,
    /// Job members with no parsed JCL
    #[serde(default)]
    pub jcls: BTreeSet<String>,
}

impl MissingReferences {
    /// Total number of unresolved references.
    #[must_use]
    pub fn total(&self) -> usize {
        self.programs.len() + self.calls.len() + self.includes.len() + self.jcls.len()
    }

    /// Whether every reference resolved.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

/// Summary of a graph: counts, data-quality report and identity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphMetadata {
    /// Number of nodes
    pub total_nodes: usize,
    /// Number of edges
    pub total_edges: usize,
    /// Nodes per type
    pub node_types: BTreeMap<NodeType, usize>,
    /// Edges per type
    pub edge_types: BTreeMap<EdgeType, usize>,
    /// Unresolved references from the build
    pub missing: MissingReferences,
    /// When the graph was built
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub built_at: Option<DateTime<Utc>>,
    /// SHA-256 over the sorted node ids and edge triples
    pub fingerprint: String,
}

/// The complete node/edge collection produced by a build.
///
/// Nodes are keyed by id; inserting an existing id replaces its attributes.
/// Every edge endpoint refers to a node in the collection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyGraph {
    /// Counts, missing references and fingerprint
    pub metadata: GraphMetadata,
    nodes: BTreeMap<NodeId, Node>,
    edges: Vec<Edge>,
}

impl DependencyGraph {
    /// Create an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Assemble a graph from loaded parts.
    ///
    /// Later nodes with a repeated id replace earlier ones. Edges whose
    /// endpoints are not in `nodes` are dropped with a warning. Counts and the
    /// fingerprint are recomputed; `metadata.missing` and `built_at` are kept.
    #[must_use]
    pub fn from_parts(nodes: Vec<Node>, edges: Vec<Edge>, metadata: GraphMetadata) -> Self {
        let mut graph = Self {
            metadata,
            nodes: BTreeMap::new(),
            edges: Vec::with_capacity(edges.len()),
        };
        for node in nodes {
            graph.insert_node(node);
        }
        for edge in edges {
            if graph.contains(&edge.from) && graph.contains(&edge.to) {
                graph.edges.push(edge);
            } else {
                warn!(from = %edge.from, to = %edge.to, "Dropping edge with unknown endpoint");
            }
        }
        graph.refresh_metadata();
        graph
    }

    /// Insert or replace a node. Returns `true` if the id was new.
    pub fn insert_node(&mut self, node: Node) -> bool {
        self.nodes.insert(node.id.clone(), node).is_none()
    }

    /// Append an edge. Returns `false`, leaving the graph unchanged, if
    /// either endpoint is missing.
    pub fn add_edge(&mut self, edge: Edge) -> bool {
        if !self.nodes.contains_key(&edge.from) || !self.nodes.contains_key(&edge.to) {
            return false;
        }
        self.edges.push(edge);
        true
    }

    /// Look up a node.
    #[must_use]
    pub fn node(&self, id: &NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    /// Whether a node exists.
    #[must_use]
    pub fn contains(&self, id: &NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    /// Nodes in id order.
    pub fn nodes(&self) -> impl ExactSizeIterator<Item = &Node> {
        self.nodes.values()
    }

    /// Edges in insertion order.
    #[must_use]
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Number of nodes.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of edges.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Recompute counts and the fingerprint from the current contents.
    pub fn refresh_metadata(&mut self) {
        let mut node_types = BTreeMap::new();
        for node in self.nodes.values() {
            *node_types.entry(node.node_type()).or_insert(0) += 1;
        }
        let mut edge_types = BTreeMap::new();
        for edge in &self.edges {
            *edge_types.entry(edge.edge_type()).or_insert(0) += 1;
        }
        self.metadata.total_nodes = self.nodes.len();
        self.metadata.total_edges = self.edges.len();
        self.metadata.node_types = node_types;
        self.metadata.edge_types = edge_types;
        self.metadata.fingerprint = self.fingerprint();
    }

    /// SHA-256 over the sorted node ids and the sorted edge triples (with
    /// their labels). Stable across rebuilds from unchanged sources.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        for (id, node) in &self.nodes {
            hasher.update(format!("N\t{id}\t{}\n", node.node_type()));
        }
        let mut triples: Vec<String> = self
            .edges
            .iter()
            .map(|e| format!("E\t{}\t{}\t{}\t{}\n", e.from, e.to, e.edge_type(), e.label()))
            .collect();
        triples.sort_unstable();
        for triple in triples {
            hasher.update(triple);
        }
        format!("{:x}", hasher.finalize())
    }
}
