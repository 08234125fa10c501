//! # Strata: a cross-layer dependency graph for batch estates
//!
//! Strata links the layers of a batch-processing estate (scheduler
//! hierarchy, jobs and their conditions, job control members, procedural
//! programs, includes and database tables) into one typed graph, and answers
//! dependency, impact, path and cycle questions over it.
//!
//! ## Pipeline
//!
//! ```text
//! record sources ─→ GraphBuilder ─→ DependencyGraph ─┬─→ GraphStore (write)
//!                                                    └─→ GraphIndex ─→ GraphQueries
//!                                   GraphStore (read) ─→ GraphIndex ─→ subgraph extraction
//! ```
//!
//! ## Quick Start
//!
//! ```no_run
//! use strata::{EstatePaths, EstateRecords, GraphBuilder, GraphIndex, GraphQueries, NodeId, NodeType};
//!
//! let paths = EstatePaths {
//!     scheduler_export: Some("exports/ctm.xml".into()),
//!     source_dir: Some("src".into()),
//!     jcl_dir: None,
//! };
//! let (records, warnings) = EstateRecords::load(&paths)?;
//! let report = GraphBuilder::new().build(&records, warnings);
//! println!("{}", report.summary());
//!
//! let index = GraphIndex::new(report.graph);
//! let impact = index.impact_analysis(&NodeId::new(NodeType::DbTable, "ACCOUNTS"))?;
//! println!("{} nodes affected", impact.total_impacted);
//! # Ok::<(), strata::Error>(())
//! ```

#![forbid(unsafe_code)]

mod builder;
mod cache;
mod config;
mod error;
mod index;
mod model;
mod query;
mod resolver;
mod session;
mod store;
mod subgraph;

pub use builder::{BuildReport, BuildSummary, EstatePaths, EstateRecords, GraphBuilder};
pub use cache::{SubgraphCache, DEFAULT_CACHE_CAPACITY};
pub use config::{
    StrataConfig, CONFIG_FILE_NAME, DEFAULT_EDGE_BATCH_SIZE, DEFAULT_NODE_BATCH_SIZE,
    DEFAULT_STORE_PATH, ENV_SCHEDULER_EXPORT, ENV_SOURCE_DIR, ENV_STORE,
};
pub use error::{Error, Result, SourceError, SourceWarning, SourceWarningKind};
pub use index::GraphIndex;
pub use model::{
    DependencyGraph, Edge, EdgeType, GraphMetadata, JclAttributes, JobAttributes,
    MissingReferences, Node, NodeDetail, NodeId, NodeType, ProgramAttributes, Relation,
    ID_SEPARATOR,
};
pub use query::{
    CrossFolderDependency, DependencyChain, FlowDirection, GraphQueries, ImpactReport, NodeView,
    PathLimits, PathSearch, TreeEntry, DEFAULT_MAX_PATH_HOPS, DEFAULT_PATH_SEARCH_BUDGET,
};
pub use resolver::{description_program, ProgramRegistry, Resolution, ResolveStrategy, SkipList};
pub use session::{GraphSession, SessionSettings};
pub use store::{GraphStore, JsonFileStore, SqliteStore, WriteOptions, WriteStats};
pub use subgraph::{
    extract, jobs_in_scope, program_chain, ChainStats, Group, ProgramChain, Scope, Subgraph,
    SubgraphRequest, VisualEdge, VisualEdgeKind, VisualGraph, VisualNode, DEFAULT_MAX_CALL_DEPTH,
    DRILL_EDGE_TYPES,
};

pub use strata_records as records;
