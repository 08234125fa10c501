//! Graph construction: turns independently parsed record sets into one
//! consistent node/edge collection.
//!
//! ## Phases
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                         build()                              │
//! ├──────────────────────────────────────────────────────────────┤
//! │  1. Hierarchy    application → sub_application → folder → job │
//! │  2. Conditions   one node per name, producers + consumers     │
//! │  3. Produces / requires edges                                 │
//! │  4. Job → program (description token, resolver chain)         │
//! │     Job → JCL → program (optional JCL layer)                  │
//! │  5. Program → program calls                                   │
//! │  6. Program → include (only discovered fragments)             │
//! │  7. Program → table, one edge per operation                   │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Linking runs only after every record set is complete, since resolution
//! depends on the full registries. Graph mutation is single threaded.
//!
//! ## Placeholder policy
//!
//! | Edge | Missing target |
//! |------|----------------|
//! | `contains`, `produces`, `requires` | target node is derived from the job records themselves |
//! | `executes`, `calls_program`, `calls` | no edge, token recorded as missing |
//! | `includes` | no edge, token recorded as missing |
//! | `db_access` | table node created on first reference |

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, warn};

use strata_records::{
    discover_includes, ControlMSource, IncludeCatalog, JclRecord, JclSource, Pl1Source,
    ProgramRecord, RecordSource, SchedulerExport, SourceWarning, SqlFileRecord, SqlSource,
};

use crate::error::{Error, Result};
use crate::model::{
    DependencyGraph, Edge, EdgeType, JclAttributes, JobAttributes, MissingReferences, Node,
    NodeDetail, NodeId, NodeType, ProgramAttributes, Relation,
};
use crate::resolver::{description_program, ProgramRegistry, SkipList};

/// Every record set a build consumes.
#[derive(Debug, Clone, Default)]
pub struct EstateRecords {
    /// Scheduler folders and jobs
    pub scheduler: SchedulerExport,
    /// Programs keyed by declared name
    pub programs: BTreeMap<String, ProgramRecord>,
    /// Discovered include fragments
    pub includes: IncludeCatalog,
    /// JCL members keyed by name; `None` leaves the JCL layer out
    pub jcls: Option<BTreeMap<String, JclRecord>>,
    /// Standalone SQL scripts in the source tree; catalogued, not linked
    pub sql_files: BTreeMap<String, SqlFileRecord>,
}

/// Where the record sources live on disk.
#[derive(Debug, Clone, Default)]
pub struct EstatePaths {
    /// Scheduler export file or directory of exports
    pub scheduler_export: Option<PathBuf>,
    /// Procedural source tree (programs and include fragments)
    pub source_dir: Option<PathBuf>,
    /// JCL member tree
    pub jcl_dir: Option<PathBuf>,
}

impl EstateRecords {
    /// Read every configured record source.
    ///
    /// The scheduler export and the source tree are read in parallel.
    /// Per-file failures inside a directory become warnings.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if no source is configured and
    /// [`Error::Source`] if a configured source cannot be opened or a single
    /// export file is malformed.
    pub fn load(paths: &EstatePaths) -> Result<(Self, Vec<SourceWarning>)> {
        if paths.scheduler_export.is_none() && paths.source_dir.is_none() {
            return Err(Error::Config(
                "no scheduler export or source directory configured".to_string(),
            ));
        }

        let (scheduler, sources) = rayon::join(
            || load_scheduler(paths.scheduler_export.as_deref()),
            || load_sources(paths.source_dir.as_deref()),
        );
        let (scheduler, mut warnings) = scheduler?;
        let LoadedSources {
            programs,
            includes,
            sql_files,
            warnings: source_warnings,
        } = sources?;
        warnings.extend(source_warnings);

        let jcls = match paths.jcl_dir.as_deref() {
            Some(dir) => {
                let scanned = JclSource::new()?.parse_directory(dir)?;
                info!(jcls = scanned.len(), directory = %dir.display(), "Parsed JCL members");
                warnings.extend(scanned.warnings);
                Some(scanned.records)
            }
            None => None,
        };

        Ok((
            Self {
                scheduler,
                programs,
                includes,
                jcls,
                sql_files,
            },
            warnings,
        ))
    }
}

fn load_scheduler(path: Option<&Path>) -> Result<(SchedulerExport, Vec<SourceWarning>)> {
    match path {
        Some(path) => Ok(ControlMSource::new()?.load(path)?),
        None => Ok((SchedulerExport::default(), Vec::new())),
    }
}

#[derive(Default)]
struct LoadedSources {
    programs: BTreeMap<String, ProgramRecord>,
    includes: IncludeCatalog,
    sql_files: BTreeMap<String, SqlFileRecord>,
    warnings: Vec<SourceWarning>,
}

fn load_sources(dir: Option<&Path>) -> Result<LoadedSources> {
    let Some(dir) = dir else {
        return Ok(LoadedSources::default());
    };
    let scanned = Pl1Source::new()?.parse_directory(dir)?;
    let (includes, include_warnings) = discover_includes(dir)?;
    let scripts = SqlSource.parse_directory(dir)?;
    info!(
        programs = scanned.len(),
        includes = includes.len(),
        sql_files = scripts.len(),
        directory = %dir.display(),
        "Parsed program sources"
    );
    let mut warnings = scanned.warnings;
    warnings.extend(include_warnings);
    warnings.extend(scripts.warnings);
    Ok(LoadedSources {
        programs: scanned.records,
        includes,
        sql_files: scripts.records,
        warnings,
    })
}

/// Outcome of a build: the graph plus its data-quality report.
#[derive(Debug, Clone)]
pub struct BuildReport {
    /// The built graph; `metadata.missing` mirrors [`missing`](Self::missing)
    pub graph: DependencyGraph,
    /// Unresolved references
    pub missing: MissingReferences,
    /// Per-file problems from the record sources
    pub warnings: Vec<SourceWarning>,
}

impl BuildReport {
    /// Counts for display.
    #[must_use]
    pub fn summary(&self) -> BuildSummary {
        BuildSummary {
            total_nodes: self.graph.node_count(),
            total_edges: self.graph.edge_count(),
            nodes_by_type: self.graph.metadata.node_types.clone(),
            edges_by_type: self.graph.metadata.edge_types.clone(),
            missing_programs: self.missing.programs.len(),
            missing_calls: self.missing.calls.len(),
            missing_includes: self.missing.includes.len(),
            missing_jcls: self.missing.jcls.len(),
            input_warnings: self.warnings.iter().filter(|w| w.kind.is_input_error()).count(),
            internal_warnings: self
                .warnings
                .iter()
                .filter(|w| w.kind.is_internal_error())
                .count(),
        }
    }
}

/// Node and edge counts plus data-quality counts of a build.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BuildSummary {
    /// Nodes in the graph
    pub total_nodes: usize,
    /// Edges in the graph
    pub total_edges: usize,
    /// Nodes per type
    pub nodes_by_type: BTreeMap<NodeType, usize>,
    /// Edges per type
    pub edges_by_type: BTreeMap<EdgeType, usize>,
    /// Unresolved job → program tokens
    pub missing_programs: usize,
    /// Unresolved program calls
    pub missing_calls: usize,
    /// Unresolved includes
    pub missing_includes: usize,
    /// Job members with no JCL
    pub missing_jcls: usize,
    /// Problems with the estate's files
    pub input_warnings: usize,
    /// Problems with the scan environment
    pub internal_warnings: usize,
}

impl fmt::Display for BuildSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Nodes:")?;
        for (node_type, count) in &self.nodes_by_type {
            writeln!(f, "  {:20} {count:>7}", node_type.as_str())?;
        }
        writeln!(f, "  {:20} {:>7}", "TOTAL", self.total_nodes)?;
        writeln!(f, "Edges:")?;
        for (edge_type, count) in &self.edges_by_type {
            writeln!(f, "  {:20} {count:>7}", edge_type.as_str())?;
        }
        writeln!(f, "  {:20} {:>7}", "TOTAL", self.total_edges)?;
        write!(
            f,
            "Missing: {} programs, {} calls, {} includes, {} JCL members",
            self.missing_programs, self.missing_calls, self.missing_includes, self.missing_jcls
        )
    }
}

/// Builds a [`DependencyGraph`] from [`EstateRecords`].
#[derive(Debug, Clone, Default)]
pub struct GraphBuilder {
    skip: SkipList,
}

impl GraphBuilder {
    /// Builder with the default description denylist.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder whose denylist also rejects `extra` tokens.
    pub fn with_extra_skip<I, S>(extra: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            skip: SkipList::with_extra(extra),
        }
    }

    /// Build the graph. Inputs are not modified; unresolved references are
    /// reported, never fatal.
    #[must_use]
    pub fn build(&self, records: &EstateRecords, warnings: Vec<SourceWarning>) -> BuildReport {
        let mut pass = BuildPass {
            graph: DependencyGraph::new(),
            missing: MissingReferences::default(),
            registry: ProgramRegistry::new(&records.programs),
        };

        pass.add_hierarchy(&records.scheduler);
        pass.add_conditions(&records.scheduler);
        pass.add_programs(&records.programs);
        if let Some(jcls) = &records.jcls {
            pass.add_jcls(jcls);
        }

        pass.link_jobs_to_programs(&records.scheduler, &self.skip);
        if let Some(jcls) = &records.jcls {
            pass.link_jobs_to_jcls(&records.scheduler, jcls);
            pass.link_jcls_to_programs(jcls);
        }
        pass.link_calls(&records.programs);
        pass.link_includes(&records.programs, &records.includes);
        pass.link_tables(&records.programs);

        let BuildPass {
            mut graph, missing, ..
        } = pass;
        graph.metadata.missing = missing.clone();
        graph.metadata.built_at = Some(Utc::now());
        graph.refresh_metadata();

        info!(
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            missing = missing.total(),
            "Built dependency graph"
        );
        if !missing.is_empty() {
            warn!(
                programs = missing.programs.len(),
                calls = missing.calls.len(),
                includes = missing.includes.len(),
                jcls = missing.jcls.len(),
                "Unresolved references"
            );
        }

        BuildReport {
            graph,
            missing,
            warnings,
        }
    }
}

/// Mutable state of one build.
struct BuildPass {
    graph: DependencyGraph,
    missing: MissingReferences,
    registry: ProgramRegistry,
}

impl BuildPass {
    fn link(&mut self, from: NodeId, to: NodeId, relation: Relation) {
        let added = self.graph.add_edge(Edge::new(from, to, relation));
        debug_assert!(added, "builder emitted an edge with an unknown endpoint");
    }

    /// Step 1: hierarchy nodes and deduplicated `contains` edges.
    fn add_hierarchy(&mut self, scheduler: &SchedulerExport) {
        for (name, folder) in &scheduler.folders {
            if name.trim().is_empty() {
                continue;
            }
            self.graph.insert_node(Node::new(
                name.as_str(),
                NodeDetail::Folder {
                    datacenter: folder.datacenter.clone(),
                    platform: folder.platform.clone(),
                },
            ));
        }

        let mut app_subapps: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
        let mut subapp_folders: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
        let mut folder_jobs: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
        let mut applications: BTreeSet<&str> = BTreeSet::new();
        let mut sub_applications: BTreeSet<&str> = BTreeSet::new();

        for job in scheduler.jobs.values() {
            let folder = present(job.folder.as_deref());
            let app = present(job.application.as_deref());
            let sub_app = present(job.sub_application.as_deref());

            if let Some(app) = app {
                applications.insert(app);
            }
            if let Some(sub_app) = sub_app {
                sub_applications.insert(sub_app);
            }
            if let (Some(app), Some(sub_app)) = (app, sub_app) {
                app_subapps.entry(app).or_default().insert(sub_app);
            }
            if let (Some(sub_app), Some(folder)) = (sub_app, folder) {
                subapp_folders.entry(sub_app).or_default().insert(folder);
            }
            if let Some(folder) = folder {
                folder_jobs.entry(folder).or_default().insert(job.name.as_str());
            }

            self.graph.insert_node(Node::new(
                job.name.as_str(),
                NodeDetail::ControlmJob(JobAttributes::from(job)),
            ));
        }

        for app in &applications {
            self.graph.insert_node(Node::new(*app, NodeDetail::Application));
        }
        for sub_app in &sub_applications {
            self.graph
                .insert_node(Node::new(*sub_app, NodeDetail::SubApplication));
        }
        for folder in folder_jobs.keys().chain(subapp_folders.values().flatten()) {
            let id = NodeId::new(NodeType::Folder, folder);
            if !self.graph.contains(&id) {
                self.graph.insert_node(Node::new(
                    *folder,
                    NodeDetail::Folder {
                        datacenter: String::new(),
                        platform: String::new(),
                    },
                ));
            }
        }

        let mut seen: HashSet<(NodeId, NodeId)> = HashSet::new();
        let pairs = app_subapps
            .iter()
            .flat_map(|(app, subs)| {
                subs.iter().map(move |sub| {
                    (
                        NodeId::new(NodeType::Application, app),
                        NodeId::new(NodeType::SubApplication, sub),
                    )
                })
            })
            .chain(subapp_folders.iter().flat_map(|(sub, folders)| {
                folders.iter().map(move |folder| {
                    (
                        NodeId::new(NodeType::SubApplication, sub),
                        NodeId::new(NodeType::Folder, folder),
                    )
                })
            }))
            .chain(folder_jobs.iter().flat_map(|(folder, jobs)| {
                jobs.iter().map(move |job| {
                    (
                        NodeId::new(NodeType::Folder, folder),
                        NodeId::new(NodeType::ControlmJob, job),
                    )
                })
            }))
            .collect::<Vec<_>>();

        for (from, to) in pairs {
            if seen.insert((from.clone(), to.clone())) {
                self.link(from, to, Relation::Contains);
            }
        }

        debug!(
            applications = applications.len(),
            sub_applications = sub_applications.len(),
            folders = folder_jobs.len(),
            jobs = scheduler.jobs.len(),
            contains = seen.len(),
            "Added scheduler hierarchy"
        );
    }

    /// Steps 2 and 3: condition nodes and `produces`/`requires` edges.
    fn add_conditions(&mut self, scheduler: &SchedulerExport) {
        let index = scheduler.condition_index();
        for (name, usage) in &index {
            if name.trim().is_empty() {
                continue;
            }
            self.graph.insert_node(Node::new(
                name.as_str(),
                NodeDetail::Condition {
                    producer_jobs: usage.producers.clone(),
                    consuming_jobs: usage.consumers.clone(),
                },
            ));
        }

        let mut seen: HashSet<(&str, &str, EdgeType)> = HashSet::new();
        for job in scheduler.jobs.values() {
            let job_id = NodeId::new(NodeType::ControlmJob, &job.name);
            for cond in &job.out_conditions {
                if cond.name.trim().is_empty()
                    || !seen.insert((job.name.as_str(), cond.name.as_str(), EdgeType::Produces))
                {
                    continue;
                }
                self.link(
                    job_id.clone(),
                    NodeId::new(NodeType::Condition, &cond.name),
                    Relation::Produces {
                        sign: cond.sign.clone(),
                        odate: cond.odate.clone(),
                    },
                );
            }
            for cond in &job.in_conditions {
                if cond.name.trim().is_empty()
                    || !seen.insert((job.name.as_str(), cond.name.as_str(), EdgeType::Requires))
                {
                    continue;
                }
                self.link(
                    job_id.clone(),
                    NodeId::new(NodeType::Condition, &cond.name),
                    Relation::Requires {
                        and_or: cond.and_or.clone(),
                        odate: cond.odate.clone(),
                    },
                );
            }
        }
        debug!(conditions = index.len(), "Added conditions");
    }

    fn add_programs(&mut self, programs: &BTreeMap<String, ProgramRecord>) {
        for (name, program) in programs {
            self.graph.insert_node(Node::new(
                name.as_str(),
                NodeDetail::Pl1Program(ProgramAttributes::from(program)),
            ));
        }
    }

    fn add_jcls(&mut self, jcls: &BTreeMap<String, JclRecord>) {
        for (name, jcl) in jcls {
            self.graph
                .insert_node(Node::new(name.as_str(), NodeDetail::Jcl(JclAttributes::from(jcl))));
        }
    }

    /// Step 4: job description token → program.
    fn link_jobs_to_programs(&mut self, scheduler: &SchedulerExport, skip: &SkipList) {
        let mut linked = 0usize;
        for job in scheduler.jobs.values() {
            let Some(token) = description_program(&job.description, skip) else {
                continue;
            };
            match self.registry.resolve(&token) {
                Some(resolution) => {
                    self.link(
                        NodeId::new(NodeType::ControlmJob, &job.name),
                        NodeId::new(NodeType::Pl1Program, &resolution.program),
                        Relation::Executes,
                    );
                    linked += 1;
                }
                None => {
                    debug!(job = %job.name, token = %token, "Description names an unknown program");
                    self.missing.programs.insert(token);
                }
            }
        }
        debug!(linked, "Linked jobs to programs");
    }

    /// Job member → JCL node.
    fn link_jobs_to_jcls(&mut self, scheduler: &SchedulerExport, jcls: &BTreeMap<String, JclRecord>) {
        for job in scheduler.jobs.values() {
            let Some(memname) = present(job.memname.as_deref()) else {
                continue;
            };
            let jcl_name = member_name(memname);
            if jcls.contains_key(&jcl_name) {
                self.link(
                    NodeId::new(NodeType::ControlmJob, &job.name),
                    NodeId::new(NodeType::Jcl, &jcl_name),
                    Relation::Executes,
                );
            } else {
                self.missing.jcls.insert(memname.to_string());
            }
        }
    }

    /// JCL member → program, through the same resolver chain.
    fn link_jcls_to_programs(&mut self, jcls: &BTreeMap<String, JclRecord>) {
        for (name, jcl) in jcls {
            for program in &jcl.programs_called {
                match self.registry.resolve(program) {
                    Some(resolution) => self.link(
                        NodeId::new(NodeType::Jcl, name),
                        NodeId::new(NodeType::Pl1Program, &resolution.program),
                        Relation::CallsProgram,
                    ),
                    None => {
                        self.missing.programs.insert(program.clone());
                    }
                }
            }
        }
    }

    /// Step 5: program → program calls.
    fn link_calls(&mut self, programs: &BTreeMap<String, ProgramRecord>) {
        for (name, program) in programs {
            for callee in &program.calls {
                match self.registry.resolve(callee) {
                    Some(resolution) => self.link(
                        NodeId::new(NodeType::Pl1Program, name),
                        NodeId::new(NodeType::Pl1Program, &resolution.program),
                        Relation::Calls,
                    ),
                    None => {
                        self.missing.calls.insert(callee.clone());
                    }
                }
            }
        }
    }

    /// Step 6: program → discovered include fragment.
    fn link_includes(&mut self, programs: &BTreeMap<String, ProgramRecord>, catalog: &IncludeCatalog) {
        for (name, program) in programs {
            for include in &program.includes {
                let Some(path) = catalog.get(include) else {
                    self.missing.includes.insert(include.clone());
                    continue;
                };
                let include_name = include.to_uppercase();
                let id = NodeId::new(NodeType::IncludeFile, &include_name);
                if !self.graph.contains(&id) {
                    self.graph.insert_node(Node::new(
                        include_name,
                        NodeDetail::IncludeFile {
                            file_path: path.clone(),
                        },
                    ));
                }
                self.link(NodeId::new(NodeType::Pl1Program, name), id, Relation::Includes);
            }
        }
    }

    /// Step 7: program → table, one edge per operation.
    fn link_tables(&mut self, programs: &BTreeMap<String, ProgramRecord>) {
        for (name, program) in programs {
            for (table, operations) in &program.sql_operations {
                let table_id = NodeId::new(NodeType::DbTable, table);
                if !self.graph.contains(&table_id) {
                    self.graph
                        .insert_node(Node::new(table.as_str(), NodeDetail::DbTable));
                }
                for operation in operations {
                    self.link(
                        NodeId::new(NodeType::Pl1Program, name),
                        table_id.clone(),
                        Relation::DbAccess {
                            operation: *operation,
                        },
                    );
                }
            }
        }
    }
}

fn present(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

/// JCL member name for a job's `memname`: extension stripped, uppercased.
fn member_name(memname: &str) -> String {
    let trimmed = memname.trim();
    let stem = match trimmed.rsplit_once('.') {
        Some((stem, ext)) if ext.eq_ignore_ascii_case("jcl") => stem,
        _ => trimmed,
    };
    stem.to_uppercase()
}
