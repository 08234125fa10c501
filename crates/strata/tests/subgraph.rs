//! Scoped subgraph extraction, drill-down and program chains over a built estate.

use std::path::PathBuf;

use rstest::{fixture, rstest};
use strata::records::{IncludeCatalog, JobRecord, ProgramRecord, SchedulerExport, SqlOperation};
use strata::{
    extract, program_chain, EstateRecords, GraphBuilder, GraphIndex, GraphSession, NodeId,
    NodeType, Scope, SubgraphRequest, VisualEdgeKind, DEFAULT_MAX_CALL_DEPTH,
};

fn job(name: &str) -> NodeId {
    NodeId::new(NodeType::ControlmJob, name)
}

fn program(name: &str) -> NodeId {
    NodeId::new(NodeType::Pl1Program, name)
}

/// Two folders sharing conditions, and a four-deep call chain under J1.
#[fixture]
fn estate() -> GraphIndex {
    let scheduler = SchedulerExport::from_jobs([
        JobRecord::new("J1")
            .placed(Some("A1"), Some("S1"), Some("F1"))
            .with_description("P1 = daily extract")
            .produces("C1")
            .produces("C2"),
        JobRecord::new("J2")
            .placed(Some("A1"), Some("S1"), Some("F1"))
            .requires("C1"),
        JobRecord::new("J3")
            .placed(Some("A1"), Some("S2"), Some("F2"))
            .requires("C1")
            .requires("C2"),
    ]);
    let programs = [
        ProgramRecord::new("P1", "src/p1.pl1")
            .calling("P2")
            .including("INC1")
            .accessing("T1", SqlOperation::Select),
        ProgramRecord::new("P2", "src/p2.pl1").calling("P3"),
        ProgramRecord::new("P3", "src/p3.pl1").calling("P4"),
        ProgramRecord::new("P4", "src/p4.pl1"),
    ]
    .into_iter()
    .map(|p| (p.name.clone(), p))
    .collect();
    let mut includes = IncludeCatalog::new();
    includes.insert("INC1", PathBuf::from("src/inc1.inc"));

    let records = EstateRecords {
        scheduler,
        programs,
        includes,
        jcls: None,
        ..EstateRecords::default()
    };
    GraphIndex::new(GraphBuilder::new().build(&records, Vec::new()).graph)
}

#[rstest]
fn condition_links_reach_jobs_outside_the_scope(estate: GraphIndex) {
    let subgraph = extract(&estate, Scope::Folder, "F1").expect("F1 exists");

    assert_eq!(subgraph.job_count, 2);
    let j3 = subgraph.graph.node(&job("J3")).expect("J3 drawn as external");
    assert!(j3.external);
    assert_eq!(j3.label, "[F2]\nJ3");

    let mut links: Vec<(&str, &str, &str, bool)> = subgraph
        .graph
        .edges()
        .iter()
        .filter(|e| e.kind == VisualEdgeKind::JobDependency)
        .map(|e| {
            (
                e.source.name(),
                e.target.name(),
                e.condition.as_deref().unwrap_or_default(),
                e.external,
            )
        })
        .collect();
    links.sort_unstable();
    assert_eq!(
        links,
        [
            ("J1", "J2", "C1", false),
            ("J1", "J3", "C1", true),
            ("J1", "J3", "C2", true),
        ]
    );
    assert!(subgraph
        .graph
        .edges()
        .iter()
        .any(|e| e.id == "e_CONTROLM::J1__CONTROLM::J3__C2"));
}

#[rstest]
fn folder_scope_groups_by_sub_application(estate: GraphIndex) {
    let subgraph = extract(&estate, Scope::Folder, "F1").expect("F1 exists");

    assert_eq!(subgraph.groups.len(), 1);
    let group = &subgraph.groups[0];
    assert_eq!(group.id, "SUBAPP::S1");
    assert_eq!(group.group_type, NodeType::SubApplication);
    assert_eq!(group.job_ids, vec![job("J1"), job("J2")]);
}

#[rstest]
fn drill_down_is_bounded_by_call_depth(estate: GraphIndex) {
    let request = SubgraphRequest::new(Scope::Folder, "F1").drilling("J1");
    let subgraph = request
        .run(&estate, DEFAULT_MAX_CALL_DEPTH)
        .expect("drill should succeed");

    for reached in [program("P1"), program("P2"), program("P3")] {
        assert!(subgraph.graph.contains(&reached), "missing {reached}");
    }
    assert!(!subgraph.graph.contains(&program("P4")));
    assert!(subgraph.graph.contains(&NodeId::new(NodeType::DbTable, "T1")));
    assert!(subgraph
        .graph
        .contains(&NodeId::new(NodeType::IncludeFile, "INC1")));
    assert_eq!(subgraph.drill, Some(job("J1")));

    let drill_edges = subgraph
        .graph
        .edges()
        .iter()
        .filter(|e| e.kind != VisualEdgeKind::JobDependency)
        .count();
    assert_eq!(drill_edges, 5);
    assert!(subgraph
        .graph
        .edges()
        .iter()
        .any(|e| e.id == "drill_PL1::P1__DB::T1__db_access"
            && e.label.as_deref() == Some("SELECT")));
}

#[rstest]
fn deeper_call_depth_reaches_further(estate: GraphIndex) {
    let subgraph = SubgraphRequest::new(Scope::Folder, "F1")
        .drilling("J1")
        .run(&estate, 3)
        .expect("drill should succeed");
    assert!(subgraph.graph.contains(&program("P4")));
}

#[rstest]
fn drilling_a_job_outside_the_scope_is_rejected(estate: GraphIndex) {
    let err = SubgraphRequest::new(Scope::Folder, "F1")
        .drilling("J3")
        .run(&estate, DEFAULT_MAX_CALL_DEPTH)
        .expect_err("J3 is not in F1");
    assert!(matches!(err, strata::Error::InvalidQuery(_)));
}

#[rstest]
fn program_chain_counts_include_the_seed(estate: GraphIndex) {
    let chain = program_chain(&estate, &program("P1"), DEFAULT_MAX_CALL_DEPTH)
        .expect("P1 exists");

    // Seeded at the program itself, so one call level deeper than a job drill.
    assert_eq!(chain.stats.pl1_count, 4);
    assert_eq!(chain.stats.db_count, 1);
    assert_eq!(chain.stats.include_count, 1);
    assert!(chain.graph.contains(&program("P4")));

    let from_job = program_chain(&estate, &job("J1"), DEFAULT_MAX_CALL_DEPTH)
        .expect("J1 exists");
    assert_eq!(from_job.stats.pl1_count, 3);
    assert!(!from_job.graph.contains(&program("P4")));

    let json = serde_json::to_value(&chain).expect("serializes");
    assert_eq!(json["seed"], "PL1::P1");
    assert_eq!(json["stats"]["pl1_count"], 4);
}

#[rstest]
fn subgraph_json_uses_flat_node_and_edge_lists(estate: GraphIndex) {
    let subgraph = extract(&estate, Scope::SubApplication, "S1").expect("S1 exists");
    let json = serde_json::to_value(&subgraph).expect("serializes");

    assert_eq!(json["scope"], "subapp");
    assert_eq!(json["job_count"], 2);
    assert!(json["nodes"].as_array().is_some_and(|nodes| nodes.len() == 3));
    assert_eq!(json["edges"][0]["type"], "job_dependency");
    assert!(json.get("drill").is_none());
}

#[rstest]
fn session_serves_repeated_requests_from_cache(estate: GraphIndex) {
    let session = GraphSession::new(estate.into_graph());
    let request = SubgraphRequest::new(Scope::Application, "A1").drilling("J1");

    let first = session.subgraph(&request).expect("request succeeds");
    let second = session.subgraph(&request).expect("request succeeds");

    assert!(std::sync::Arc::ptr_eq(&first, &second));
    assert_eq!(first.job_count, 3);
}
