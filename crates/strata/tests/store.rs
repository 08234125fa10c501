//! Persisting built graphs and reloading them through both stores.

use std::fs;

use strata::records::{JobRecord, ProgramRecord, SchedulerExport, SqlOperation};
use strata::{
    BuildReport, DependencyGraph, Error, EstateRecords, GraphBuilder, GraphIndex, GraphQueries,
    GraphStore, JsonFileStore, NodeId, NodeType, SqliteStore, WriteOptions,
};

fn build_estate(jobs: usize) -> BuildReport {
    let mut job_records = Vec::new();
    for n in 0..jobs {
        let mut job = JobRecord::new(format!("JOB{n:03}"))
            .placed(Some("APP"), Some("SUB"), Some("FOLDER"))
            .with_description(format!("PGM{n:03} = step {n}"))
            .produces(format!("DONE{n:03}"));
        if n > 0 {
            job = job.requires(format!("DONE{:03}", n - 1));
        }
        job_records.push(job);
    }
    // JOB000 names a program that does not exist.
    let programs = (1..jobs)
        .map(|n| {
            let mut program = ProgramRecord::new(format!("PGM{n:03}"), format!("src/pgm{n:03}.pl1"))
                .accessing("LEDGER", SqlOperation::Select);
            if n + 1 < jobs {
                program = program.calling(format!("PGM{:03}", n + 1));
            }
            (program.name.clone(), program)
        })
        .collect();

    let records = EstateRecords {
        scheduler: SchedulerExport::from_jobs(job_records),
        programs,
        ..EstateRecords::default()
    };
    GraphBuilder::new().build(&records, Vec::new())
}

fn assert_same_graph(loaded: &DependencyGraph, built: &DependencyGraph) {
    assert_eq!(loaded.metadata.fingerprint, built.metadata.fingerprint);
    assert_eq!(loaded.metadata.missing, built.metadata.missing);
    assert_eq!(loaded.metadata.built_at, built.metadata.built_at);
    assert_eq!(loaded.node_count(), built.node_count());
    assert_eq!(loaded.edge_count(), built.edge_count());
    for node in built.nodes() {
        assert_eq!(loaded.node(&node.id), Some(node), "node {} differs", node.id);
    }
}

#[test]
fn sqlite_round_trip_preserves_the_graph() {
    let dir = tempfile::tempdir().expect("should create temp dir");
    let path = dir.path().join("graph").join("strata.db");
    let report = build_estate(12);
    assert!(report.missing.programs.contains("PGM000"));

    let stats = SqliteStore::open(&path)
        .expect("should open store")
        .write_graph(&report.graph)
        .expect("write should succeed");
    assert_eq!(stats.nodes_written, report.graph.node_count());
    assert_eq!(stats.edges_written, report.graph.edge_count());

    // A fresh connection sees exactly what was written.
    let loaded = SqliteStore::open(&path)
        .expect("should reopen store")
        .load_graph()
        .expect("load should succeed");
    assert_same_graph(&loaded, &report.graph);

    let built = GraphIndex::new(report.graph);
    let reloaded = GraphIndex::new(loaded);
    let ledger = NodeId::new(NodeType::DbTable, "LEDGER");
    assert_eq!(
        reloaded.dependencies(&ledger, true).expect("LEDGER exists"),
        built.dependencies(&ledger, true).expect("LEDGER exists")
    );
    assert_eq!(reloaded.detect_cycles(), built.detect_cycles());
}

#[test]
fn sqlite_batches_follow_the_configured_sizes() {
    let report = build_estate(30);
    let store = SqliteStore::in_memory()
        .expect("should open store")
        .with_options(WriteOptions {
            node_batch_size: 16,
            edge_batch_size: 32,
            clear: true,
        })
        .expect("sizes are valid");

    let stats = store.write_graph(&report.graph).expect("write should succeed");
    let nodes = report.graph.node_count();
    let edges = report.graph.edge_count();
    assert_eq!(stats.batches_committed, nodes.div_ceil(16) + edges.div_ceil(32));
    assert_eq!(store.counts().expect("counts"), (nodes, edges));

    // Clearing rewrite replaces rather than accumulates.
    store.write_graph(&report.graph).expect("rewrite should succeed");
    assert_eq!(store.counts().expect("counts"), (nodes, edges));
}

#[test]
fn json_round_trip_preserves_the_graph() {
    let dir = tempfile::tempdir().expect("should create temp dir");
    let store = JsonFileStore::new(dir.path().join("out").join("graph.json"));
    let report = build_estate(8);

    store.write_graph(&report.graph).expect("write should succeed");
    let loaded = store.load_graph().expect("load should succeed");

    assert_same_graph(&loaded, &report.graph);
}

#[test]
fn failed_json_write_keeps_the_previous_document() {
    let dir = tempfile::tempdir().expect("should create temp dir");
    let path = dir.path().join("graph.json");
    let store = JsonFileStore::new(&path);
    let first = build_estate(3);
    store.write_graph(&first.graph).expect("first write should succeed");

    // Block the temporary file so the next write cannot start.
    fs::create_dir(dir.path().join("graph.json.tmp")).expect("should create blocker");
    let second = build_estate(6);
    let err = store
        .write_graph(&second.graph)
        .expect_err("blocked write should fail");
    assert!(matches!(err, Error::Io(_)));

    let loaded = store.load_graph().expect("previous document loads");
    assert_eq!(loaded.metadata.fingerprint, first.graph.metadata.fingerprint);
    // The graph being written is untouched by the failure.
    assert_eq!(second.graph.metadata.fingerprint, second.graph.fingerprint());
}

#[test]
fn loading_a_missing_sqlite_store_is_empty() {
    let dir = tempfile::tempdir().expect("should create temp dir");
    let store = SqliteStore::open(&dir.path().join("fresh.db")).expect("should open store");

    let graph = store.load_graph().expect("empty store loads");
    assert_eq!(graph.node_count(), 0);
    assert!(graph.metadata.missing.is_empty());
}
