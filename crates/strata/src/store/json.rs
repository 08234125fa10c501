//! Single-document JSON graph store.
//!
//! # Atomicity
//!
//! The document is first written to a sibling file with a `.tmp` extension,
//! flushed and synced, then renamed over the target. If a write fails
//! part-way the previous document is left intact.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{GraphStore, WriteStats};
use crate::error::Result;
use crate::model::{DependencyGraph, Edge, GraphMetadata, Node};

#[derive(Serialize)]
struct DocumentRef<'a> {
    metadata: &'a GraphMetadata,
    nodes: Vec<&'a Node>,
    edges: &'a [Edge],
}

#[derive(Deserialize)]
struct Document {
    #[serde(default)]
    metadata: GraphMetadata,
    nodes: Vec<Node>,
    edges: Vec<Edge>,
}

/// Graph stored as one JSON document: `{ metadata, nodes, edges }`.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    /// Store backed by the file at `path`. Nothing is touched until the
    /// first read or write.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Document location.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut temp = self.path.as_os_str().to_owned();
        temp.push(".tmp");
        PathBuf::from(temp)
    }
}

impl GraphStore for JsonFileStore {
    fn write_graph(&self, graph: &DependencyGraph) -> Result<WriteStats> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let document = DocumentRef {
            metadata: &graph.metadata,
            nodes: graph.nodes().collect(),
            edges: graph.edges(),
        };

        let temp_path = self.temp_path();
        {
            let file = File::create(&temp_path)?;
            let mut writer = BufWriter::new(file);
            serde_json::to_writer_pretty(&mut writer, &document)?;
            writer.flush()?;
            writer.get_ref().sync_all()?;
        }
        debug!(temp = %temp_path.display(), "Wrote graph document");

        std::fs::rename(&temp_path, &self.path)?;

        info!(
            path = %self.path.display(),
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            "Wrote graph document"
        );
        Ok(WriteStats {
            nodes_written: graph.node_count(),
            edges_written: graph.edge_count(),
            batches_committed: 1,
        })
    }

    fn load_graph(&self) -> Result<DependencyGraph> {
        let reader = BufReader::new(File::open(&self.path)?);
        let document: Document = serde_json::from_reader(reader)?;
        let graph = DependencyGraph::from_parts(document.nodes, document.edges, document.metadata);
        info!(
            path = %self.path.display(),
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            "Loaded graph document"
        );
        Ok(graph)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::model::{NodeDetail, NodeId, NodeType, Relation};

    #[test]
    fn write_replaces_document_and_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("out").join("graph.json"));
        let nodes = vec![Node::new("T1", NodeDetail::DbTable)];

        store
            .write_graph(&DependencyGraph::from_parts(nodes, Vec::new(), GraphMetadata::default()))
            .unwrap();
        store.write_graph(&DependencyGraph::new()).unwrap();

        assert!(!store.temp_path().exists());
        assert_eq!(store.load_graph().unwrap().node_count(), 0);
    }

    #[test]
    fn document_layout_is_flat() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("graph.json"));
        let nodes = vec![
            Node::new("A", NodeDetail::DbTable),
            Node::new("B", NodeDetail::DbTable),
        ];
        let edges = vec![Edge::new(
            NodeId::new(NodeType::DbTable, "A"),
            NodeId::new(NodeType::DbTable, "B"),
            Relation::Contains,
        )];
        store
            .write_graph(&DependencyGraph::from_parts(nodes, edges, GraphMetadata::default()))
            .unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(store.path()).unwrap()).unwrap();
        assert_eq!(raw["nodes"][0]["id"], "DB::A");
        assert_eq!(raw["nodes"][0]["type"], "db_table");
        assert_eq!(raw["edges"][0]["type"], "contains");
        assert_eq!(raw["metadata"]["total_edges"], 1);
    }

    #[test]
    fn missing_document_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = JsonFileStore::new(dir.path().join("nope.json"))
            .load_graph()
            .unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }
}
