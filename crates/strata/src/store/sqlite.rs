//! `SQLite` graph store.
//!
//! # Atomicity
//!
//! A write runs in one transaction: the optional clear, every node and edge
//! batch (each a savepoint) and the metadata row. If any step fails the
//! transaction rolls back and the previously stored graph is left intact.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use rusqlite::{params, Connection, OptionalExtension, Transaction};
use tracing::{debug, info};

use super::helpers::{row_to_edge, row_to_node, EDGES_COLUMNS, NODES_COLUMNS};
use super::schema::SCHEMA;
use super::{GraphStore, WriteStats};
use crate::config::{DEFAULT_EDGE_BATCH_SIZE, DEFAULT_NODE_BATCH_SIZE};
use crate::error::{Error, Result};
use crate::model::{DependencyGraph, Edge, GraphMetadata, Node};

const METADATA_KEY: &str = "graph";

/// How a [`SqliteStore`] writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteOptions {
    /// Nodes per transaction
    pub node_batch_size: usize,
    /// Edges per transaction
    pub edge_batch_size: usize,
    /// Delete every stored node and edge before writing
    pub clear: bool,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            node_batch_size: DEFAULT_NODE_BATCH_SIZE,
            edge_batch_size: DEFAULT_EDGE_BATCH_SIZE,
            clear: true,
        }
    }
}

/// `SQLite` database holding one graph.
///
/// The connection is wrapped in a `Mutex` so the store can be shared across
/// threads.
#[derive(Debug)]
pub struct SqliteStore {
    conn: Mutex<Connection>,
    path: PathBuf,
    options: WriteOptions,
}

impl SqliteStore {
    /// Open or create the store.
    ///
    /// # Errors
    ///
    /// Returns an error if the parent directory cannot be created or the
    /// database cannot be opened.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.execute_batch(SCHEMA)?;

        debug!(path = %path.display(), "Opened graph store");
        Ok(Self {
            conn: Mutex::new(conn),
            path: path.to_path_buf(),
            options: WriteOptions::default(),
        })
    }

    /// In-memory store, for tests and throwaway builds.
    ///
    /// # Errors
    ///
    /// Returns an error if the schema cannot be applied.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
            path: PathBuf::from(":memory:"),
            options: WriteOptions::default(),
        })
    }

    /// Use `options` for subsequent writes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a batch size is zero.
    pub fn with_options(mut self, options: WriteOptions) -> Result<Self> {
        if options.node_batch_size == 0 || options.edge_batch_size == 0 {
            return Err(Error::Config("store batch sizes must be greater than zero".to_string()));
        }
        self.options = options;
        Ok(self)
    }

    /// Database location.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn connection(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|e| {
            Error::Internal(format!(
                "database connection mutex poisoned (a thread panicked while holding the lock): {e}"
            ))
        })
    }

    /// Number of stored nodes and edges.
    ///
    /// # Errors
    ///
    /// Returns an error if the counts cannot be read.
    pub fn counts(&self) -> Result<(usize, usize)> {
        let conn = self.connection()?;
        let nodes: usize = conn.query_row("SELECT COUNT(*) FROM nodes", [], |row| row.get(0))?;
        let edges: usize = conn.query_row("SELECT COUNT(*) FROM edges", [], |row| row.get(0))?;
        Ok((nodes, edges))
    }

    fn write_nodes(tx: &mut Transaction<'_>, nodes: &[&Node]) -> Result<()> {
        let batch = tx.savepoint()?;
        {
            let mut stmt = batch.prepare_cached(
                "INSERT INTO nodes (id, type, name, props) VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(id) DO UPDATE SET
                     type = excluded.type,
                     name = excluded.name,
                     props = excluded.props",
            )?;
            for node in nodes {
                let props = serde_json::to_string(&node.detail)?;
                stmt.execute(params![
                    node.id.as_str(),
                    node.node_type().as_str(),
                    node.name,
                    props
                ])?;
            }
        }
        batch.commit()?;
        Ok(())
    }

    fn write_edges(tx: &mut Transaction<'_>, edges: &[Edge]) -> Result<()> {
        let batch = tx.savepoint()?;
        {
            let mut stmt = batch.prepare_cached(
                "INSERT INTO edges (from_id, to_id, type, props) VALUES (?1, ?2, ?3, ?4)",
            )?;
            for edge in edges {
                let props = serde_json::to_string(&edge.relation)?;
                stmt.execute(params![
                    edge.from.as_str(),
                    edge.to.as_str(),
                    edge.edge_type().as_str(),
                    props
                ])?;
            }
        }
        batch.commit()?;
        Ok(())
    }
}

impl GraphStore for SqliteStore {
    fn write_graph(&self, graph: &DependencyGraph) -> Result<WriteStats> {
        let mut conn = self.connection()?;
        let mut tx = conn.transaction()?;
        let mut stats = WriteStats::default();

        if self.options.clear {
            tx.execute("DELETE FROM edges", [])?;
            tx.execute("DELETE FROM nodes", [])?;
            tx.execute("DELETE FROM metadata", [])?;
            debug!(path = %self.path.display(), "Cleared graph store");
        }

        let nodes: Vec<&Node> = graph.nodes().collect();
        for batch in nodes.chunks(self.options.node_batch_size) {
            Self::write_nodes(&mut tx, batch)?;
            stats.nodes_written += batch.len();
            stats.batches_committed += 1;
            debug!(written = stats.nodes_written, total = nodes.len(), "Wrote node batch");
        }

        for batch in graph.edges().chunks(self.options.edge_batch_size) {
            Self::write_edges(&mut tx, batch)?;
            stats.edges_written += batch.len();
            stats.batches_committed += 1;
            debug!(written = stats.edges_written, total = graph.edge_count(), "Wrote edge batch");
        }

        let metadata = serde_json::to_string(&graph.metadata)?;
        tx.execute(
            "INSERT INTO metadata (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![METADATA_KEY, metadata],
        )?;
        tx.commit()?;

        info!(
            path = %self.path.display(),
            nodes = stats.nodes_written,
            edges = stats.edges_written,
            batches = stats.batches_committed,
            "Wrote graph to store"
        );
        Ok(stats)
    }

    fn load_graph(&self) -> Result<DependencyGraph> {
        let conn = self.connection()?;

        let mut stmt = conn.prepare(&format!("SELECT {NODES_COLUMNS} FROM nodes ORDER BY id"))?;
        let nodes = stmt
            .query_map([], row_to_node)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut stmt = conn.prepare(&format!("SELECT {EDGES_COLUMNS} FROM edges ORDER BY id"))?;
        let edges = stmt
            .query_map([], row_to_edge)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let metadata: Option<String> = conn
            .query_row(
                "SELECT value FROM metadata WHERE key = ?1",
                [METADATA_KEY],
                |row| row.get(0),
            )
            .optional()?;
        let metadata = match metadata {
            Some(json) => serde_json::from_str(&json)?,
            None => GraphMetadata::default(),
        };

        let graph = DependencyGraph::from_parts(nodes, edges, metadata);
        info!(
            path = %self.path.display(),
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            "Loaded graph from store"
        );
        Ok(graph)
    }
}
