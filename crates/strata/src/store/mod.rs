//! Durable graph storage.
//!
//! ## Module Structure
//!
//! - `schema` - `SQLite` schema (DDL)
//! - `helpers` - Row conversion and parsing utilities
//! - `sqlite` - [`SqliteStore`], the default store
//! - `json` - [`JsonFileStore`], one JSON document per graph
//!
//! Both stores hand back the same [`DependencyGraph`] shape the builder
//! produces. A failed write leaves the in-memory graph untouched.

mod helpers;
mod json;
mod schema;
mod sqlite;

pub use json::JsonFileStore;
pub use sqlite::{SqliteStore, WriteOptions};

use crate::error::Result;
use crate::model::DependencyGraph;

/// Statistics about a graph write.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WriteStats {
    /// Nodes written (inserted or updated)
    pub nodes_written: usize,
    /// Edges inserted
    pub edges_written: usize,
    /// Batches written, one savepoint each
    pub batches_committed: usize,
}

/// A place graphs are written to and read back from.
pub trait GraphStore: Send + Sync {
    /// Persist `graph`. Nodes are upserted by id; edges are inserted as given.
    ///
    /// # Errors
    ///
    /// Returns an error if the store rejects the write.
    fn write_graph(&self, graph: &DependencyGraph) -> Result<WriteStats>;

    /// Read the stored graph back.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read or holds corrupt rows.
    fn load_graph(&self) -> Result<DependencyGraph>;
}
