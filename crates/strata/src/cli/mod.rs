//! CLI command implementations.

mod display;

pub mod build;
pub mod chain;
pub mod cycles;
pub mod dependents;
pub mod deps;
pub mod impact;
pub mod node;
pub mod paths;
pub mod search;
pub mod stats;
pub mod subgraph;
pub mod tree;

use strata::{Error, GraphIndex, GraphStore, NodeId, SqliteStore, StrataConfig};

/// Open the configured store, refusing to create one.
pub(crate) fn open_store(config: &StrataConfig) -> Result<SqliteStore, Error> {
    if !config.store.is_file() {
        return Err(Error::Config(format!(
            "no graph store at {} (run `strata build` first)",
            config.store.display()
        )));
    }
    SqliteStore::open(&config.store)
}

/// Load the stored graph and index it.
pub(crate) fn load_index(config: &StrataConfig) -> Result<GraphIndex, Error> {
    let graph = open_store(config)?.load_graph()?;
    Ok(GraphIndex::new(graph))
}

/// Parse a node id argument, requiring a known type prefix.
pub(crate) fn parse_id(raw: &str) -> Result<NodeId, Error> {
    let id = NodeId::from(raw.trim());
    if id.node_type().is_none() {
        return Err(Error::InvalidQuery(format!(
            "'{raw}' is not a node id (expected PREFIX::NAME, e.g. CONTROLM::PAYJ010)"
        )));
    }
    Ok(id)
}
