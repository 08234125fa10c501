//! Row conversion between the graph store and the graph model.

use rusqlite::types::Type;
use rusqlite::Row;

use crate::model::{Edge, EdgeType, Node, NodeDetail, NodeId, NodeType, Relation};

/// SQL column list for the nodes table.
///
/// Use with `row_to_node` for consistent column ordering.
pub(crate) const NODES_COLUMNS: &str = "id, type, name, props";

/// SQL column list for the edges table.
///
/// Use with `row_to_edge` for consistent column ordering.
pub(crate) const EDGES_COLUMNS: &str = "from_id, to_id, type, props";

fn corrupt(column: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(column, Type::Text, message.into())
}

/// Parse a node type string from the database.
///
/// Returns an error for unrecognized values, indicating possible database corruption.
pub(crate) fn parse_node_type(s: &str) -> rusqlite::Result<NodeType> {
    s.parse().map_err(|_| {
        corrupt(
            1,
            format!("Unknown node type '{s}' in database. Store may be corrupted or from a newer version."),
        )
    })
}

/// Parse an edge type string from the database.
///
/// Returns an error for unrecognized values, indicating possible database corruption.
pub(crate) fn parse_edge_type(s: &str) -> rusqlite::Result<EdgeType> {
    s.parse().map_err(|_| {
        corrupt(
            2,
            format!("Unknown edge type '{s}' in database. Store may be corrupted or from a newer version."),
        )
    })
}

/// Convert a row selected with [`NODES_COLUMNS`] to a node.
pub(crate) fn row_to_node(row: &Row) -> rusqlite::Result<Node> {
    let id: String = row.get(0)?;
    let node_type = parse_node_type(&row.get::<_, String>(1)?)?;
    let name: String = row.get(2)?;
    let props: String = row.get(3)?;

    let detail: NodeDetail = serde_json::from_str(&props)
        .map_err(|e| corrupt(3, format!("Invalid properties for node '{id}': {e}")))?;
    if detail.node_type() != node_type {
        return Err(corrupt(
            3,
            format!(
                "Node '{id}' is stored as {node_type} but its properties describe {}",
                detail.node_type()
            ),
        ));
    }

    Ok(Node {
        id: NodeId::from(id),
        name,
        detail,
    })
}

/// Convert a row selected with [`EDGES_COLUMNS`] to an edge.
pub(crate) fn row_to_edge(row: &Row) -> rusqlite::Result<Edge> {
    let from: String = row.get(0)?;
    let to: String = row.get(1)?;
    let edge_type = parse_edge_type(&row.get::<_, String>(2)?)?;
    let props: String = row.get(3)?;

    let relation: Relation = serde_json::from_str(&props)
        .map_err(|e| corrupt(3, format!("Invalid properties for edge {from} -> {to}: {e}")))?;
    if relation.edge_type() != edge_type {
        return Err(corrupt(
            3,
            format!(
                "Edge {from} -> {to} is stored as {edge_type} but its properties describe {}",
                relation.edge_type()
            ),
        ));
    }

    Ok(Edge::new(NodeId::from(from), NodeId::from(to), relation))
}
