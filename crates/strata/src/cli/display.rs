//! Common display utilities for CLI commands.

use std::collections::BTreeMap;

use colored::Colorize;
use serde::Serialize;
use strata::{Error, GraphIndex, NodeId, NodeType};

const MAX_DISPLAY_ITEMS: usize = 10;

/// Print a value as pretty JSON on stdout.
pub fn print_json<T: Serialize>(value: &T) -> Result<(), Error> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Display node ids with optional truncation.
///
/// Shows up to `MAX_DISPLAY_ITEMS` ids with bullet points. If there are more,
/// shows "... and N more". If empty, shows the provided `empty_message`.
pub fn print_ids<'a, I>(ids: I, empty_message: &str)
where
    I: IntoIterator<Item = &'a NodeId>,
    I::IntoIter: ExactSizeIterator,
{
    let ids = ids.into_iter();
    let total = ids.len();
    if total == 0 {
        println!("    {}", empty_message.dimmed());
        return;
    }

    for id in ids.take(MAX_DISPLAY_ITEMS) {
        println!("    {} {id}", "•".dimmed());
    }

    if total > MAX_DISPLAY_ITEMS {
        println!(
            "    {} ... and {} more",
            "•".dimmed(),
            total - MAX_DISPLAY_ITEMS
        );
    }
}

/// Group ids by node type and display each group, truncated.
pub fn print_ids_by_type<'a, I>(index: &GraphIndex, ids: I)
where
    I: IntoIterator<Item = &'a NodeId>,
{
    let mut by_type: BTreeMap<NodeType, Vec<&NodeId>> = BTreeMap::new();
    for id in ids {
        if let Some(node) = index.node(id) {
            by_type.entry(node.node_type()).or_default().push(id);
        }
    }
    for (node_type, ids) in by_type {
        println!(
            "  {} ({}):",
            type_label(node_type).white().bold(),
            ids.len().to_string().green()
        );
        print_ids(ids, "none");
    }
}

/// Human-readable plural name of a node type.
pub fn type_label(node_type: NodeType) -> &'static str {
    match node_type {
        NodeType::Folder => "Folders",
        NodeType::Application => "Applications",
        NodeType::SubApplication => "Sub-applications",
        NodeType::ControlmJob => "Jobs",
        NodeType::Condition => "Conditions",
        NodeType::Jcl => "JCL members",
        NodeType::Pl1Program => "Programs",
        NodeType::DbTable => "Tables",
        NodeType::IncludeFile => "Include files",
    }
}
