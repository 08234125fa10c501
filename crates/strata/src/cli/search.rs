//! `strata search` command implementation.

use colored::Colorize;
use strata::{GraphQueries, NodeType, StrataConfig};

/// Run the search command.
pub fn run(
    config: &StrataConfig,
    query: &str,
    node_type: Option<&str>,
    limit: usize,
) -> Result<(), strata::Error> {
    let node_type: Option<NodeType> = node_type.map(str::parse::<NodeType>).transpose()?;
    let index = super::load_index(config)?;

    let results = index.search_by_name(query, node_type);

    if results.is_empty() {
        println!("No nodes found matching '{}'", query.yellow());
        return Ok(());
    }

    println!(
        "Found {} nodes matching '{}':",
        results.len().to_string().green().bold(),
        query.cyan()
    );
    println!();

    for id in results.iter().take(limit) {
        let Some(node) = index.node(id) else {
            continue;
        };
        println!(
            "  {} {}",
            format!("[{}]", node.node_type()).dimmed(),
            node.name.white().bold()
        );
        println!("    {}", id.as_str().dimmed());
    }

    if results.len() > limit {
        println!();
        println!("  ... and {} more (use --limit to show more)", results.len() - limit);
    }

    Ok(())
}
