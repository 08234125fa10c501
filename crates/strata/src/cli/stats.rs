//! `strata stats` command implementation.

use colored::Colorize;
use strata::{GraphQueries, StrataConfig};

use super::display::type_label;

/// Run the stats command.
pub fn run(config: &StrataConfig) -> Result<(), strata::Error> {
    let index = super::load_index(config)?;
    let stats = index.stats();

    println!("{}", "Strata Graph Statistics".cyan().bold());
    println!();
    println!(
        "  {}: {}",
        "Store".white().bold(),
        config.store.display()
    );
    if let Some(built_at) = stats.built_at {
        println!("  {}: {}", "Built".white().bold(), built_at.to_rfc3339());
    }
    println!("  {}: {}", "Fingerprint".white().bold(), stats.fingerprint.dimmed());
    println!();

    println!(
        "  {}: {} total",
        "Nodes".white().bold(),
        stats.total_nodes.to_string().green()
    );
    for (node_type, count) in &stats.node_types {
        println!("    {}: {count}", type_label(*node_type).dimmed());
    }
    println!();

    println!(
        "  {}: {} total",
        "Edges".white().bold(),
        stats.total_edges.to_string().green()
    );
    for (edge_type, count) in &stats.edge_types {
        println!("    {}: {count}", edge_type.as_str().dimmed());
    }

    let missing = &stats.missing;
    if !missing.is_empty() {
        println!();
        println!(
            "  {}: {} unresolved references",
            "Warning".yellow().bold(),
            missing.total().to_string().yellow()
        );
        for (label, set) in [
            ("programs", &missing.programs),
            ("calls", &missing.calls),
            ("includes", &missing.includes),
            ("JCL members", &missing.jcls),
        ] {
            if !set.is_empty() {
                println!("    {} {label}", set.len().to_string().yellow());
            }
        }
    }

    Ok(())
}
