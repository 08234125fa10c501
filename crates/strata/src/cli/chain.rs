//! `strata chain` command implementation.

use colored::Colorize;
use strata::{program_chain, StrataConfig};

use super::display::print_json;

/// Run the chain command.
pub fn run(config: &StrataConfig, id: &str, json: bool) -> Result<(), strata::Error> {
    let index = super::load_index(config)?;
    let chain = program_chain(&index, &super::parse_id(id)?, config.max_call_depth)?;

    if json {
        return print_json(&chain);
    }

    println!("{} {}", "Program chain of".cyan().bold(), chain.seed.to_string().cyan().bold());
    println!(
        "  {}: {}, {}: {}, {}: {}",
        "Programs".white().bold(),
        chain.stats.pl1_count.to_string().green(),
        "Tables".white().bold(),
        chain.stats.db_count.to_string().green(),
        "Includes".white().bold(),
        chain.stats.include_count.to_string().green()
    );
    println!();

    if chain.graph.edges().is_empty() {
        println!("  {}", "Nothing reachable.".dimmed());
        return Ok(());
    }
    for edge in chain.graph.edges() {
        println!(
            "  {} {} {} {}",
            "•".dimmed(),
            edge.source,
            format!("-[{}]→", edge.label.as_deref().unwrap_or(edge.kind.as_str())).dimmed(),
            edge.target
        );
    }

    Ok(())
}
