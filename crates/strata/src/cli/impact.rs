//! `strata impact` command implementation.

use colored::Colorize;
use strata::{GraphQueries, StrataConfig};

use super::display::{print_ids, type_label};

/// Run the impact command.
pub fn run(config: &StrataConfig, id: &str) -> Result<(), strata::Error> {
    let index = super::load_index(config)?;
    let report = index.impact_analysis(&super::parse_id(id)?)?;

    println!(
        "{} {}",
        "Impact of".cyan().bold(),
        report.node.id.to_string().cyan().bold()
    );
    println!();

    if report.total_impacted == 0 {
        println!("  {}", "Nothing depends on this node.".green());
        return Ok(());
    }

    println!(
        "  {}: {}",
        "Impacted nodes".white().bold(),
        report.total_impacted.to_string().red().bold()
    );
    for (node_type, ids) in &report.impacted_by_type {
        println!();
        println!(
            "  {} ({}):",
            type_label(*node_type).white().bold(),
            ids.len().to_string().yellow()
        );
        print_ids(ids, "none");
    }

    Ok(())
}
