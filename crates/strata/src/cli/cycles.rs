//! `strata cycles` command implementation.

use colored::Colorize;
use strata::{GraphQueries, NodeId, StrataConfig};

/// Run the cycles command.
pub fn run(config: &StrataConfig, id: Option<&str>) -> Result<(), strata::Error> {
    let index = super::load_index(config)?;

    let cycles = match id {
        Some(id) => index.find_cycles(&super::parse_id(id)?)?,
        None => index.detect_cycles(),
    };

    if cycles.is_empty() {
        println!("{}", "No circular dependencies detected.".green());
        return Ok(());
    }

    println!(
        "Found {} circular dependencies:",
        cycles.len().to_string().red().bold()
    );
    println!();

    for (i, cycle) in cycles.iter().enumerate() {
        println!("  {} {}:", "Cycle".yellow().bold(), i + 1);

        // Paths through a node already close on themselves; components do not
        let mut rendered = cycle.iter().map(NodeId::to_string).collect::<Vec<_>>();
        if id.is_none() {
            if let Some(first) = cycle.first() {
                rendered.push(first.to_string());
            }
        }

        println!("    {}", rendered.join(" → ").dimmed());
    }

    Ok(())
}
