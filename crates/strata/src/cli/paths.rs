//! `strata paths` command implementation.

use colored::Colorize;
use strata::{GraphQueries, StrataConfig};

const MAX_PATHS_SHOWN: usize = 20;

/// Run the paths command.
pub fn run(config: &StrataConfig, from: &str, to: &str) -> Result<(), strata::Error> {
    let index = super::load_index(config)?;
    let from = super::parse_id(from)?;
    let to = super::parse_id(to)?;
    index.get_node(&from)?;
    index.get_node(&to)?;

    let search = index.find_paths_bounded(&from, &to, config.path_limits());

    if search.paths.is_empty() {
        println!(
            "{} within {} hops.",
            "No path found".yellow(),
            config.max_path_hops
        );
    } else {
        println!(
            "Found {} paths from {} to {}:",
            search.paths.len().to_string().green().bold(),
            from.to_string().cyan(),
            to.to_string().cyan()
        );
        println!();
        for (i, path) in search.paths.iter().take(MAX_PATHS_SHOWN).enumerate() {
            let rendered = path
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(" → ");
            println!("  {} {}", format!("{}.", i + 1).dimmed(), rendered);
        }
        if search.paths.len() > MAX_PATHS_SHOWN {
            println!("  ... and {} more", search.paths.len() - MAX_PATHS_SHOWN);
        }
    }

    if search.budget_exhausted {
        println!();
        println!(
            "{}: search stopped after {} expansions; results may be incomplete",
            "Warning".yellow().bold(),
            config.path_search_budget
        );
    }

    Ok(())
}
