//! `strata tree` command implementation.

use colored::Colorize;
use strata::{GraphQueries, StrataConfig};

/// Run the tree command.
pub fn run(config: &StrataConfig, id: Option<&str>) -> Result<(), strata::Error> {
    let index = super::load_index(config)?;

    let entries = match id {
        Some(id) => {
            let id = super::parse_id(id)?;
            println!("{}", id.to_string().cyan().bold());
            index.children(&id)?
        }
        None => {
            println!("{}", "Applications".cyan().bold());
            index.hierarchy_roots()
        }
    };

    if entries.is_empty() {
        println!("  {}", "(empty)".dimmed());
        return Ok(());
    }

    for entry in entries {
        let marker = if entry.leaf { "•" } else { "▸" };
        let children = if entry.leaf {
            String::new()
        } else {
            format!(" ({})", entry.child_count)
        };
        println!(
            "  {} {}{} {}",
            marker.dimmed(),
            entry.name.white().bold(),
            children.green(),
            entry.id.as_str().dimmed()
        );
    }

    Ok(())
}
