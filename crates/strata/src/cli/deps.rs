//! `strata deps` command implementation.

use colored::Colorize;
use strata::{GraphQueries, StrataConfig};

use super::display::print_ids_by_type;

/// Run the deps command.
pub fn run(config: &StrataConfig, id: &str, recursive: bool) -> Result<(), strata::Error> {
    let index = super::load_index(config)?;
    let id = super::parse_id(id)?;
    let dependencies = index.dependencies(&id, recursive)?;

    let scope = if recursive { "transitive" } else { "direct" };
    println!(
        "{} has {} {scope} dependencies",
        id.to_string().cyan().bold(),
        dependencies.len().to_string().green()
    );
    if dependencies.is_empty() {
        return Ok(());
    }
    println!();
    print_ids_by_type(&index, &dependencies);
    Ok(())
}
