//! `strata dependents` command implementation.

use colored::Colorize;
use strata::{GraphQueries, StrataConfig};

use super::display::print_ids_by_type;

/// Run the dependents command.
pub fn run(config: &StrataConfig, id: &str, recursive: bool) -> Result<(), strata::Error> {
    let index = super::load_index(config)?;
    let id = super::parse_id(id)?;
    let dependents = index.dependents(&id, recursive)?;

    let scope = if recursive { "transitive" } else { "direct" };
    println!(
        "{} has {} {scope} dependents",
        id.to_string().cyan().bold(),
        dependents.len().to_string().green()
    );
    if dependents.is_empty() {
        return Ok(());
    }
    println!();
    print_ids_by_type(&index, &dependents);
    Ok(())
}
