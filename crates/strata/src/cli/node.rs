//! `strata node` command implementation.

use colored::Colorize;
use strata::{Edge, FlowDirection, GraphQueries, StrataConfig};

use super::display::print_json;

/// Run the node command.
pub fn run(config: &StrataConfig, id: &str, limit: usize, json: bool) -> Result<(), strata::Error> {
    let index = super::load_index(config)?;
    let view = index.node_detail(&super::parse_id(id)?, limit)?;

    if json {
        return print_json(&view);
    }

    println!(
        "{} {}",
        view.node.name.cyan().bold(),
        format!("({})", view.node.node_type()).dimmed()
    );
    println!("  {}: {}", "Id".white().bold(), view.node.id);
    if let Some(job) = view.node.job() {
        for (label, value) in [
            ("Folder", job.folder.as_deref()),
            ("Application", job.application.as_deref()),
            ("Sub-application", job.sub_application.as_deref()),
            ("Member", job.memname.as_deref()),
        ] {
            if let Some(value) = value {
                println!("  {}: {value}", label.white().bold());
            }
        }
        if !job.description.is_empty() {
            println!("  {}: {}", "Description".white().bold(), job.description);
        }
    }
    println!();

    print_edges("Outgoing", &view.outgoing, view.total_outgoing, |e| e.to.to_string());
    print_edges("Incoming", &view.incoming, view.total_incoming, |e| e.from.to_string());

    if !view.cross_folder.is_empty() {
        println!();
        println!("  {}:", "Cross-folder conditions".white().bold());
        for link in &view.cross_folder {
            let arrow = match link.direction {
                FlowDirection::Outgoing => "→",
                FlowDirection::Incoming => "←",
            };
            println!(
                "    {} {} [{}] via {}",
                arrow.yellow(),
                link.job,
                link.folder.as_deref().unwrap_or("?"),
                link.condition.dimmed()
            );
        }
    }

    Ok(())
}

fn print_edges(title: &str, edges: &[Edge], total: usize, other_end: impl Fn(&Edge) -> String) {
    println!(
        "  {} ({}):",
        title.white().bold(),
        total.to_string().green()
    );
    for edge in edges {
        println!(
            "    {} {} {}",
            "•".dimmed(),
            format!("[{}]", edge.label()).dimmed(),
            other_end(edge)
        );
    }
    if total > edges.len() {
        println!("    {} ... and {} more", "•".dimmed(), total - edges.len());
    }
}
