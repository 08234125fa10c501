//! `strata subgraph` command implementation.

use colored::Colorize;
use strata::{
    GraphSession, GraphStore, Scope, SessionSettings, StrataConfig, SubgraphRequest,
    VisualEdgeKind,
};

use super::display::{print_json, type_label};

/// Run the subgraph command.
pub fn run(
    config: &StrataConfig,
    scope: &str,
    name: &str,
    drill: Option<&str>,
    json: bool,
) -> Result<(), strata::Error> {
    let scope: Scope = scope.parse()?;
    let mut request = SubgraphRequest::new(scope, name);
    if let Some(job) = drill {
        request = request.drilling(job);
    }

    let session = GraphSession::with_settings(
        super::open_store(config)?.load_graph()?,
        SessionSettings {
            max_call_depth: config.max_call_depth,
            path_limits: config.path_limits(),
        },
    );
    let subgraph = session.subgraph(&request)?;

    if json {
        return print_json(subgraph.as_ref());
    }

    println!(
        "{} {} {}",
        "Subgraph of".cyan().bold(),
        scope,
        name.cyan().bold()
    );
    println!(
        "  {}: {}, {}: {}, {}: {}",
        "Jobs".white().bold(),
        subgraph.job_count.to_string().green(),
        "Nodes".white().bold(),
        subgraph.graph.nodes().len(),
        "Edges".white().bold(),
        subgraph.graph.edges().len()
    );

    let external = subgraph.graph.nodes().iter().filter(|n| n.external).count();
    if external > 0 {
        println!("  {}: {external}", "External jobs".white().bold());
    }

    if let Some(first) = subgraph.groups.first() {
        println!();
        println!("  {}:", type_label(first.group_type).white().bold());
        for group in &subgraph.groups {
            println!(
                "    {} {} ({} jobs)",
                "•".dimmed(),
                group.label,
                group.job_ids.len()
            );
        }
    }

    let dependencies: Vec<_> = subgraph
        .graph
        .edges()
        .iter()
        .filter(|e| e.kind == VisualEdgeKind::JobDependency)
        .collect();
    if !dependencies.is_empty() {
        println!();
        println!("  {}:", "Job dependencies".white().bold());
        for edge in dependencies {
            let target = if edge.external {
                edge.target.name().yellow().to_string()
            } else {
                edge.target.name().to_string()
            };
            println!(
                "    {} → {} {}",
                edge.source.name(),
                target,
                format!("[{}]", edge.condition.as_deref().unwrap_or("")).dimmed()
            );
        }
    }

    if let Some(job) = &subgraph.drill {
        println!();
        println!("  {} {}:", "Drill-down of".white().bold(), job.name());
        for edge in subgraph
            .graph
            .edges()
            .iter()
            .filter(|e| e.kind != VisualEdgeKind::JobDependency)
        {
            println!(
                "    {} {} {} {}",
                "•".dimmed(),
                edge.source,
                format!("-[{}]→", edge.label.as_deref().unwrap_or(edge.kind.as_str())).dimmed(),
                edge.target
            );
        }
    }

    Ok(())
}
