//! `strata build` command implementation.

use std::time::Instant;

use colored::Colorize;
use strata::{
    EstateRecords, GraphBuilder, GraphStore, JsonFileStore, SqliteStore, StrataConfig,
    WriteOptions,
};

/// Run the build command.
pub fn run(config: &StrataConfig, clear: bool) -> Result<(), strata::Error> {
    println!("{} estate records...", "Loading".cyan().bold());
    let started = Instant::now();

    let (records, warnings) = EstateRecords::load(&config.estate_paths())?;
    let report = GraphBuilder::with_extra_skip(&config.extra_skip_programs).build(&records, warnings);

    let store = SqliteStore::open(&config.store)?.with_options(WriteOptions {
        node_batch_size: config.node_batch_size,
        edge_batch_size: config.edge_batch_size,
        clear,
    })?;
    let written = store.write_graph(&report.graph)?;

    if let Some(json_output) = &config.json_output {
        JsonFileStore::new(json_output).write_graph(&report.graph)?;
        println!("{}: {}", "JSON".dimmed(), json_output.display());
    }

    println!();
    println!("{}", report.summary());
    println!();
    println!(
        "{} {} nodes, {} edges to {} in {} batches",
        "Stored".green().bold(),
        written.nodes_written,
        written.edges_written,
        config.store.display(),
        written.batches_committed
    );
    println!("{}: {:.2?}", "Duration".dimmed(), started.elapsed());

    if !report.warnings.is_empty() {
        println!();
        println!("{} ({}):", "Warnings".yellow().bold(), report.warnings.len());
        for warning in report.warnings.iter().take(5) {
            println!(
                "  {} {}: {}",
                "•".yellow(),
                warning.path.display(),
                warning.message
            );
        }
        if report.warnings.len() > 5 {
            println!("  ... and {} more", report.warnings.len() - 5);
        }
    }

    Ok(())
}
