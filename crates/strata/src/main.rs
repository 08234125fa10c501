//! Strata CLI - dependency questions about a batch estate from the command line.
//!
//! `strata build` links the estate's records into a graph and stores it;
//! every other command loads the stored graph and queries it.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use colored::Colorize;
use strata::StrataConfig;
use tracing_subscriber::EnvFilter;

mod cli;

/// Strata: cross-layer dependency graph for batch estates.
#[derive(Parser)]
#[command(name = "strata")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file (defaults to ./strata.yaml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Graph store location (overrides configuration and environment)
    #[arg(short, long, global = true)]
    store: Option<PathBuf>,

    /// Verbose output (can be repeated: -v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the graph from the estate's records and store it
    Build {
        /// Scheduler export file or directory
        #[arg(long)]
        scheduler_export: Option<PathBuf>,

        /// Procedural source directory
        #[arg(long)]
        source_dir: Option<PathBuf>,

        /// JCL member directory
        #[arg(long)]
        jcl_dir: Option<PathBuf>,

        /// Also write the graph as a JSON document
        #[arg(long)]
        json_output: Option<PathBuf>,

        /// Keep existing store contents (nodes are upserted, edges appended)
        #[arg(long)]
        no_clear: bool,
    },

    /// Show graph statistics and unresolved references
    Stats,

    /// Show a node, its edges and cross-folder condition links
    Node {
        /// Node id (e.g., "CONTROLM::PAYJ010")
        id: String,

        /// Maximum edges shown per direction
        #[arg(short, long, default_value = "50")]
        limit: usize,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Show what a node depends on
    Deps {
        /// Node id
        id: String,

        /// Follow dependencies transitively
        #[arg(short, long)]
        recursive: bool,
    },

    /// Show what depends on a node
    Dependents {
        /// Node id
        id: String,

        /// Follow dependents transitively
        #[arg(short, long)]
        recursive: bool,
    },

    /// List paths between two nodes
    Paths {
        /// Starting node id
        from: String,

        /// Target node id
        to: String,

        /// Longest path, in edges (defaults to the configured limit)
        #[arg(long)]
        max_hops: Option<usize>,
    },

    /// Detect cycles through one node, or across the whole graph
    Cycles {
        /// Node id (omit for estate-wide detection)
        id: Option<String>,
    },

    /// Analyze what a change to a node would affect
    Impact {
        /// Node id
        id: String,
    },

    /// Search nodes by name
    Search {
        /// Case-insensitive name fragment
        query: String,

        /// Filter by node type (controlm_job, pl1_program, db_table, ...)
        #[arg(short = 't', long = "type")]
        node_type: Option<String>,

        /// Maximum number of results
        #[arg(short, long, default_value = "100")]
        limit: usize,
    },

    /// Browse the scheduler hierarchy
    Tree {
        /// Node to expand (omit for the applications)
        id: Option<String>,
    },

    /// Extract the subgraph of a folder, sub-application or application
    Subgraph {
        /// Scope level: folder, subapp or app
        scope: String,

        /// Scope name
        name: String,

        /// Job name to drill into
        #[arg(short, long)]
        drill: Option<String>,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Show what a job or program runs, calls and touches
    Chain {
        /// Job or program node id
        id: String,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    let result = StrataConfig::discover(cli.config.as_deref()).and_then(|mut config| {
        if let Some(store) = cli.store {
            config.store = store;
        }
        run(cli.command, config)
    });

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}: {e}", "error".red().bold());
            // Show cause chain for nested errors
            let mut source = std::error::Error::source(&e);
            while let Some(cause) = source {
                eprintln!("  {}: {cause}", "caused by".dimmed());
                source = std::error::Error::source(cause);
            }
            ExitCode::FAILURE
        }
    }
}

fn run(command: Commands, mut config: StrataConfig) -> strata::Result<()> {
    match command {
        Commands::Build {
            scheduler_export,
            source_dir,
            jcl_dir,
            json_output,
            no_clear,
        } => {
            config.scheduler_export = scheduler_export.or(config.scheduler_export);
            config.source_dir = source_dir.or(config.source_dir);
            config.jcl_dir = jcl_dir.or(config.jcl_dir);
            config.json_output = json_output.or(config.json_output);
            cli::build::run(&config, !no_clear)
        }
        Commands::Stats => cli::stats::run(&config),
        Commands::Node { id, limit, json } => cli::node::run(&config, &id, limit, json),
        Commands::Deps { id, recursive } => cli::deps::run(&config, &id, recursive),
        Commands::Dependents { id, recursive } => cli::dependents::run(&config, &id, recursive),
        Commands::Paths { from, to, max_hops } => {
            if let Some(max_hops) = max_hops {
                config.set_max_path_hops(max_hops)?;
            }
            cli::paths::run(&config, &from, &to)
        }
        Commands::Cycles { id } => cli::cycles::run(&config, id.as_deref()),
        Commands::Impact { id } => cli::impact::run(&config, &id),
        Commands::Search {
            query,
            node_type,
            limit,
        } => cli::search::run(&config, &query, node_type.as_deref(), limit),
        Commands::Tree { id } => cli::tree::run(&config, id.as_deref()),
        Commands::Subgraph {
            scope,
            name,
            drill,
            json,
        } => cli::subgraph::run(&config, &scope, &name, drill.as_deref(), json),
        Commands::Chain { id, json } => cli::chain::run(&config, &id, json),
    }
}
