//! `grit-sv`: build and shard SV evidence graphs.
//!
//! Usage: grit-sv <COMMAND> [OPTIONS]

use std::io;
use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

use sv_locus_graph::commands::{BuildCommand, ShardCommand};
use sv_locus_graph::scanner::ReadScannerOptions;
use sv_locus_graph::GraphError;

#[derive(Parser)]
#[command(name = "grit-sv")]
#[command(author = "Manish Kumar Bobbili")]
#[command(version)]
#[command(about = "SV evidence-graph engine: read-pair to breakend-locus graph for structural variant discovery", long_about = None)]
struct Cli {
    /// Number of threads to use (default: number of CPUs)
    #[arg(long, short = 't', global = true)]
    threads: Option<usize>,

    /// Enable verbose (debug-level) logging
    #[arg(long, global = true)]
    verbose: bool,

    /// Enable expensive internal graph-consistency checks
    #[arg(long, global = true)]
    debug_checks: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan alignment inputs into a finalized evidence graph
    Build {
        /// Read-group statistics file
        #[arg(long)]
        stats: PathBuf,

        /// Alignment input files (one scan per file)
        #[arg(long, required = true, num_args = 1..)]
        alignments: Vec<PathBuf>,

        /// Output graph file
        #[arg(short, long)]
        out: PathBuf,

        /// Minimum mapping quality to admit a read
        #[arg(long, default_value_t = 15)]
        min_mapq: u8,

        /// Drop nodes whose in/out edges all fall below this count
        #[arg(long, default_value_t = 0)]
        min_merge_edge_count: u16,
    },

    /// Emit one bin's worth of edges from a finalized graph
    Shard {
        /// Input graph file (written by `build`)
        #[arg(short, long)]
        graph: PathBuf,

        /// Total number of bins to partition edges into
        #[arg(long)]
        bin_count: u32,

        /// Which bin this invocation emits
        #[arg(long)]
        bin_index: u32,
    },
}

fn main() {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    if cli.debug_checks {
        sv_locus_graph::config::set_debug_checks(true);
    }

    if let Some(n) = cli.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(n)
            .build_global()
            .expect("failed to initialize thread pool");
    }

    let result = match cli.command {
        Commands::Build {
            stats,
            alignments,
            out,
            min_mapq,
            min_merge_edge_count,
        } => run_build(stats, alignments, out, min_mapq, min_merge_edge_count),

        Commands::Shard {
            graph,
            bin_count,
            bin_index,
        } => run_shard(graph, bin_count, bin_index),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run_build(
    stats: PathBuf,
    alignments: Vec<PathBuf>,
    out: PathBuf,
    min_mapq: u8,
    min_merge_edge_count: u16,
) -> Result<(), GraphError> {
    log::info!("building evidence graph from {} alignment file(s)", alignments.len());

    let options = ReadScannerOptions {
        min_mapq,
        ..ReadScannerOptions::default()
    };
    let cmd = BuildCommand::new()
        .with_options(options)
        .with_min_merge_edge_count(min_merge_edge_count);
    cmd.run(&stats, &alignments, &out)?;

    log::info!("wrote graph to {}", out.display());
    Ok(())
}

fn run_shard(graph: PathBuf, bin_count: u32, bin_index: u32) -> Result<(), GraphError> {
    if bin_index >= bin_count {
        return Err(GraphError::InvariantViolation(format!(
            "bin_index {bin_index} must be less than bin_count {bin_count}"
        )));
    }

    let stdout = io::stdout();
    let mut handle = stdout.lock();
    let cmd = ShardCommand::new(bin_count, bin_index);
    cmd.run(&graph, &mut handle)
}
