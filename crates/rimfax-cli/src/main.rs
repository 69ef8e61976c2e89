//! Rimfax Command-Line Interface
//!
//! The main entry point for the `rimfax` binary: heuristic circuit mapping
//! (`rimfax map`) and SAT-based Clifford synthesis (`rimfax synth`).

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use console::style;
use tracing_subscriber::EnvFilter;

mod commands;

use commands::CommandError;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

/// Rimfax - quantum circuit mapping and Clifford synthesis
#[derive(Parser)]
#[command(name = "rimfax")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Map a circuit onto a device coupling map
    Map {
        /// File to read from (OpenQASM)
        #[arg(long = "in")]
        input: String,

        /// File to write the routed circuit to
        #[arg(long = "out")]
        output: String,

        /// Architecture to use (points to a coupling-map file)
        #[arg(long)]
        arch: String,

        /// Calibration to use (points to a CSV file)
        #[arg(long)]
        calibration: Option<String>,

        /// Initial layout strategy ("identity" | "static" | "dynamic")
        #[arg(long = "initiallayout", default_value = "dynamic")]
        initial_layout: String,

        /// Layering strategy ("individual" | "disjoint")
        #[arg(long, default_value = "individual")]
        layering: String,

        /// Use teleportation, optionally specifying the seed
        #[arg(long, num_args = 0..=1, default_missing_value = "0")]
        teleportation: Option<u64>,

        /// Compute the teleportation layout but schedule no teleports
        #[arg(long = "teleportation_fake")]
        teleportation_fake: bool,

        /// Weight routing costs by calibration fidelities
        #[arg(long)]
        fidelity: bool,

        /// Print statistics
        #[arg(long)]
        ps: bool,
    },

    /// Synthesize an optimal Clifford circuit for a target tableau
    Synth {
        /// Circuit file whose tableau is the target (OpenQASM)
        #[arg(long = "in")]
        input: Option<String>,

        /// Target tableau, e.g. "+XX;+ZZ" (alternative to --in)
        #[arg(long)]
        tableau: Option<String>,

        /// File to write the synthesized circuit to
        #[arg(long = "out")]
        output: Option<String>,

        /// Target metric ("gates" | "depth" | "two-qubit-gates" | "gates-fixed-depth")
        #[arg(long, default_value = "gates")]
        metric: String,

        /// Single-qubit gate family, comma separated (e.g. "h,s,sdg")
        #[arg(long = "gate-set")]
        gate_set: Option<String>,

        /// Commander grouping ("halves" | "fixed2" | "fixed3" | "logarithm")
        #[arg(long, default_value = "halves")]
        grouping: String,

        /// Minimize through repeated cardinality tightening
        #[arg(long)]
        maxsat: bool,

        /// Track destabilizers (synthesize the full unitary)
        #[arg(long)]
        destabilizers: bool,

        /// Timestep budget cap
        #[arg(long, default_value = "64")]
        timestep_limit: usize,

        /// Split the input circuit into windows of this many gates
        #[arg(long)]
        split_size: Option<usize>,

        /// Print statistics
        #[arg(long)]
        ps: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_target(false)
        .init();

    let verbose = cli.verbose > 0;
    let result = match cli.command {
        Commands::Map {
            input,
            output,
            arch,
            calibration,
            initial_layout,
            layering,
            teleportation,
            teleportation_fake,
            fidelity,
            ps,
        } => commands::map::execute(&commands::map::MapArgs {
            input,
            output,
            arch,
            calibration,
            initial_layout,
            layering,
            teleportation,
            teleportation_fake,
            fidelity,
            ps,
            verbose,
        }),

        Commands::Synth {
            input,
            tableau,
            output,
            metric,
            gate_set,
            grouping,
            maxsat,
            destabilizers,
            timestep_limit,
            split_size,
            ps,
        } => commands::synth::execute(&commands::synth::SynthArgs {
            input,
            tableau,
            output,
            metric,
            gate_set,
            grouping,
            maxsat,
            destabilizers,
            timestep_limit,
            split_size,
            ps,
        }),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(CommandError::Usage(err)) => {
            eprintln!("{} {err:#}", style("[ERROR]").red().bold());
            ExitCode::from(1)
        }
        Err(CommandError::Failure(err)) => {
            eprintln!("{} {err:#}", style("[ERROR]").red().bold());
            ExitCode::from(2)
        }
    }
}
