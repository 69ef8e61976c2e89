//! Map command implementation.

use std::fs;

use anyhow::Context;
use console::style;

use rimfax_arch::Architecture;
use rimfax_map::{HeuristicMapper, InitialLayoutStrategy, LayeringStrategy, MappingSettings};
use rimfax_qasm::{emit, parse};

use super::{CommandError, CommandResult};

/// Arguments of `rimfax map`.
pub struct MapArgs {
    pub input: String,
    pub output: String,
    pub arch: String,
    pub calibration: Option<String>,
    pub initial_layout: String,
    pub layering: String,
    pub teleportation: Option<u64>,
    pub teleportation_fake: bool,
    pub fidelity: bool,
    pub ps: bool,
    pub verbose: bool,
}

/// Execute the map command.
pub fn execute(args: &MapArgs) -> CommandResult {
    let source = fs::read_to_string(&args.input)
        .with_context(|| format!("could not read circuit '{}'", args.input))
        .map_err(CommandError::Usage)?;
    let circuit = parse(&source)
        .with_context(|| format!("could not import circuit '{}'", args.input))
        .map_err(CommandError::Usage)?;

    let mut arch = Architecture::load_coupling_map(&args.arch)
        .with_context(|| format!("could not import coupling map '{}'", args.arch))
        .map_err(CommandError::Usage)?;

    if let Some(calibration) = &args.calibration {
        arch.load_calibration_data(calibration)
            .with_context(|| format!("could not import calibration data '{calibration}'"))
            .map_err(CommandError::Usage)?;
    }

    let mut settings = MappingSettings {
        layering_strategy: LayeringStrategy::from_name(&args.layering)
            .map_err(CommandError::usage)?,
        initial_layout_strategy: InitialLayoutStrategy::from_name(&args.initial_layout)
            .map_err(CommandError::usage)?,
        consider_fidelity: args.fidelity,
        verbose: args.verbose,
        ..Default::default()
    };

    if let Some(seed) = args.teleportation {
        // Reserve as many ancillas as fit, in pairs, capped at eight.
        settings.teleportation_qubits =
            (arch.num_qubits().saturating_sub(circuit.num_qubits()) & !1).min(8);
        settings.teleportation_seed = seed;
        settings.teleportation_fake = args.teleportation_fake;
        settings.initial_layout_strategy = InitialLayoutStrategy::Identity;
    }

    println!(
        "{} Mapping {} ({} qubits, {} gates) onto {} ({} qubits)",
        style("→").cyan().bold(),
        style(&args.input).green(),
        circuit.num_qubits(),
        circuit.num_gates(),
        style(&args.arch).yellow(),
        arch.num_qubits()
    );

    let mapper = HeuristicMapper::new(&circuit, &arch).map_err(CommandError::failure)?;
    let outcome = mapper.map(&settings).map_err(CommandError::failure)?;

    let qasm = emit(&outcome.circuit)
        .context("could not serialize routed circuit")
        .map_err(CommandError::Failure)?;
    fs::write(&args.output, qasm)
        .with_context(|| format!("could not write '{}'", args.output))
        .map_err(CommandError::Usage)?;

    println!(
        "{} Routed: {} swaps, {} teleportations, depth {}",
        style("✓").green().bold(),
        outcome.results.swaps,
        outcome.results.teleportations,
        outcome.results.depth
    );
    println!("  Output: {}", style(&args.output).green());

    if args.ps {
        println!("{}", outcome.results);
    }

    Ok(())
}
