//! Synth command implementation.

use std::fs;

use anyhow::Context;
use console::style;

use rimfax_qasm::{emit, parse};
use rimfax_synth::{
    CliffordSynthesizer, CommanderGrouping, SynthesisConfig, TargetMetric, Tableau,
    gate_set_from_names,
};

use super::{CommandError, CommandResult};

/// Arguments of `rimfax synth`.
pub struct SynthArgs {
    pub input: Option<String>,
    pub tableau: Option<String>,
    pub output: Option<String>,
    pub metric: String,
    pub gate_set: Option<String>,
    pub grouping: String,
    pub maxsat: bool,
    pub destabilizers: bool,
    pub timestep_limit: usize,
    pub split_size: Option<usize>,
    pub ps: bool,
}

/// Execute the synth command.
pub fn execute(args: &SynthArgs) -> CommandResult {
    let metric = TargetMetric::from_name(&args.metric).map_err(CommandError::usage)?;
    let mut config = SynthesisConfig {
        target_metric: metric,
        use_max_sat: args.maxsat,
        use_multi_gate_encoding: metric == TargetMetric::Depth,
        commander_grouping: CommanderGrouping::from_name(&args.grouping)
            .map_err(CommandError::usage)?,
        timestep_limit: args.timestep_limit,
        split_size: args.split_size,
        ..Default::default()
    };
    if let Some(names) = &args.gate_set {
        config.gate_set = gate_set_from_names(names).map_err(CommandError::usage)?;
    }

    let mut synthesizer = match (&args.input, &args.tableau) {
        (Some(input), None) => {
            let source = fs::read_to_string(input)
                .with_context(|| format!("could not read circuit '{input}'"))
                .map_err(CommandError::Usage)?;
            let circuit = parse(&source)
                .with_context(|| format!("could not import circuit '{input}'"))
                .map_err(CommandError::Usage)?;
            println!(
                "{} Synthesizing target of {} ({} qubits, {} gates)",
                style("→").cyan().bold(),
                style(input).green(),
                circuit.num_qubits(),
                circuit.num_gates()
            );
            CliffordSynthesizer::from_circuit(&circuit, args.destabilizers)
                .map_err(CommandError::failure)?
        }
        (None, Some(tableau)) => {
            let target: Tableau = tableau
                .parse()
                .context("could not parse target tableau")
                .map_err(CommandError::Usage)?;
            println!(
                "{} Synthesizing {}-qubit tableau target",
                style("→").cyan().bold(),
                target.num_qubits()
            );
            CliffordSynthesizer::from_target(target)
        }
        _ => {
            return Err(CommandError::Usage(anyhow::anyhow!(
                "exactly one of --in or --tableau is required"
            )));
        }
    };

    let results = synthesizer.synthesize(&config).map_err(CommandError::failure)?;

    if !results.sat() {
        return Err(CommandError::Failure(anyhow::anyhow!(
            "no circuit found (solver result: {:?})",
            results.solver_result
        )));
    }

    println!(
        "{} Synthesized: {} single-qubit + {} two-qubit gates, depth {}",
        style("✓").green().bold(),
        results.single_qubit_gates,
        results.two_qubit_gates,
        results.depth
    );

    if let Some(output) = &args.output {
        let circuit = results
            .circuit
            .as_ref()
            .expect("SAT results carry a circuit");
        let qasm = emit(circuit)
            .context("could not serialize synthesized circuit")
            .map_err(CommandError::Failure)?;
        fs::write(output, qasm)
            .with_context(|| format!("could not write '{output}'"))
            .map_err(CommandError::Usage)?;
        println!("  Output: {}", style(output).green());
    }

    if args.ps {
        println!("{results}");
    }

    Ok(())
}
