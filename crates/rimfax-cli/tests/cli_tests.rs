//! End-to-end flows through the crates the CLI wires together.
//!
//! The binary itself only parses flags and forwards to these library calls,
//! so the tests exercise the same load → run → save path with real files.

use std::fs;

use rimfax_arch::Architecture;
use rimfax_map::{HeuristicMapper, InitialLayoutStrategy, MappingSettings};
use rimfax_qasm::{emit, parse};
use rimfax_synth::{CliffordSynthesizer, SynthesisConfig, Tableau};

const BELL_QASM: &str = "OPENQASM 2.0;\ninclude \"qelib1.inc\";\nqreg q[2];\ncreg c[2];\nh q[0];\ncx q[0], q[1];\nmeasure q[0] -> c[0];\nmeasure q[1] -> c[1];\n";

#[test]
fn test_map_flow_through_files() {
    let dir = tempfile::tempdir().unwrap();
    let circuit_path = dir.path().join("bell.qasm");
    let arch_path = dir.path().join("line4.arch");
    let out_path = dir.path().join("bell_mapped.qasm");

    fs::write(&circuit_path, BELL_QASM).unwrap();
    fs::write(&arch_path, "4\n0 1\n1 2\n2 3\n").unwrap();

    let circuit = parse(&fs::read_to_string(&circuit_path).unwrap()).unwrap();
    let arch = Architecture::load_coupling_map(&arch_path).unwrap();

    let settings = MappingSettings {
        initial_layout_strategy: InitialLayoutStrategy::Identity,
        ..Default::default()
    };
    let outcome = HeuristicMapper::new(&circuit, &arch)
        .unwrap()
        .map(&settings)
        .unwrap();

    fs::write(&out_path, emit(&outcome.circuit).unwrap()).unwrap();

    // The routed file parses back and every two-qubit gate is on an edge.
    let routed = parse(&fs::read_to_string(&out_path).unwrap()).unwrap();
    for inst in routed.iter() {
        if inst.is_two_qubit_gate() {
            assert!(arch.has_edge(inst.qubits[0].0 as u16, inst.qubits[1].0 as u16));
        }
    }
    assert_eq!(outcome.results.swaps, 0);
}

#[test]
fn test_map_flow_with_calibration() {
    let dir = tempfile::tempdir().unwrap();
    let arch_path = dir.path().join("line4.arch");
    let cal_path = dir.path().join("line4.csv");

    fs::write(&arch_path, "4\n0 1\n1 2\n2 3\n").unwrap();
    fs::write(
        &cal_path,
        "qubit, single_qubit_error, readout_error, t1, t2, cnot_errors\n\
         0, 0.001, 0.02, 70.0, 50.0, 1:0.9\n\
         1, 0.001, 0.02, 70.0, 50.0, 0:0.9;2:0.9\n\
         2, 0.001, 0.02, 70.0, 50.0, 1:0.9;3:0.6\n\
         3, 0.001, 0.02, 70.0, 50.0, 2:0.6\n",
    )
    .unwrap();

    let mut arch = Architecture::load_coupling_map(&arch_path).unwrap();
    arch.load_calibration_data(&cal_path).unwrap();

    // The least-noisy 2-qubit subgraph is the (2,3) edge.
    assert_eq!(arch.highest_fidelity_coupling_map(2).unwrap(), vec![(2, 3)]);

    let circuit = parse(BELL_QASM).unwrap();
    let settings = MappingSettings {
        initial_layout_strategy: InitialLayoutStrategy::Static,
        ..Default::default()
    };
    let outcome = HeuristicMapper::new(&circuit, &arch)
        .unwrap()
        .map(&settings)
        .unwrap();
    assert!(outcome.results.fidelity > 0.0 && outcome.results.fidelity < 1.0);
}

#[test]
fn test_synth_flow_through_files() {
    let dir = tempfile::tempdir().unwrap();
    let out_path = dir.path().join("synth.qasm");

    let target: Tableau = "+XX;+ZZ".parse().unwrap();
    let mut synthesizer = CliffordSynthesizer::from_target(target.clone());
    let results = synthesizer.synthesize(&SynthesisConfig::default()).unwrap();
    assert!(results.sat());

    fs::write(&out_path, emit(results.circuit.as_ref().unwrap()).unwrap()).unwrap();

    let reparsed = parse(&fs::read_to_string(&out_path).unwrap()).unwrap();
    let reached = Tableau::from_circuit(&reparsed, false).unwrap();
    assert_eq!(reached, target);
}

#[test]
fn test_bad_coupling_map_is_schema_error() {
    let dir = tempfile::tempdir().unwrap();
    let arch_path = dir.path().join("bad.arch");
    fs::write(&arch_path, "3\n0 0\n").unwrap();
    assert!(Architecture::load_coupling_map(&arch_path).is_err());
}

#[test]
fn test_missing_file_is_config_error() {
    assert!(Architecture::load_coupling_map("/nonexistent/rimfax.arch").is_err());
}
