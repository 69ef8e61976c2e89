//! Benchmarks for Rimfax circuit operations
//!
//! Run with: cargo bench -p rimfax-ir

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use rimfax_ir::{Circuit, QubitId};

/// Benchmark GHZ state circuit creation
fn bench_ghz_circuit(c: &mut Criterion) {
    let mut group = c.benchmark_group("ghz_circuit");

    for num_qubits in &[5, 10, 20, 50, 100] {
        group.bench_with_input(
            BenchmarkId::new("create", num_qubits),
            num_qubits,
            |b, &n| {
                b.iter(|| black_box(Circuit::ghz(n).unwrap()));
            },
        );
    }

    group.finish();
}

/// Benchmark circuit depth calculation
fn bench_circuit_depth(c: &mut Criterion) {
    let mut group = c.benchmark_group("circuit_depth");

    for num_qubits in &[5u32, 10, 20, 50] {
        let mut circuit = Circuit::with_size("bench", *num_qubits, 0);
        for _layer in 0..5 {
            for i in 0..*num_qubits {
                circuit.h(QubitId(i)).unwrap();
            }
            for i in (0..*num_qubits - 1).step_by(2) {
                circuit.cx(QubitId(i), QubitId(i + 1)).unwrap();
            }
        }

        group.bench_with_input(
            BenchmarkId::new("depth", num_qubits),
            &circuit,
            |b, circuit| {
                b.iter(|| black_box(circuit.depth()));
            },
        );
    }

    group.finish();
}

/// Benchmark SWAP lowering
fn bench_decompose_swaps(c: &mut Criterion) {
    let mut group = c.benchmark_group("decompose_swaps");

    for num_swaps in &[10u32, 100, 1000] {
        group.bench_with_input(
            BenchmarkId::new("lower", num_swaps),
            num_swaps,
            |b, &n| {
                b.iter_with_setup(
                    || {
                        let mut circuit = Circuit::with_size("bench", 4, 0);
                        for _ in 0..n {
                            circuit.swap(QubitId(0), QubitId(1)).unwrap();
                        }
                        circuit
                    },
                    |mut circuit| {
                        circuit.decompose_swaps();
                        black_box(circuit)
                    },
                );
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_ghz_circuit,
    bench_circuit_depth,
    bench_decompose_swaps,
);

criterion_main!(benches);
