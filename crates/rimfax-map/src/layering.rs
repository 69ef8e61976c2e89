//! Slicing a circuit into routing layers.

use rustc_hash::FxHashSet;

use rimfax_ir::{Circuit, QubitId};

use crate::error::{MapError, MapResult};
use crate::settings::LayeringStrategy;

/// A layer: indices into the circuit's instruction list that are routed as a
/// unit.
pub type Layer = Vec<usize>;

/// Slice a circuit into layers under the given strategy.
///
/// Gates acting on three or more qubits cannot be routed and are rejected
/// here. Barriers always close the current layer.
pub fn slice_into_layers(circuit: &Circuit, strategy: LayeringStrategy) -> MapResult<Vec<Layer>> {
    for (idx, inst) in circuit.iter().enumerate() {
        if inst.is_gate() && inst.qubits.len() > 2 {
            return Err(MapError::Routing(format!(
                "gate '{}' at position {idx} acts on {} qubits; only one- and \
                 two-qubit gates are routable",
                inst.name(),
                inst.qubits.len()
            )));
        }
    }

    let layers = match strategy {
        LayeringStrategy::IndividualGates => (0..circuit.len()).map(|i| vec![i]).collect(),
        LayeringStrategy::None => {
            if circuit.is_empty() {
                vec![]
            } else {
                vec![(0..circuit.len()).collect()]
            }
        }
        LayeringStrategy::DisjointQubits => disjoint_layers(circuit),
    };

    Ok(layers)
}

fn disjoint_layers(circuit: &Circuit) -> Vec<Layer> {
    let mut layers: Vec<Layer> = vec![];
    let mut current: Layer = vec![];
    let mut active: FxHashSet<QubitId> = FxHashSet::default();

    for (idx, inst) in circuit.iter().enumerate() {
        let closes = inst.is_barrier() || inst.qubits.iter().any(|q| active.contains(q));
        if closes && !current.is_empty() {
            layers.push(std::mem::take(&mut current));
            active.clear();
        }
        current.push(idx);
        active.extend(inst.qubits.iter().copied());
        if inst.is_barrier() && !current.is_empty() {
            layers.push(std::mem::take(&mut current));
            active.clear();
        }
    }
    if !current.is_empty() {
        layers.push(current);
    }
    layers
}

#[cfg(test)]
mod tests {
    use super::*;
    use rimfax_ir::QubitId;

    #[test]
    fn test_individual_gates() {
        let circuit = Circuit::ghz(3).unwrap();
        let layers = slice_into_layers(&circuit, LayeringStrategy::IndividualGates).unwrap();
        assert_eq!(layers.len(), circuit.len());
        assert!(layers.iter().all(|l| l.len() == 1));
    }

    #[test]
    fn test_none_strategy() {
        let circuit = Circuit::ghz(3).unwrap();
        let layers = slice_into_layers(&circuit, LayeringStrategy::None).unwrap();
        assert_eq!(layers.len(), 1);
        assert_eq!(layers[0].len(), circuit.len());
    }

    #[test]
    fn test_disjoint_packs_parallel_gates() {
        let mut circuit = Circuit::with_size("test", 4, 0);
        circuit.cx(QubitId(0), QubitId(1)).unwrap();
        circuit.cx(QubitId(2), QubitId(3)).unwrap();
        circuit.cx(QubitId(1), QubitId(2)).unwrap();

        let layers = slice_into_layers(&circuit, LayeringStrategy::DisjointQubits).unwrap();
        assert_eq!(layers.len(), 2);
        assert_eq!(layers[0], vec![0, 1]);
        assert_eq!(layers[1], vec![2]);
    }

    #[test]
    fn test_disjoint_barrier_closes_layer() {
        let mut circuit = Circuit::with_size("test", 4, 0);
        circuit.cx(QubitId(0), QubitId(1)).unwrap();
        circuit.barrier([QubitId(0), QubitId(1)]).unwrap();
        circuit.cx(QubitId(2), QubitId(3)).unwrap();

        let layers = slice_into_layers(&circuit, LayeringStrategy::DisjointQubits).unwrap();
        // The barrier lands in a layer of its own between the two CX layers.
        assert_eq!(layers.len(), 3);
        assert_eq!(layers[1], vec![1]);
        assert_eq!(layers[2], vec![2]);
    }

    #[test]
    fn test_three_qubit_gate_rejected() {
        let mut circuit = Circuit::with_size("test", 3, 0);
        circuit.ccx(QubitId(0), QubitId(1), QubitId(2)).unwrap();
        let result = slice_into_layers(&circuit, LayeringStrategy::IndividualGates);
        match result {
            Err(MapError::Routing(msg)) => assert!(msg.contains("ccx")),
            _ => panic!("expected RoutingError for ccx"),
        }
    }
}
