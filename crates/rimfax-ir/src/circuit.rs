//! High-level circuit builder API.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::error::{IrError, IrResult};
use crate::gate::StandardGate;
use crate::instruction::{Instruction, InstructionKind};
use crate::qubit::{Clbit, ClbitId, Qubit, QubitId};

/// A quantum circuit.
///
/// An ordered instruction sequence with a high-level API for building
/// circuits, plus the queries the compilation engines need (depth, gate
/// counts, SWAP lowering).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Circuit {
    /// Name of the circuit.
    name: String,
    /// Qubits in the circuit.
    qubits: Vec<Qubit>,
    /// Classical bits in the circuit.
    clbits: Vec<Clbit>,
    /// Instructions in program order.
    instructions: Vec<Instruction>,
}

impl Circuit {
    /// Create a new empty circuit.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            qubits: vec![],
            clbits: vec![],
            instructions: vec![],
        }
    }

    /// Create a circuit with a given number of qubits and classical bits.
    pub fn with_size(name: impl Into<String>, num_qubits: u32, num_clbits: u32) -> Self {
        let mut circuit = Self::new(name);
        for _ in 0..num_qubits {
            circuit.add_qubit();
        }
        for _ in 0..num_clbits {
            circuit.add_clbit();
        }
        circuit
    }

    /// Add a single qubit to the circuit.
    pub fn add_qubit(&mut self) -> QubitId {
        let id = QubitId(u32::try_from(self.qubits.len()).expect("qubit count exceeds u32"));
        self.qubits.push(Qubit::new(id));
        id
    }

    /// Add a quantum register with multiple qubits.
    pub fn add_qreg(&mut self, name: impl Into<String>, size: u32) -> Vec<QubitId> {
        let name = name.into();
        let mut ids = vec![];
        for i in 0..size {
            let id = QubitId(u32::try_from(self.qubits.len()).expect("qubit count exceeds u32"));
            self.qubits.push(Qubit::with_register(id, &name, i));
            ids.push(id);
        }
        ids
    }

    /// Add a single classical bit to the circuit.
    pub fn add_clbit(&mut self) -> ClbitId {
        let id = ClbitId(u32::try_from(self.clbits.len()).expect("clbit count exceeds u32"));
        self.clbits.push(Clbit::new(id));
        id
    }

    /// Add a classical register with multiple bits.
    pub fn add_creg(&mut self, name: impl Into<String>, size: u32) -> Vec<ClbitId> {
        let name = name.into();
        let mut ids = vec![];
        for i in 0..size {
            let id = ClbitId(u32::try_from(self.clbits.len()).expect("clbit count exceeds u32"));
            self.clbits.push(Clbit::with_register(id, &name, i));
            ids.push(id);
        }
        ids
    }

    /// Append an instruction, validating operands.
    pub fn push(&mut self, instruction: Instruction) -> IrResult<()> {
        let gate_name = match &instruction.kind {
            InstructionKind::Gate(g) => Some(g.name().to_string()),
            InstructionKind::ClassicallyControlled { gate, .. } => Some(gate.name().to_string()),
            _ => None,
        };

        if let InstructionKind::Gate(gate) = &instruction.kind {
            let expected = gate.num_qubits();
            let got = u32::try_from(instruction.qubits.len()).unwrap_or(u32::MAX);
            if expected != got {
                return Err(IrError::QubitCountMismatch {
                    gate_name: gate.name().to_string(),
                    expected,
                    got,
                });
            }
        }

        for &qubit in &instruction.qubits {
            if qubit.0 as usize >= self.qubits.len() {
                return Err(IrError::QubitNotFound {
                    qubit,
                    gate_name: gate_name.clone(),
                });
            }
        }
        for &clbit in &instruction.clbits {
            if clbit.0 as usize >= self.clbits.len() {
                return Err(IrError::ClbitNotFound {
                    clbit,
                    gate_name: gate_name.clone(),
                });
            }
        }

        if instruction.is_gate() {
            let mut seen = rustc_hash::FxHashSet::default();
            for &qubit in &instruction.qubits {
                if !seen.insert(qubit) {
                    return Err(IrError::DuplicateQubit {
                        qubit,
                        gate_name: gate_name.clone(),
                    });
                }
            }
        }

        self.instructions.push(instruction);
        Ok(())
    }

    // =========================================================================
    // Single-qubit gates
    // =========================================================================

    /// Apply Hadamard gate.
    pub fn h(&mut self, qubit: QubitId) -> IrResult<&mut Self> {
        self.push(Instruction::single_qubit_gate(StandardGate::H, qubit))?;
        Ok(self)
    }

    /// Apply Pauli-X gate.
    pub fn x(&mut self, qubit: QubitId) -> IrResult<&mut Self> {
        self.push(Instruction::single_qubit_gate(StandardGate::X, qubit))?;
        Ok(self)
    }

    /// Apply Pauli-Y gate.
    pub fn y(&mut self, qubit: QubitId) -> IrResult<&mut Self> {
        self.push(Instruction::single_qubit_gate(StandardGate::Y, qubit))?;
        Ok(self)
    }

    /// Apply Pauli-Z gate.
    pub fn z(&mut self, qubit: QubitId) -> IrResult<&mut Self> {
        self.push(Instruction::single_qubit_gate(StandardGate::Z, qubit))?;
        Ok(self)
    }

    /// Apply S gate.
    pub fn s(&mut self, qubit: QubitId) -> IrResult<&mut Self> {
        self.push(Instruction::single_qubit_gate(StandardGate::S, qubit))?;
        Ok(self)
    }

    /// Apply S-dagger gate.
    pub fn sdg(&mut self, qubit: QubitId) -> IrResult<&mut Self> {
        self.push(Instruction::single_qubit_gate(StandardGate::Sdg, qubit))?;
        Ok(self)
    }

    /// Apply sqrt(X) gate.
    pub fn sx(&mut self, qubit: QubitId) -> IrResult<&mut Self> {
        self.push(Instruction::single_qubit_gate(StandardGate::SX, qubit))?;
        Ok(self)
    }

    /// Apply sqrt(X)-dagger gate.
    pub fn sxdg(&mut self, qubit: QubitId) -> IrResult<&mut Self> {
        self.push(Instruction::single_qubit_gate(StandardGate::SXdg, qubit))?;
        Ok(self)
    }

    /// Apply T gate.
    pub fn t(&mut self, qubit: QubitId) -> IrResult<&mut Self> {
        self.push(Instruction::single_qubit_gate(StandardGate::T, qubit))?;
        Ok(self)
    }

    /// Apply T-dagger gate.
    pub fn tdg(&mut self, qubit: QubitId) -> IrResult<&mut Self> {
        self.push(Instruction::single_qubit_gate(StandardGate::Tdg, qubit))?;
        Ok(self)
    }

    /// Apply Rx rotation gate.
    pub fn rx(&mut self, theta: f64, qubit: QubitId) -> IrResult<&mut Self> {
        self.push(Instruction::single_qubit_gate(StandardGate::Rx(theta), qubit))?;
        Ok(self)
    }

    /// Apply Ry rotation gate.
    pub fn ry(&mut self, theta: f64, qubit: QubitId) -> IrResult<&mut Self> {
        self.push(Instruction::single_qubit_gate(StandardGate::Ry(theta), qubit))?;
        Ok(self)
    }

    /// Apply Rz rotation gate.
    pub fn rz(&mut self, theta: f64, qubit: QubitId) -> IrResult<&mut Self> {
        self.push(Instruction::single_qubit_gate(StandardGate::Rz(theta), qubit))?;
        Ok(self)
    }

    // =========================================================================
    // Multi-qubit gates
    // =========================================================================

    /// Apply CNOT (CX) gate.
    pub fn cx(&mut self, control: QubitId, target: QubitId) -> IrResult<&mut Self> {
        self.push(Instruction::two_qubit_gate(StandardGate::CX, control, target))?;
        Ok(self)
    }

    /// Apply CY gate.
    pub fn cy(&mut self, control: QubitId, target: QubitId) -> IrResult<&mut Self> {
        self.push(Instruction::two_qubit_gate(StandardGate::CY, control, target))?;
        Ok(self)
    }

    /// Apply CZ gate.
    pub fn cz(&mut self, control: QubitId, target: QubitId) -> IrResult<&mut Self> {
        self.push(Instruction::two_qubit_gate(StandardGate::CZ, control, target))?;
        Ok(self)
    }

    /// Apply SWAP gate.
    pub fn swap(&mut self, q1: QubitId, q2: QubitId) -> IrResult<&mut Self> {
        self.push(Instruction::two_qubit_gate(StandardGate::Swap, q1, q2))?;
        Ok(self)
    }

    /// Apply Toffoli (CCX) gate.
    pub fn ccx(&mut self, c1: QubitId, c2: QubitId, target: QubitId) -> IrResult<&mut Self> {
        self.push(Instruction::gate(StandardGate::CCX, [c1, c2, target]))?;
        Ok(self)
    }

    // =========================================================================
    // Other operations
    // =========================================================================

    /// Measure a qubit to a classical bit.
    pub fn measure(&mut self, qubit: QubitId, clbit: ClbitId) -> IrResult<&mut Self> {
        self.push(Instruction::measure(qubit, clbit))?;
        Ok(self)
    }

    /// Measure all qubits to corresponding classical bits.
    pub fn measure_all(&mut self) -> IrResult<&mut Self> {
        while self.clbits.len() < self.qubits.len() {
            self.add_clbit();
        }
        let pairs: Vec<_> = self
            .qubits
            .iter()
            .map(|q| q.id)
            .zip(self.clbits.iter().map(|c| c.id))
            .collect();
        for (q, c) in pairs {
            self.push(Instruction::measure(q, c))?;
        }
        Ok(self)
    }

    /// Apply a barrier to specified qubits.
    pub fn barrier(&mut self, qubits: impl IntoIterator<Item = QubitId>) -> IrResult<&mut Self> {
        self.push(Instruction::barrier(qubits))?;
        Ok(self)
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Get the circuit name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the number of qubits.
    pub fn num_qubits(&self) -> usize {
        self.qubits.len()
    }

    /// Get the number of classical bits.
    pub fn num_clbits(&self) -> usize {
        self.clbits.len()
    }

    /// Get the number of instructions.
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    /// Check whether the circuit has any instructions.
    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Iterate over the instructions in program order.
    pub fn iter(&self) -> impl Iterator<Item = &Instruction> {
        self.instructions.iter()
    }

    /// Get the instructions as a slice.
    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    /// Get the qubits in the circuit.
    pub fn qubits(&self) -> &[Qubit] {
        &self.qubits
    }

    /// Get the classical bits in the circuit.
    pub fn clbits(&self) -> &[Clbit] {
        &self.clbits
    }

    /// Count the gate operations (measures and barriers excluded).
    pub fn num_gates(&self) -> usize {
        self.instructions.iter().filter(|i| i.is_gate()).count()
    }

    /// Count the single-qubit gate operations.
    pub fn num_single_qubit_gates(&self) -> usize {
        self.instructions
            .iter()
            .filter(|i| i.is_gate() && i.qubits.len() == 1)
            .count()
    }

    /// Count the gate operations acting on two or more qubits.
    pub fn num_multi_qubit_gates(&self) -> usize {
        self.instructions
            .iter()
            .filter(|i| i.is_gate() && i.qubits.len() >= 2)
            .count()
    }

    /// Calculate the circuit depth.
    ///
    /// Greedy per-wire levelling: each instruction lands one level past the
    /// deepest wire it touches. Barriers synchronize their wires without
    /// occupying a level.
    pub fn depth(&self) -> usize {
        let mut level: FxHashMap<WireKey, usize> = FxHashMap::default();
        let mut max_depth = 0usize;

        for inst in &self.instructions {
            let wires: Vec<WireKey> = inst
                .qubits
                .iter()
                .map(|q| WireKey::Qubit(*q))
                .chain(inst.clbits.iter().map(|c| WireKey::Clbit(*c)))
                .collect();

            let base = wires
                .iter()
                .map(|w| level.get(w).copied().unwrap_or(0))
                .max()
                .unwrap_or(0);

            let next = if inst.is_barrier() { base } else { base + 1 };
            for w in wires {
                level.insert(w, next);
            }
            max_depth = max_depth.max(next);
        }

        max_depth
    }

    /// Lower every SWAP gate into three CNOTs, in place.
    pub fn decompose_swaps(&mut self) {
        let mut lowered = Vec::with_capacity(self.instructions.len());
        for inst in self.instructions.drain(..) {
            if let InstructionKind::Gate(StandardGate::Swap) = inst.kind {
                let (a, b) = (inst.qubits[0], inst.qubits[1]);
                lowered.push(Instruction::two_qubit_gate(StandardGate::CX, a, b));
                lowered.push(Instruction::two_qubit_gate(StandardGate::CX, b, a));
                lowered.push(Instruction::two_qubit_gate(StandardGate::CX, a, b));
            } else {
                lowered.push(inst);
            }
        }
        self.instructions = lowered;
    }

    /// Lower every teleportation into its gate-level pattern, in place.
    ///
    /// A teleport `(s, v, d)` expands into channel preparation on `(v, d)`,
    /// a Bell measurement on `(s, v)` reading out two fresh classical bits,
    /// and the two classically-controlled corrections on `d`.
    pub fn decompose_teleports(&mut self) {
        let instructions = std::mem::take(&mut self.instructions);
        for inst in instructions {
            if inst.kind != InstructionKind::Teleport {
                self.instructions.push(inst);
                continue;
            }
            let (s, v, d) = (inst.qubits[0], inst.qubits[1], inst.qubits[2]);
            let c_bell = self.add_clbit();
            let c_half = self.add_clbit();
            self.instructions.extend([
                Instruction::single_qubit_gate(StandardGate::H, v),
                Instruction::two_qubit_gate(StandardGate::CX, v, d),
                Instruction::two_qubit_gate(StandardGate::CX, s, v),
                Instruction::single_qubit_gate(StandardGate::H, s),
                Instruction::measure(s, c_bell),
                Instruction::measure(v, c_half),
                Instruction::classically_controlled(StandardGate::X, d, c_half),
                Instruction::classically_controlled(StandardGate::Z, d, c_bell),
            ]);
        }
    }

    // =========================================================================
    // Pre-built circuits
    // =========================================================================

    /// Create a Bell state circuit.
    pub fn bell() -> IrResult<Self> {
        let mut circuit = Self::with_size("bell", 2, 2);
        circuit
            .h(QubitId(0))?
            .cx(QubitId(0), QubitId(1))?
            .measure(QubitId(0), ClbitId(0))?
            .measure(QubitId(1), ClbitId(1))?;
        Ok(circuit)
    }

    /// Create a GHZ state circuit.
    pub fn ghz(n: u32) -> IrResult<Self> {
        if n == 0 {
            return Ok(Self::new("ghz_0"));
        }
        let mut circuit = Self::with_size("ghz", n, n);
        circuit.h(QubitId(0))?;
        for i in 0..n - 1 {
            circuit.cx(QubitId(i), QubitId(i + 1))?;
        }
        for i in 0..n {
            circuit.measure(QubitId(i), ClbitId(i))?;
        }
        Ok(circuit)
    }
}

/// Key distinguishing quantum from classical wires in the depth table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum WireKey {
    Qubit(QubitId),
    Clbit(ClbitId),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_circuit() {
        let circuit = Circuit::new("test");
        assert_eq!(circuit.name(), "test");
        assert_eq!(circuit.num_qubits(), 0);
        assert_eq!(circuit.num_clbits(), 0);
        assert!(circuit.is_empty());
    }

    #[test]
    fn test_circuit_with_size() {
        let circuit = Circuit::with_size("test", 3, 2);
        assert_eq!(circuit.num_qubits(), 3);
        assert_eq!(circuit.num_clbits(), 2);
    }

    #[test]
    fn test_add_registers() {
        let mut circuit = Circuit::new("test");
        let qreg = circuit.add_qreg("q", 4);
        let creg = circuit.add_creg("c", 4);

        assert_eq!(qreg.len(), 4);
        assert_eq!(creg.len(), 4);
        assert_eq!(circuit.num_qubits(), 4);
        assert_eq!(circuit.num_clbits(), 4);
    }

    #[test]
    fn test_bell_state() {
        let circuit = Circuit::bell().unwrap();
        assert_eq!(circuit.num_qubits(), 2);
        assert_eq!(circuit.num_clbits(), 2);
        assert_eq!(circuit.depth(), 3); // H, CX, parallel measures
        assert_eq!(circuit.num_gates(), 2);
    }

    #[test]
    fn test_ghz_state() {
        let circuit = Circuit::ghz(5).unwrap();
        assert_eq!(circuit.num_qubits(), 5);
        assert_eq!(circuit.num_clbits(), 5);
        assert_eq!(circuit.num_multi_qubit_gates(), 4);
    }

    #[test]
    fn test_parallel_gates_depth() {
        let mut circuit = Circuit::with_size("test", 2, 0);
        circuit.h(QubitId(0)).unwrap();
        circuit.h(QubitId(1)).unwrap();
        assert_eq!(circuit.depth(), 1);
    }

    #[test]
    fn test_gate_arity_mismatch() {
        let mut circuit = Circuit::with_size("test", 2, 0);
        let result = circuit.push(Instruction::gate(StandardGate::CX, [QubitId(0)]));
        match result {
            Err(IrError::QubitCountMismatch {
                gate_name,
                expected,
                got,
            }) => {
                assert_eq!(gate_name, "cx");
                assert_eq!(expected, 2);
                assert_eq!(got, 1);
            }
            _ => panic!("Expected QubitCountMismatch error"),
        }
    }

    #[test]
    fn test_qubit_not_found() {
        let mut circuit = Circuit::with_size("test", 1, 0);
        let result = circuit.push(Instruction::two_qubit_gate(
            StandardGate::CX,
            QubitId(0),
            QubitId(99),
        ));
        match result {
            Err(IrError::QubitNotFound { qubit, gate_name }) => {
                assert_eq!(qubit, QubitId(99));
                assert_eq!(gate_name, Some("cx".to_string()));
            }
            _ => panic!("Expected QubitNotFound error"),
        }
    }

    #[test]
    fn test_duplicate_qubit_rejected() {
        let mut circuit = Circuit::with_size("test", 2, 0);
        let result = circuit.push(Instruction::two_qubit_gate(
            StandardGate::CX,
            QubitId(1),
            QubitId(1),
        ));
        assert!(matches!(result, Err(IrError::DuplicateQubit { .. })));
    }

    #[test]
    fn test_decompose_swaps() {
        let mut circuit = Circuit::with_size("test", 2, 0);
        circuit.swap(QubitId(0), QubitId(1)).unwrap();
        circuit.decompose_swaps();

        assert_eq!(circuit.len(), 3);
        assert!(circuit.iter().all(|i| i.name() == "cx"));
        assert_eq!(circuit.depth(), 3);
    }

    #[test]
    fn test_decompose_teleports() {
        let mut circuit = Circuit::with_size("test", 3, 0);
        circuit
            .push(Instruction::teleport(QubitId(0), QubitId(1), QubitId(2)))
            .unwrap();
        circuit.decompose_teleports();

        assert_eq!(circuit.num_clbits(), 2);
        assert_eq!(circuit.len(), 8);
        assert_eq!(circuit.num_gates(), 6); // 4 plain + 2 conditioned
        assert_eq!(circuit.iter().filter(|i| i.is_measure()).count(), 2);
        assert!(circuit.iter().all(|i| !i.is_teleport()));
    }

    #[test]
    fn test_barrier_synchronizes_without_depth() {
        let mut circuit = Circuit::with_size("test", 2, 0);
        circuit.h(QubitId(0)).unwrap();
        circuit.barrier([QubitId(0), QubitId(1)]).unwrap();
        circuit.h(QubitId(1)).unwrap();
        // The barrier forces q1's H after q0's H without adding a level.
        assert_eq!(circuit.depth(), 2);
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn depth_bounded_by_length(
                gates in proptest::collection::vec((0u32..4, 0u32..4), 0..32),
            ) {
                let mut circuit = Circuit::with_size("rand", 4, 0);
                for (a, b) in gates {
                    if a != b {
                        circuit.cx(QubitId(a), QubitId(b)).unwrap();
                    } else {
                        circuit.s(QubitId(a)).unwrap();
                    }
                }
                prop_assert!(circuit.depth() <= circuit.len());
            }

            #[test]
            fn swap_lowering_preserves_counts(
                swaps in proptest::collection::vec((0u32..4, 0u32..4), 0..16),
            ) {
                let mut circuit = Circuit::with_size("rand", 4, 0);
                let mut expected = 0usize;
                for (a, b) in swaps {
                    if a != b {
                        circuit.swap(QubitId(a), QubitId(b)).unwrap();
                        expected += 1;
                    }
                }
                circuit.decompose_swaps();
                prop_assert_eq!(circuit.len(), 3 * expected);
                prop_assert!(circuit.iter().all(|i| i.name() == "cx"));
            }
        }
    }
}
