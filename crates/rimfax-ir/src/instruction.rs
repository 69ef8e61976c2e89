//! Circuit instructions combining gates with operands.

use serde::{Deserialize, Serialize};

use crate::gate::StandardGate;
use crate::qubit::{ClbitId, QubitId};

/// The kind of instruction in a circuit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum InstructionKind {
    /// A quantum gate operation.
    Gate(StandardGate),
    /// A gate conditioned on a classical bit being 1.
    ///
    /// Teleportation corrections are the only producer inside rimfax.
    ClassicallyControlled {
        /// The gate to apply when the bit reads 1.
        gate: StandardGate,
        /// The controlling classical bit.
        clbit: ClbitId,
    },
    /// Measurement operation.
    Measure,
    /// Barrier (synchronization point).
    Barrier,
    /// Qubit-state teleportation through a pre-shared ancilla channel.
    ///
    /// Operands are `(source, channel half adjacent to source, destination
    /// half)`. Hardware with entanglement distribution executes this as a
    /// primitive; [`Circuit::decompose_teleports`](crate::Circuit::decompose_teleports)
    /// lowers it into local gates, measurements, and classically-controlled
    /// corrections.
    Teleport,
}

/// A complete instruction with operands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instruction {
    /// The kind of instruction.
    pub kind: InstructionKind,
    /// Qubits this instruction operates on.
    pub qubits: Vec<QubitId>,
    /// Classical bits this instruction operates on (for measure).
    pub clbits: Vec<ClbitId>,
}

impl Instruction {
    /// Create a gate instruction.
    pub fn gate(gate: StandardGate, qubits: impl IntoIterator<Item = QubitId>) -> Self {
        Self {
            kind: InstructionKind::Gate(gate),
            qubits: qubits.into_iter().collect(),
            clbits: vec![],
        }
    }

    /// Create a single-qubit gate instruction.
    pub fn single_qubit_gate(gate: StandardGate, qubit: QubitId) -> Self {
        Self::gate(gate, [qubit])
    }

    /// Create a two-qubit gate instruction.
    pub fn two_qubit_gate(gate: StandardGate, q1: QubitId, q2: QubitId) -> Self {
        Self::gate(gate, [q1, q2])
    }

    /// Create a classically-controlled gate instruction.
    pub fn classically_controlled(gate: StandardGate, qubit: QubitId, clbit: ClbitId) -> Self {
        Self {
            kind: InstructionKind::ClassicallyControlled { gate, clbit },
            qubits: vec![qubit],
            clbits: vec![clbit],
        }
    }

    /// Create a measurement instruction.
    pub fn measure(qubit: QubitId, clbit: ClbitId) -> Self {
        Self {
            kind: InstructionKind::Measure,
            qubits: vec![qubit],
            clbits: vec![clbit],
        }
    }

    /// Create a barrier instruction.
    pub fn barrier(qubits: impl IntoIterator<Item = QubitId>) -> Self {
        Self {
            kind: InstructionKind::Barrier,
            qubits: qubits.into_iter().collect(),
            clbits: vec![],
        }
    }

    /// Create a teleportation instruction.
    pub fn teleport(source: QubitId, via: QubitId, dest: QubitId) -> Self {
        Self {
            kind: InstructionKind::Teleport,
            qubits: vec![source, via, dest],
            clbits: vec![],
        }
    }

    /// Check if this is a gate instruction.
    pub fn is_gate(&self) -> bool {
        matches!(
            self.kind,
            InstructionKind::Gate(_) | InstructionKind::ClassicallyControlled { .. }
        )
    }

    /// Check if this is a measurement.
    pub fn is_measure(&self) -> bool {
        matches!(self.kind, InstructionKind::Measure)
    }

    /// Check if this is a barrier.
    pub fn is_barrier(&self) -> bool {
        matches!(self.kind, InstructionKind::Barrier)
    }

    /// Check if this is a teleportation.
    pub fn is_teleport(&self) -> bool {
        matches!(self.kind, InstructionKind::Teleport)
    }

    /// Get the gate if this is a (plain or conditioned) gate instruction.
    pub fn as_gate(&self) -> Option<StandardGate> {
        match &self.kind {
            InstructionKind::Gate(g) => Some(*g),
            InstructionKind::ClassicallyControlled { gate, .. } => Some(*gate),
            _ => None,
        }
    }

    /// Check if this instruction is a gate acting on two qubits.
    pub fn is_two_qubit_gate(&self) -> bool {
        matches!(self.kind, InstructionKind::Gate(_)) && self.qubits.len() == 2
    }

    /// Get the name of the instruction.
    pub fn name(&self) -> &'static str {
        match &self.kind {
            InstructionKind::Gate(g) => g.name(),
            InstructionKind::ClassicallyControlled { gate, .. } => gate.name(),
            InstructionKind::Measure => "measure",
            InstructionKind::Barrier => "barrier",
            InstructionKind::Teleport => "teleport",
        }
    }
}
