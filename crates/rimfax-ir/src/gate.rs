//! Quantum gate types.

use serde::{Deserialize, Serialize};

/// Standard gates with known semantics.
///
/// Rotation angles are concrete `f64` radians; the compilation engines never
/// need symbolic parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum StandardGate {
    // Single-qubit Pauli gates
    /// Identity gate.
    I,
    /// Pauli-X gate.
    X,
    /// Pauli-Y gate.
    Y,
    /// Pauli-Z gate.
    Z,

    // Single-qubit Clifford gates
    /// Hadamard gate.
    H,
    /// S gate (sqrt(Z)).
    S,
    /// S-dagger gate.
    Sdg,
    /// sqrt(X) gate.
    SX,
    /// sqrt(X)-dagger gate.
    SXdg,

    // Non-Clifford single-qubit gates
    /// T gate (fourth root of Z).
    T,
    /// T-dagger gate.
    Tdg,
    /// Rotation around X axis.
    Rx(f64),
    /// Rotation around Y axis.
    Ry(f64),
    /// Rotation around Z axis.
    Rz(f64),

    // Two-qubit gates
    /// Controlled-X (CNOT) gate.
    CX,
    /// Controlled-Y gate.
    CY,
    /// Controlled-Z gate.
    CZ,
    /// SWAP gate.
    Swap,

    // Three-qubit gates
    /// Toffoli gate (CCX).
    CCX,
}

impl StandardGate {
    /// Get the name of this gate.
    #[inline]
    pub fn name(&self) -> &'static str {
        match self {
            StandardGate::I => "id",
            StandardGate::X => "x",
            StandardGate::Y => "y",
            StandardGate::Z => "z",
            StandardGate::H => "h",
            StandardGate::S => "s",
            StandardGate::Sdg => "sdg",
            StandardGate::SX => "sx",
            StandardGate::SXdg => "sxdg",
            StandardGate::T => "t",
            StandardGate::Tdg => "tdg",
            StandardGate::Rx(_) => "rx",
            StandardGate::Ry(_) => "ry",
            StandardGate::Rz(_) => "rz",
            StandardGate::CX => "cx",
            StandardGate::CY => "cy",
            StandardGate::CZ => "cz",
            StandardGate::Swap => "swap",
            StandardGate::CCX => "ccx",
        }
    }

    /// Get the number of qubits this gate operates on.
    #[inline]
    pub fn num_qubits(&self) -> u32 {
        match self {
            StandardGate::I
            | StandardGate::X
            | StandardGate::Y
            | StandardGate::Z
            | StandardGate::H
            | StandardGate::S
            | StandardGate::Sdg
            | StandardGate::SX
            | StandardGate::SXdg
            | StandardGate::T
            | StandardGate::Tdg
            | StandardGate::Rx(_)
            | StandardGate::Ry(_)
            | StandardGate::Rz(_) => 1,

            StandardGate::CX | StandardGate::CY | StandardGate::CZ | StandardGate::Swap => 2,

            StandardGate::CCX => 3,
        }
    }

    /// Check whether this gate belongs to the Clifford group.
    pub fn is_clifford(&self) -> bool {
        matches!(
            self,
            StandardGate::I
                | StandardGate::X
                | StandardGate::Y
                | StandardGate::Z
                | StandardGate::H
                | StandardGate::S
                | StandardGate::Sdg
                | StandardGate::SX
                | StandardGate::SXdg
                | StandardGate::CX
                | StandardGate::CY
                | StandardGate::CZ
                | StandardGate::Swap
        )
    }

    /// Get the inverse of this gate.
    pub fn inverse(&self) -> StandardGate {
        match self {
            StandardGate::S => StandardGate::Sdg,
            StandardGate::Sdg => StandardGate::S,
            StandardGate::SX => StandardGate::SXdg,
            StandardGate::SXdg => StandardGate::SX,
            StandardGate::T => StandardGate::Tdg,
            StandardGate::Tdg => StandardGate::T,
            StandardGate::Rx(theta) => StandardGate::Rx(-theta),
            StandardGate::Ry(theta) => StandardGate::Ry(-theta),
            StandardGate::Rz(theta) => StandardGate::Rz(-theta),
            g => *g,
        }
    }

    /// Get the rotation angle if this is a rotation gate.
    pub fn angle(&self) -> Option<f64> {
        match self {
            StandardGate::Rx(theta) | StandardGate::Ry(theta) | StandardGate::Rz(theta) => {
                Some(*theta)
            }
            _ => None,
        }
    }
}
