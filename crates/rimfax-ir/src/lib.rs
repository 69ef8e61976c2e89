//! Rimfax Circuit Intermediate Representation
//!
//! This crate provides the circuit types shared by the mapping and synthesis
//! engines. A circuit is an ordered instruction sequence over logical qubits;
//! both engines consume the sequence in program order (the mapper slices it
//! into layers, the synthesizer folds it into a tableau), so the container is
//! a flat list rather than a dependency graph.
//!
//! # Example
//!
//! ```rust
//! use rimfax_ir::{Circuit, QubitId};
//!
//! let mut circuit = Circuit::with_size("bell", 2, 2);
//! circuit.h(QubitId(0)).unwrap();
//! circuit.cx(QubitId(0), QubitId(1)).unwrap();
//! assert_eq!(circuit.depth(), 2);
//! ```

pub mod circuit;
pub mod error;
pub mod gate;
pub mod instruction;
pub mod qubit;

pub use circuit::Circuit;
pub use error::{IrError, IrResult};
pub use gate::StandardGate;
pub use instruction::{Instruction, InstructionKind};
pub use qubit::{Clbit, ClbitId, Qubit, QubitId};
