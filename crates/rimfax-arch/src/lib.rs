//! Rimfax Device Architecture Model
//!
//! This crate describes the hardware a circuit is compiled onto: an undirected
//! coupling graph over physical qubits, optional per-qubit and per-edge
//! calibration data, and the derived tables the mapping engine queries
//! (shortest-path distances, fidelity-weighted distances, connected-subset
//! enumeration, highest-fidelity subgraph selection).
//!
//! An [`Architecture`] is built once (from an edge list, a coupling-map file,
//! or a factory) and is immutable afterwards. Derived tables are computed
//! lazily on first access and memoized.
//!
//! # Example
//!
//! ```rust
//! use rimfax_arch::Architecture;
//!
//! let arch = Architecture::linear(4);
//! assert_eq!(arch.num_qubits(), 4);
//! assert_eq!(arch.distance(0, 3).unwrap(), 3.0);
//! assert_eq!(arch.connected_subsets(4).unwrap().len(), 1);
//! ```

pub mod architecture;
pub mod calibration;
pub mod error;

pub use architecture::Architecture;
pub use calibration::{Calibration, CalibrationRecord};
pub use error::{ArchError, ArchResult};
