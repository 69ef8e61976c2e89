//! Rimfax Heuristic Mapping and Routing
//!
//! This crate makes a circuit executable on a device: every two-qubit gate of
//! the output acts on a coupling edge of the target [`rimfax_arch::Architecture`].
//! Connectivity is bought with SWAP insertions (lowered to three CNOTs) and,
//! optionally, teleportation channels backed by ancilla pairs.
//!
//! The engine slices the circuit into layers, seeds an initial
//! logical-to-physical layout, and runs an A* search per layer over layout
//! permutations with an admissible distance-based lower bound.
//!
//! # Example
//!
//! ```rust
//! use rimfax_arch::Architecture;
//! use rimfax_ir::{Circuit, QubitId};
//! use rimfax_map::{HeuristicMapper, MappingSettings};
//!
//! let mut circuit = Circuit::with_size("example", 2, 0);
//! circuit.cx(QubitId(0), QubitId(1)).unwrap();
//!
//! let arch = Architecture::linear(4);
//! let mapper = HeuristicMapper::new(&circuit, &arch).unwrap();
//! let outcome = mapper.map(&MappingSettings::default()).unwrap();
//! assert_eq!(outcome.results.swaps, 0);
//! ```

pub mod error;
pub mod layering;
pub mod layout;
pub mod mapper;
pub mod results;
pub mod search;
pub mod settings;

pub use error::{MapError, MapResult};
pub use layout::Layout;
pub use mapper::{HeuristicMapper, MappingOutcome};
pub use results::{MappingResults, MappingStatus};
pub use settings::{InitialLayoutStrategy, LayeringStrategy, MappingSettings};
