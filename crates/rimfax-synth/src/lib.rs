//! Rimfax Clifford Circuit Synthesis
//!
//! Bounded-model synthesis of Clifford circuits: the target is a stabilizer
//! [`Tableau`], the search space is all circuits over a configurable Clifford
//! gate set within `T` timesteps, and the engine is a propositional encoding
//! dispatched to a SAT oracle inside binary- and linear-search loops.
//!
//! # Example
//!
//! ```rust
//! use rimfax_ir::{Circuit, QubitId};
//! use rimfax_synth::{CliffordSynthesizer, SynthesisConfig, Tableau};
//!
//! // Target: the Bell-state preparation H(0); CX(0,1).
//! let mut circuit = Circuit::with_size("bell_prep", 2, 0);
//! circuit.h(QubitId(0)).unwrap();
//! circuit.cx(QubitId(0), QubitId(1)).unwrap();
//! let target = Tableau::from_circuit(&circuit, false).unwrap();
//!
//! let mut synthesizer = CliffordSynthesizer::from_target(target);
//! let results = synthesizer.synthesize(&SynthesisConfig::default()).unwrap();
//! assert_eq!(results.single_qubit_gates + results.two_qubit_gates, 2);
//! ```

pub mod config;
pub mod encoding;
pub mod error;
pub mod results;
pub mod solver;
pub mod synthesizer;
pub mod tableau;

pub use config::{CommanderGrouping, SynthesisConfig, TargetMetric, gate_set_from_names};
pub use error::{SynthError, SynthResult};
pub use results::{SolverResult, SynthesisResults};
pub use solver::{DpllSolver, SatOracle, SolverOutcome};
pub use synthesizer::CliffordSynthesizer;
pub use tableau::Tableau;
