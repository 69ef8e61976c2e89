//! Mapping settings.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{MapError, MapResult};

/// How the circuit is sliced into routing layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LayeringStrategy {
    /// One gate per layer, preserving original order.
    #[default]
    IndividualGates,
    /// Greedy packing: a gate joins the current layer iff its qubits are
    /// disjoint from every gate already in it.
    DisjointQubits,
    /// One layer containing the whole circuit.
    None,
}

impl LayeringStrategy {
    /// Parse a strategy from its CLI spelling.
    pub fn from_name(name: &str) -> MapResult<Self> {
        match name {
            "individual" => Ok(Self::IndividualGates),
            "disjoint" => Ok(Self::DisjointQubits),
            "none" => Ok(Self::None),
            other => Err(MapError::Config(format!(
                "unknown layering strategy '{other}'"
            ))),
        }
    }
}

/// How the initial logical-to-physical layout is seeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum InitialLayoutStrategy {
    /// Logical qubit i starts on physical qubit i.
    Identity,
    /// Place onto the highest-fidelity connected subset, most interacting
    /// logical qubits on the best-connected physical positions.
    Static,
    /// Defer placement until the search first needs a qubit.
    #[default]
    Dynamic,
    /// No seeding policy; behaves like [`Identity`](Self::Identity).
    None,
}

impl InitialLayoutStrategy {
    /// Parse a strategy from its CLI spelling.
    pub fn from_name(name: &str) -> MapResult<Self> {
        match name {
            "identity" => Ok(Self::Identity),
            "static" => Ok(Self::Static),
            "dynamic" => Ok(Self::Dynamic),
            "none" => Ok(Self::None),
            other => Err(MapError::Config(format!(
                "unknown initial layout strategy '{other}'"
            ))),
        }
    }
}

/// Settings for a mapping run.
#[derive(Debug, Clone)]
pub struct MappingSettings {
    /// Layer slicing strategy.
    pub layering_strategy: LayeringStrategy,
    /// Initial layout strategy.
    pub initial_layout_strategy: InitialLayoutStrategy,
    /// Number of ancilla qubits reserved for teleportation channels.
    /// Must be even; 0 disables teleportation.
    pub teleportation_qubits: usize,
    /// Seed for drawing the ancilla pairs.
    pub teleportation_seed: u64,
    /// Draw the same ancilla pairs (and layout) but schedule no teleports.
    pub teleportation_fake: bool,
    /// Maximum number of placement children kept per fork in dynamic layout.
    pub dynamic_placement_limit: usize,
    /// Use the admissible lower bound; `false` inflates it for speed.
    pub admissible_heuristic: bool,
    /// Weight SWAP costs by calibration fidelities.
    pub consider_fidelity: bool,
    /// Abort the search when this much wall time has elapsed.
    pub deadline: Option<Duration>,
    /// Emit per-layer diagnostics.
    pub verbose: bool,
}

impl Default for MappingSettings {
    fn default() -> Self {
        Self {
            layering_strategy: LayeringStrategy::default(),
            initial_layout_strategy: InitialLayoutStrategy::default(),
            teleportation_qubits: 0,
            teleportation_seed: 0,
            teleportation_fake: false,
            dynamic_placement_limit: 5,
            admissible_heuristic: true,
            consider_fidelity: false,
            deadline: None,
            verbose: false,
        }
    }
}

impl MappingSettings {
    /// Validate the settings against a device and circuit size.
    pub fn validate(&self, num_logical: usize, num_physical: usize) -> MapResult<()> {
        if self.teleportation_qubits % 2 != 0 {
            return Err(MapError::Config(format!(
                "teleportation_qubits must be even, got {}",
                self.teleportation_qubits
            )));
        }
        let cap = num_physical.saturating_sub(num_logical).min(8);
        if self.teleportation_qubits > cap {
            return Err(MapError::Config(format!(
                "teleportation_qubits {} exceeds limit {} (free qubits capped at 8)",
                self.teleportation_qubits, cap
            )));
        }
        if self.teleportation_qubits > 0
            && !matches!(
                self.initial_layout_strategy,
                InitialLayoutStrategy::Identity | InitialLayoutStrategy::None
            )
        {
            return Err(MapError::Config(
                "teleportation reserves ancilla positions up front and \
                 requires the identity initial layout"
                    .into(),
            ));
        }
        if self.dynamic_placement_limit == 0 {
            return Err(MapError::Config(
                "dynamic_placement_limit must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
