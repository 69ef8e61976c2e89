//! Synthesis and encoder configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use rimfax_ir::StandardGate;

use crate::error::{SynthError, SynthResult};

/// What the optimization loop minimizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TargetMetric {
    /// Total gate count.
    #[default]
    Gates,
    /// Circuit depth (requires the multi-gate encoding).
    Depth,
    /// Two-qubit gate count first, total gates second.
    TwoQubitGates,
    /// Gate count at a fixed timestep budget.
    GatesFixedDepth,
}

impl TargetMetric {
    /// Parse a metric from its CLI spelling.
    pub fn from_name(name: &str) -> SynthResult<Self> {
        match name {
            "gates" => Ok(Self::Gates),
            "depth" => Ok(Self::Depth),
            "two-qubit-gates" => Ok(Self::TwoQubitGates),
            "gates-fixed-depth" => Ok(Self::GatesFixedDepth),
            other => Err(SynthError::Config(format!("unknown target metric '{other}'"))),
        }
    }
}

/// Grouping policy for the cardinality-encoding tree.
///
/// The choice trades clause count against propagation speed; outcomes are
/// identical.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CommanderGrouping {
    /// Split the literal set in half at every level.
    #[default]
    Halves,
    /// Groups of two.
    Fixed2,
    /// Groups of three.
    Fixed3,
    /// Groups of logarithmic size.
    Logarithm,
}

impl CommanderGrouping {
    /// Parse a grouping from its CLI spelling.
    pub fn from_name(name: &str) -> SynthResult<Self> {
        match name {
            "halves" | "0" => Ok(Self::Halves),
            "fixed2" | "1" => Ok(Self::Fixed2),
            "fixed3" | "2" => Ok(Self::Fixed3),
            "logarithm" | "3" => Ok(Self::Logarithm),
            other => Err(SynthError::Config(format!(
                "unknown commander grouping '{other}'"
            ))),
        }
    }

    /// Group size for `len` literals.
    pub fn group_size(self, len: usize) -> usize {
        match self {
            CommanderGrouping::Halves => len.div_ceil(2).max(2),
            CommanderGrouping::Fixed2 => 2,
            CommanderGrouping::Fixed3 => 3,
            CommanderGrouping::Logarithm => (usize::BITS - len.leading_zeros()).max(2) as usize,
        }
    }
}

/// Parse a comma-separated single-qubit gate list, e.g. `"h,s,sdg"`.
pub fn gate_set_from_names(names: &str) -> SynthResult<Vec<StandardGate>> {
    let gates: Vec<StandardGate> = names
        .split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(|name| match name {
            "id" => Ok(StandardGate::I),
            "h" => Ok(StandardGate::H),
            "s" => Ok(StandardGate::S),
            "sdg" => Ok(StandardGate::Sdg),
            "sx" => Ok(StandardGate::SX),
            "sxdg" => Ok(StandardGate::SXdg),
            "x" => Ok(StandardGate::X),
            "y" => Ok(StandardGate::Y),
            "z" => Ok(StandardGate::Z),
            other => Err(SynthError::Config(format!(
                "unknown gate '{other}' in gate set"
            ))),
        })
        .collect::<SynthResult<_>>()?;
    if gates.is_empty() {
        return Err(SynthError::Config("empty gate set".into()));
    }
    Ok(gates)
}

/// The default single-qubit gate family.
pub const DEFAULT_GATE_SET: [StandardGate; 8] = [
    StandardGate::H,
    StandardGate::S,
    StandardGate::Sdg,
    StandardGate::SX,
    StandardGate::SXdg,
    StandardGate::X,
    StandardGate::Y,
    StandardGate::Z,
];

/// Configuration of a synthesis run.
#[derive(Debug, Clone)]
pub struct SynthesisConfig {
    /// The metric the driver minimizes.
    pub target_metric: TargetMetric,
    /// Minimize the gate count at fixed timesteps through repeated
    /// cardinality tightening instead of binary search on the budget.
    pub use_max_sat: bool,
    /// Allow gates on distinct qubits to share a timestep.
    pub use_multi_gate_encoding: bool,
    /// The single-qubit gate family available to the synthesizer.
    pub gate_set: Vec<StandardGate>,
    /// Whether CNOT is available.
    pub include_cx: bool,
    /// Grouping policy for cardinality encodings.
    pub commander_grouping: CommanderGrouping,
    /// Hard cap on the timestep budget.
    pub timestep_limit: usize,
    /// Restrict CNOTs to these ordered pairs (both directions of a coupling
    /// edge); `None` allows all pairs.
    pub coupling: Option<Vec<(u16, u16)>>,
    /// Window size for subcircuit decomposition; `None` synthesizes whole.
    pub split_size: Option<usize>,
    /// Wall-time budget for the whole optimization loop.
    pub deadline: Option<Duration>,
    /// Per-call solver timeout in milliseconds.
    pub solver_timeout_ms: Option<u64>,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            target_metric: TargetMetric::default(),
            use_max_sat: false,
            use_multi_gate_encoding: false,
            gate_set: DEFAULT_GATE_SET.to_vec(),
            include_cx: true,
            commander_grouping: CommanderGrouping::default(),
            timestep_limit: 64,
            coupling: None,
            split_size: None,
            deadline: None,
            solver_timeout_ms: None,
        }
    }
}

impl SynthesisConfig {
    /// Validate the configuration.
    pub fn validate(&self) -> SynthResult<()> {
        if self.target_metric == TargetMetric::Depth && !self.use_multi_gate_encoding {
            return Err(SynthError::Config(
                "depth-optimal synthesis requires the multi-gate encoding".into(),
            ));
        }
        if self.gate_set.is_empty() && !self.include_cx {
            return Err(SynthError::Config("empty gate set".into()));
        }
        for gate in &self.gate_set {
            if gate.num_qubits() != 1 || !gate.is_clifford() {
                return Err(SynthError::Config(format!(
                    "'{}' is not a single-qubit Clifford gate",
                    gate.name()
                )));
            }
        }
        if self.timestep_limit == 0 {
            return Err(SynthError::Config("timestep_limit must be positive".into()));
        }
        if self.split_size == Some(0) {
            return Err(SynthError::Config("split_size must be positive".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_depth_requires_multi_gate() {
        let config = SynthesisConfig {
            target_metric: TargetMetric::Depth,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = SynthesisConfig {
            target_metric: TargetMetric::Depth,
            use_multi_gate_encoding: true,
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_gate_set_must_be_single_qubit_clifford() {
        let config = SynthesisConfig {
            gate_set: vec![StandardGate::T],
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = SynthesisConfig {
            gate_set: vec![StandardGate::CX],
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_grouping_parsing_and_sizes() {
        assert_eq!(
            CommanderGrouping::from_name("fixed3").unwrap(),
            CommanderGrouping::Fixed3
        );
        assert_eq!(CommanderGrouping::Fixed2.group_size(10), 2);
        assert_eq!(CommanderGrouping::Halves.group_size(10), 5);
        assert_eq!(CommanderGrouping::Logarithm.group_size(16), 5);
    }

    #[test]
    fn test_metric_parsing() {
        assert_eq!(
            TargetMetric::from_name("two-qubit-gates").unwrap(),
            TargetMetric::TwoQubitGates
        );
        assert!(TargetMetric::from_name("nope").is_err());
    }

    #[test]
    fn test_gate_set_parsing() {
        assert_eq!(
            gate_set_from_names("h, s,sdg").unwrap(),
            vec![StandardGate::H, StandardGate::S, StandardGate::Sdg]
        );
        assert!(gate_set_from_names("h,t").is_err());
        assert!(gate_set_from_names("").is_err());

        // The parsed list passes config validation.
        let config = SynthesisConfig {
            gate_set: gate_set_from_names("h,z").unwrap(),
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }
}
