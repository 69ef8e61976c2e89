//! Result reporting for mapping runs.

use serde::{Deserialize, Serialize};

/// Terminal status of a mapping run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MappingStatus {
    /// The whole circuit was routed.
    Ok,
    /// The deadline expired; the routed prefix is reported.
    TimedOut,
}

/// Statistics and layouts of a mapping run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MappingResults {
    /// Gates in the input circuit.
    pub input_gates: usize,
    /// Gates in the routed circuit (SWAPs and teleports lowered).
    pub output_gates: usize,
    /// SWAP operations inserted.
    pub swaps: usize,
    /// Teleportation operations inserted.
    pub teleportations: usize,
    /// Depth of the routed circuit.
    pub depth: usize,
    /// Wall time of the run in seconds.
    pub runtime_seconds: f64,
    /// Estimated fidelity of the routed circuit (1.0 without calibration).
    pub fidelity: f64,
    /// Physical position per logical qubit before routing, `-1` if unmapped.
    pub initial_layout: Vec<i32>,
    /// Physical position per logical qubit after routing.
    pub output_layout: Vec<i32>,
    /// Terminal status.
    pub status: MappingStatus,
}

impl MappingResults {
    /// The report as a JSON value.
    pub fn json(&self) -> serde_json::Value {
        serde_json::json!({
            "input_gates": self.input_gates,
            "output_gates": self.output_gates,
            "swaps": self.swaps,
            "teleportations": self.teleportations,
            "depth": self.depth,
            "runtime_seconds": self.runtime_seconds,
            "fidelity": self.fidelity,
            "initial_layout": self.initial_layout,
            "output_layout": self.output_layout,
            "status": match self.status {
                MappingStatus::Ok => "Ok",
                MappingStatus::TimedOut => "TimedOut",
            },
        })
    }
}

impl std::fmt::Display for MappingResults {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let pretty = serde_json::to_string_pretty(&self.json()).map_err(|_| std::fmt::Error)?;
        write!(f, "{pretty}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_fields() {
        let results = MappingResults {
            input_gates: 3,
            output_gates: 9,
            swaps: 2,
            teleportations: 0,
            depth: 7,
            runtime_seconds: 0.01,
            fidelity: 1.0,
            initial_layout: vec![0, 1],
            output_layout: vec![1, 0],
            status: MappingStatus::Ok,
        };
        let json = results.json();
        assert_eq!(json["swaps"], 2);
        assert_eq!(json["status"], "Ok");
        assert_eq!(json["initial_layout"], serde_json::json!([0, 1]));
    }
}
