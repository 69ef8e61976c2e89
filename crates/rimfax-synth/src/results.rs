//! Result reporting for synthesis runs.

use serde::{Deserialize, Serialize};

use rimfax_ir::Circuit;

/// Terminal solver verdict of a synthesis run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SolverResult {
    /// A satisfying circuit was found.
    Sat,
    /// The target was proven unreachable within the budget.
    Unsat,
    /// No definite verdict (nothing solved yet, or timed out first).
    #[default]
    Ndef,
}

impl SolverResult {
    fn as_str(self) -> &'static str {
        match self {
            SolverResult::Sat => "SAT",
            SolverResult::Unsat => "UNSAT",
            SolverResult::Ndef => "NDEF",
        }
    }
}

/// Statistics and artifacts of a synthesis run.
#[derive(Debug, Clone, Default)]
pub struct SynthesisResults {
    /// The best verdict reached.
    pub solver_result: SolverResult,
    /// Single-qubit gates in the best circuit.
    pub single_qubit_gates: usize,
    /// Two-qubit gates in the best circuit.
    pub two_qubit_gates: usize,
    /// Depth of the best circuit.
    pub depth: usize,
    /// Wall time in seconds.
    pub runtime: f64,
    /// Number of oracle invocations.
    pub solver_calls: usize,
    /// Whether the deadline expired before the search finished.
    pub timed_out: bool,
    /// The best circuit, if any call was SAT.
    pub circuit: Option<Circuit>,
}

impl SynthesisResults {
    /// Whether the best verdict is SAT.
    pub fn sat(&self) -> bool {
        self.solver_result == SolverResult::Sat
    }

    /// Total gate count of the best circuit.
    pub fn gates(&self) -> usize {
        self.single_qubit_gates + self.two_qubit_gates
    }

    /// The report as a JSON value.
    pub fn json(&self) -> serde_json::Value {
        serde_json::json!({
            "solver_result": self.solver_result.as_str(),
            "single_qubit_gates": self.single_qubit_gates,
            "two_qubit_gates": self.two_qubit_gates,
            "depth": self.depth,
            "runtime": self.runtime,
            "solver_calls": self.solver_calls,
        })
    }
}

impl std::fmt::Display for SynthesisResults {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let pretty = serde_json::to_string_pretty(&self.json()).map_err(|_| std::fmt::Error)?;
        write!(f, "{pretty}")
    }
}
