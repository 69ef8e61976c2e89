//! Propositional encoding of bounded Clifford synthesis.
//!
//! For a timestep budget `T` the encoder allocates tableau-state variables
//! `x[t][i][q]`, `z[t][i][q]`, `r[t][i]` for every step boundary, gate
//! selectors `g[t][q][k]` (with `k = 0` the explicit "no gate"), and CNOT
//! selectors per ordered qubit pair. Transition constraints tie consecutive
//! states together under the selected gates; phase updates accumulate through
//! per-qubit contribution variables XOR-chained into the sign column.

pub mod cardinality;
pub mod cnf;
pub mod variants;

use rimfax_ir::{Circuit, StandardGate};

use crate::config::{CommanderGrouping, SynthesisConfig};
use crate::encoding::cnf::{Cnf, Lit, Model};
use crate::error::{SynthError, SynthResult};
use crate::tableau::Tableau;
use variants::{GateEncoding, MultiGateEncoder, SingleGateEncoder};

/// Variable tables of one bounded-model instance.
#[derive(Debug, Clone)]
pub struct EncodingVars {
    /// Timestep budget.
    pub timesteps: usize,
    /// Number of qubits.
    pub num_qubits: usize,
    /// Number of tableau rows.
    pub rows: usize,
    /// Single-qubit gate family, index 1.. in the selector tables.
    pub gate_set: Vec<StandardGate>,
    /// Ordered CNOT pairs.
    pub pairs: Vec<(u16, u16)>,
    /// `x[t][i][q]`.
    pub x: Vec<Vec<Vec<Lit>>>,
    /// `z[t][i][q]`.
    pub z: Vec<Vec<Vec<Lit>>>,
    /// `r[t][i]`.
    pub r: Vec<Vec<Lit>>,
    /// `g[t][q][k]`; `k = 0` is "no single-qubit gate".
    pub g: Vec<Vec<Vec<Lit>>>,
    /// `cx[t][pair]`.
    pub cx: Vec<Vec<Lit>>,
    /// Phase contribution `p[t][i][q]`.
    pub p: Vec<Vec<Vec<Lit>>>,
    /// `twoq[t][q]`: some CNOT touches `q` at step `t`.
    pub twoq: Vec<Vec<Lit>>,
}

impl EncodingVars {
    /// All "a gate happens" literals, for gate-count cardinality bounds.
    pub fn gate_lits(&self) -> Vec<Lit> {
        let mut lits = vec![];
        for t in 0..self.timesteps {
            for q in 0..self.num_qubits {
                lits.extend(&self.g[t][q][1..]);
            }
            lits.extend(&self.cx[t]);
        }
        lits
    }

    /// All CNOT literals, for two-qubit-count cardinality bounds.
    pub fn cx_lits(&self) -> Vec<Lit> {
        self.cx.iter().flatten().copied().collect()
    }
}

/// A complete constraint system plus its variable tables.
#[derive(Debug, Clone)]
pub struct Encoding {
    /// The formula.
    pub cnf: Cnf,
    /// The variable tables, for bounds and model extraction.
    pub vars: EncodingVars,
}

impl Encoding {
    /// Read the synthesized circuit out of a model.
    ///
    /// Within a timestep all actions touch disjoint qubits, so the emission
    /// order (single-qubit gates by qubit, then CNOTs by pair index) is a
    /// valid serialization.
    pub fn extract_circuit(&self, model: &Model) -> SynthResult<Circuit> {
        let vars = &self.vars;
        let mut circuit = Circuit::with_size("synthesized", vars.num_qubits as u32, 0);

        for t in 0..vars.timesteps {
            for q in 0..vars.num_qubits {
                for (k, gate) in vars.gate_set.iter().enumerate() {
                    if vars.g[t][q][k + 1].eval(model) {
                        circuit.push(rimfax_ir::Instruction::single_qubit_gate(
                            *gate,
                            rimfax_ir::QubitId(q as u32),
                        ))?;
                    }
                }
            }
            for (idx, &(c, tgt)) in vars.pairs.iter().enumerate() {
                if vars.cx[t][idx].eval(model) {
                    circuit.cx(
                        rimfax_ir::QubitId(u32::from(c)),
                        rimfax_ir::QubitId(u32::from(tgt)),
                    )?;
                }
            }
        }
        Ok(circuit)
    }
}

/// Build the constraint system for reaching `target` from `initial` within
/// `timesteps` steps.
pub fn encode(
    initial: &Tableau,
    target: &Tableau,
    config: &SynthesisConfig,
    timesteps: usize,
) -> SynthResult<Encoding> {
    encode_with_bounds(initial, target, config, timesteps, None, None)
}

/// [`encode`] plus optional cardinality bounds on the total gate count and
/// the CNOT count.
pub fn encode_with_bounds(
    initial: &Tableau,
    target: &Tableau,
    config: &SynthesisConfig,
    timesteps: usize,
    gate_bound: Option<usize>,
    two_qubit_bound: Option<usize>,
) -> SynthResult<Encoding> {
    if initial.num_qubits() != target.num_qubits() {
        return Err(SynthError::Encoding(format!(
            "initial tableau has {} qubits, target has {}",
            initial.num_qubits(),
            target.num_qubits()
        )));
    }
    if initial.num_rows() != target.num_rows() {
        return Err(SynthError::Encoding(format!(
            "initial tableau has {} rows, target has {}",
            initial.num_rows(),
            target.num_rows()
        )));
    }
    if initial.num_qubits() == 0 {
        return Err(SynthError::Encoding("tableau has no qubits".into()));
    }

    let core = EncoderCore::build(initial, config, timesteps);
    let mut encoder: Box<dyn GateEncoding> = if config.use_multi_gate_encoding {
        Box::new(MultiGateEncoder::new(core))
    } else {
        Box::new(SingleGateEncoder::new(core))
    };

    encoder.assert_consistency();
    encoder.assert_gate_constraints();
    for pos in 0..timesteps.saturating_sub(1) {
        encoder.assert_single_qubit_gate_order_constraints(pos);
        encoder.assert_two_qubit_gate_order_constraints(pos);
    }

    let mut core = encoder.into_core();
    core.assert_tableau(0, initial);
    core.assert_tableau(timesteps, target);

    if let Some(bound) = gate_bound {
        let lits = core.vars.gate_lits();
        cardinality::at_most_k(&mut core.cnf, &lits, bound, core.grouping);
    }
    if let Some(bound) = two_qubit_bound {
        let lits = core.vars.cx_lits();
        cardinality::at_most_k(&mut core.cnf, &lits, bound, core.grouping);
    }

    Ok(Encoding {
        cnf: core.cnf,
        vars: core.vars,
    })
}

/// Shared state and constraint emitters of both encoder variants.
#[derive(Debug)]
pub struct EncoderCore {
    pub(crate) cnf: Cnf,
    pub(crate) vars: EncodingVars,
    pub(crate) grouping: CommanderGrouping,
}

impl EncoderCore {
    fn build(initial: &Tableau, config: &SynthesisConfig, timesteps: usize) -> Self {
        let n = initial.num_qubits();
        let rows = initial.num_rows();

        let pairs: Vec<(u16, u16)> = if config.include_cx {
            match &config.coupling {
                Some(edges) => {
                    let mut pairs: Vec<(u16, u16)> = edges
                        .iter()
                        .flat_map(|&(u, v)| [(u, v), (v, u)])
                        .filter(|&(u, v)| u != v)
                        .collect();
                    pairs.sort_unstable();
                    pairs.dedup();
                    pairs
                }
                None => {
                    let mut pairs = vec![];
                    for c in 0..n as u16 {
                        for t in 0..n as u16 {
                            if c != t {
                                pairs.push((c, t));
                            }
                        }
                    }
                    pairs
                }
            }
        } else {
            vec![]
        };

        let mut cnf = Cnf::new();
        let state = |cnf: &mut Cnf| -> Vec<Vec<Lit>> {
            (0..rows)
                .map(|_| (0..n).map(|_| cnf.new_var()).collect())
                .collect()
        };

        // Selectors are allocated first: a lowest-index-first decision
        // heuristic then branches on gate choices, and the state variables
        // follow by propagation from the pinned boundary tableaus.
        let g: Vec<Vec<Vec<Lit>>> = (0..timesteps)
            .map(|_| {
                (0..n)
                    .map(|_| {
                        (0..=config.gate_set.len())
                            .map(|_| cnf.new_var())
                            .collect()
                    })
                    .collect()
            })
            .collect();
        let cx: Vec<Vec<Lit>> = (0..timesteps)
            .map(|_| (0..pairs.len()).map(|_| cnf.new_var()).collect())
            .collect();
        let twoq: Vec<Vec<Lit>> = (0..timesteps)
            .map(|_| (0..n).map(|_| cnf.new_var()).collect())
            .collect();
        let x: Vec<_> = (0..=timesteps).map(|_| state(&mut cnf)).collect();
        let z: Vec<_> = (0..=timesteps).map(|_| state(&mut cnf)).collect();
        let r: Vec<Vec<Lit>> = (0..=timesteps)
            .map(|_| (0..rows).map(|_| cnf.new_var()).collect())
            .collect();
        let p: Vec<_> = (0..timesteps).map(|_| state(&mut cnf)).collect();

        Self {
            cnf,
            vars: EncodingVars {
                timesteps,
                num_qubits: n,
                rows,
                gate_set: config.gate_set.clone(),
                pairs,
                x,
                z,
                r,
                g,
                cx,
                p,
                twoq,
            },
            grouping: config.commander_grouping,
        }
    }

    /// Pin the state at a step boundary to a concrete tableau.
    fn assert_tableau(&mut self, t: usize, tableau: &Tableau) {
        for (i, row) in tableau.rows().iter().enumerate() {
            for q in 0..self.vars.num_qubits {
                let xl = self.vars.x[t][i][q];
                self.cnf.assert_lit(if row.x[q] { xl } else { !xl });
                let zl = self.vars.z[t][i][q];
                self.cnf.assert_lit(if row.z[q] { zl } else { !zl });
            }
            let rl = self.vars.r[t][i];
            self.cnf.assert_lit(if row.sign { rl } else { !rl });
        }
    }

    /// Structural constraints common to both variants: selector semantics,
    /// per-qubit exclusivity, CNOT participation.
    pub(crate) fn assert_selector_consistency(&mut self) {
        for t in 0..self.vars.timesteps {
            for q in 0..self.vars.num_qubits {
                // Exactly one single-qubit selector (index 0 = none).
                let selectors = self.vars.g[t][q].clone();
                cardinality::exactly_one(&mut self.cnf, &selectors, self.grouping);

                // twoq[t][q] <-> OR of CNOTs touching q.
                let touching: Vec<Lit> = self
                    .vars
                    .pairs
                    .iter()
                    .enumerate()
                    .filter(|(_, pair)| pair.0 as usize == q || pair.1 as usize == q)
                    .map(|(idx, _)| self.vars.cx[t][idx])
                    .collect();
                let twoq = self.vars.twoq[t][q];
                for &lit in &touching {
                    self.cnf.add_clause(vec![!lit, twoq]);
                }
                let mut clause = vec![!twoq];
                clause.extend(&touching);
                self.cnf.add_clause(clause);

                // At most one CNOT per qubit per step.
                cardinality::at_most_one(&mut self.cnf, &touching, self.grouping);

                // A CNOT participant carries no single-qubit gate.
                self.cnf.imply_lit(twoq, self.vars.g[t][q][0]);
            }
        }
    }

    pub(crate) fn assert_single_qubit_transition(&mut self, t: usize, q: usize, k: usize) {
        let gate = self.vars.gate_set[k];
        let cond = self.vars.g[t][q][k + 1];
        for i in 0..self.vars.rows {
            let x0 = self.vars.x[t][i][q];
            let z0 = self.vars.z[t][i][q];
            let x1 = self.vars.x[t + 1][i][q];
            let z1 = self.vars.z[t + 1][i][q];
            let pp = self.vars.p[t][i][q];
            match gate {
                StandardGate::H => {
                    self.cnf.imply_eq(cond, x1, z0);
                    self.cnf.imply_eq(cond, z1, x0);
                    self.cnf.imply_and_eq(cond, pp, x0, z0);
                }
                StandardGate::S => {
                    self.cnf.imply_eq(cond, x1, x0);
                    self.cnf.imply_xor_eq(cond, z1, x0, z0);
                    self.cnf.imply_and_eq(cond, pp, x0, z0);
                }
                StandardGate::Sdg => {
                    self.cnf.imply_eq(cond, x1, x0);
                    self.cnf.imply_xor_eq(cond, z1, x0, z0);
                    self.cnf.imply_and_eq(cond, pp, x0, !z0);
                }
                StandardGate::X => {
                    self.cnf.imply_eq(cond, x1, x0);
                    self.cnf.imply_eq(cond, z1, z0);
                    self.cnf.imply_eq(cond, pp, z0);
                }
                StandardGate::Y => {
                    self.cnf.imply_eq(cond, x1, x0);
                    self.cnf.imply_eq(cond, z1, z0);
                    self.cnf.imply_xor_eq(cond, pp, x0, z0);
                }
                StandardGate::Z => {
                    self.cnf.imply_eq(cond, x1, x0);
                    self.cnf.imply_eq(cond, z1, z0);
                    self.cnf.imply_eq(cond, pp, x0);
                }
                StandardGate::SX => {
                    self.cnf.imply_xor_eq(cond, x1, x0, z0);
                    self.cnf.imply_eq(cond, z1, z0);
                    self.cnf.imply_and_eq(cond, pp, z0, !x0);
                }
                StandardGate::SXdg => {
                    self.cnf.imply_xor_eq(cond, x1, x0, z0);
                    self.cnf.imply_eq(cond, z1, z0);
                    self.cnf.imply_and_eq(cond, pp, x0, z0);
                }
                StandardGate::I => {
                    self.cnf.imply_eq(cond, x1, x0);
                    self.cnf.imply_eq(cond, z1, z0);
                    self.cnf.imply_lit(cond, !pp);
                }
                // Excluded by config validation.
                other => unreachable!("non-Clifford gate '{}' in gate set", other.name()),
            }
        }
    }

    pub(crate) fn assert_cx_transition(&mut self, t: usize, pair_idx: usize) {
        let (c, tgt) = self.vars.pairs[pair_idx];
        let (c, tgt) = (c as usize, tgt as usize);
        let cond = self.vars.cx[t][pair_idx];
        for i in 0..self.vars.rows {
            let xc0 = self.vars.x[t][i][c];
            let zc0 = self.vars.z[t][i][c];
            let xt0 = self.vars.x[t][i][tgt];
            let zt0 = self.vars.z[t][i][tgt];
            let xc1 = self.vars.x[t + 1][i][c];
            let zc1 = self.vars.z[t + 1][i][c];
            let xt1 = self.vars.x[t + 1][i][tgt];
            let zt1 = self.vars.z[t + 1][i][tgt];

            self.cnf.imply_eq(cond, xc1, xc0);
            self.cnf.imply_eq(cond, zt1, zt0);
            self.cnf.imply_xor_eq(cond, xt1, xt0, xc0);
            self.cnf.imply_xor_eq(cond, zc1, zc0, zt0);

            // Phase lands on the control column; the target contributes none.
            let pc = self.vars.p[t][i][c];
            let pt = self.vars.p[t][i][tgt];
            self.cnf.imply_and3_xnor_eq(cond, pc, xc0, zt0, xt0, zc0);
            self.cnf.imply_lit(cond, !pt);
        }
    }

    pub(crate) fn assert_idle(&mut self, t: usize, q: usize) {
        // idle <-> no single-qubit gate and no CNOT participation.
        let idle = self.cnf.new_var();
        let none = self.vars.g[t][q][0];
        let twoq = self.vars.twoq[t][q];
        self.cnf.add_clause(vec![!idle, none]);
        self.cnf.add_clause(vec![!idle, !twoq]);
        self.cnf.add_clause(vec![idle, !none, twoq]);

        for i in 0..self.vars.rows {
            self.cnf
                .imply_eq(idle, self.vars.x[t + 1][i][q], self.vars.x[t][i][q]);
            self.cnf
                .imply_eq(idle, self.vars.z[t + 1][i][q], self.vars.z[t][i][q]);
            self.cnf.imply_lit(idle, !self.vars.p[t][i][q]);
        }
    }

    pub(crate) fn assert_sign_chain(&mut self, t: usize) {
        for i in 0..self.vars.rows {
            let mut acc = self.vars.r[t][i];
            for q in 0..self.vars.num_qubits {
                let contribution = self.vars.p[t][i][q];
                let next = if q + 1 == self.vars.num_qubits {
                    self.vars.r[t + 1][i]
                } else {
                    self.cnf.new_var()
                };
                self.cnf.xor_eq(next, acc, contribution);
                acc = next;
            }
        }
    }

    /// All action literals of one timestep (non-identity selectors + CNOTs).
    pub(crate) fn step_action_lits(&self, t: usize) -> Vec<Lit> {
        let mut lits = vec![];
        for q in 0..self.vars.num_qubits {
            lits.extend(&self.vars.g[t][q][1..]);
        }
        lits.extend(&self.vars.cx[t]);
        lits
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::{DpllSolver, SatOracle, SolverOutcome};

    fn solve(encoding: &Encoding) -> SolverOutcome {
        DpllSolver::new().solve(&encoding.cnf)
    }

    fn config() -> SynthesisConfig {
        SynthesisConfig::default()
    }

    #[test]
    fn test_identity_reachable() {
        let t = Tableau::identity(2);
        let encoding = encode(&t, &t, &config(), 1).unwrap();
        match solve(&encoding) {
            SolverOutcome::Sat(model) => {
                // The step may carry a gate that acts trivially on the
                // stabilizer rows (e.g. Z on a Z-stabilized qubit); what
                // matters is that the folded circuit reproduces the target.
                let circuit = encoding.extract_circuit(&model).unwrap();
                let reached = Tableau::from_circuit(&circuit, false).unwrap();
                assert_eq!(reached, t);
            }
            other => panic!("expected SAT, got {other:?}"),
        }
    }

    #[test]
    fn test_single_h_target() {
        let initial = Tableau::identity(1);
        let mut target = Tableau::identity(1);
        target.apply_h(0);

        let encoding = encode(&initial, &target, &config(), 1).unwrap();
        match solve(&encoding) {
            SolverOutcome::Sat(model) => {
                let circuit = encoding.extract_circuit(&model).unwrap();
                let reached = Tableau::from_circuit(&circuit, false).unwrap();
                assert_eq!(reached, target);
            }
            other => panic!("expected SAT, got {other:?}"),
        }
    }

    #[test]
    fn test_sign_tracking_minus_z() {
        // Target -Z from +Z needs an X (or Y); one step suffices.
        let initial = Tableau::identity(1);
        let target: Tableau = "-Z".parse().unwrap();

        let encoding = encode(&initial, &target, &config(), 1).unwrap();
        match solve(&encoding) {
            SolverOutcome::Sat(model) => {
                let circuit = encoding.extract_circuit(&model).unwrap();
                let reached = Tableau::from_circuit(&circuit, false).unwrap();
                assert_eq!(reached, target);
                assert_eq!(circuit.num_gates(), 1);
            }
            other => panic!("expected SAT, got {other:?}"),
        }
    }

    #[test]
    fn test_bell_unsat_in_one_step() {
        let initial = Tableau::identity(2);
        let target: Tableau = "+XX;+ZZ".parse().unwrap();

        // Single-gate encoding: one timestep holds at most one gate, and no
        // single gate maps |00> stabilizers onto the Bell pair.
        let encoding = encode(&initial, &target, &config(), 1).unwrap();
        assert_eq!(solve(&encoding), SolverOutcome::Unsat);
    }

    #[test]
    fn test_bell_sat_in_two_steps() {
        let initial = Tableau::identity(2);
        let target: Tableau = "+XX;+ZZ".parse().unwrap();

        let encoding = encode(&initial, &target, &config(), 2).unwrap();
        match solve(&encoding) {
            SolverOutcome::Sat(model) => {
                let circuit = encoding.extract_circuit(&model).unwrap();
                let reached = Tableau::from_circuit(&circuit, false).unwrap();
                assert_eq!(reached, target);
                assert_eq!(circuit.num_gates(), 2);
            }
            other => panic!("expected SAT, got {other:?}"),
        }
    }

    #[test]
    fn test_multi_gate_parallel_hh() {
        // Targets H on both qubits: the multi-gate encoding fits both into
        // one timestep.
        let initial = Tableau::identity(2);
        let mut target = Tableau::identity(2);
        target.apply_h(0);
        target.apply_h(1);

        let mut cfg = config();
        cfg.use_multi_gate_encoding = true;
        let encoding = encode(&initial, &target, &cfg, 1).unwrap();
        match solve(&encoding) {
            SolverOutcome::Sat(model) => {
                let circuit = encoding.extract_circuit(&model).unwrap();
                let reached = Tableau::from_circuit(&circuit, false).unwrap();
                assert_eq!(reached, target);
            }
            other => panic!("expected SAT, got {other:?}"),
        }

        // The single-gate encoding cannot.
        let encoding = encode(&initial, &target, &config(), 1).unwrap();
        assert_eq!(solve(&encoding), SolverOutcome::Unsat);
    }

    #[test]
    fn test_gate_bound_cuts_solutions() {
        let initial = Tableau::identity(2);
        let target: Tableau = "+XX;+ZZ".parse().unwrap();

        let bounded = encode_with_bounds(&initial, &target, &config(), 3, Some(1), None).unwrap();
        assert_eq!(solve(&bounded), SolverOutcome::Unsat);

        let loose = encode_with_bounds(&initial, &target, &config(), 3, Some(2), None).unwrap();
        assert!(solve(&loose).is_sat());
    }

    #[test]
    fn test_coupling_restricts_pairs() {
        let initial = Tableau::identity(3);
        let mut target = Tableau::identity(3);
        target.apply_cx(0, 2);

        // Direct CX(0,2) is not available on a 0-1-2 line; the synthesizer
        // needs a longer realization.
        let mut cfg = config();
        cfg.coupling = Some(vec![(0, 1), (1, 2)]);
        let encoding = encode(&initial, &target, &cfg, 1).unwrap();
        assert_eq!(solve(&encoding), SolverOutcome::Unsat);

        // All-pairs reaches it in one step.
        let encoding = encode(&initial, &target, &config(), 1).unwrap();
        assert!(solve(&encoding).is_sat());
    }

    #[test]
    fn test_destabilizer_rows_tracked() {
        let initial = Tableau::identity_with_destabilizers(1);
        let mut target = Tableau::identity_with_destabilizers(1);
        target.apply_s(0);

        let encoding = encode(&initial, &target, &config(), 1).unwrap();
        match solve(&encoding) {
            SolverOutcome::Sat(model) => {
                let circuit = encoding.extract_circuit(&model).unwrap();
                let reached = Tableau::from_circuit(&circuit, true).unwrap();
                assert_eq!(reached, target);
                // With destabilizers the S/Sdg distinction is visible, so
                // exactly S must be chosen.
                assert_eq!(circuit.num_gates(), 1);
                assert_eq!(circuit.instructions()[0].name(), "s");
            }
            other => panic!("expected SAT, got {other:?}"),
        }
    }

    #[test]
    fn test_mismatched_tableaus_rejected() {
        let a = Tableau::identity(2);
        let b = Tableau::identity(3);
        assert!(encode(&a, &b, &config(), 1).is_err());

        let c = Tableau::identity_with_destabilizers(2);
        assert!(encode(&a, &c, &config(), 1).is_err());
    }
}
