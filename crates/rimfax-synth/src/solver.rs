//! The SAT oracle interface and the built-in DPLL backend.

use std::time::{Duration, Instant};

use crate::encoding::cnf::{Cnf, Lit, Model};

/// Outcome of one oracle invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SolverOutcome {
    /// Satisfiable, with a model.
    Sat(Model),
    /// Proven unsatisfiable.
    Unsat,
    /// The oracle gave up (timeout or resource limit).
    Unknown,
}

impl SolverOutcome {
    /// Whether the outcome is SAT.
    pub fn is_sat(&self) -> bool {
        matches!(self, SolverOutcome::Sat(_))
    }
}

/// The abstract SAT back end.
///
/// The optimization driver only ever talks to this interface; swapping in an
/// external solver is a matter of implementing it.
pub trait SatOracle {
    /// Decide a formula.
    fn solve(&mut self, cnf: &Cnf) -> SolverOutcome;

    /// Bound the wall time of subsequent [`solve`](Self::solve) calls.
    fn set_timeout(&mut self, timeout: Option<Duration>);
}

/// A compact DPLL solver with two-watched-literal unit propagation and
/// chronological backtracking.
///
/// Decisions pick the lowest unassigned variable and try `false` first, so
/// models (and therefore synthesized circuits) are deterministic.
#[derive(Debug, Default)]
pub struct DpllSolver {
    timeout: Option<Duration>,
}

impl DpllSolver {
    /// Create a solver with no timeout.
    pub fn new() -> Self {
        Self::default()
    }
}

impl SatOracle for DpllSolver {
    fn solve(&mut self, cnf: &Cnf) -> SolverOutcome {
        Search::new(cnf, self.timeout).run()
    }

    fn set_timeout(&mut self, timeout: Option<Duration>) {
        self.timeout = timeout;
    }
}

const UNASSIGNED: u8 = 2;

/// Watched-literal index: `2 * var + polarity`.
#[inline]
fn code(lit: Lit) -> usize {
    (lit.var() as usize) * 2 + usize::from(lit.is_positive())
}

struct Search {
    clauses: Vec<Vec<Lit>>,
    /// For each literal code, the clauses watching that literal.
    watches: Vec<Vec<usize>>,
    /// Assignment per variable: 0 false, 1 true, 2 unassigned.
    assign: Vec<u8>,
    /// Assigned variables in order.
    trail: Vec<u32>,
    /// Decision stack: (trail length before, decided var, tried both).
    decisions: Vec<(usize, u32, bool)>,
    /// Next trail index to propagate.
    prop_head: usize,
    deadline: Option<Instant>,
    steps: u64,
    /// Empty clause or contradictory units in the input.
    root_conflict: bool,
}

impl Search {
    fn new(cnf: &Cnf, timeout: Option<Duration>) -> Self {
        let num_vars = cnf.num_vars() as usize;
        let mut search = Self {
            clauses: vec![],
            watches: vec![vec![]; 2 * num_vars],
            assign: vec![UNASSIGNED; num_vars],
            trail: vec![],
            decisions: vec![],
            prop_head: 0,
            deadline: timeout.map(|t| Instant::now() + t),
            steps: 0,
            root_conflict: false,
        };

        for clause in cnf.clauses() {
            match clause.len() {
                0 => search.root_conflict = true,
                1 => {
                    if !search.enqueue(clause[0]) {
                        search.root_conflict = true;
                    }
                }
                _ => {
                    let idx = search.clauses.len();
                    search.clauses.push(clause.clone());
                    search.watches[code(clause[0])].push(idx);
                    search.watches[code(clause[1])].push(idx);
                }
            }
        }
        search
    }

    #[inline]
    fn value(&self, lit: Lit) -> u8 {
        let v = self.assign[lit.var() as usize];
        if v == UNASSIGNED {
            UNASSIGNED
        } else if lit.is_positive() {
            v
        } else {
            1 - v
        }
    }

    /// Assign a literal true; `false` on conflict with the current value.
    fn enqueue(&mut self, lit: Lit) -> bool {
        match self.value(lit) {
            1 => true,
            0 => false,
            _ => {
                self.assign[lit.var() as usize] = u8::from(lit.is_positive());
                self.trail.push(lit.var());
                true
            }
        }
    }

    /// Propagate all pending assignments. Returns `false` on conflict.
    fn propagate(&mut self) -> bool {
        while self.prop_head < self.trail.len() {
            let var = self.trail[self.prop_head];
            self.prop_head += 1;
            let assigned_true = if self.assign[var as usize] == 1 {
                Lit::pos(var)
            } else {
                Lit::neg(var)
            };
            // Clauses watching the now-false literal must find a new watch.
            let falsified = code(!assigned_true);
            let mut idx = 0;
            while idx < self.watches[falsified].len() {
                let clause_idx = self.watches[falsified][idx];
                if self.update_watch(clause_idx, !assigned_true) {
                    // Watch moved away; the list shrank in place.
                    self.watches[falsified].swap_remove(idx);
                } else {
                    idx += 1;
                    if self.clause_conflicts(clause_idx) {
                        return false;
                    }
                }
            }
        }
        true
    }

    /// Try to move the watch of `clause_idx` away from `watched` (which is
    /// now false). Returns `true` if the watch moved.
    fn update_watch(&mut self, clause_idx: usize, watched: Lit) -> bool {
        let clause = &mut self.clauses[clause_idx];
        let pos = clause
            .iter()
            .position(|&l| l == watched)
            .expect("watched literal must be in clause");
        // Normalize: watched literals live at slots 0 and 1.
        clause.swap(pos, 0);

        for i in 2..clause.len() {
            let candidate = clause[i];
            let val = if self.assign[candidate.var() as usize] == UNASSIGNED {
                UNASSIGNED
            } else if candidate.is_positive() {
                self.assign[candidate.var() as usize]
            } else {
                1 - self.assign[candidate.var() as usize]
            };
            if val != 0 {
                clause.swap(0, i);
                let new_watch = clause[0];
                self.watches[code(new_watch)].push(clause_idx);
                return true;
            }
        }
        false
    }

    /// With slot-0 false and no replacement found: the clause is unit on
    /// slot 1 (enqueue) or conflicting.
    fn clause_conflicts(&mut self, clause_idx: usize) -> bool {
        let other = self.clauses[clause_idx][1];
        match self.value(other) {
            1 => false,
            0 => true,
            _ => !self.enqueue(other),
        }
    }

    fn backtrack_to(&mut self, mark: usize) {
        while self.trail.len() > mark {
            let var = self.trail.pop().expect("trail underflow");
            self.assign[var as usize] = UNASSIGNED;
        }
        self.prop_head = mark;
    }

    fn expired(&mut self) -> bool {
        self.steps += 1;
        if self.steps % 4096 != 0 {
            return false;
        }
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    fn run(mut self) -> SolverOutcome {
        if self.root_conflict {
            return SolverOutcome::Unsat;
        }

        loop {
            if self.expired() {
                return SolverOutcome::Unknown;
            }

            if self.propagate() {
                // Decision: lowest unassigned variable, false first.
                match self.assign.iter().position(|&v| v == UNASSIGNED) {
                    Some(var) => {
                        let var = var as u32;
                        self.decisions.push((self.trail.len(), var, false));
                        let ok = self.enqueue(Lit::neg(var));
                        debug_assert!(ok, "fresh decision cannot conflict");
                    }
                    None => {
                        let model: Model = self.assign.iter().map(|&v| v == 1).collect();
                        return SolverOutcome::Sat(model);
                    }
                }
            } else {
                // Conflict: flip the most recent un-flipped decision.
                loop {
                    match self.decisions.pop() {
                        None => return SolverOutcome::Unsat,
                        Some((mark, var, true)) => {
                            self.backtrack_to(mark);

                            // Both polarities failed; keep unwinding.
                            let _ = var;
                        }
                        Some((mark, var, false)) => {
                            self.backtrack_to(mark);
                            self.decisions.push((mark, var, true));
                            let ok = self.enqueue(Lit::pos(var));
                            debug_assert!(ok, "flipped decision cannot conflict");
                            break;
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lits(ls: &[i32]) -> Vec<Lit> {
        ls.iter()
            .map(|&l| {
                let var = (l.unsigned_abs()) - 1;
                if l > 0 { Lit::pos(var) } else { Lit::neg(var) }
            })
            .collect()
    }

    fn check(cnf: &Cnf, model: &Model) -> bool {
        cnf.clauses()
            .iter()
            .all(|cl| cl.iter().any(|l| l.eval(model)))
    }

    #[test]
    fn test_empty_formula_is_sat() {
        let cnf = Cnf::new();
        assert!(DpllSolver::new().solve(&cnf).is_sat());
    }

    #[test]
    fn test_unit_clauses() {
        let mut cnf = Cnf::new();
        let a = cnf.new_var();
        let b = cnf.new_var();
        cnf.assert_lit(a);
        cnf.assert_lit(!b);

        match DpllSolver::new().solve(&cnf) {
            SolverOutcome::Sat(model) => {
                assert!(model[0]);
                assert!(!model[1]);
            }
            other => panic!("expected SAT, got {other:?}"),
        }
    }

    #[test]
    fn test_contradictory_units_unsat() {
        let mut cnf = Cnf::new();
        let a = cnf.new_var();
        cnf.assert_lit(a);
        cnf.assert_lit(!a);
        assert_eq!(DpllSolver::new().solve(&cnf), SolverOutcome::Unsat);
    }

    #[test]
    fn test_simple_sat_instance() {
        // (a | b) & (!a | c) & (!b | !c) & (a | c)
        let mut cnf = Cnf::new();
        for _ in 0..3 {
            cnf.new_var();
        }
        cnf.add_clause(lits(&[1, 2]));
        cnf.add_clause(lits(&[-1, 3]));
        cnf.add_clause(lits(&[-2, -3]));
        cnf.add_clause(lits(&[1, 3]));

        match DpllSolver::new().solve(&cnf) {
            SolverOutcome::Sat(model) => assert!(check(&cnf, &model)),
            other => panic!("expected SAT, got {other:?}"),
        }
    }

    #[test]
    fn test_pigeonhole_unsat() {
        // 3 pigeons, 2 holes: p[i][h] with i in 0..3, h in 0..2.
        let mut cnf = Cnf::new();
        let mut p = vec![];
        for _ in 0..3 {
            let row = [cnf.new_var(), cnf.new_var()];
            cnf.add_clause(vec![row[0], row[1]]);
            p.push(row);
        }
        for h in 0..2 {
            for i in 0..3 {
                for j in (i + 1)..3 {
                    cnf.add_clause(vec![!p[i][h], !p[j][h]]);
                }
            }
        }
        assert_eq!(DpllSolver::new().solve(&cnf), SolverOutcome::Unsat);
    }

    #[test]
    fn test_xor_chain_sat() {
        let mut cnf = Cnf::new();
        let a = cnf.new_var();
        let b = cnf.new_var();
        let c = cnf.new_var();
        cnf.xor_eq(c, a, b);
        cnf.assert_lit(c);
        cnf.assert_lit(a);

        match DpllSolver::new().solve(&cnf) {
            SolverOutcome::Sat(model) => {
                assert!(model[2] && model[0] && !model[1]);
            }
            other => panic!("expected SAT, got {other:?}"),
        }
    }

    #[test]
    fn test_deterministic_model() {
        let mut cnf = Cnf::new();
        let a = cnf.new_var();
        let b = cnf.new_var();
        cnf.add_clause(vec![a, b]);

        let first = DpllSolver::new().solve(&cnf);
        let second = DpllSolver::new().solve(&cnf);
        assert_eq!(first, second);
        // False-first decisions leave `a` false and force `b`.
        match first {
            SolverOutcome::Sat(model) => assert_eq!(model, vec![false, true]),
            other => panic!("expected SAT, got {other:?}"),
        }
    }
}
