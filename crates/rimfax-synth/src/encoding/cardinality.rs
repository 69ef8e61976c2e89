//! Cardinality constraints with commander-style grouping.
//!
//! Counts are encoded as sorted unary counters merged along a tree whose
//! shape is set by the [`CommanderGrouping`]: the counter outputs act as the
//! commander variables of their group. Only the "forbid high counts"
//! direction is emitted, which is all the encoder needs.

use crate::config::CommanderGrouping;
use crate::encoding::cnf::{Cnf, Lit};

/// Forbid more than one of `lits` being true.
pub fn at_most_one(cnf: &mut Cnf, lits: &[Lit], grouping: CommanderGrouping) {
    if lits.len() <= 4 {
        pairwise(cnf, lits);
        return;
    }
    at_most_k(cnf, lits, 1, grouping);
}

/// Require at least one of `lits`.
pub fn at_least_one(cnf: &mut Cnf, lits: &[Lit]) {
    cnf.add_clause(lits.to_vec());
}

/// Require exactly one of `lits`.
pub fn exactly_one(cnf: &mut Cnf, lits: &[Lit], grouping: CommanderGrouping) {
    at_least_one(cnf, lits);
    at_most_one(cnf, lits, grouping);
}

/// Forbid more than `k` of `lits` being true.
pub fn at_most_k(cnf: &mut Cnf, lits: &[Lit], k: usize, grouping: CommanderGrouping) {
    if lits.len() <= k {
        return;
    }
    if k == 0 {
        for &lit in lits {
            cnf.assert_lit(!lit);
        }
        return;
    }

    let cap = k + 1;
    let mut nodes: Vec<Vec<Lit>> = lits.iter().map(|&l| vec![l]).collect();
    while nodes.len() > 1 {
        let group = grouping.group_size(nodes.len()).max(2);
        let mut next = vec![];
        for chunk in nodes.chunks(group) {
            let mut merged = chunk[0].clone();
            for counter in &chunk[1..] {
                merged = merge(cnf, &merged, counter, cap);
            }
            next.push(merged);
        }
        nodes = next;
    }

    let total = &nodes[0];
    if total.len() >= cap {
        // The top output asserts "count >= k+1".
        cnf.assert_lit(!total[cap - 1]);
    }
}

fn pairwise(cnf: &mut Cnf, lits: &[Lit]) {
    for (i, &a) in lits.iter().enumerate() {
        for &b in &lits[i + 1..] {
            cnf.add_clause(vec![!a, !b]);
        }
    }
}

/// Merge two sorted unary counters, clamped at `cap` outputs.
///
/// Output bit `o[i]` means "count >= i+1". Sums that overflow the clamp are
/// forbidden outright, which is sound below an at-most-k assertion.
fn merge(cnf: &mut Cnf, a: &[Lit], b: &[Lit], cap: usize) -> Vec<Lit> {
    let out_len = (a.len() + b.len()).min(cap);
    let out: Vec<Lit> = (0..out_len).map(|_| cnf.new_var()).collect();

    for (i, &ai) in a.iter().enumerate() {
        if i < out_len {
            cnf.add_clause(vec![!ai, out[i]]);
        } else {
            cnf.assert_lit(!ai);
        }
    }
    for (j, &bj) in b.iter().enumerate() {
        if j < out_len {
            cnf.add_clause(vec![!bj, out[j]]);
        } else {
            cnf.assert_lit(!bj);
        }
    }
    for (i, &ai) in a.iter().enumerate() {
        for (j, &bj) in b.iter().enumerate() {
            let idx = i + j + 1;
            if idx < out_len {
                cnf.add_clause(vec![!ai, !bj, out[idx]]);
            } else {
                cnf.add_clause(vec![!ai, !bj]);
            }
        }
    }
    out
}
