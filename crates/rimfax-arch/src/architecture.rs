//! The device architecture: coupling graph plus derived tables.

use std::cell::OnceCell;
use std::path::Path;

use petgraph::algo::dijkstra;
use petgraph::graph::{NodeIndex, UnGraph};
use petgraph::visit::EdgeRef;
use rustc_hash::FxHashSet;
use tracing::{debug, info};

use crate::calibration::{Calibration, CalibrationRecord};
use crate::error::{ArchError, ArchResult};

/// Number of qubits up to which all-pairs distances use Floyd–Warshall.
/// Larger devices run Dijkstra from each source instead.
const FLOYD_WARSHALL_LIMIT: usize = 32;

/// An undirected coupling graph over physical qubits with optional
/// calibration data and memoized distance tables.
#[derive(Debug, Clone)]
pub struct Architecture {
    num_qubits: usize,
    graph: UnGraph<(), ()>,
    /// Canonical edge list, each `(u, v)` with `u < v`, sorted.
    edges: Vec<(u16, u16)>,
    /// Sorted neighbor list per qubit.
    adjacency: Vec<Vec<u16>>,
    calibration: Option<Calibration>,
    /// Memoized all-pairs hop distances.
    dist: OnceCell<Vec<Vec<f64>>>,
    /// Memoized all-pairs fidelity-weighted distances.
    fidelity_dist: OnceCell<Vec<Vec<f64>>>,
}

impl Architecture {
    /// Build an architecture from an explicit edge list.
    ///
    /// Edges are undirected and deduplicated; self-loops and endpoints
    /// outside `0..num_qubits` are rejected.
    pub fn from_edges(
        num_qubits: usize,
        edges: impl IntoIterator<Item = (u16, u16)>,
    ) -> ArchResult<Self> {
        let mut canonical: FxHashSet<(u16, u16)> = FxHashSet::default();
        for (u, v) in edges {
            if u == v {
                return Err(ArchError::schema(format!("self-loop on qubit {u}")));
            }
            if u as usize >= num_qubits || v as usize >= num_qubits {
                return Err(ArchError::schema(format!(
                    "edge ({u}, {v}) references a qubit outside 0..{num_qubits}"
                )));
            }
            canonical.insert((u.min(v), u.max(v)));
        }

        let mut edge_list: Vec<(u16, u16)> = canonical.into_iter().collect();
        edge_list.sort_unstable();

        let mut graph = UnGraph::default();
        for _ in 0..num_qubits {
            graph.add_node(());
        }
        let mut adjacency = vec![vec![]; num_qubits];
        for &(u, v) in &edge_list {
            graph.add_edge(NodeIndex::new(u as usize), NodeIndex::new(v as usize), ());
            adjacency[u as usize].push(v);
            adjacency[v as usize].push(u);
        }
        for neighbors in &mut adjacency {
            neighbors.sort_unstable();
        }

        debug!(num_qubits, num_edges = edge_list.len(), "architecture built");

        Ok(Self {
            num_qubits,
            graph,
            edges: edge_list,
            adjacency,
            calibration: None,
            dist: OnceCell::new(),
            fidelity_dist: OnceCell::new(),
        })
    }

    /// Load a coupling map from a file.
    ///
    /// Line 1 holds the qubit count; every further non-empty line holds one
    /// undirected `u v` edge.
    pub fn load_coupling_map(path: impl AsRef<Path>) -> ArchResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ArchError::config(format!("cannot read '{}': {e}", path.display())))?;
        let arch = Self::parse_coupling_map(&content)?;
        info!(
            path = %path.display(),
            num_qubits = arch.num_qubits,
            "coupling map loaded"
        );
        Ok(arch)
    }

    /// Parse the coupling-map format from a string.
    pub fn parse_coupling_map(content: &str) -> ArchResult<Self> {
        let mut lines = content.lines().map(str::trim).filter(|l| !l.is_empty());
        let first = lines
            .next()
            .ok_or_else(|| ArchError::schema("empty coupling map"))?;
        let num_qubits: usize = first
            .parse()
            .map_err(|_| ArchError::schema(format!("invalid qubit count '{first}'")))?;

        let mut edges = vec![];
        for line in lines {
            let mut it = line.split_whitespace();
            let (u, v) = match (it.next(), it.next(), it.next()) {
                (Some(u), Some(v), None) => (u, v),
                _ => {
                    return Err(ArchError::schema(format!("invalid edge line '{line}'")));
                }
            };
            let u: u16 = u
                .parse()
                .map_err(|_| ArchError::schema(format!("invalid qubit '{u}'")))?;
            let v: u16 = v
                .parse()
                .map_err(|_| ArchError::schema(format!("invalid qubit '{v}'")))?;
            edges.push((u, v));
        }

        Self::from_edges(num_qubits, edges)
    }

    /// Attach calibration data from a CSV file (header line optional).
    pub fn load_calibration_data(&mut self, path: impl AsRef<Path>) -> ArchResult<()> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ArchError::config(format!("cannot read '{}': {e}", path.display())))?;

        let mut records = vec![];
        for line in content.lines().map(str::trim).filter(|l| !l.is_empty()) {
            if line.starts_with("qubit") {
                continue; // header
            }
            records.push(CalibrationRecord::parse_line(line)?);
        }
        self.set_calibration(&records)?;
        info!(path = %path.display(), rows = records.len(), "calibration loaded");
        Ok(())
    }

    /// Attach calibration data from parsed records.
    ///
    /// CNOT entries for pairs that are not coupling edges are schema errors.
    pub fn set_calibration(&mut self, records: &[CalibrationRecord]) -> ArchResult<()> {
        let cal = Calibration::from_records(self.num_qubits, records)?;
        for &(u, v) in cal.cnot_error.keys() {
            if !self.has_edge(u, v) {
                return Err(ArchError::schema(format!(
                    "calibration references non-edge ({u}, {v})"
                )));
            }
        }
        self.calibration = Some(cal);
        // Weighted distances depend on the calibration; recompute on demand.
        self.fidelity_dist = OnceCell::new();
        Ok(())
    }

    // =========================================================================
    // Basic queries
    // =========================================================================

    /// Number of physical qubits.
    #[inline]
    pub fn num_qubits(&self) -> usize {
        self.num_qubits
    }

    /// The canonical sorted edge list (`u < v` per edge).
    pub fn edges(&self) -> &[(u16, u16)] {
        &self.edges
    }

    /// Sorted neighbors of a qubit.
    pub fn neighbors(&self, q: u16) -> ArchResult<&[u16]> {
        self.check_qubit(q)?;
        Ok(&self.adjacency[q as usize])
    }

    /// Degree of a qubit.
    pub fn degree(&self, q: u16) -> ArchResult<usize> {
        Ok(self.neighbors(q)?.len())
    }

    /// Check whether two qubits share a coupling edge.
    #[inline]
    pub fn has_edge(&self, u: u16, v: u16) -> bool {
        (u as usize) < self.num_qubits
            && (v as usize) < self.num_qubits
            && self.adjacency[u as usize].binary_search(&v).is_ok()
    }

    /// The attached calibration data, if any.
    pub fn calibration(&self) -> Option<&Calibration> {
        self.calibration.as_ref()
    }

    /// Fidelity-weighted cost of a coupling edge: `-ln(1 - error)`.
    ///
    /// Without calibration every edge costs 1.
    pub fn edge_cost(&self, u: u16, v: u16) -> ArchResult<f64> {
        self.check_qubit(u)?;
        self.check_qubit(v)?;
        if !self.has_edge(u, v) {
            return Err(ArchError::domain(format!("({u}, {v}) is not a coupling edge")));
        }
        Ok(self.raw_edge_cost(u, v))
    }

    fn raw_edge_cost(&self, u: u16, v: u16) -> f64 {
        match &self.calibration {
            Some(cal) => {
                let err = cal.edge_error(u, v).min(1.0 - f64::EPSILON);
                if err <= 0.0 { 1.0 } else { -(1.0 - err).ln() }
            }
            None => 1.0,
        }
    }

    fn check_qubit(&self, q: u16) -> ArchResult<()> {
        if (q as usize) < self.num_qubits {
            Ok(())
        } else {
            Err(ArchError::domain(format!(
                "qubit {q} outside device of size {}",
                self.num_qubits
            )))
        }
    }

    // =========================================================================
    // Distances
    // =========================================================================

    /// Shortest-path hop distance between two qubits.
    ///
    /// Returns `f64::INFINITY` for disconnected pairs.
    pub fn distance(&self, u: u16, v: u16) -> ArchResult<f64> {
        self.check_qubit(u)?;
        self.check_qubit(v)?;
        let table = self
            .dist
            .get_or_init(|| self.all_pairs_distances(|_, _| 1.0));
        Ok(table[u as usize][v as usize])
    }

    /// Fidelity-weighted shortest-path distance between two qubits.
    ///
    /// Edge weights are `-ln(1 - error)`; without calibration this equals the
    /// hop distance.
    pub fn fidelity_distance(&self, u: u16, v: u16) -> ArchResult<f64> {
        self.check_qubit(u)?;
        self.check_qubit(v)?;
        let table = self
            .fidelity_dist
            .get_or_init(|| self.all_pairs_distances(|a, b| self.raw_edge_cost(a, b)));
        Ok(table[u as usize][v as usize])
    }

    fn all_pairs_distances(&self, cost: impl Fn(u16, u16) -> f64) -> Vec<Vec<f64>> {
        if self.num_qubits <= FLOYD_WARSHALL_LIMIT {
            self.floyd_warshall(&cost)
        } else {
            self.dijkstra_per_source(&cost)
        }
    }

    fn floyd_warshall(&self, cost: &impl Fn(u16, u16) -> f64) -> Vec<Vec<f64>> {
        let n = self.num_qubits;
        let mut d = vec![vec![f64::INFINITY; n]; n];
        for (i, row) in d.iter_mut().enumerate() {
            row[i] = 0.0;
        }
        for &(u, v) in &self.edges {
            let w = cost(u, v);
            d[u as usize][v as usize] = w;
            d[v as usize][u as usize] = w;
        }
        for k in 0..n {
            for i in 0..n {
                if d[i][k].is_infinite() {
                    continue;
                }
                for j in 0..n {
                    let via = d[i][k] + d[k][j];
                    if via < d[i][j] {
                        d[i][j] = via;
                    }
                }
            }
        }
        d
    }

    fn dijkstra_per_source(&self, cost: &impl Fn(u16, u16) -> f64) -> Vec<Vec<f64>> {
        let n = self.num_qubits;
        let mut d = vec![vec![f64::INFINITY; n]; n];
        for src in 0..n {
            let reached = dijkstra(&self.graph, NodeIndex::new(src), None, |e| {
                cost(e.source().index() as u16, e.target().index() as u16)
            });
            for (node, w) in reached {
                d[src][node.index()] = w;
            }
        }
        d
    }

    // =========================================================================
    // Connected subsets
    // =========================================================================

    /// Enumerate all size-`k` vertex subsets inducing a connected subgraph.
    ///
    /// The enumeration grows subsets breadth-first from each anchor vertex,
    /// only ever adding vertices larger than the anchor, so every subset is
    /// produced exactly once; results are sorted lexicographically.
    pub fn connected_subsets(&self, k: usize) -> ArchResult<Vec<Vec<u16>>> {
        if k == 0 || k > self.num_qubits {
            return Err(ArchError::domain(format!(
                "subset size {k} outside 1..={}",
                self.num_qubits
            )));
        }

        let mut out: Vec<Vec<u16>> = vec![];
        for anchor in 0..self.num_qubits as u16 {
            let mut frontier: FxHashSet<Vec<u16>> = FxHashSet::default();
            frontier.insert(vec![anchor]);

            for _ in 1..k {
                let mut next: FxHashSet<Vec<u16>> = FxHashSet::default();
                for subset in &frontier {
                    for &member in subset {
                        for &nb in &self.adjacency[member as usize] {
                            if nb <= anchor || subset.binary_search(&nb).is_ok() {
                                continue;
                            }
                            let mut grown = subset.clone();
                            let pos = grown.binary_search(&nb).unwrap_err();
                            grown.insert(pos, nb);
                            next.insert(grown);
                        }
                    }
                }
                frontier = next;
                if frontier.is_empty() {
                    break;
                }
            }

            out.extend(frontier);
        }

        out.sort_unstable();
        Ok(out)
    }

    /// Induced subgraph edge sets, one per connected size-`k` subset, in the
    /// same order as [`connected_subsets`](Self::connected_subsets).
    pub fn reduced_coupling_maps(&self, k: usize) -> ArchResult<Vec<Vec<(u16, u16)>>> {
        let subsets = self.connected_subsets(k)?;
        Ok(subsets.iter().map(|s| self.induced_edges(s)).collect())
    }

    fn induced_edges(&self, subset: &[u16]) -> Vec<(u16, u16)> {
        self.edges
            .iter()
            .copied()
            .filter(|&(u, v)| subset.binary_search(&u).is_ok() && subset.binary_search(&v).is_ok())
            .collect()
    }

    /// The connected size-`k` subset minimizing summed weighted edge cost,
    /// ties broken by the lexicographically smallest vertex set.
    pub fn highest_fidelity_subset(&self, k: usize) -> ArchResult<Vec<u16>> {
        let subsets = self.connected_subsets(k)?;
        let mut best: Option<(f64, Vec<u16>)> = None;
        for subset in subsets {
            let cost: f64 = self
                .induced_edges(&subset)
                .iter()
                .map(|&(u, v)| self.raw_edge_cost(u, v))
                .sum();
            // Subsets arrive lexicographically sorted; a strict comparison
            // keeps the smallest set on ties.
            if best.as_ref().is_none_or(|(c, _)| cost < *c) {
                best = Some((cost, subset));
            }
        }
        best.map(|(_, s)| s)
            .ok_or_else(|| ArchError::domain(format!("no connected subset of size {k}")))
    }

    /// The induced coupling map of [`highest_fidelity_subset`](Self::highest_fidelity_subset).
    pub fn highest_fidelity_coupling_map(&self, k: usize) -> ArchResult<Vec<(u16, u16)>> {
        let subset = self.highest_fidelity_subset(k)?;
        Ok(self.induced_edges(&subset))
    }

    // =========================================================================
    // Factories
    // =========================================================================

    /// Create a linear coupling map (0-1-2-...).
    pub fn linear(n: usize) -> Self {
        let edges = (0..n.saturating_sub(1)).map(|i| (i as u16, i as u16 + 1));
        Self::from_edges(n, edges).expect("linear edges are well-formed")
    }

    /// Create a fully connected coupling map.
    pub fn full(n: usize) -> Self {
        let mut edges = vec![];
        for i in 0..n as u16 {
            for j in (i + 1)..n as u16 {
                edges.push((i, j));
            }
        }
        Self::from_edges(n, edges).expect("full edges are well-formed")
    }

    /// Create a star topology (center qubit connected to all others).
    pub fn star(n: usize) -> Self {
        let edges = (1..n as u16).map(|i| (0, i));
        Self::from_edges(n, edges).expect("star edges are well-formed")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// IBM Q London: 5 qubits, T-shaped coupling.
    fn london() -> Architecture {
        Architecture::from_edges(5, [(0, 1), (1, 2), (1, 3), (3, 4)]).unwrap()
    }

    #[test]
    fn test_self_loop_rejected() {
        let result = Architecture::from_edges(3, [(0, 0)]);
        assert!(matches!(result, Err(ArchError::Schema(_))));
    }

    #[test]
    fn test_out_of_range_edge_rejected() {
        let result = Architecture::from_edges(3, [(0, 5)]);
        assert!(matches!(result, Err(ArchError::Schema(_))));
    }

    #[test]
    fn test_duplicate_edges_collapse() {
        let arch = Architecture::from_edges(3, [(0, 1), (1, 0), (0, 1)]).unwrap();
        assert_eq!(arch.edges(), &[(0, 1)]);
    }

    #[test]
    fn test_parse_coupling_map() {
        let arch = Architecture::parse_coupling_map("4\n0 1\n1 2\n2 3\n").unwrap();
        assert_eq!(arch.num_qubits(), 4);
        assert_eq!(arch.edges(), &[(0, 1), (1, 2), (2, 3)]);
    }

    #[test]
    fn test_parse_coupling_map_bad_line() {
        assert!(Architecture::parse_coupling_map("3\n0 1 2\n").is_err());
    }

    #[test]
    fn test_distances_linear() {
        let arch = Architecture::linear(4);
        assert_eq!(arch.distance(0, 0).unwrap(), 0.0);
        assert_eq!(arch.distance(0, 3).unwrap(), 3.0);
        assert_eq!(arch.distance(3, 0).unwrap(), 3.0);
    }

    #[test]
    fn test_distance_disconnected() {
        let arch = Architecture::from_edges(4, [(0, 1), (2, 3)]).unwrap();
        assert!(arch.distance(0, 3).unwrap().is_infinite());
    }

    #[test]
    fn test_distance_domain_error() {
        let arch = Architecture::linear(3);
        assert!(matches!(arch.distance(0, 9), Err(ArchError::Domain(_))));
    }

    #[test]
    fn test_dijkstra_matches_floyd_warshall() {
        // 40 qubits forces the Dijkstra path; compare against a small ring
        // computed both ways by checking hand-known distances.
        let arch = Architecture::linear(40);
        assert_eq!(arch.distance(0, 39).unwrap(), 39.0);
        assert_eq!(arch.distance(10, 20).unwrap(), 10.0);
    }

    #[test]
    fn test_connected_subsets_counts() {
        let arch = london();
        // |subsets(1)| = n, |subsets(2)| = #edges for the T shape, |subsets(n)| = 1.
        assert_eq!(arch.connected_subsets(1).unwrap().len(), 5);
        assert_eq!(arch.connected_subsets(2).unwrap().len(), 4);
        assert_eq!(arch.connected_subsets(5).unwrap().len(), 1);
    }

    #[test]
    fn test_connected_subsets_content() {
        let arch = london();
        let pairs = arch.connected_subsets(2).unwrap();
        assert_eq!(
            pairs,
            vec![vec![0, 1], vec![1, 2], vec![1, 3], vec![3, 4]]
        );
        let triples = arch.connected_subsets(3).unwrap();
        assert!(triples.contains(&vec![0, 1, 2]));
        assert!(triples.contains(&vec![1, 3, 4]));
        assert!(!triples.contains(&vec![0, 2, 4]));
    }

    #[test]
    fn test_connected_subsets_domain() {
        let arch = london();
        assert!(arch.connected_subsets(0).is_err());
        assert!(arch.connected_subsets(6).is_err());
    }

    #[test]
    fn test_reduced_coupling_maps() {
        let arch = london();
        let maps = arch.reduced_coupling_maps(3).unwrap();
        let subsets = arch.connected_subsets(3).unwrap();
        assert_eq!(maps.len(), subsets.len());
        let idx = subsets.iter().position(|s| s == &vec![0, 1, 2]).unwrap();
        assert_eq!(maps[idx], vec![(0, 1), (1, 2)]);
    }

    #[test]
    fn test_highest_fidelity_duality() {
        let arch = london();
        assert_eq!(
            arch.highest_fidelity_coupling_map(5).unwrap(),
            arch.edges().to_vec()
        );
    }

    #[test]
    fn test_highest_fidelity_prefers_good_edge() {
        // 4-qubit chain, edge (2,3) error 0.6, all others 0.9.
        let mut arch = Architecture::linear(4);
        let records = vec![
            CalibrationRecord::parse_line("0, 0.0, 0.0, 1.0, 1.0, 1:0.9").unwrap(),
            CalibrationRecord::parse_line("1, 0.0, 0.0, 1.0, 1.0, 0:0.9;2:0.9").unwrap(),
            CalibrationRecord::parse_line("2, 0.0, 0.0, 1.0, 1.0, 1:0.9;3:0.6").unwrap(),
            CalibrationRecord::parse_line("3, 0.0, 0.0, 1.0, 1.0, 2:0.6").unwrap(),
        ];
        arch.set_calibration(&records).unwrap();
        assert_eq!(arch.highest_fidelity_coupling_map(2).unwrap(), vec![(2, 3)]);
        assert_eq!(arch.highest_fidelity_subset(2).unwrap(), vec![2, 3]);
    }

    #[test]
    fn test_calibration_non_edge_rejected() {
        let mut arch = Architecture::linear(4);
        let records = vec![CalibrationRecord::parse_line("0, 0.0, 0.0, 1.0, 1.0, 3:0.1").unwrap()];
        assert!(matches!(
            arch.set_calibration(&records),
            Err(ArchError::Schema(_))
        ));
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn subset_counts_on_factories(n in 1usize..8) {
                for arch in [Architecture::linear(n), Architecture::star(n), Architecture::full(n)] {
                    prop_assert_eq!(arch.connected_subsets(1).unwrap().len(), n);
                    prop_assert_eq!(arch.connected_subsets(n).unwrap().len(), 1);
                    prop_assert_eq!(
                        arch.highest_fidelity_coupling_map(n).unwrap(),
                        arch.edges().to_vec()
                    );
                }
            }

            #[test]
            fn distance_is_symmetric(n in 2usize..8, u in 0u16..8, v in 0u16..8) {
                prop_assume!((u as usize) < n && (v as usize) < n);
                let arch = Architecture::linear(n);
                prop_assert_eq!(arch.distance(u, v).unwrap(), arch.distance(v, u).unwrap());
            }
        }
    }

    #[test]
    fn test_fidelity_distance_prefers_reliable_path() {
        // Square 0-1-2-3-0 where the 0-1 edge is noisy: the weighted distance
        // from 0 to 2 should route around it.
        let mut arch = Architecture::from_edges(4, [(0, 1), (1, 2), (2, 3), (0, 3)]).unwrap();
        let records = vec![
            CalibrationRecord::parse_line("0, 0.0, 0.0, 1.0, 1.0, 1:0.5;3:0.01").unwrap(),
            CalibrationRecord::parse_line("1, 0.0, 0.0, 1.0, 1.0, 2:0.01").unwrap(),
            CalibrationRecord::parse_line("2, 0.0, 0.0, 1.0, 1.0, 3:0.01").unwrap(),
        ];
        arch.set_calibration(&records).unwrap();

        let via_noisy = arch.edge_cost(0, 1).unwrap() + arch.edge_cost(1, 2).unwrap();
        let via_clean = arch.edge_cost(0, 3).unwrap() + arch.edge_cost(2, 3).unwrap();
        assert!(via_clean < via_noisy);
        assert!((arch.fidelity_distance(0, 2).unwrap() - via_clean).abs() < 1e-12);
    }
}
