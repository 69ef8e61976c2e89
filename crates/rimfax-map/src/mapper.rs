//! The heuristic mapping engine.

use std::time::Instant;

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rustc_hash::FxHashMap;
use tracing::{debug, info};

use rimfax_arch::Architecture;
use rimfax_ir::{Circuit, Instruction, InstructionKind, QubitId};

use crate::error::{MapError, MapResult};
use crate::layering::{Layer, slice_into_layers};
use crate::layout::Layout;
use crate::results::{MappingResults, MappingStatus};
use crate::search::{Action, HeapEntry, NodeArena, OpenList, SearchNode};
use crate::settings::{InitialLayoutStrategy, MappingSettings};

/// Cost of a SWAP in primitive two-qubit gate units.
const SWAP_COST: f64 = 3.0;
/// Cost of a teleportation in primitive gate units.
const TELEPORT_COST: f64 = 7.0;
/// Lower-bound inflation factor in the non-admissible mode.
const INFLATION: f64 = 1.5;
/// Slack for floating-point cost comparisons in the dedup map.
const COST_EPS: f64 = 1e-9;

/// A teleportation channel: an entangled ancilla pair.
///
/// The halves stay reserved for the whole run; a teleport moves a state from
/// a neighbor of one half onto the other half.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct TeleportChannel {
    half_a: u16,
    half_b: u16,
}

/// Result of a mapping run: the routed circuit plus statistics.
#[derive(Debug, Clone)]
pub struct MappingOutcome {
    /// The routed circuit over physical qubits.
    pub circuit: Circuit,
    /// Statistics and layouts.
    pub results: MappingResults,
}

/// Heuristic mapper binding a circuit to a target architecture.
pub struct HeuristicMapper<'a> {
    circuit: &'a Circuit,
    arch: &'a Architecture,
}

impl<'a> HeuristicMapper<'a> {
    /// Create a mapper for a circuit/architecture pair.
    pub fn new(circuit: &'a Circuit, arch: &'a Architecture) -> MapResult<Self> {
        if circuit.num_qubits() > arch.num_qubits() {
            return Err(MapError::CircuitTooLarge {
                required: circuit.num_qubits(),
                available: arch.num_qubits(),
            });
        }
        if arch.num_qubits() > u8::MAX as usize {
            return Err(MapError::Config(format!(
                "devices above {} qubits are not supported by the layout encoding",
                u8::MAX
            )));
        }
        if circuit.iter().any(Instruction::is_teleport) {
            return Err(MapError::Config(
                "input circuit already contains teleportation operations".into(),
            ));
        }
        Ok(Self { circuit, arch })
    }

    /// Map the circuit under the given settings.
    pub fn map(&self, settings: &MappingSettings) -> MapResult<MappingOutcome> {
        settings.validate(self.circuit.num_qubits(), self.arch.num_qubits())?;
        let layers = slice_into_layers(self.circuit, settings.layering_strategy)?;

        let mut router = Router::new(self.circuit, self.arch, settings)?;
        router.run(&layers)
    }
}

/// Why a layer search stopped without a goal.
enum LayerAbort {
    Exhausted,
    Deadline,
}

/// Per-run state of the routing loop.
struct Router<'a> {
    circuit: &'a Circuit,
    arch: &'a Architecture,
    settings: &'a MappingSettings,
    layout: Layout,
    /// First physical position each logical qubit was bound to.
    first_position: Vec<Option<u16>>,
    channels: Vec<TeleportChannel>,
    channels_active: bool,
    /// Hop distances on the coupling augmented with teleport shortcuts.
    aug_dist: Vec<Vec<f64>>,
    /// Cheapest possible swap unit, for the admissible bound.
    min_swap_cost: f64,
    out: Circuit,
    swaps: usize,
    teleports: usize,
    arena: NodeArena,
    start: Instant,
}

impl<'a> Router<'a> {
    fn new(
        circuit: &'a Circuit,
        arch: &'a Architecture,
        settings: &'a MappingSettings,
    ) -> MapResult<Self> {
        let start = Instant::now();
        let n_log = circuit.num_qubits();
        let n_phys = arch.num_qubits();

        let (channels, channels_active, layout) = if settings.teleportation_qubits > 0 {
            let (channels, layout) = draw_channels(circuit, arch, settings);
            (channels, !settings.teleportation_fake, layout)
        } else {
            let layout = seed_layout(circuit, arch, settings)?;
            (vec![], false, layout)
        };

        let mut first_position = vec![None; n_log];
        for l in 0..n_log as u16 {
            first_position[l as usize] = layout.physical(l);
        }

        let aug_dist = augmented_distances(arch, &channels, channels_active);

        let mut min_swap_cost = if settings.consider_fidelity {
            let min_w = arch
                .edges()
                .iter()
                .map(|&(u, v)| arch.edge_cost(u, v).unwrap_or(1.0))
                .fold(f64::INFINITY, f64::min);
            SWAP_COST * if min_w.is_finite() { min_w } else { 1.0 }
        } else {
            SWAP_COST
        };
        if channels_active {
            // Teleport hops in the augmented distance are cheaper-bounded too.
            min_swap_cost = min_swap_cost.min(TELEPORT_COST);
        }

        let out = Circuit::with_size(
            format!("{}_mapped", circuit.name()),
            n_phys as u32,
            circuit.num_clbits() as u32,
        );

        Ok(Self {
            circuit,
            arch,
            settings,
            layout,
            first_position,
            channels,
            channels_active,
            aug_dist,
            min_swap_cost,
            out,
            swaps: 0,
            teleports: 0,
            arena: NodeArena::new(),
            start,
        })
    }

    fn expired(&self) -> bool {
        self.settings
            .deadline
            .is_some_and(|d| self.start.elapsed() >= d)
    }

    fn run(&mut self, layers: &[Layer]) -> MapResult<MappingOutcome> {
        let mut status = MappingStatus::Ok;

        for (layer_idx, layer) in layers.iter().enumerate() {
            if self.expired() {
                status = MappingStatus::TimedOut;
                break;
            }

            let gates = self.layer_gates(layer);
            self.check_routable(&gates)?;

            if !self.satisfied(&gates) {
                match self.route_layer(&gates) {
                    Ok(actions) => {
                        if self.settings.verbose {
                            info!(
                                layer = layer_idx,
                                actions = actions.len(),
                                nodes = self.arena.len(),
                                "layer routed"
                            );
                        } else {
                            debug!(layer = layer_idx, actions = actions.len(), "layer routed");
                        }
                        for action in actions {
                            self.apply_action(action)?;
                        }
                    }
                    Err(LayerAbort::Deadline) => {
                        status = MappingStatus::TimedOut;
                        break;
                    }
                    Err(LayerAbort::Exhausted) => {
                        return Err(MapError::Routing(format!(
                            "search exhausted without satisfying layer {layer_idx}"
                        )));
                    }
                }
            }

            self.emit_layer(layer)?;
        }

        let results = MappingResults {
            input_gates: self.circuit.num_gates(),
            output_gates: self.out.num_gates(),
            swaps: self.swaps,
            teleportations: self.teleports,
            depth: self.out.depth(),
            runtime_seconds: self.start.elapsed().as_secs_f64(),
            fidelity: self.fidelity(),
            initial_layout: self
                .first_position
                .iter()
                .map(|p| p.map_or(-1, i32::from))
                .collect(),
            output_layout: self.layout.as_report_vec(),
            status,
        };

        info!(
            swaps = results.swaps,
            teleportations = results.teleportations,
            depth = results.depth,
            "mapping finished"
        );

        Ok(MappingOutcome {
            circuit: self.out.clone(),
            results,
        })
    }

    /// Two-qubit gates of a layer as logical index pairs.
    fn layer_gates(&self, layer: &Layer) -> Vec<(u16, u16)> {
        layer
            .iter()
            .map(|&idx| &self.circuit.instructions()[idx])
            .filter(|inst| inst.is_two_qubit_gate())
            .map(|inst| (inst.qubits[0].0 as u16, inst.qubits[1].0 as u16))
            .collect()
    }

    /// Mapped gate pairs must be connectable at all.
    fn check_routable(&self, gates: &[(u16, u16)]) -> MapResult<()> {
        for &(a, b) in gates {
            if let (Some(pa), Some(pb)) = (self.layout.physical(a), self.layout.physical(b)) {
                if self.aug_dist[pa as usize][pb as usize].is_infinite() {
                    return Err(MapError::Routing(format!(
                        "no path between physical qubits {pa} and {pb} for gate (q{a}, q{b})"
                    )));
                }
            }
        }
        Ok(())
    }

    fn satisfied(&self, gates: &[(u16, u16)]) -> bool {
        gates.iter().all(|&(a, b)| {
            match (self.layout.physical(a), self.layout.physical(b)) {
                (Some(pa), Some(pb)) => self.arch.has_edge(pa, pb),
                _ => false,
            }
        })
    }

    fn goal(&self, layout: &Layout, gates: &[(u16, u16)]) -> bool {
        gates.iter().all(|&(a, b)| {
            match (layout.physical(a), layout.physical(b)) {
                (Some(pa), Some(pb)) => self.arch.has_edge(pa, pb),
                _ => false,
            }
        })
    }

    /// Admissible lower bound on the remaining routing cost of a layer.
    fn heuristic(&self, layout: &Layout, gates: &[(u16, u16)]) -> f64 {
        let mut bound = 0.0;
        for &(a, b) in gates {
            let (Some(pa), Some(pb)) = (layout.physical(a), layout.physical(b)) else {
                continue;
            };
            let d = self.aug_dist[pa as usize][pb as usize];
            if d.is_infinite() {
                return f64::INFINITY;
            }
            if d > 1.0 {
                bound += (d - 1.0) * self.min_swap_cost;
            }
        }
        if self.settings.admissible_heuristic {
            bound
        } else {
            bound * INFLATION
        }
    }

    fn swap_cost(&self, u: u16, v: u16) -> f64 {
        if self.settings.consider_fidelity {
            SWAP_COST * self.arch.edge_cost(u, v).unwrap_or(1.0)
        } else {
            SWAP_COST
        }
    }

    /// The A* search for one layer. Returns the action sequence reaching a
    /// satisfying layout.
    fn route_layer(&mut self, gates: &[(u16, u16)]) -> Result<Vec<Action>, LayerAbort> {
        self.arena.clear();
        let mut open = OpenList::new();
        let mut seen: FxHashMap<Vec<u8>, f64> = FxHashMap::default();

        let root_layout = self.layout.clone();
        let root_heur = self.heuristic(&root_layout, gates);
        seen.insert(root_layout.packed_key(), 0.0);
        let root = self.arena.push(SearchNode {
            layout: root_layout,
            cost_fixed: 0.0,
            cost_heur: root_heur,
            depth: 0,
            parent: 0,
            action: None,
        });
        open.push(HeapEntry {
            key: root_heur,
            depth: 0,
            id: root,
        });

        while let Some(entry) = open.pop() {
            if self.expired() {
                return Err(LayerAbort::Deadline);
            }

            let node = self.arena.get(entry.id).clone();

            // A cheaper path to this layout has been expanded already.
            if let Some(&best) = seen.get(&node.layout.packed_key()) {
                if node.cost_fixed > best + COST_EPS {
                    continue;
                }
            }

            if self.goal(&node.layout, gates) {
                self.layout = node.layout.clone();
                return Ok(self.arena.path_to(entry.id));
            }

            if let Some((logical, partner)) = first_unmapped(&node.layout, gates) {
                self.expand_placements(&mut open, &mut seen, entry.id, &node, logical, partner, gates);
            } else {
                self.expand_swaps(&mut open, &mut seen, entry.id, &node, gates);
                self.expand_teleports(&mut open, &mut seen, entry.id, &node, gates);
            }
        }

        Err(LayerAbort::Exhausted)
    }

    /// Fork one child per candidate position for an unmapped logical qubit,
    /// keeping only the best few placements.
    #[allow(clippy::too_many_arguments)]
    fn expand_placements(
        &mut self,
        open: &mut OpenList,
        seen: &mut FxHashMap<Vec<u8>, f64>,
        parent_id: usize,
        parent: &SearchNode,
        logical: u16,
        partner: Option<u16>,
        gates: &[(u16, u16)],
    ) {
        let mut candidates: Vec<(f64, u16)> = parent
            .layout
            .free_physical()
            .into_iter()
            .map(|p| {
                let score = match partner {
                    Some(pp) => self.aug_dist[pp as usize][p as usize],
                    None => -(self.arch.neighbors(p).map_or(0, <[u16]>::len) as f64),
                };
                (score, p)
            })
            .collect();
        candidates.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
        candidates.truncate(self.settings.dynamic_placement_limit);

        for (_, physical) in candidates {
            let mut layout = parent.layout.clone();
            layout.assign(logical, physical);
            self.push_child(
                open,
                seen,
                parent_id,
                parent,
                Action::Place { logical, physical },
                layout,
                0.0,
                gates,
            );
        }
    }

    fn expand_swaps(
        &mut self,
        open: &mut OpenList,
        seen: &mut FxHashMap<Vec<u8>, f64>,
        parent_id: usize,
        parent: &SearchNode,
        gates: &[(u16, u16)],
    ) {
        for &(u, v) in self.arch.edges() {
            if parent.layout.is_free(u) && parent.layout.is_free(v) {
                continue;
            }
            let mut layout = parent.layout.clone();
            layout.swap_physical(u, v);
            let cost = self.swap_cost(u, v);
            self.push_child(
                open,
                seen,
                parent_id,
                parent,
                Action::Swap { p1: u, p2: v },
                layout,
                cost,
                gates,
            );
        }
    }

    fn expand_teleports(
        &mut self,
        open: &mut OpenList,
        seen: &mut FxHashMap<Vec<u8>, f64>,
        parent_id: usize,
        parent: &SearchNode,
        gates: &[(u16, u16)],
    ) {
        if !self.channels_active {
            return;
        }
        let channels = self.channels.clone();
        for channel in channels {
            for (via, dest) in [
                (channel.half_a, channel.half_b),
                (channel.half_b, channel.half_a),
            ] {
                if !parent.layout.is_free(via) || !parent.layout.is_free(dest) {
                    continue;
                }
                let neighbors: Vec<u16> = self
                    .arch
                    .neighbors(via)
                    .map(<[u16]>::to_vec)
                    .unwrap_or_default();
                for src in neighbors {
                    if src == dest {
                        continue;
                    }
                    let Some(logical) = parent.layout.logical(src) else {
                        continue;
                    };
                    let mut layout = parent.layout.clone();
                    layout.assign(logical, dest);
                    self.push_child(
                        open,
                        seen,
                        parent_id,
                        parent,
                        Action::Teleport { src, via, dest },
                        layout,
                        TELEPORT_COST,
                        gates,
                    );
                }
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn push_child(
        &mut self,
        open: &mut OpenList,
        seen: &mut FxHashMap<Vec<u8>, f64>,
        parent_id: usize,
        parent: &SearchNode,
        action: Action,
        layout: Layout,
        added_cost: f64,
        gates: &[(u16, u16)],
    ) {
        let cost_fixed = parent.cost_fixed + added_cost;
        let key = layout.packed_key();
        if let Some(&best) = seen.get(&key) {
            if best <= cost_fixed + COST_EPS {
                return;
            }
        }
        seen.insert(key, cost_fixed);

        let cost_heur = self.heuristic(&layout, gates);
        let depth = parent.depth + 1;
        let id = self.arena.push(SearchNode {
            layout,
            cost_fixed,
            cost_heur,
            depth,
            parent: parent_id,
            action: Some(action),
        });
        open.push(HeapEntry {
            key: cost_fixed + cost_heur,
            depth,
            id,
        });
    }

    /// Apply an accepted action to the live layout and emit its gates.
    fn apply_action(&mut self, action: Action) -> MapResult<()> {
        match action {
            Action::Swap { p1, p2 } => {
                let (a, b) = (QubitId(u32::from(p1)), QubitId(u32::from(p2)));
                self.out.cx(a, b)?;
                self.out.cx(b, a)?;
                self.out.cx(a, b)?;
                self.layout.swap_physical(p1, p2);
                self.swaps += 1;
            }
            Action::Teleport { src, via, dest } => {
                self.out.push(Instruction::teleport(
                    QubitId(u32::from(src)),
                    QubitId(u32::from(via)),
                    QubitId(u32::from(dest)),
                ))?;
                let logical = self
                    .layout
                    .logical(src)
                    .expect("teleport source must hold a logical qubit");
                self.layout.assign(logical, dest);
                self.teleports += 1;
            }
            Action::Place { logical, physical } => {
                self.layout.assign(logical, physical);
                self.record_first_position(logical, physical);
            }
        }
        Ok(())
    }

    fn record_first_position(&mut self, logical: u16, physical: u16) {
        let slot = &mut self.first_position[logical as usize];
        if slot.is_none() {
            *slot = Some(physical);
        }
    }

    /// Physical position of a logical qubit, binding it on first use.
    fn place_for_emission(&mut self, logical: u16) -> MapResult<u16> {
        if let Some(p) = self.layout.physical(logical) {
            return Ok(p);
        }
        let free = self.layout.free_physical();
        let p = free.first().copied().ok_or_else(|| {
            MapError::Routing(format!("no free physical qubit for logical q{logical}"))
        })?;
        self.layout.assign(logical, p);
        self.record_first_position(logical, p);
        Ok(p)
    }

    /// Emit one layer's instructions remapped onto physical wires.
    fn emit_layer(&mut self, layer: &Layer) -> MapResult<()> {
        for &idx in layer {
            let inst = &self.circuit.instructions()[idx];
            let mut physical = Vec::with_capacity(inst.qubits.len());
            for q in &inst.qubits {
                let p = self.place_for_emission(q.0 as u16)?;
                physical.push(QubitId(u32::from(p)));
            }
            let remapped = Instruction {
                kind: inst.kind.clone(),
                qubits: physical,
                clbits: inst.clbits.clone(),
            };
            self.out.push(remapped)?;
        }
        Ok(())
    }

    /// Estimated fidelity of the routed circuit.
    fn fidelity(&self) -> f64 {
        let Some(cal) = self.arch.calibration() else {
            return 1.0;
        };
        let mut fidelity = 1.0;
        for inst in self.out.iter() {
            match &inst.kind {
                InstructionKind::Gate(_) | InstructionKind::ClassicallyControlled { .. } => {
                    if inst.qubits.len() == 2 {
                        let (u, v) = (inst.qubits[0].0 as u16, inst.qubits[1].0 as u16);
                        fidelity *= 1.0 - cal.edge_error(u, v);
                    } else {
                        for q in &inst.qubits {
                            fidelity *= 1.0 - cal.single_qubit_error[q.0 as usize];
                        }
                    }
                }
                InstructionKind::Measure => {
                    for q in &inst.qubits {
                        fidelity *= 1.0 - cal.readout_error[q.0 as usize];
                    }
                }
                InstructionKind::Barrier | InstructionKind::Teleport => {}
            }
        }
        fidelity
    }
}

/// First gate qubit without a physical position, with its (possibly mapped)
/// partner, in layer order.
fn first_unmapped(layout: &Layout, gates: &[(u16, u16)]) -> Option<(u16, Option<u16>)> {
    for &(a, b) in gates {
        if layout.physical(a).is_none() {
            return Some((a, layout.physical(b)));
        }
        if layout.physical(b).is_none() {
            return Some((b, layout.physical(a)));
        }
    }
    None
}

/// Seed the initial layout for runs without teleportation.
fn seed_layout(
    circuit: &Circuit,
    arch: &Architecture,
    settings: &MappingSettings,
) -> MapResult<Layout> {
    let n_log = circuit.num_qubits();
    let n_phys = arch.num_qubits();

    match settings.initial_layout_strategy {
        InitialLayoutStrategy::Identity | InitialLayoutStrategy::None => {
            Ok(Layout::identity(n_log, n_phys))
        }
        InitialLayoutStrategy::Dynamic => Ok(Layout::new(n_log, n_phys)),
        InitialLayoutStrategy::Static => {
            let subset = arch.highest_fidelity_subset(n_log)?;

            // Logical qubits by interaction degree, descending.
            let mut interactions = vec![0usize; n_log];
            for inst in circuit.iter() {
                if inst.is_two_qubit_gate() {
                    interactions[inst.qubits[0].0 as usize] += 1;
                    interactions[inst.qubits[1].0 as usize] += 1;
                }
            }
            let mut logical_order: Vec<u16> = (0..n_log as u16).collect();
            logical_order.sort_by_key(|&l| (std::cmp::Reverse(interactions[l as usize]), l));

            // Subset positions by induced degree, descending.
            let induced_degree = |p: u16| {
                arch.neighbors(p)
                    .map(|ns| ns.iter().filter(|n| subset.binary_search(n).is_ok()).count())
                    .unwrap_or(0)
            };
            let mut physical_order = subset.clone();
            physical_order.sort_by_key(|&p| (std::cmp::Reverse(induced_degree(p)), p));

            let mut layout = Layout::new(n_log, n_phys);
            for (l, p) in logical_order.into_iter().zip(physical_order) {
                layout.assign(l, p);
            }
            Ok(layout)
        }
    }
}

/// Reserve ancilla positions for the teleport channels and lay the logical
/// qubits out over the remaining positions in order.
fn draw_channels(
    circuit: &Circuit,
    arch: &Architecture,
    settings: &MappingSettings,
) -> (Vec<TeleportChannel>, Layout) {
    let n_log = circuit.num_qubits();
    let n_phys = arch.num_qubits();

    let mut slots: Vec<u16> = (0..n_phys as u16).collect();
    let mut rng = StdRng::seed_from_u64(settings.teleportation_seed);
    slots.shuffle(&mut rng);

    let ancillas: Vec<u16> = slots[..settings.teleportation_qubits].to_vec();
    let channels = ancillas
        .chunks_exact(2)
        .map(|pair| TeleportChannel {
            half_a: pair[0],
            half_b: pair[1],
        })
        .collect();

    let mut remaining: Vec<u16> = (0..n_phys as u16)
        .filter(|p| !ancillas.contains(p))
        .collect();
    remaining.sort_unstable();

    let mut layout = Layout::new(n_log, n_phys);
    for (l, p) in (0..n_log as u16).zip(remaining) {
        layout.assign(l, p);
    }

    (channels, layout)
}

/// Hop distances over the coupling plus teleport shortcut edges.
fn augmented_distances(
    arch: &Architecture,
    channels: &[TeleportChannel],
    active: bool,
) -> Vec<Vec<f64>> {
    let n = arch.num_qubits();
    let mut adjacency: Vec<Vec<u16>> = (0..n as u16)
        .map(|q| arch.neighbors(q).map(<[u16]>::to_vec).unwrap_or_default())
        .collect();

    if active {
        for channel in channels {
            for (via, dest) in [
                (channel.half_a, channel.half_b),
                (channel.half_b, channel.half_a),
            ] {
                let neighbors = adjacency[via as usize].clone();
                for x in neighbors {
                    if x == dest || x == via {
                        continue;
                    }
                    if !adjacency[x as usize].contains(&dest) {
                        adjacency[x as usize].push(dest);
                        adjacency[dest as usize].push(x);
                    }
                }
            }
        }
    }

    let mut dist = vec![vec![f64::INFINITY; n]; n];
    for src in 0..n {
        dist[src][src] = 0.0;
        let mut queue = std::collections::VecDeque::new();
        queue.push_back(src as u16);
        while let Some(current) = queue.pop_front() {
            for &nb in &adjacency[current as usize] {
                if dist[src][nb as usize].is_infinite() {
                    dist[src][nb as usize] = dist[src][current as usize] + 1.0;
                    queue.push_back(nb);
                }
            }
        }
    }
    dist
}
