use std::{
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};

use dronerouting_structs::plan::{ObjectiveVector, Route, Stop, StopRole};
use log::{debug, trace};
use rayon::prelude::*;
use tinyvec::TinyVec;

use crate::{
    evaluate::accumulate,
    graph::{BatteryState, Graph, NodeIdx},
    pareto::{DuplicatePolicy, ParetoFrontier},
};

/// Lower bound used to cut partial routes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BoundMode {
    /// No cutting; every feasible order is enumerated.
    Disabled,
    /// The objective of the prefix itself.
    Prefix,
    /// Prefix plus a straight-line bound on the distance still to fly.
    #[default]
    Lookahead,
}

#[derive(Debug, Clone)]
pub struct SearchBudget {
    pub max_nodes: Option<u64>,
    pub time_limit: Option<Duration>,
    pub stop: Option<Arc<AtomicBool>>,
    /// Expansions between two looks at the clock.
    pub check_interval: u64,
}

impl Default for SearchBudget {
    fn default() -> Self {
        Self {
            max_nodes: None,
            time_limit: None,
            stop: None,
            check_interval: 1024,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ExactConfig {
    pub bound: BoundMode,
    pub duplicates: DuplicatePolicy,
    pub budget: SearchBudget,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Termination {
    /// Every order was enumerated or cut.
    Exhausted,
    /// Budget or stop flag hit; the frontier may be missing routes.
    Cancelled(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchStatistics {
    /// Transfers attempted from a partial route to one more client.
    pub nodes_expanded: u64,
    pub pruned_bound: u64,
    pub infeasible: u64,
    /// Complete client orders reached.
    pub leaves: u64,
    pub frontier_insertions: u64,
    pub max_depth: u64,
    pub elapsed: Duration,
}

impl SearchStatistics {
    #[inline]
    pub fn on_node_expanded(&mut self) {
        self.nodes_expanded = self.nodes_expanded.saturating_add(1);
    }

    #[inline]
    pub fn on_pruning_bound(&mut self) {
        self.pruned_bound = self.pruned_bound.saturating_add(1);
    }

    #[inline]
    pub fn on_infeasible(&mut self) {
        self.infeasible = self.infeasible.saturating_add(1);
    }

    #[inline]
    pub fn on_leaf(&mut self) {
        self.leaves = self.leaves.saturating_add(1);
    }

    #[inline]
    pub fn on_frontier_insertion(&mut self) {
        self.frontier_insertions = self.frontier_insertions.saturating_add(1);
    }

    #[inline]
    pub fn on_depth_update(&mut self, depth: u64) {
        self.max_depth = self.max_depth.max(depth);
    }

    /// Adds the counters of another worker. Elapsed time is left alone.
    pub fn absorb(&mut self, other: &SearchStatistics) {
        self.nodes_expanded = self.nodes_expanded.saturating_add(other.nodes_expanded);
        self.pruned_bound = self.pruned_bound.saturating_add(other.pruned_bound);
        self.infeasible = self.infeasible.saturating_add(other.infeasible);
        self.leaves = self.leaves.saturating_add(other.leaves);
        self.frontier_insertions =
            self.frontier_insertions.saturating_add(other.frontier_insertions);
        self.max_depth = self.max_depth.max(other.max_depth);
    }
}

impl std::fmt::Display for SearchStatistics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Exact search statistics:")?;
        writeln!(f, "  Nodes expanded:       {}", self.nodes_expanded)?;
        writeln!(f, "  Prunings (bound):     {}", self.pruned_bound)?;
        writeln!(f, "  Infeasible transfers: {}", self.infeasible)?;
        writeln!(f, "  Leaves reached:       {}", self.leaves)?;
        writeln!(f, "  Frontier insertions:  {}", self.frontier_insertions)?;
        writeln!(f, "  Max depth reached:    {}", self.max_depth)?;
        writeln!(f, "  Total time:           {:.2?}", self.elapsed)?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct ExactOutcome {
    pub frontier: ParetoFrontier,
    pub termination: Termination,
    pub statistics: SearchStatistics,
}

impl ExactOutcome {
    /// The frontier is the full Pareto set, not a best-effort subset.
    pub fn is_complete(&self) -> bool {
        self.termination == Termination::Exhausted
    }
}

/// Bitset over client positions.
#[derive(Debug, Clone, Default)]
struct VisitSet {
    words: TinyVec<[u64; 2]>,
    count: usize,
}

impl VisitSet {
    fn new(n: usize) -> Self {
        let mut words = TinyVec::new();
        words.resize(n.div_ceil(64), 0);
        Self { words, count: 0 }
    }

    fn contains(&self, i: usize) -> bool {
        self.words[i / 64] & (1 << (i % 64)) != 0
    }

    fn insert(&mut self, i: usize) {
        if !self.contains(i) {
            self.words[i / 64] |= 1 << (i % 64);
            self.count += 1;
        }
    }

    fn len(&self) -> usize {
        self.count
    }
}

/// Partial route on the work stack.
#[derive(Debug, Clone)]
struct Frame {
    node: NodeIdx,
    visited: VisitSet,
    state: BatteryState,
    objective: ObjectiveVector,
    /// Next client position to try, and one past the last.
    next: usize,
    end: usize,
    /// Length of the shared stop path up to and including this frame's node.
    path_len: usize,
}

struct Monitor<'a> {
    budget: &'a SearchBudget,
    start: Instant,
    nodes: &'a AtomicU64,
    local: u64,
}

impl<'a> Monitor<'a> {
    fn new(budget: &'a SearchBudget, start: Instant, nodes: &'a AtomicU64) -> Self {
        Self {
            budget,
            start,
            nodes,
            local: 0,
        }
    }

    /// Counts one expansion. Returns the reason to stop, if any.
    fn tick(&mut self) -> Option<String> {
        let nodes = self.nodes.fetch_add(1, Ordering::Relaxed) + 1;
        if let Some(max_nodes) = self.budget.max_nodes {
            if nodes > max_nodes {
                return Some(format!("node limit of {} reached", max_nodes));
            }
        }
        if let Some(stop) = &self.budget.stop {
            if stop.load(Ordering::Relaxed) {
                return Some("stop requested".to_string());
            }
        }
        self.local += 1;
        if self.local % self.budget.check_interval.max(1) == 0 {
            if let Some(limit) = self.budget.time_limit {
                if self.start.elapsed() >= limit {
                    return Some(format!("time limit of {:.2?} reached", limit));
                }
            }
        }
        None
    }
}

/// Straight-line lower bound on the distance from `current` through the unvisited clients back to
/// the depot.
fn remaining_distance_bound(graph: &Graph, current: NodeIdx, visited: &VisitSet) -> f64 {
    let pos = graph.node(current).pos;
    let depot = graph.node(graph.depot()).pos;
    let mut bound = pos.dist(&depot);
    for (i, &client) in graph.clients().iter().enumerate() {
        if !visited.contains(i) {
            let u = graph.node(client).pos;
            bound = bound.max(pos.dist(&u) + u.dist(&depot));
        }
    }
    bound
}

fn lower_bound(
    graph: &Graph,
    mode: BoundMode,
    current: NodeIdx,
    visited: &VisitSet,
    objective: &ObjectiveVector,
) -> Option<ObjectiveVector> {
    match mode {
        BoundMode::Disabled => None,
        BoundMode::Prefix => Some(*objective),
        BoundMode::Lookahead => {
            let distance = objective.distance + remaining_distance_bound(graph, current, visited);
            // Leg distances are summed in a different order than the bound, stay below them.
            let distance = (distance - 1e-9 * (1.0 + distance)).max(objective.distance);
            Some(ObjectiveVector {
                distance,
                ..*objective
            })
        }
    }
}

fn root_frame(graph: &Graph, next: usize, end: usize) -> Frame {
    Frame {
        node: graph.depot(),
        visited: VisitSet::new(graph.clients().len()),
        state: graph.initial_state(),
        objective: ObjectiveVector::default(),
        next,
        end,
        path_len: 1,
    }
}

/// Depth-first search below `root` into `frontier`.
fn explore(
    graph: &Graph,
    config: &ExactConfig,
    root: Frame,
    monitor: &mut Monitor,
    frontier: &mut ParetoFrontier,
    statistics: &mut SearchStatistics,
) -> Termination {
    let clients = graph.clients();
    let n = clients.len();
    let depot = graph.depot();

    let mut path: Vec<Stop> = vec![Stop {
        node: depot,
        role: StopRole::Start,
    }];
    let mut stack: Vec<Frame> = vec![root];

    while let Some(top) = stack.last_mut() {
        if top.next >= top.end {
            stack.pop();
            continue;
        }
        let pos = top.next;
        top.next += 1;
        if top.visited.contains(pos) {
            continue;
        }

        path.truncate(top.path_len);
        let (from, state, prefix) = (top.node, top.state, top.objective);
        let mut visited = top.visited.clone();

        if let Some(reason) = monitor.tick() {
            debug!("Exact search cancelled: {}", reason);
            return Termination::Cancelled(reason);
        }
        statistics.on_node_expanded();

        let client = clients[pos];
        let Ok(leg) = graph.transfer(&state, from, client) else {
            statistics.on_infeasible();
            continue;
        };
        let objective = accumulate(graph, &prefix, &leg);
        visited.insert(pos);
        path.extend(leg.via.iter().copied());
        path.push(Stop {
            node: client,
            role: StopRole::Visit,
        });

        if visited.len() == n {
            statistics.on_leaf();
            let Ok(back) = graph.transfer(&leg.arrival, client, depot) else {
                statistics.on_infeasible();
                continue;
            };
            let objective = accumulate(graph, &objective, &back);
            let mut stops = path.clone();
            stops.extend(back.via.iter().copied());
            stops.push(Stop {
                node: depot,
                role: StopRole::End,
            });
            if frontier.try_insert(Route { stops }, objective) {
                statistics.on_frontier_insertion();
                trace!("frontier += {}", objective);
            }
            continue;
        }

        if let Some(bound) = lower_bound(graph, config.bound, client, &visited, &objective) {
            if frontier.cuts(&bound) {
                statistics.on_pruning_bound();
                continue;
            }
        }

        stack.push(Frame {
            node: client,
            visited,
            state: leg.arrival,
            objective,
            next: 0,
            end: n,
            path_len: path.len(),
        });
        statistics.on_depth_update(stack.len() as u64 - 1);
    }

    Termination::Exhausted
}

fn empty_tour(graph: &Graph, config: &ExactConfig) -> ExactOutcome {
    let depot = graph.depot();
    let mut frontier = ParetoFrontier::new(config.duplicates);
    let stops = vec![
        Stop {
            node: depot,
            role: StopRole::Start,
        },
        Stop {
            node: depot,
            role: StopRole::End,
        },
    ];
    frontier.try_insert(Route { stops }, ObjectiveVector::default());
    ExactOutcome {
        frontier,
        termination: Termination::Exhausted,
        statistics: SearchStatistics {
            frontier_insertions: 1,
            leaves: 1,
            ..Default::default()
        },
    }
}

/// Branch & Bound over client orders. Returns every Pareto-optimal route, or the routes found
/// before the budget ran out.
pub fn solve_exact(graph: &Graph, config: &ExactConfig) -> ExactOutcome {
    #[cfg(feature = "prof")]
    let _p = hprof::enter("solve_exact");

    let start = Instant::now();
    if graph.clients().is_empty() {
        return empty_tour(graph, config);
    }
    debug!(
        "Exact search over {} clients, bound {:?}",
        graph.clients().len(),
        config.bound
    );

    let nodes = AtomicU64::new(0);
    let mut monitor = Monitor::new(&config.budget, start, &nodes);
    let mut frontier = ParetoFrontier::new(config.duplicates);
    let mut statistics = SearchStatistics::default();

    let root = root_frame(graph, 0, graph.clients().len());
    let termination = explore(
        graph,
        config,
        root,
        &mut monitor,
        &mut frontier,
        &mut statistics,
    );
    statistics.elapsed = start.elapsed();

    debug!(
        "Exact search finished ({:?}) with {} routes after {} expansions",
        termination,
        frontier.len(),
        statistics.nodes_expanded
    );
    ExactOutcome {
        frontier,
        termination,
        statistics,
    }
}

/// Like [`solve_exact`], but the subtree below each first client runs on its own rayon worker.
/// Worker frontiers are merged in client order.
pub fn solve_exact_parallel(graph: &Graph, config: &ExactConfig) -> ExactOutcome {
    #[cfg(feature = "prof")]
    let _p = hprof::enter("solve_exact_parallel");

    let start = Instant::now();
    let n = graph.clients().len();
    if n == 0 {
        return empty_tour(graph, config);
    }
    debug!(
        "Parallel exact search over {} clients, bound {:?}",
        n, config.bound
    );

    let nodes = AtomicU64::new(0);
    let results = (0..n)
        .into_par_iter()
        .map(|first| {
            let mut monitor = Monitor::new(&config.budget, start, &nodes);
            let mut frontier = ParetoFrontier::new(config.duplicates);
            let mut statistics = SearchStatistics::default();
            let root = root_frame(graph, first, first + 1);
            let termination = explore(
                graph,
                config,
                root,
                &mut monitor,
                &mut frontier,
                &mut statistics,
            );
            (frontier, termination, statistics)
        })
        .collect::<Vec<_>>();

    let mut frontier = ParetoFrontier::new(config.duplicates);
    let mut termination = Termination::Exhausted;
    let mut statistics = SearchStatistics::default();
    for (worker_frontier, worker_termination, worker_statistics) in results {
        frontier.merge(worker_frontier);
        statistics.absorb(&worker_statistics);
        if termination == Termination::Exhausted {
            termination = worker_termination;
        }
    }
    statistics.frontier_insertions = frontier.len() as u64;
    statistics.elapsed = start.elapsed();

    debug!(
        "Parallel exact search finished ({:?}) with {} routes after {} expansions",
        termination,
        frontier.len(),
        statistics.nodes_expanded
    );
    ExactOutcome {
        frontier,
        termination,
        statistics,
    }
}
