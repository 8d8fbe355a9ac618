use std::collections::HashMap;

use dronerouting_structs::{
    plan::{Route, StopRole},
    problem::{Instance, NodeKind, Parameters, RiskAggregation},
    Point, Polygon,
};
use log::{debug, trace};
use tinyvec::TinyVec;

use crate::{
    error::InstanceError,
    geometry::{segment_crosses_polygon, segment_touches_polygon},
    shortest_path::{find_leg, Leg},
};

pub type NodeIdx = u32;

/// Local signal that a move cannot be flown. Recovered by the caller, never fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Infeasible;

impl std::fmt::Display for Infeasible {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "infeasible move")
    }
}

#[derive(Debug, Clone)]
pub struct Node {
    pub id: String,
    pub pos: Point,
    pub kind: NodeKind,
    /// Targets of usable edges, ascending.
    pub outgoing: TinyVec<[NodeIdx; 16]>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct EdgeData {
    pub length: f64,
    pub energy: f64,
    pub risk: f64,
    /// The straight segment stays clear of every obstacle interior.
    pub usable: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BatteryState {
    pub remaining: f64,
    pub recharges: u32,
    /// Number of edges flown so far.
    pub steps: u32,
}

impl BatteryState {
    pub fn full(capacity: f64) -> Self {
        Self {
            remaining: capacity,
            recharges: 0,
            steps: 0,
        }
    }
}

/// Complete graph over all nodes with cached edge data, immutable after construction.
#[derive(Debug, Clone)]
pub struct Graph {
    nodes: Vec<Node>,
    edges: Vec<EdgeData>,
    depot: NodeIdx,
    clients: Vec<NodeIdx>,
    recharges: Vec<NodeIdx>,
    ids: HashMap<String, NodeIdx>,
    parameters: Parameters,
}

fn validate_polygon(polygon: &Polygon, zone: String) -> Result<(), InstanceError> {
    if polygon.is_degenerate() {
        return Err(InstanceError::DegeneratePolygon {
            zone,
            vertices: polygon.vertices.len(),
        });
    }
    if polygon.vertices.iter().any(|v| !v.is_finite()) {
        return Err(InstanceError::NonFiniteCoordinate(zone));
    }
    Ok(())
}

fn validate_parameters(parameters: &Parameters) -> Result<(), InstanceError> {
    let positive = |name: &'static str, value: f64| {
        if value.is_finite() && value > 0.0 {
            Ok(())
        } else {
            Err(InstanceError::InvalidParameter { name, value })
        }
    };
    positive("max_battery", parameters.max_battery)?;
    positive("energy_per_unit", parameters.energy_per_unit)?;
    if !(parameters.risk_per_unit.is_finite() && parameters.risk_per_unit >= 0.0) {
        return Err(InstanceError::InvalidParameter {
            name: "risk_per_unit",
            value: parameters.risk_per_unit,
        });
    }
    if let Some(start) = parameters.start_battery {
        if !(start.is_finite() && (0.0..=parameters.max_battery).contains(&start)) {
            return Err(InstanceError::InvalidParameter {
                name: "start_battery",
                value: start,
            });
        }
    }
    Ok(())
}

pub fn build_graph(instance: &Instance) -> Result<Graph, InstanceError> {
    #[cfg(feature = "prof")]
    let _p_graph = hprof::enter("build_graph");

    validate_parameters(&instance.parameters)?;
    for (i, zone) in instance.forbidden_zones.iter().enumerate() {
        validate_polygon(&zone.polygon, format!("forbidden zone {}", i))?;
    }
    for (i, zone) in instance.risk_zones.iter().enumerate() {
        validate_polygon(&zone.polygon, format!("risk zone {}", i))?;
        if !(zone.risk_factor.is_finite() && zone.risk_factor >= 0.0) {
            return Err(InstanceError::InvalidParameter {
                name: "risk_factor",
                value: zone.risk_factor,
            });
        }
    }

    let mut ids: HashMap<String, NodeIdx> = Default::default();
    let mut depot: Option<NodeIdx> = None;
    let mut clients = Vec::new();
    let mut recharges = Vec::new();
    let mut nodes: Vec<Node> = Vec::with_capacity(instance.nodes.len());

    for (idx, spec) in instance.nodes.iter().enumerate() {
        let idx = idx as NodeIdx;
        if !spec.pos().is_finite() {
            let name = format!("node {}", spec.id);
            return Err(InstanceError::NonFiniteCoordinate(name));
        }
        if ids.insert(spec.id.clone(), idx).is_some() {
            return Err(InstanceError::DuplicateNodeId(spec.id.clone()));
        }
        match spec.kind {
            NodeKind::Depot => {
                if let Some(first) = depot {
                    return Err(InstanceError::MultipleDepots {
                        first: nodes[first as usize].id.clone(),
                        second: spec.id.clone(),
                    });
                }
                depot = Some(idx);
            }
            NodeKind::Client => clients.push(idx),
            NodeKind::Recharge => recharges.push(idx),
        }
        nodes.push(Node {
            id: spec.id.clone(),
            pos: spec.pos(),
            kind: spec.kind,
            outgoing: Default::default(),
        });
    }
    let depot = depot.ok_or(InstanceError::MissingDepot)?;

    let parameters = &instance.parameters;
    let n = nodes.len();
    let mut edges = vec![EdgeData::default(); n * n];
    for i in 0..n {
        for j in 0..n {
            if i == j {
                continue;
            }
            let (a, b) = (nodes[i].pos, nodes[j].pos);
            let length = a.dist(&b);
            let usable = !instance
                .forbidden_zones
                .iter()
                .any(|zone| segment_crosses_polygon(&a, &b, &zone.polygon));

            let zone_risk = instance
                .risk_zones
                .iter()
                .filter(|zone| segment_touches_polygon(&a, &b, &zone.polygon))
                .map(|zone| zone.risk_factor * length)
                .sum::<f64>();
            let mut risk = zone_risk + parameters.risk_per_unit * length;
            if parameters.risk_aggregation == RiskAggregation::Multiplicative {
                risk = risk.clamp(0.0, 1.0);
            }

            edges[i * n + j] = EdgeData {
                length,
                energy: length * parameters.energy_per_unit,
                risk,
                usable,
            };
            if usable {
                nodes[i].outgoing.push(j as NodeIdx);
            } else {
                trace!(
                    "edge {} -> {} blocked by an obstacle",
                    nodes[i].id, nodes[j].id
                );
            }
        }
    }

    if !clients.is_empty() && nodes[depot as usize].outgoing.is_empty() {
        let id = nodes[depot as usize].id.clone();
        return Err(InstanceError::UnreachableDepot(id));
    }

    debug!(
        "Constructed graph with {} nodes ({} clients, {} recharge), {} usable edges of {}",
        n,
        clients.len(),
        recharges.len(),
        nodes.iter().map(|n| n.outgoing.len()).sum::<usize>(),
        n * n.saturating_sub(1)
    );

    Ok(Graph {
        nodes,
        edges,
        depot,
        clients,
        recharges,
        ids,
        parameters: parameters.clone(),
    })
}

impl Graph {
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn node(&self, idx: NodeIdx) -> &Node {
        &self.nodes[idx as usize]
    }

    pub fn node_by_id(&self, id: &str) -> Option<NodeIdx> {
        self.ids.get(id).copied()
    }

    pub fn edge(&self, from: NodeIdx, to: NodeIdx) -> &EdgeData {
        &self.edges[from as usize * self.nodes.len() + to as usize]
    }

    pub fn depot(&self) -> NodeIdx {
        self.depot
    }

    /// Clients in instance order. This order is the tie-break order of every solver.
    pub fn clients(&self) -> &[NodeIdx] {
        &self.clients
    }

    pub fn recharges(&self) -> &[NodeIdx] {
        &self.recharges
    }

    pub fn parameters(&self) -> &Parameters {
        &self.parameters
    }

    pub fn capacity(&self) -> f64 {
        self.parameters.max_battery
    }

    pub fn initial_state(&self) -> BatteryState {
        BatteryState::full(self.parameters.initial_battery())
    }

    /// Whether arriving at `node` mid-leg refills the battery.
    pub fn refills_at(&self, node: NodeIdx) -> bool {
        match self.node(node).kind {
            NodeKind::Recharge => true,
            NodeKind::Depot => self.parameters.depot_recharges,
            NodeKind::Client => false,
        }
    }

    pub fn combine_risk(&self, acc: f64, risk: f64) -> f64 {
        match self.parameters.risk_aggregation {
            RiskAggregation::Additive => acc + risk,
            RiskAggregation::Multiplicative => acc + risk - acc * risk,
        }
    }

    /// Usable edges as `(from, to)` pairs, ascending.
    pub fn usable_edges(&self) -> impl Iterator<Item = (NodeIdx, NodeIdx)> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .flat_map(|(i, n)| n.outgoing.iter().map(move |j| (i as NodeIdx, *j)))
    }

    /// Moves the drone from `from` to `to`, possibly through recharge stations and waypoints.
    /// The input state is left untouched.
    pub fn transfer(
        &self,
        state: &BatteryState,
        from: NodeIdx,
        to: NodeIdx,
    ) -> Result<Leg, Infeasible> {
        find_leg(self, state, from, to)
    }

    /// Replays `route` edge by edge and returns the battery state at every stop.
    pub fn simulate(&self, route: &Route) -> Result<Vec<BatteryState>, Infeasible> {
        let mut state = self.initial_state();
        let mut states = Vec::with_capacity(route.len());
        let mut prev: Option<NodeIdx> = None;

        for stop in route.stops.iter() {
            if let Some(prev) = prev {
                if prev != stop.node {
                    let edge = self.edge(prev, stop.node);
                    if !edge.usable || edge.energy > state.remaining {
                        return Err(Infeasible);
                    }
                    state.remaining -= edge.energy;
                    state.steps += 1;
                }
            }
            if stop.role == StopRole::Recharge {
                state.remaining = self.capacity();
                if self.node(stop.node).kind == NodeKind::Recharge {
                    state.recharges += 1;
                }
            }
            states.push(state);
            prev = Some(stop.node);
        }
        Ok(states)
    }
}
