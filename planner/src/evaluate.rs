use std::time::Duration;

use dronerouting_structs::plan::{ObjectiveVector, Route, Stop, StopRole};

use crate::{
    graph::{BatteryState, Graph, Infeasible, NodeIdx},
    shortest_path::Leg,
};

/// Weighted-sum coefficients used to rank single routes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Weights {
    pub distance: f64,
    pub risk: f64,
    pub recharges: f64,
}

impl Default for Weights {
    fn default() -> Self {
        Self {
            distance: 1.0,
            risk: 100.0,
            recharges: 1000.0,
        }
    }
}

pub fn score(objective: &ObjectiveVector, weights: &Weights) -> f64 {
    weights.distance * objective.distance
        + weights.risk * objective.risk
        + weights.recharges * objective.recharges as f64
}

#[derive(Debug, Clone)]
pub struct Evaluation {
    pub route: Route,
    pub objective: ObjectiveVector,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApproxStatistics {
    /// Transfers or order evaluations performed.
    pub evaluations: u64,
    pub elapsed: Duration,
}

/// Single route produced by a heuristic or the annealer.
#[derive(Debug, Clone)]
pub struct ApproxOutcome {
    pub route: Route,
    pub objective: ObjectiveVector,
    pub statistics: ApproxStatistics,
}

impl ApproxOutcome {
    pub fn order(&self) -> Vec<NodeIdx> {
        self.route.client_order().collect()
    }
}

/// Route under construction, with the battery and objective accumulated so far.
#[derive(Debug, Clone)]
pub struct RouteBuilder {
    stops: Vec<Stop>,
    current: NodeIdx,
    state: BatteryState,
    objective: ObjectiveVector,
}

impl RouteBuilder {
    pub fn start(graph: &Graph) -> Self {
        Self {
            stops: vec![Stop {
                node: graph.depot(),
                role: StopRole::Start,
            }],
            current: graph.depot(),
            state: graph.initial_state(),
            objective: ObjectiveVector::default(),
        }
    }

    pub fn current(&self) -> NodeIdx {
        self.current
    }

    pub fn state(&self) -> &BatteryState {
        &self.state
    }

    pub fn objective(&self) -> &ObjectiveVector {
        &self.objective
    }

    /// Appends a leg computed from the current node, ending in a stop with the given role.
    pub fn push_leg(&mut self, graph: &Graph, leg: &Leg, target: NodeIdx, role: StopRole) {
        self.stops.extend(leg.via.iter().copied());
        self.stops.push(Stop { node: target, role });
        self.current = target;
        self.state = leg.arrival;
        self.objective = accumulate(graph, &self.objective, leg);
    }

    pub fn visit(&mut self, graph: &Graph, client: NodeIdx) -> Result<(), Infeasible> {
        let leg = graph.transfer(&self.state, self.current, client)?;
        self.push_leg(graph, &leg, client, StopRole::Visit);
        Ok(())
    }

    pub fn finish(mut self, graph: &Graph) -> Result<Evaluation, Infeasible> {
        let depot = graph.depot();
        let leg = graph.transfer(&self.state, self.current, depot)?;
        self.push_leg(graph, &leg, depot, StopRole::End);
        Ok(Evaluation {
            route: Route { stops: self.stops },
            objective: self.objective,
        })
    }
}

/// Objective of a partial route extended by `leg`.
pub fn accumulate(graph: &Graph, objective: &ObjectiveVector, leg: &Leg) -> ObjectiveVector {
    ObjectiveVector {
        distance: objective.distance + leg.distance,
        risk: graph.combine_risk(objective.risk, leg.risk),
        recharges: objective.recharges + leg.recharges,
    }
}

/// Flies depot, `order`, depot and sums up the objectives.
pub fn evaluate_order(graph: &Graph, order: &[NodeIdx]) -> Result<Evaluation, Infeasible> {
    let mut builder = RouteBuilder::start(graph);
    for &client in order {
        builder.visit(graph, client)?;
    }
    builder.finish(graph)
}
