use std::time::Instant;

use dronerouting_structs::plan::{ObjectiveVector, StopRole};
use log::debug;
use ordered_float::OrderedFloat;
use tinyvec::TinyVec;

use crate::{
    evaluate::{score, ApproxOutcome, ApproxStatistics, RouteBuilder, Weights},
    graph::Graph,
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HeuristicStrategy {
    /// Shortest feasible leg first.
    NearestFeasible,
    /// Smallest weighted leg cost first.
    GreedyWeighted(Weights),
}

impl HeuristicStrategy {
    pub fn name(&self) -> &'static str {
        match self {
            HeuristicStrategy::NearestFeasible => "nearest",
            HeuristicStrategy::GreedyWeighted(_) => "greedy",
        }
    }
}

/// Builds one route client by client, always taking the best next leg. Ties go to the client that
/// comes first in the instance. Returns `None` when the drone gets stuck.
pub fn solve_heuristic(graph: &Graph, strategy: HeuristicStrategy) -> Option<ApproxOutcome> {
    #[cfg(feature = "prof")]
    let _p = hprof::enter("solve_heuristic");

    let start = Instant::now();
    let mut statistics = ApproxStatistics::default();
    let mut builder = RouteBuilder::start(graph);
    let mut remaining: TinyVec<[u32; 32]> = graph.clients().iter().copied().collect();

    while !remaining.is_empty() {
        let mut best = None;
        for (i, &client) in remaining.iter().enumerate() {
            statistics.evaluations += 1;
            let Ok(leg) = graph.transfer(builder.state(), builder.current(), client) else {
                continue;
            };
            let key = OrderedFloat(match strategy {
                HeuristicStrategy::NearestFeasible => leg.distance,
                HeuristicStrategy::GreedyWeighted(weights) => {
                    let cost = ObjectiveVector::new(leg.distance, leg.risk, leg.recharges);
                    score(&cost, &weights)
                }
            });
            if best.as_ref().map_or(true, |(b, _, _)| key < *b) {
                best = Some((key, i, leg));
            }
        }

        let Some((_, i, leg)) = best else {
            debug!(
                "{} heuristic stuck at node {} with {} clients left",
                strategy.name(),
                graph.node(builder.current()).id,
                remaining.len()
            );
            return None;
        };
        let client = remaining.remove(i);
        builder.push_leg(graph, &leg, client, StopRole::Visit);
    }

    statistics.evaluations += 1;
    let evaluation = match builder.finish(graph) {
        Ok(evaluation) => evaluation,
        Err(_) => {
            debug!(
                "{} heuristic cannot return to the depot",
                strategy.name()
            );
            return None;
        }
    };
    statistics.elapsed = start.elapsed();
    debug!(
        "{} heuristic found {}",
        strategy.name(),
        evaluation.objective
    );

    Some(ApproxOutcome {
        route: evaluation.route,
        objective: evaluation.objective,
        statistics,
    })
}
