use std::time::Instant;

use log::{debug, trace};
use rand::{rngs::SmallRng, Rng, SeedableRng};

use crate::{
    evaluate::{evaluate_order, score, ApproxOutcome, ApproxStatistics, Evaluation, Weights},
    graph::{Graph, NodeIdx},
    greedy::{solve_heuristic, HeuristicStrategy},
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnnealingParams {
    pub seed: u64,
    pub iterations: u32,
    pub initial_temperature: f64,
    /// Geometric cooling factor applied after every iteration.
    pub alpha: f64,
    pub weights: Weights,
}

impl Default for AnnealingParams {
    fn default() -> Self {
        Self {
            seed: 0,
            iterations: 5000,
            initial_temperature: 10.0,
            alpha: 0.995,
            weights: Weights::default(),
        }
    }
}

/// Swaps two distinct random positions.
fn swap_neighbor(order: &[NodeIdx], rng: &mut SmallRng) -> Vec<NodeIdx> {
    let mut neighbor = order.to_vec();
    if order.len() < 2 {
        return neighbor;
    }
    let i = rng.gen_range(0..order.len());
    let mut j = rng.gen_range(0..order.len() - 1);
    if j >= i {
        j += 1;
    }
    neighbor.swap(i, j);
    neighbor
}

/// Simulated annealing over client orders, starting from `initial_order`. Returns the best order
/// seen, or `None` if the initial order cannot be flown.
pub fn anneal(
    graph: &Graph,
    initial_order: &[NodeIdx],
    params: &AnnealingParams,
) -> Option<ApproxOutcome> {
    #[cfg(feature = "prof")]
    let _p = hprof::enter("anneal");

    let start = Instant::now();
    let mut statistics = ApproxStatistics {
        evaluations: 1,
        ..Default::default()
    };
    let mut rng = SmallRng::seed_from_u64(params.seed);

    let mut current_order = initial_order.to_vec();
    let mut current = evaluate_order(graph, &current_order).ok()?;
    let mut current_score = score(&current.objective, &params.weights);

    let mut best: Evaluation = current.clone();
    let mut best_score = current_score;
    let mut temperature = params.initial_temperature;

    for iteration in 0..params.iterations {
        let candidate_order = swap_neighbor(&current_order, &mut rng);
        statistics.evaluations += 1;
        let candidate = evaluate_order(graph, &candidate_order);
        temperature *= params.alpha;
        let Ok(candidate) = candidate else {
            continue;
        };

        let candidate_score = score(&candidate.objective, &params.weights);
        let delta = candidate_score - current_score;
        let accept = delta <= 0.0
            || (temperature > 1e-12 && rng.gen::<f64>() < (-delta / temperature).exp());
        if !accept {
            continue;
        }

        current_order = candidate_order;
        current = candidate;
        current_score = candidate_score;
        if current_score < best_score {
            trace!(
                "anneal iteration {}: new best {:.3} at T={:.4}",
                iteration, current_score, temperature
            );
            best = current.clone();
            best_score = current_score;
        }
    }

    statistics.elapsed = start.elapsed();
    debug!(
        "annealing finished after {} evaluations, best {} (score {:.3})",
        statistics.evaluations, best.objective, best_score
    );
    Some(ApproxOutcome {
        route: best.route,
        objective: best.objective,
        statistics,
    })
}

/// Anneals from the greedy-weighted route, or from the nearest-feasible one if greedy gets stuck.
pub fn solve_metaheuristic(graph: &Graph, params: &AnnealingParams) -> Option<ApproxOutcome> {
    let greedy = solve_heuristic(graph, HeuristicStrategy::GreedyWeighted(params.weights));
    let initial = match greedy {
        Some(initial) => initial,
        None => solve_heuristic(graph, HeuristicStrategy::NearestFeasible)?,
    };
    let mut outcome = anneal(graph, &initial.order(), params)?;
    outcome.statistics.evaluations += initial.statistics.evaluations;
    outcome.statistics.elapsed += initial.statistics.elapsed;
    Some(outcome)
}
