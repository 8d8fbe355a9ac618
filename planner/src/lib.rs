pub mod annealing;
pub mod bnb;
pub mod error;
pub mod evaluate;
pub mod geometry;
pub mod graph;
pub mod greedy;
pub mod pareto;
pub mod shortest_path;

pub use annealing::{solve_metaheuristic, AnnealingParams};
pub use bnb::{
    solve_exact, solve_exact_parallel, BoundMode, ExactConfig, ExactOutcome, SearchBudget,
    Termination,
};
pub use error::InstanceError;
pub use evaluate::{evaluate_order, score, ApproxOutcome, Weights};
pub use graph::{build_graph, BatteryState, Graph, Infeasible, NodeIdx};
pub use greedy::{solve_heuristic, HeuristicStrategy};
pub use pareto::{dominates, DuplicatePolicy, ParetoFrontier};

/// Client ids of a route in visiting order, joined by `-`.
pub fn order_string(graph: &Graph, order: impl IntoIterator<Item = NodeIdx>) -> String {
    order
        .into_iter()
        .map(|n| graph.node(n).id.as_str())
        .collect::<Vec<_>>()
        .join("-")
}
