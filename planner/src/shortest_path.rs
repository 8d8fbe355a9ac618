use std::{cmp::Reverse, collections::BinaryHeap};

use dronerouting_structs::{
    plan::{Stop, StopRole},
    problem::NodeKind,
};
use log::trace;
use ordered_float::OrderedFloat;
use tinyvec::TinyVec;

use crate::graph::{BatteryState, Graph, Infeasible, NodeIdx};

/// Result of one transfer: the path between two nodes and what flying it costs.
#[derive(Debug, Clone, PartialEq)]
pub struct Leg {
    /// Stops strictly between the origin and the destination.
    pub via: TinyVec<[Stop; 4]>,
    pub distance: f64,
    pub risk: f64,
    pub recharges: u32,
    pub arrival: BatteryState,
}

#[derive(Default, Debug, Clone, Copy)]
struct Label {
    node: NodeIdx,
    distance: f64,
    risk: f64,
    recharges: u32,
    battery: f64,
    hops: u32,
    prev_label: u32,
    alive: bool,
}

fn label_dominates(a: &Label, b: &Label) -> bool {
    a.recharges <= b.recharges
        && a.distance <= b.distance
        && a.risk <= b.risk
        && a.battery >= b.battery
}

/// Keeps `front` Pareto-optimal. Returns whether `new_elem` should be added; labels it dominates
/// are removed from the front and marked dead so that queued copies get skipped.
fn remove_dominated(
    front: &mut TinyVec<[u32; 8]>,
    labels: &mut [Label],
    new_elem: &Label,
) -> bool {
    for (index, elem) in front.iter().enumerate() {
        let elem = &labels[*elem as usize];
        if label_dominates(elem, new_elem) {
            if index > 0 {
                front.swap(index, index - 1);
            }
            return false;
        } else if label_dominates(new_elem, elem) {
            let mut index = index;
            while index < front.len() {
                let other = front[index] as usize;
                if label_dominates(new_elem, &labels[other]) {
                    labels[other].alive = false;
                    front.swap_remove(index);
                } else {
                    index += 1;
                }
            }
            return true;
        }
    }
    true
}

/// Label-setting search from `from` to `to`.
///
/// Labels are popped in lexicographic order of (recharges, distance, risk), so the first label
/// reaching `to` is the leg with the fewest recharges, then the shortest, then the safest.
/// Passing a recharge node refills the battery and counts as a recharge.
pub fn find_leg(
    graph: &Graph,
    state: &BatteryState,
    from: NodeIdx,
    to: NodeIdx,
) -> Result<Leg, Infeasible> {
    if from == to {
        return Ok(Leg {
            via: Default::default(),
            distance: 0.0,
            risk: 0.0,
            recharges: 0,
            arrival: *state,
        });
    }

    let max_recharges = graph.recharges().len() as u32;
    let mut labels: Vec<Label> = Vec::new();
    let mut fronts: Vec<TinyVec<[u32; 8]>> = vec![Default::default(); graph.nodes().len()];
    let mut queue: BinaryHeap<Reverse<(u32, OrderedFloat<f64>, OrderedFloat<f64>, u32)>> =
        BinaryHeap::new();

    labels.push(Label {
        node: from,
        battery: state.remaining,
        prev_label: u32::MAX,
        alive: true,
        ..Default::default()
    });
    fronts[from as usize].push(0);
    queue.push(Reverse((0, OrderedFloat(0.0), OrderedFloat(0.0), 0)));

    while let Some(Reverse((_, _, _, label_idx))) = queue.pop() {
        let label = labels[label_idx as usize];
        if !label.alive {
            continue;
        }

        if label.node == to {
            trace!(
                "leg {} -> {} found: dist={:.3} recharges={} after {} labels",
                from,
                to,
                label.distance,
                label.recharges,
                labels.len()
            );
            return Ok(reconstruct(graph, state, &labels, label_idx));
        }

        for &next in graph.node(label.node).outgoing.iter() {
            let edge = graph.edge(label.node, next);
            let mut battery = label.battery - edge.energy;
            if battery < 0.0 {
                continue;
            }

            let mut recharges = label.recharges;
            if next != to && graph.refills_at(next) {
                battery = graph.capacity();
                if graph.node(next).kind == NodeKind::Recharge {
                    recharges += 1;
                }
            }
            if recharges > max_recharges {
                continue;
            }

            let new_label = Label {
                node: next,
                distance: label.distance + edge.length,
                risk: graph.combine_risk(label.risk, edge.risk),
                recharges,
                battery,
                hops: label.hops + 1,
                prev_label: label_idx,
                alive: true,
            };

            let is_pareto_optimal =
                remove_dominated(&mut fronts[next as usize], &mut labels, &new_label);
            if is_pareto_optimal {
                let new_idx = labels.len() as u32;
                labels.push(new_label);
                fronts[next as usize].push(new_idx);
                queue.push(Reverse((
                    new_label.recharges,
                    OrderedFloat(new_label.distance),
                    OrderedFloat(new_label.risk),
                    new_idx,
                )));
            }
        }
    }

    trace!(
        "leg {} -> {} infeasible with battery {:.3}",
        from, to, state.remaining
    );
    Err(Infeasible)
}

fn reconstruct(graph: &Graph, state: &BatteryState, labels: &[Label], goal: u32) -> Leg {
    let goal_label = &labels[goal as usize];

    let mut via: TinyVec<[Stop; 4]> = Default::default();
    let mut idx = goal_label.prev_label;
    while idx != u32::MAX {
        let label = &labels[idx as usize];
        if label.prev_label == u32::MAX {
            break;
        }
        let role = if graph.refills_at(label.node) {
            StopRole::Recharge
        } else {
            StopRole::PassThrough
        };
        via.push(Stop {
            node: label.node,
            role,
        });
        idx = label.prev_label;
    }
    via.reverse();

    Leg {
        via,
        distance: goal_label.distance,
        risk: goal_label.risk,
        recharges: goal_label.recharges,
        arrival: BatteryState {
            remaining: goal_label.battery,
            recharges: state.recharges + goal_label.recharges,
            steps: state.steps + goal_label.hops,
        },
    }
}

#[cfg(test)]
mod tests {
    use dronerouting_structs::{
        problem::{ForbiddenZone, Instance, NodeSpec, Parameters},
        Point, Polygon,
    };

    use super::*;
    use crate::graph::build_graph;

    fn square(x0: f64, y0: f64, x1: f64, y1: f64) -> Polygon {
        Polygon::new(vec![
            Point::new(x0, y0),
            Point::new(x1, y0),
            Point::new(x1, y1),
            Point::new(x0, y1),
        ])
    }

    fn instance(capacity: f64, nodes: Vec<NodeSpec>, obstacles: Vec<Polygon>) -> Instance {
        Instance {
            parameters: Parameters::with_capacity(capacity),
            nodes,
            forbidden_zones: obstacles
                .into_iter()
                .map(|polygon| ForbiddenZone { polygon })
                .collect(),
            risk_zones: Vec::new(),
        }
    }

    fn waypoint(node: NodeIdx) -> Stop {
        Stop {
            node,
            role: StopRole::PassThrough,
        }
    }

    fn recharge_at(node: NodeIdx) -> Stop {
        Stop {
            node,
            role: StopRole::Recharge,
        }
    }

    fn corridor(capacity: f64) -> Graph {
        build_graph(&instance(
            capacity,
            vec![
                NodeSpec::new("D", 0.0, 0.0, NodeKind::Depot),
                NodeSpec::new("C", 10.0, 0.0, NodeKind::Client),
                NodeSpec::new("R", 5.0, 3.0, NodeKind::Recharge),
            ],
            vec![],
        ))
        .unwrap()
    }

    #[test]
    fn direct_edge_when_battery_suffices() {
        let graph = corridor(20.0);
        let leg = graph.transfer(&graph.initial_state(), 0, 1).unwrap();
        assert!(leg.via.is_empty());
        assert_eq!(leg.recharges, 0);
        assert!((leg.distance - 10.0).abs() < 1e-12);
        assert!((leg.arrival.remaining - 10.0).abs() < 1e-12);
        assert_eq!(leg.arrival.steps, 1);
    }

    #[test]
    fn recharge_stop_is_inserted_when_needed() {
        let _ = env_logger::try_init();
        let graph = corridor(8.0);
        let state = BatteryState {
            remaining: 8.0,
            recharges: 2,
            steps: 3,
        };
        let leg = graph.transfer(&state, 0, 1).unwrap();

        assert_eq!(leg.via.as_slice(), &[recharge_at(2)]);
        assert_eq!(leg.recharges, 1);
        let half = 34f64.sqrt();
        assert!((leg.distance - 2.0 * half).abs() < 1e-9);
        assert!((leg.arrival.remaining - (8.0 - half)).abs() < 1e-9);
        assert_eq!(leg.arrival.recharges, 3);
        assert_eq!(leg.arrival.steps, 5);
        // The caller's state is a value and stays as it was.
        assert_eq!(state.remaining, 8.0);
    }

    #[test]
    fn unreachable_recharge_makes_the_move_infeasible() {
        let graph = corridor(5.0);
        let leg = graph.transfer(&graph.initial_state(), 0, 1);
        assert_eq!(leg, Err(Infeasible));
    }

    #[test]
    fn same_node_transfer_is_free() {
        let graph = corridor(5.0);
        let state = BatteryState {
            remaining: 1.5,
            recharges: 1,
            steps: 7,
        };
        let leg = graph.transfer(&state, 1, 1).unwrap();
        assert_eq!(leg.arrival, state);
        assert_eq!(leg.distance, 0.0);
    }

    #[test]
    fn obstacles_are_flown_around_through_waypoints() {
        let graph = build_graph(&instance(
            100.0,
            vec![
                NodeSpec::new("D", 0.0, 0.0, NodeKind::Depot),
                NodeSpec::new("C", 10.0, 0.0, NodeKind::Client),
                NodeSpec::new("W", 5.0, 5.0, NodeKind::Client),
            ],
            vec![square(4.0, -1.0, 6.0, 1.0)],
        ))
        .unwrap();
        assert!(!graph.edge(0, 1).usable);

        let leg = graph.transfer(&graph.initial_state(), 0, 1).unwrap();
        assert_eq!(leg.via.as_slice(), &[waypoint(2)]);
        assert!((leg.distance - 2.0 * 50f64.sqrt()).abs() < 1e-9);
        assert!(leg.distance > 10.0);
    }

    #[test]
    fn fewer_recharges_beat_shorter_distance() {
        let graph = build_graph(&instance(
            30.0,
            vec![
                NodeSpec::new("D", 0.0, 0.0, NodeKind::Depot),
                NodeSpec::new("C", 10.0, 0.0, NodeKind::Client),
                NodeSpec::new("R", 5.0, 1.0, NodeKind::Recharge),
                NodeSpec::new("W", 5.0, -6.0, NodeKind::Client),
            ],
            vec![square(4.0, -0.5, 6.0, 0.5)],
        ))
        .unwrap();

        let leg = graph.transfer(&graph.initial_state(), 0, 1).unwrap();
        assert_eq!(leg.recharges, 0);
        assert_eq!(leg.via.as_slice(), &[waypoint(3)]);
        assert!((leg.distance - 2.0 * 61f64.sqrt()).abs() < 1e-9);
    }
}
