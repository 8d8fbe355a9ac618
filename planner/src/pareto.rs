use std::cmp::Ordering;

use dronerouting_structs::plan::{ObjectiveVector, Route};
use ordered_float::OrderedFloat;

/// `a` is no worse than `b` in every objective and strictly better in at least one.
pub fn dominates(a: &ObjectiveVector, b: &ObjectiveVector) -> bool {
    let no_worse = a.distance <= b.distance && a.risk <= b.risk && a.recharges <= b.recharges;
    let better = a.distance < b.distance || a.risk < b.risk || a.recharges < b.recharges;
    no_worse && better
}

/// `Less` when `a` dominates `b`, `Greater` when `b` dominates `a`, `Equal` otherwise.
pub fn dominance_order(a: &ObjectiveVector, b: &ObjectiveVector) -> Ordering {
    if dominates(a, b) {
        Ordering::Less
    } else if dominates(b, a) {
        Ordering::Greater
    } else {
        Ordering::Equal
    }
}

/// What to do with a candidate whose vector equals a member's.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DuplicatePolicy {
    #[default]
    KeepFirst,
    KeepAll,
}

#[derive(Debug, Clone)]
pub struct FrontierMember {
    pub route: Route,
    pub objective: ObjectiveVector,
}

/// Mutually non-dominated set of routes.
#[derive(Debug, Clone, Default)]
pub struct ParetoFrontier {
    members: Vec<FrontierMember>,
    policy: DuplicatePolicy,
}

impl ParetoFrontier {
    pub fn new(policy: DuplicatePolicy) -> Self {
        Self {
            members: Vec::new(),
            policy,
        }
    }

    pub fn policy(&self) -> DuplicatePolicy {
        self.policy
    }

    /// Inserts the route unless a member dominates it (or duplicates it under `KeepFirst`).
    /// Members dominated by the new route are removed.
    pub fn try_insert(&mut self, route: Route, objective: ObjectiveVector) -> bool {
        for member in self.members.iter() {
            if dominates(&member.objective, &objective) {
                return false;
            }
            if self.policy == DuplicatePolicy::KeepFirst && member.objective == objective {
                return false;
            }
        }
        self.members.retain(|m| !dominates(&objective, &m.objective));
        self.members.push(FrontierMember { route, objective });
        true
    }

    /// Whether every completion of a partial route with lower bound `bound` is already covered.
    ///
    /// All objectives only grow along a route, so a member that is no worse than the bound in every
    /// component is no worse than any completion.
    pub fn cuts(&self, bound: &ObjectiveVector) -> bool {
        self.members.iter().any(|m| {
            let o = &m.objective;
            let covers = o.distance <= bound.distance
                && o.risk <= bound.risk
                && o.recharges <= bound.recharges;
            match self.policy {
                DuplicatePolicy::KeepFirst => covers,
                DuplicatePolicy::KeepAll => covers && dominates(o, bound),
            }
        })
    }

    /// Inserts the members of `other` in their order. Returns the number accepted.
    pub fn merge(&mut self, other: ParetoFrontier) -> usize {
        other
            .members
            .into_iter()
            .filter(|m| self.try_insert(m.route.clone(), m.objective))
            .count()
    }

    pub fn members(&self) -> &[FrontierMember] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Members by ascending distance, then risk, then recharges.
    pub fn sorted(&self) -> Vec<&FrontierMember> {
        let mut sorted = self.members.iter().collect::<Vec<_>>();
        sorted.sort_by_key(|m| sort_key(&m.objective));
        sorted
    }

    /// Objective vectors in sorted order.
    pub fn vectors(&self) -> Vec<ObjectiveVector> {
        self.sorted().into_iter().map(|m| m.objective).collect()
    }
}

fn sort_key(v: &ObjectiveVector) -> (OrderedFloat<f64>, OrderedFloat<f64>, u32) {
    (OrderedFloat(v.distance), OrderedFloat(v.risk), v.recharges)
}
