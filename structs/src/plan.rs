use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StopRole {
    Start,
    /// A client served at this stop.
    Visit,
    /// Battery refilled to capacity.
    Recharge,
    /// Flown over as a waypoint, nothing happens there.
    #[default]
    PassThrough,
    End,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Stop {
    pub node: u32,
    pub role: StopRole,
}

/// Depot-to-depot sequence of stops.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Route {
    pub stops: Vec<Stop>,
}

impl Route {
    pub fn client_order(&self) -> impl Iterator<Item = u32> + '_ {
        self.stops
            .iter()
            .filter(|s| s.role == StopRole::Visit)
            .map(|s| s.node)
    }

    pub fn recharge_stops(&self) -> impl Iterator<Item = u32> + '_ {
        self.stops
            .iter()
            .filter(|s| s.role == StopRole::Recharge)
            .map(|s| s.node)
    }

    pub fn len(&self) -> usize {
        self.stops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stops.is_empty()
    }
}

/// Objectives of a complete or partial route. All are minimized.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ObjectiveVector {
    pub distance: f64,
    pub risk: f64,
    pub recharges: u32,
}

impl ObjectiveVector {
    pub fn new(distance: f64, risk: f64, recharges: u32) -> Self {
        Self {
            distance,
            risk,
            recharges,
        }
    }

    pub fn as_array(&self) -> [f64; 3] {
        [self.distance, self.risk, self.recharges as f64]
    }
}

impl std::fmt::Display for ObjectiveVector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "(dist={:.3}, risk={:.3}, recharges={})",
            self.distance, self.risk, self.recharges
        )
    }
}
