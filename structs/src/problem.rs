use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{Point, Polygon};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    #[serde(rename = "hub", alias = "depot")]
    Depot,
    Client,
    Recharge,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct NodeSpec {
    pub id: String,
    pub x: f64,
    pub y: f64,
    #[serde(rename = "type")]
    pub kind: NodeKind,
}

impl NodeSpec {
    pub fn new(id: impl Into<String>, x: f64, y: f64, kind: NodeKind) -> Self {
        Self {
            id: id.into(),
            x,
            y,
            kind,
        }
    }

    pub fn pos(&self) -> Point {
        Point {
            x: self.x,
            y: self.y,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ForbiddenZone {
    pub polygon: Polygon,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RiskZone {
    pub polygon: Polygon,
    pub risk_factor: f64,
}

/// How per-edge risks combine along a route.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum RiskAggregation {
    /// Plain sum of edge risks.
    #[default]
    Additive,
    /// Edge risks are independent incident probabilities, combined as `1 - prod(1 - r)`.
    Multiplicative,
}

fn default_energy_per_unit() -> f64 {
    1.0
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Parameters {
    pub max_battery: f64,
    #[serde(default = "default_energy_per_unit")]
    pub energy_per_unit: f64,
    #[serde(default)]
    pub risk_per_unit: f64,
    /// Battery at takeoff. Full capacity when absent.
    #[serde(default)]
    pub start_battery: Option<f64>,
    /// Whether flying through the depot in the middle of a leg refills the battery.
    #[serde(default)]
    pub depot_recharges: bool,
    #[serde(default)]
    pub risk_aggregation: RiskAggregation,
}

impl Parameters {
    pub fn with_capacity(max_battery: f64) -> Self {
        Self {
            max_battery,
            energy_per_unit: default_energy_per_unit(),
            risk_per_unit: 0.0,
            start_battery: None,
            depot_recharges: false,
            risk_aggregation: RiskAggregation::Additive,
        }
    }

    pub fn initial_battery(&self) -> f64 {
        self.start_battery.unwrap_or(self.max_battery)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Instance {
    #[serde(flatten)]
    pub parameters: Parameters,
    pub nodes: Vec<NodeSpec>,
    #[serde(default)]
    pub forbidden_zones: Vec<ForbiddenZone>,
    #[serde(default)]
    pub risk_zones: Vec<RiskZone>,
}

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("could not read instance file: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed instance json: {0}")]
    Json(#[from] serde_json::Error),
}

impl Instance {
    pub fn from_json_str(json: &str) -> Result<Instance, LoadError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Instance, LoadError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    pub fn clients(&self) -> impl Iterator<Item = &NodeSpec> {
        self.nodes.iter().filter(|n| n.kind == NodeKind::Client)
    }
}
