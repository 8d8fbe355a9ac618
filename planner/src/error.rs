#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InstanceError {
    #[error("{zone} has {vertices} vertices, at least 3 are required")]
    DegeneratePolygon { zone: String, vertices: usize },
    #[error("node id {0:?} is used more than once")]
    DuplicateNodeId(String),
    #[error("the instance has no depot")]
    MissingDepot,
    #[error("the instance has more than one depot ({first:?} and {second:?})")]
    MultipleDepots { first: String, second: String },
    #[error("no usable edge leaves depot {0:?}")]
    UnreachableDepot(String),
    #[error("parameter {name} has invalid value {value}")]
    InvalidParameter { name: &'static str, value: f64 },
    #[error("{0} has a non-finite coordinate")]
    NonFiniteCoordinate(String),
}
