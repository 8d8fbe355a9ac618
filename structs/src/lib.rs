use serde::{Deserialize, Serialize};

pub mod plan;
pub mod problem;

#[derive(Clone, Copy, Serialize, Deserialize, Debug, Default, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn dist(&self, other: &Point) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }

    pub fn eq_xy(&self, other: &Point) -> bool {
        self.dist(other) < 1e-9
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// Axis-aligned box `(min, max)`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    pub min: Point,
    pub max: Point,
}

impl BoundingBox {
    pub fn of_points<'a>(points: impl IntoIterator<Item = &'a Point>) -> Option<Self> {
        let mut points = points.into_iter();
        let first = *points.next()?;
        let mut bbox = BoundingBox {
            min: first,
            max: first,
        };
        for p in points {
            bbox.min.x = bbox.min.x.min(p.x);
            bbox.min.y = bbox.min.y.min(p.y);
            bbox.max.x = bbox.max.x.max(p.x);
            bbox.max.y = bbox.max.y.max(p.y);
        }
        Some(bbox)
    }

    /// Overlap test with a slack of `eps` on every side.
    pub fn overlaps(&self, other: &BoundingBox, eps: f64) -> bool {
        !(self.max.x < other.min.x - eps
            || other.max.x < self.min.x - eps
            || self.max.y < other.min.y - eps
            || other.max.y < self.min.y - eps)
    }

    pub fn contains(&self, p: &Point, eps: f64) -> bool {
        p.x >= self.min.x - eps
            && p.x <= self.max.x + eps
            && p.y >= self.min.y - eps
            && p.y <= self.max.y + eps
    }
}

/// Closed obstacle or zone boundary. Vertices are listed in order and the last one connects back to
/// the first. Simplicity is assumed, not checked.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
#[serde(transparent)]
pub struct Polygon {
    pub vertices: Vec<Point>,
}

impl Polygon {
    pub fn new(vertices: Vec<Point>) -> Self {
        Self { vertices }
    }

    pub fn edges(&self) -> impl Iterator<Item = (Point, Point)> + '_ {
        let n = self.vertices.len();
        (0..n).map(move |i| (self.vertices[i], self.vertices[(i + 1) % n]))
    }

    pub fn bounding_box(&self) -> Option<BoundingBox> {
        BoundingBox::of_points(self.vertices.iter())
    }

    pub fn is_degenerate(&self) -> bool {
        self.vertices.len() < 3
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distance_3_4_5() {
        let d = Point::new(0.0, 0.0).dist(&Point::new(3.0, 4.0));
        assert!((d - 5.0).abs() < 1e-12);
    }

    #[test]
    fn polygon_edges_wrap_around() {
        let square = Polygon::new(vec![
            Point::new(0.0, 0.0),
            Point::new(1.0, 0.0),
            Point::new(1.0, 1.0),
            Point::new(0.0, 1.0),
        ]);
        let edges = square.edges().collect::<Vec<_>>();
        assert_eq!(edges.len(), 4);
        assert_eq!(edges[3], (Point::new(0.0, 1.0), Point::new(0.0, 0.0)));

        let bbox = square.bounding_box().unwrap();
        assert_eq!(bbox.min, Point::new(0.0, 0.0));
        assert_eq!(bbox.max, Point::new(1.0, 1.0));
        assert!(!bbox.contains(&Point::new(2.0, 0.5), 1e-9));
    }
}
