//! Planar predicates used to decide line of sight between nodes.
//!
//! All predicates are total: degenerate input (zero-length segments, collinear points) yields a
//! well-defined boolean instead of an error.

use dronerouting_structs::{BoundingBox, Point, Polygon};
use ordered_float::OrderedFloat;
use tinyvec::TinyVec;

pub const EPSILON: f64 = 1e-9;

/// How contacts that are not transversal crossings are treated.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Touching {
    /// Shared endpoints, T-junctions and collinear overlaps count as intersections.
    Include,
    /// Only proper crossings of the two interiors count.
    Exclude,
}

/// Whether points on a polygon's boundary count as inside it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Boundary {
    Include,
    Exclude,
}

pub fn distance(a: &Point, b: &Point) -> f64 {
    a.dist(b)
}

/// Twice the signed area of the triangle `abc`. Positive for a counter-clockwise turn.
pub fn orientation(a: &Point, b: &Point, c: &Point) -> f64 {
    (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x)
}

/// Bounding box test for `c` against segment `ab`. Only meaningful when `c` is collinear with `ab`.
fn within_segment_box(a: &Point, b: &Point, c: &Point) -> bool {
    a.x.min(b.x) - EPSILON <= c.x
        && c.x <= a.x.max(b.x) + EPSILON
        && a.y.min(b.y) - EPSILON <= c.y
        && c.y <= a.y.max(b.y) + EPSILON
}

fn on_segment(a: &Point, b: &Point, c: &Point) -> bool {
    orientation(a, b, c).abs() <= EPSILON && within_segment_box(a, b, c)
}

fn strictly_opposite(o1: f64, o2: f64) -> bool {
    (o1 > EPSILON && o2 < -EPSILON) || (o1 < -EPSILON && o2 > EPSILON)
}

pub fn segments_intersect(a: &Point, b: &Point, c: &Point, d: &Point, touching: Touching) -> bool {
    let abc = orientation(a, b, c);
    let abd = orientation(a, b, d);
    let cda = orientation(c, d, a);
    let cdb = orientation(c, d, b);

    if strictly_opposite(abc, abd) && strictly_opposite(cda, cdb) {
        return true;
    }

    if touching == Touching::Exclude {
        return false;
    }

    (abc.abs() <= EPSILON && within_segment_box(a, b, c))
        || (abd.abs() <= EPSILON && within_segment_box(a, b, d))
        || (cda.abs() <= EPSILON && within_segment_box(c, d, a))
        || (cdb.abs() <= EPSILON && within_segment_box(c, d, b))
}

pub fn point_in_polygon(p: &Point, polygon: &Polygon, boundary: Boundary) -> bool {
    let Some(bbox) = polygon.bounding_box() else {
        return false;
    };
    if !bbox.contains(p, EPSILON) {
        return false;
    }

    if polygon.edges().any(|(a, b)| on_segment(&a, &b, p)) {
        return boundary == Boundary::Include;
    }

    // Even-odd ray cast towards +x.
    let mut inside = false;
    for (a, b) in polygon.edges() {
        if (a.y > p.y) != (b.y > p.y) {
            let x_cross = a.x + (p.y - a.y) * (b.x - a.x) / (b.y - a.y);
            if x_cross > p.x {
                inside = !inside;
            }
        }
    }
    inside
}

/// True iff some part of the segment `ab` lies in the open interior of `polygon`.
///
/// Grazing a vertex, touching an edge or flying along an edge is not a crossing, so tangent paths
/// around obstacles stay usable.
pub fn segment_crosses_polygon(a: &Point, b: &Point, polygon: &Polygon) -> bool {
    let Some(poly_box) = polygon.bounding_box() else {
        return false;
    };
    let Some(seg_box) = BoundingBox::of_points([a, b]) else {
        return false;
    };
    if !seg_box.overlaps(&poly_box, EPSILON) {
        return false;
    }

    if a.eq_xy(b) {
        return point_in_polygon(a, polygon, Boundary::Exclude);
    }

    if polygon
        .edges()
        .any(|(c, d)| segments_intersect(a, b, &c, &d, Touching::Exclude))
    {
        return true;
    }

    // No transversal crossing: the boundary is only met at isolated points or along collinear
    // stretches. Split at every contact and test each piece at its midpoint.
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    let len2 = dx * dx + dy * dy;

    let mut cuts: TinyVec<[OrderedFloat<f64>; 16]> = Default::default();
    cuts.push(OrderedFloat(0.0));
    cuts.push(OrderedFloat(1.0));
    for v in polygon.vertices.iter() {
        if on_segment(a, b, v) {
            let t = ((v.x - a.x) * dx + (v.y - a.y) * dy) / len2;
            cuts.push(OrderedFloat(t.clamp(0.0, 1.0)));
        }
    }
    cuts.sort();

    cuts.windows(2).any(|w| {
        let (t0, t1) = (w[0].0, w[1].0);
        if t1 - t0 <= EPSILON {
            return false;
        }
        let t = 0.5 * (t0 + t1);
        let mid = Point::new(a.x + t * dx, a.y + t * dy);
        point_in_polygon(&mid, polygon, Boundary::Exclude)
    })
}

/// True iff the segment `ab` meets the closed polygon at all.
pub fn segment_touches_polygon(a: &Point, b: &Point, polygon: &Polygon) -> bool {
    let Some(poly_box) = polygon.bounding_box() else {
        return false;
    };
    let Some(seg_box) = BoundingBox::of_points([a, b]) else {
        return false;
    };
    if !seg_box.overlaps(&poly_box, EPSILON) {
        return false;
    }

    polygon
        .edges()
        .any(|(c, d)| segments_intersect(a, b, &c, &d, Touching::Include))
        || point_in_polygon(a, polygon, Boundary::Include)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn p(x: f64, y: f64) -> Point {
        Point::new(x, y)
    }

    fn zp1() -> Polygon {
        Polygon::new(vec![p(2.0, 1.0), p(4.0, 1.0), p(4.0, 3.0), p(2.0, 3.0)])
    }

    fn meets(a: Point, b: Point, c: Point, d: Point) -> bool {
        segments_intersect(&a, &b, &c, &d, Touching::Include)
    }

    fn crosses(a: Point, b: Point, c: Point, d: Point) -> bool {
        segments_intersect(&a, &b, &c, &d, Touching::Exclude)
    }

    #[test]
    fn crossing_diagonals_intersect() {
        let (a, b, c, d) = (p(0.0, 0.0), p(4.0, 4.0), p(0.0, 4.0), p(4.0, 0.0));
        assert!(meets(a, b, c, d));
        assert!(crosses(a, b, c, d));
        assert!(!meets(a, b, p(5.0, 5.0), p(6.0, 6.0)));
    }

    #[test]
    fn touching_endpoints_follow_policy() {
        let (a, b) = (p(0.0, 0.0), p(2.0, 0.0));
        // Shared endpoint.
        assert!(meets(a, b, b, p(3.0, 1.0)));
        assert!(!crosses(a, b, b, p(3.0, 1.0)));
        // T-junction.
        assert!(meets(a, b, p(1.0, 0.0), p(1.0, 2.0)));
        assert!(!crosses(a, b, p(1.0, 0.0), p(1.0, 2.0)));
        // Collinear overlap.
        assert!(meets(a, b, p(1.0, 0.0), p(3.0, 0.0)));
        // Collinear but disjoint.
        assert!(!meets(a, b, p(3.0, 0.0), p(4.0, 0.0)));
    }

    #[test]
    fn zero_length_segments_are_handled() {
        let q = p(1.0, 0.0);
        assert!(meets(q, q, p(0.0, 0.0), p(2.0, 0.0)));
        assert!(!crosses(q, q, p(0.0, 0.0), p(2.0, 0.0)));
        assert!(!meets(q, q, p(0.0, 1.0), p(2.0, 1.0)));

        assert!(segment_crosses_polygon(&p(3.0, 2.0), &p(3.0, 2.0), &zp1()));
        assert!(!segment_crosses_polygon(&p(2.0, 2.0), &p(2.0, 2.0), &zp1()));
        assert!(!segment_crosses_polygon(&p(9.0, 9.0), &p(9.0, 9.0), &zp1()));
    }

    #[test]
    fn point_in_polygon_inside_outside_border() {
        let zp1 = zp1();
        assert!(point_in_polygon(&p(3.0, 2.0), &zp1, Boundary::Include));
        assert!(point_in_polygon(&p(3.0, 2.0), &zp1, Boundary::Exclude));
        assert!(!point_in_polygon(&p(10.0, 10.0), &zp1, Boundary::Include));
        assert!(point_in_polygon(&p(2.0, 2.0), &zp1, Boundary::Include));
        assert!(!point_in_polygon(&p(2.0, 2.0), &zp1, Boundary::Exclude));
        assert!(point_in_polygon(&p(4.0, 3.0), &zp1, Boundary::Include));
        assert!(!point_in_polygon(&p(4.0, 3.0), &zp1, Boundary::Exclude));
    }

    #[test]
    fn concave_polygon_ray_cast() {
        // U shape opening upwards.
        let u = Polygon::new(vec![
            p(0.0, 0.0),
            p(3.0, 0.0),
            p(3.0, 3.0),
            p(2.0, 3.0),
            p(2.0, 1.0),
            p(1.0, 1.0),
            p(1.0, 3.0),
            p(0.0, 3.0),
        ]);
        assert!(point_in_polygon(&p(0.5, 2.0), &u, Boundary::Exclude));
        assert!(!point_in_polygon(&p(1.5, 2.0), &u, Boundary::Exclude));
        // Through the notch of the U without entering the material.
        assert!(!segment_crosses_polygon(&p(1.5, 5.0), &p(1.5, 1.0), &u));
        // Across both arms.
        assert!(segment_crosses_polygon(&p(-1.0, 2.0), &p(4.0, 2.0), &u));
    }

    #[test]
    fn segment_through_obstacle_crosses() {
        let zp1 = zp1();
        assert!(segment_crosses_polygon(&p(0.0, 0.0), &p(5.0, 2.0), &zp1));
        assert!(!segment_crosses_polygon(&p(0.0, 0.0), &p(-3.0, 4.0), &zp1));
        // One endpoint inside.
        assert!(segment_crosses_polygon(&p(3.0, 2.0), &p(10.0, 2.0), &zp1));
        // Entirely inside.
        assert!(segment_crosses_polygon(&p(2.5, 1.5), &p(3.5, 2.5), &zp1));
    }

    #[test]
    fn tangent_paths_are_not_crossings() {
        let zp1 = zp1();
        // Along the bottom edge and beyond.
        assert!(!segment_crosses_polygon(&p(0.0, 1.0), &p(6.0, 1.0), &zp1));
        // Grazing the corner (2, 1).
        assert!(!segment_crosses_polygon(&p(0.0, 3.0), &p(3.0, 0.0), &zp1));
        // Ending on a vertex.
        let tri = Polygon::new(vec![p(4.0, 1.0), p(6.0, 1.0), p(6.0, 3.0)]);
        assert!(!segment_crosses_polygon(&p(0.0, 5.0), &p(4.0, 1.0), &tri));
        // Ending exactly on the boundary from outside.
        assert!(!segment_crosses_polygon(&p(0.0, 2.0), &p(2.0, 2.0), &zp1));
    }

    #[test]
    fn entering_through_a_vertex_crosses() {
        let zp1 = zp1();
        // Diagonal of the square, from corner to corner extended.
        assert!(segment_crosses_polygon(&p(1.0, 0.0), &p(5.0, 4.0), &zp1));
    }

    #[test]
    fn touching_detects_contact_and_containment() {
        let zp1 = zp1();
        assert!(segment_touches_polygon(&p(0.0, 1.0), &p(6.0, 1.0), &zp1));
        assert!(segment_touches_polygon(&p(2.5, 1.5), &p(3.5, 2.5), &zp1));
        assert!(!segment_touches_polygon(&p(0.0, 0.0), &p(-3.0, 4.0), &zp1));
    }

    proptest! {
        #[test]
        fn segments_outside_bounding_box_never_cross(
            x0 in 4.001f64..100.0, y0 in -100.0f64..100.0,
            x1 in 4.001f64..100.0, y1 in -100.0f64..100.0,
        ) {
            let zp1 = zp1();
            prop_assert!(!segment_crosses_polygon(&p(x0, y0), &p(x1, y1), &zp1));
            prop_assert!(!segment_crosses_polygon(&p(-x0, y0), &p(-x1, y1), &zp1));
        }

        #[test]
        fn intersection_is_symmetric(
            coords in proptest::array::uniform8(-10.0f64..10.0),
        ) {
            let [ax, ay, bx, by, cx, cy, dx, dy] = coords;
            let (a, b, c, d) = (p(ax, ay), p(bx, by), p(cx, cy), p(dx, dy));
            for touching in [Touching::Include, Touching::Exclude] {
                prop_assert_eq!(
                    segments_intersect(&a, &b, &c, &d, touching),
                    segments_intersect(&c, &d, &a, &b, touching)
                );
            }
        }
    }
}
