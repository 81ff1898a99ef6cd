//! Adjacency graph from shared wall edges.

use crate::domain::{polygon_edges, Adjacency, Point, Segment};
use crate::extract::polygon::bounds;

/// Edges closer to parallel than this (sine of the angle) are treated as parallel.
const PARALLEL_SINE: f64 = 0.01;

/// Length over which two edges run side by side within `max_gap`.
pub fn shared_length(a: &Segment, b: &Segment, max_gap: f64) -> f64 {
    let len_a = a.length();
    let len_b = b.length();
    if len_a == 0.0 || len_b == 0.0 {
        return 0.0;
    }
    let ux = (a.end.x - a.start.x) / len_a;
    let uy = (a.end.y - a.start.y) / len_a;
    let vx = (b.end.x - b.start.x) / len_b;
    let vy = (b.end.y - b.start.y) / len_b;
    if (ux * vy - uy * vx).abs() > PARALLEL_SINE {
        return 0.0;
    }
    // Perpendicular distance of b's midpoint from a's supporting line.
    let mid = Point::new((b.start.x + b.end.x) / 2.0, (b.start.y + b.end.y) / 2.0);
    let gap = ((mid.x - a.start.x) * uy - (mid.y - a.start.y) * ux).abs();
    if gap > max_gap {
        return 0.0;
    }
    let project = |p: &Point| (p.x - a.start.x) * ux + (p.y - a.start.y) * uy;
    let (t0, t1) = {
        let s = project(&b.start);
        let e = project(&b.end);
        (s.min(e), s.max(e))
    };
    (t1.min(len_a) - t0.max(0.0)).max(0.0)
}

/// Total shared boundary length between two closed polygons.
pub fn shared_boundary(a: &[Point], b: &[Point], max_gap: f64) -> f64 {
    let (a_min, a_max) = bounds(a);
    let (b_min, b_max) = bounds(b);
    if a_min.x > b_max.x + max_gap
        || b_min.x > a_max.x + max_gap
        || a_min.y > b_max.y + max_gap
        || b_min.y > a_max.y + max_gap
    {
        return 0.0;
    }
    polygon_edges(a)
        .map(|ea| {
            polygon_edges(b)
                .map(|eb| shared_length(&ea, &eb, max_gap))
                .sum::<f64>()
        })
        .sum()
}

/// Adjacency between every pair of rooms on the same level.
///
/// `rooms` is `(id, level, vertices)`; output pairs keep input order (`a` before `b`).
pub fn build(rooms: &[(&str, usize, &[Point])], min_shared: f64, max_gap: f64) -> Vec<Adjacency> {
    let mut out = Vec::new();
    for (i, (id_a, level_a, poly_a)) in rooms.iter().enumerate() {
        for (id_b, level_b, poly_b) in rooms.iter().skip(i + 1) {
            if level_a != level_b {
                continue;
            }
            let shared = shared_boundary(poly_a, poly_b, max_gap);
            if shared >= min_shared {
                out.push(Adjacency {
                    a: id_a.to_string(),
                    b: id_b.to_string(),
                    shared_length_m: shared,
                });
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> Vec<Point> {
        vec![
            Point::new(x0, y0),
            Point::new(x1, y0),
            Point::new(x1, y1),
            Point::new(x0, y1),
        ]
    }

    #[test]
    fn test_touching_rooms_share_edge() {
        let a = rect(0.0, 0.0, 4.0, 5.0);
        let b = rect(4.0, 0.0, 10.0, 5.0);
        assert!((shared_boundary(&a, &b, 0.4) - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_wall_gap_within_tolerance() {
        let a = rect(0.0, 0.0, 4.0, 5.0);
        let b = rect(4.2, 1.0, 10.0, 5.0);
        assert!((shared_boundary(&a, &b, 0.4) - 4.0).abs() < 1e-9);
        assert_eq!(shared_boundary(&a, &b, 0.1), 0.0);
    }

    #[test]
    fn test_build_skips_other_levels_and_corners() {
        let a = rect(0.0, 0.0, 4.0, 4.0);
        let b = rect(4.0, 4.0, 8.0, 8.0);
        let c = rect(4.0, 0.0, 8.0, 4.0);
        let rooms = [
            ("a", 0, a.as_slice()),
            ("b", 0, b.as_slice()),
            ("c", 1, c.as_slice()),
        ];
        assert!(build(&rooms, 0.5, 0.4).is_empty());
    }
}
