//! Planar polygon helpers used by the extractor.

use crate::domain::{polygon_edges, signed_area, Point, Segment};

/// Perimeter of a closed polygon.
pub fn perimeter(vertices: &[Point]) -> f64 {
    polygon_edges(vertices).map(|e| e.length()).sum()
}

/// Area centroid; falls back to the vertex mean for degenerate polygons.
pub fn centroid(vertices: &[Point]) -> Point {
    let area = signed_area(vertices);
    let n = vertices.len();
    if n == 0 {
        return Point::default();
    }
    if area.abs() < 1e-12 {
        let sx: f64 = vertices.iter().map(|p| p.x).sum();
        let sy: f64 = vertices.iter().map(|p| p.y).sum();
        return Point::new(sx / n as f64, sy / n as f64);
    }
    let (mut cx, mut cy) = (0.0, 0.0);
    for i in 0..n {
        let a = vertices[i];
        let b = vertices[(i + 1) % n];
        let cross = a.x * b.y - b.x * a.y;
        cx += (a.x + b.x) * cross;
        cy += (a.y + b.y) * cross;
    }
    Point::new(cx / (6.0 * area), cy / (6.0 * area))
}

/// `(short, long)` sides of the axis-aligned bounding box.
pub fn bbox_sides(vertices: &[Point]) -> (f64, f64) {
    let (min, max) = bounds(vertices);
    let w = max.x - min.x;
    let h = max.y - min.y;
    (w.min(h), w.max(h))
}

pub fn bounds(vertices: &[Point]) -> (Point, Point) {
    let mut min = Point::new(f64::INFINITY, f64::INFINITY);
    let mut max = Point::new(f64::NEG_INFINITY, f64::NEG_INFINITY);
    for p in vertices {
        min.x = min.x.min(p.x);
        min.y = min.y.min(p.y);
        max.x = max.x.max(p.x);
        max.y = max.y.max(p.y);
    }
    (min, max)
}

/// Ray-casting point-in-polygon test.
pub fn contains(vertices: &[Point], p: &Point) -> bool {
    let n = vertices.len();
    let mut inside = false;
    let mut j = n.wrapping_sub(1);
    for i in 0..n {
        let (a, b) = (vertices[i], vertices[j]);
        if (a.y > p.y) != (b.y > p.y) {
            let x = (b.x - a.x) * (p.y - a.y) / (b.y - a.y) + a.x;
            if p.x < x {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

/// Shortest distance from `p` to the polygon boundary.
pub fn boundary_distance(vertices: &[Point], p: &Point) -> f64 {
    polygon_edges(vertices)
        .map(|e| e.distance_to(p))
        .fold(f64::INFINITY, f64::min)
}

fn orientation(a: &Point, b: &Point, c: &Point) -> f64 {
    (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x)
}

fn properly_intersect(s: &Segment, t: &Segment) -> bool {
    let d1 = orientation(&s.start, &s.end, &t.start);
    let d2 = orientation(&s.start, &s.end, &t.end);
    let d3 = orientation(&t.start, &t.end, &s.start);
    let d4 = orientation(&t.start, &t.end, &s.end);
    const EPS: f64 = 1e-12;
    ((d1 > EPS && d2 < -EPS) || (d1 < -EPS && d2 > EPS))
        && ((d3 > EPS && d4 < -EPS) || (d3 < -EPS && d4 > EPS))
}

/// First pair of non-adjacent edges that cross, if any.
pub fn self_intersection(vertices: &[Point]) -> Option<(usize, usize)> {
    let edges: Vec<Segment> = polygon_edges(vertices).collect();
    let n = edges.len();
    for i in 0..n {
        for j in (i + 2)..n {
            if i == 0 && j == n - 1 {
                continue;
            }
            if properly_intersect(&edges[i], &edges[j]) {
                return Some((i, j));
            }
        }
    }
    None
}

/// Reorder to counter-clockwise winding.
pub fn ensure_ccw(vertices: &mut [Point]) {
    if signed_area(vertices) < 0.0 {
        vertices.reverse();
    }
}
