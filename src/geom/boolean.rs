//! Polygon boolean algebra (union / intersection / difference) via planar
//! overlay: split every edge at crossings, classify each fragment by which
//! side of it lies inside the result, keep the fragments that separate
//! inside from outside, and stitch them back into rings.

use std::collections::HashMap;

use super::{MultiPolygon, Polygon, Ring, Vec2, point_in_ring, signed_area};

/// Perpendicular offset used to sample just off an edge when classifying it.
const SIDE_SAMPLE_EPS: f64 = 1e-5;
/// Parameter-space tolerance when splitting edges at intersections.
const SPLIT_T_EPS: f64 = 1e-9;
/// Rings with less area than this are dropped as numeric noise.
const MIN_RING_AREA: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BoolOp {
    Union,
    Intersection,
    Difference,
}

pub fn union(a: &MultiPolygon, b: &MultiPolygon) -> MultiPolygon {
    if a.is_empty() {
        return b.clone();
    }
    if b.is_empty() {
        return a.clone();
    }
    overlay(a, b, BoolOp::Union)
}

pub fn intersection(a: &MultiPolygon, b: &MultiPolygon) -> MultiPolygon {
    if a.is_empty() || b.is_empty() {
        return MultiPolygon::default();
    }
    overlay(a, b, BoolOp::Intersection)
}

pub fn difference(a: &MultiPolygon, b: &MultiPolygon) -> MultiPolygon {
    if a.is_empty() {
        return MultiPolygon::default();
    }
    if b.is_empty() {
        return a.clone();
    }
    overlay(a, b, BoolOp::Difference)
}

/// Fold a sequence of shapes into one union, largest first so small nested
/// shapes cannot be erased by later holes.
pub fn union_all(mut shapes: Vec<MultiPolygon>) -> MultiPolygon {
    shapes.sort_by(|l, r| {
        r.area()
            .partial_cmp(&l.area())
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    let mut acc = MultiPolygon::default();
    for shape in shapes {
        acc = union(&acc, &shape);
    }
    acc
}

fn overlay(a: &MultiPolygon, b: &MultiPolygon, op: BoolOp) -> MultiPolygon {
    let edges_a = collect_edges(a);
    let edges_b = collect_edges(b);

    let mut kept: Vec<(Vec2, Vec2)> = Vec::new();
    split_and_classify(&edges_a, &edges_b, a, b, op, &mut kept);
    split_and_classify(&edges_b, &edges_a, a, b, op, &mut kept);

    dedup_edges(&mut kept);
    let rings = stitch(kept);
    assemble(rings)
}

/// Directed edges of every ring (exteriors and holes alike; orientation of
/// the source rings does not matter, classification re-orients).
fn collect_edges(shape: &MultiPolygon) -> Vec<(Vec2, Vec2)> {
    let mut edges = Vec::new();
    for poly in &shape.polygons {
        push_ring_edges(&poly.exterior, &mut edges);
        for hole in &poly.holes {
            push_ring_edges(hole, &mut edges);
        }
    }
    edges
}

fn push_ring_edges(ring: &Ring, edges: &mut Vec<(Vec2, Vec2)>) {
    if ring.len() < 3 {
        return;
    }
    for i in 0..ring.len() {
        let a = ring[i];
        let b = ring[(i + 1) % ring.len()];
        if a.quantized() != b.quantized() {
            edges.push((a, b));
        }
    }
}

fn split_and_classify(
    edges: &[(Vec2, Vec2)],
    others: &[(Vec2, Vec2)],
    a: &MultiPolygon,
    b: &MultiPolygon,
    op: BoolOp,
    kept: &mut Vec<(Vec2, Vec2)>,
) {
    for &(p0, p1) in edges {
        let mut cuts: Vec<f64> = vec![0.0, 1.0];
        for &(q0, q1) in others {
            edge_cut_params(p0, p1, q0, q1, &mut cuts);
        }
        cuts.sort_by(|x, y| x.partial_cmp(y).unwrap_or(std::cmp::Ordering::Equal));
        cuts.dedup_by(|x, y| (*x - *y).abs() < SPLIT_T_EPS);

        let dir = p1 - p0;
        for w in cuts.windows(2) {
            let (t0, t1) = (w[0], w[1]);
            if t1 - t0 < SPLIT_T_EPS {
                continue;
            }
            let s = p0 + dir * t0;
            let e = p0 + dir * t1;
            let mid = p0 + dir * ((t0 + t1) * 0.5);
            let normal = dir.perp().normalized();
            let left = mid + normal * SIDE_SAMPLE_EPS;
            let right = mid - normal * SIDE_SAMPLE_EPS;
            let left_in = op_contains(a, b, op, left);
            let right_in = op_contains(a, b, op, right);
            // A fragment belongs to the result boundary iff it separates
            // inside from outside. Interior goes on the left of the edge.
            if left_in && !right_in {
                kept.push((s, e));
            } else if right_in && !left_in {
                kept.push((e, s));
            }
        }
    }
}

fn op_contains(a: &MultiPolygon, b: &MultiPolygon, op: BoolOp, p: Vec2) -> bool {
    match op {
        BoolOp::Union => a.contains(p) || b.contains(p),
        BoolOp::Intersection => a.contains(p) && b.contains(p),
        BoolOp::Difference => a.contains(p) && !b.contains(p),
    }
}

/// Intersection parameters of edge (p0,p1) against (q0,q1), pushed as t
/// values on the p edge. Collinear overlaps contribute both projected
/// endpoints.
fn edge_cut_params(p0: Vec2, p1: Vec2, q0: Vec2, q1: Vec2, cuts: &mut Vec<f64>) {
    let r = p1 - p0;
    let s = q1 - q0;
    let denom = r.cross(s);
    let qp = q0 - p0;
    if denom.abs() > 1e-12 {
        let t = qp.cross(s) / denom;
        let u = qp.cross(r) / denom;
        if t > SPLIT_T_EPS && t < 1.0 - SPLIT_T_EPS && u >= -SPLIT_T_EPS && u <= 1.0 + SPLIT_T_EPS {
            cuts.push(t);
        }
        return;
    }
    // Parallel. Only collinear segments can overlap.
    if qp.cross(r).abs() > 1e-9 {
        return;
    }
    let len_sq = r.dot(r);
    if len_sq <= f64::EPSILON {
        return;
    }
    for q in [q0, q1] {
        let t = (q - p0).dot(r) / len_sq;
        if t > SPLIT_T_EPS && t < 1.0 - SPLIT_T_EPS {
            cuts.push(t);
        }
    }
}

fn dedup_edges(edges: &mut Vec<(Vec2, Vec2)>) {
    let mut seen = HashMap::new();
    edges.retain(|&(s, e)| {
        let key = (s.quantized(), e.quantized());
        if key.0 == key.1 {
            return false;
        }
        seen.insert(key, ()).is_none()
    });
}

/// Walk directed edges into closed rings. At junction vertices, take the
/// sharpest left turn so rings with the interior on their left stay simple.
fn stitch(edges: Vec<(Vec2, Vec2)>) -> Vec<Ring> {
    let mut outgoing: HashMap<(i64, i64), Vec<usize>> = HashMap::new();
    for (idx, (s, _)) in edges.iter().enumerate() {
        outgoing.entry(s.quantized()).or_default().push(idx);
    }

    let mut used = vec![false; edges.len()];
    let mut rings = Vec::new();

    for start in 0..edges.len() {
        if used[start] {
            continue;
        }
        let mut ring: Ring = Vec::new();
        let start_key = edges[start].0.quantized();
        let mut current = start;
        loop {
            used[current] = true;
            let (s, e) = edges[current];
            ring.push(s);
            let end_key = e.quantized();
            if end_key == start_key {
                break;
            }
            let incoming_dir = e - s;
            let candidates = outgoing.get(&end_key);
            let next = candidates.and_then(|cands| {
                cands
                    .iter()
                    .copied()
                    .filter(|&c| !used[c])
                    .min_by(|&l, &r| {
                        let turn_l = turn_angle(incoming_dir, edges[l].1 - edges[l].0);
                        let turn_r = turn_angle(incoming_dir, edges[r].1 - edges[r].0);
                        turn_l
                            .partial_cmp(&turn_r)
                            .unwrap_or(std::cmp::Ordering::Equal)
                    })
            });
            match next {
                Some(next) => current = next,
                // Open chain: numeric mismatch somewhere, drop it.
                None => {
                    ring.clear();
                    break;
                }
            }
        }
        if ring.len() >= 3 && signed_area(&ring).abs() > MIN_RING_AREA {
            rings.push(ring);
        }
    }
    rings
}

/// Turn angle in `(-pi, pi]`, smallest = sharpest left turn.
fn turn_angle(incoming: Vec2, outgoing: Vec2) -> f64 {
    let angle = outgoing.y.atan2(outgoing.x) - incoming.y.atan2(incoming.x);
    let mut a = angle;
    while a <= -std::f64::consts::PI {
        a += 2.0 * std::f64::consts::PI;
    }
    while a > std::f64::consts::PI {
        a -= 2.0 * std::f64::consts::PI;
    }
    // Map so that the sharpest left turn sorts first, a u-turn last.
    -a
}

/// Counterclockwise rings become exteriors, clockwise rings holes; each hole
/// attaches to the smallest exterior containing it.
fn assemble(rings: Vec<Ring>) -> MultiPolygon {
    let mut exteriors: Vec<(f64, Ring)> = Vec::new();
    let mut holes: Vec<Ring> = Vec::new();
    for ring in rings {
        let area = signed_area(&ring);
        if area > 0.0 {
            exteriors.push((area, ring));
        } else {
            holes.push(ring);
        }
    }
    exteriors.sort_by(|l, r| l.0.partial_cmp(&r.0).unwrap_or(std::cmp::Ordering::Equal));

    let mut polygons: Vec<Polygon> = exteriors
        .into_iter()
        .map(|(_, ring)| Polygon::from_ring(ring))
        .collect();
    'holes: for hole in holes {
        let probe = hole[0];
        for poly in polygons.iter_mut() {
            if point_in_ring(probe, &poly.exterior) {
                poly.holes.push(hole);
                continue 'holes;
            }
        }
        // Orphan hole: nothing contains it, discard.
        log::warn!("boolean overlay produced an orphan hole, discarding");
    }
    MultiPolygon { polygons }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(x: f64, y: f64, size: f64) -> MultiPolygon {
        MultiPolygon::from_polygon(Polygon::from_ring(vec![
            Vec2::new(x, y),
            Vec2::new(x + size, y),
            Vec2::new(x + size, y + size),
            Vec2::new(x, y + size),
        ]))
    }

    #[test]
    fn union_of_overlapping_squares() {
        let a = square(0.0, 0.0, 2.0);
        let b = square(1.0, 1.0, 2.0);
        let out = union(&a, &b);
        assert_eq!(out.polygons.len(), 1);
        assert!((out.area() - 7.0).abs() < 1e-6, "area {}", out.area());
    }

    #[test]
    fn intersection_of_overlapping_squares() {
        let a = square(0.0, 0.0, 2.0);
        let b = square(1.0, 1.0, 2.0);
        let out = intersection(&a, &b);
        assert_eq!(out.polygons.len(), 1);
        assert!((out.area() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn difference_of_overlapping_squares() {
        let a = square(0.0, 0.0, 2.0);
        let b = square(1.0, 1.0, 2.0);
        let out = difference(&a, &b);
        assert!((out.area() - 3.0).abs() < 1e-6);
        assert!(out.contains(Vec2::new(0.5, 0.5)));
        assert!(!out.contains(Vec2::new(1.5, 1.5)));
    }

    #[test]
    fn union_of_disjoint_squares_keeps_both() {
        let a = square(0.0, 0.0, 1.0);
        let b = square(5.0, 5.0, 1.0);
        let out = union(&a, &b);
        assert_eq!(out.polygons.len(), 2);
        assert!((out.area() - 2.0).abs() < 1e-6);
    }

    #[test]
    fn union_of_adjacent_squares_removes_the_seam() {
        let a = square(0.0, 0.0, 2.0);
        let b = square(2.0, 0.0, 2.0);
        let out = union(&a, &b);
        assert_eq!(out.polygons.len(), 1);
        assert!((out.area() - 8.0).abs() < 1e-6);
        // The seam x=2 must not survive as a boundary: a point on it is
        // interior now.
        assert!(out.contains(Vec2::new(2.0 + 1e-3, 1.0)));
        assert!(out.contains(Vec2::new(2.0 - 1e-3, 1.0)));
    }

    #[test]
    fn difference_can_cut_a_hole() {
        let a = square(0.0, 0.0, 10.0);
        let b = square(4.0, 4.0, 2.0);
        let out = difference(&a, &b);
        assert_eq!(out.polygons.len(), 1);
        assert_eq!(out.polygons[0].holes.len(), 1);
        assert!((out.area() - 96.0).abs() < 1e-6);
        assert!(!out.contains(Vec2::new(5.0, 5.0)));
    }

    #[test]
    fn difference_with_contained_subtrahend_equal_to_nothing() {
        let a = square(4.0, 4.0, 2.0);
        let b = square(0.0, 0.0, 10.0);
        let out = difference(&a, &b);
        assert!(out.is_empty() || out.area() < 1e-9);
    }

    #[test]
    fn union_all_is_order_insensitive_for_nested_shapes() {
        let big = square(0.0, 0.0, 10.0);
        let small = square(2.0, 2.0, 1.0);
        let out = union_all(vec![small.clone(), big.clone()]);
        assert!((out.area() - 100.0).abs() < 1e-6);
    }
}
