//! Inward polygon offsetting (miter inset), used to derive inner border
//! boundaries from outer ones.

use super::boolean;
use super::{MultiPolygon, Polygon, Ring, Vec2, signed_area};

/// Vertices ending up closer to the original boundary than this fraction of
/// the inset distance are collapse artifacts and get dropped.
const COLLAPSE_FRACTION: f64 = 0.999;

/// Shrink a polygon inward by `distance`. Holes grow by the same amount.
/// Returns an empty shape when the polygon collapses entirely.
pub fn inset_polygon(poly: &Polygon, distance: f64) -> MultiPolygon {
    if distance <= 0.0 {
        return MultiPolygon::from_polygon(poly.clone());
    }
    if poly.is_empty() {
        return MultiPolygon::default();
    }

    let exterior = oriented(&poly.exterior, true);
    let Some(shrunk) = inset_ring(&exterior, distance, poly) else {
        return MultiPolygon::default();
    };
    let mut result = MultiPolygon::from_polygon(Polygon::from_ring(shrunk));

    for hole in &poly.holes {
        // A clockwise hole ring offset by the same rule moves away from the
        // hole, i.e. the hole expands into the polygon.
        let hole_cw = oriented(hole, false);
        let grown = offset_ring_raw(&hole_cw, distance);
        if grown.len() < 3 {
            continue;
        }
        let mut fill: Ring = grown;
        fill.reverse(); // filled subtrahend wants counterclockwise
        result = boolean::difference(
            &result,
            &MultiPolygon::from_polygon(Polygon::from_ring(fill)),
        );
        if result.is_empty() {
            return MultiPolygon::default();
        }
    }
    result
}

/// Shrink every polygon of a shape inward by `distance`.
pub fn inset_multi(shape: &MultiPolygon, distance: f64) -> MultiPolygon {
    let mut polygons = Vec::new();
    for poly in &shape.polygons {
        polygons.extend(inset_polygon(poly, distance).polygons);
    }
    MultiPolygon { polygons }
}

fn oriented(ring: &Ring, ccw: bool) -> Ring {
    if (signed_area(ring) > 0.0) == ccw {
        ring.clone()
    } else {
        ring.iter().rev().copied().collect()
    }
}

/// Miter offset toward the left of the ring direction, then drop collapse
/// artifacts (vertices that came out closer to the source boundary than the
/// inset distance).
fn inset_ring(ring: &Ring, distance: f64, source: &Polygon) -> Option<Ring> {
    let raw = offset_ring_raw(ring, distance);
    if raw.len() < 3 {
        return None;
    }
    let threshold = distance * COLLAPSE_FRACTION;
    let cleaned: Ring = raw
        .into_iter()
        .filter(|&v| source.contains(v) && source.boundary_distance(v) >= threshold)
        .collect();
    if cleaned.len() < 3 || signed_area(&cleaned) <= 0.0 {
        return None;
    }
    Some(cleaned)
}

fn offset_ring_raw(ring: &Ring, distance: f64) -> Ring {
    let n = ring.len();
    if n < 3 {
        return Vec::new();
    }
    let mut out = Vec::with_capacity(n);
    for i in 0..n {
        let prev = ring[(i + n - 1) % n];
        let cur = ring[i];
        let next = ring[(i + 1) % n];

        let dir_in = (cur - prev).normalized();
        let dir_out = (next - cur).normalized();
        let off_in = dir_in.perp() * distance;
        let off_out = dir_out.perp() * distance;

        // Intersection of the two offset edge lines (miter joint).
        let a0 = prev + off_in;
        let b0 = cur + off_out;
        let denom = dir_in.cross(dir_out);
        if denom.abs() < 1e-9 {
            // Near-collinear joint: average the two offset endpoints.
            let p = cur + off_in;
            let q = cur + off_out;
            out.push(Vec2::new((p.x + q.x) * 0.5, (p.y + q.y) * 0.5));
        } else {
            let t = (b0 - a0).cross(dir_out) / denom;
            out.push(a0 + dir_in * t);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(size: f64) -> Polygon {
        Polygon::from_ring(vec![
            Vec2::new(0.0, 0.0),
            Vec2::new(size, 0.0),
            Vec2::new(size, size),
            Vec2::new(0.0, size),
        ])
    }

    #[test]
    fn square_inset_shrinks_by_distance() {
        let out = inset_polygon(&square(10.0), 1.0);
        assert!((out.area() - 64.0).abs() < 1e-6, "area {}", out.area());
        assert!(out.contains(Vec2::new(5.0, 5.0)));
        assert!(!out.contains(Vec2::new(0.5, 5.0)));
    }

    #[test]
    fn inset_area_is_monotone_in_distance() {
        let poly = square(10.0);
        let mut last = f64::INFINITY;
        for step in 1..=6 {
            let area = inset_polygon(&poly, step as f64 * 0.8).area();
            assert!(area <= last + 1e-9, "width {} grew area", step);
            last = area;
        }
    }

    #[test]
    fn over_inset_collapses_to_empty() {
        let out = inset_polygon(&square(2.0), 1.5);
        assert!(out.is_empty());
    }

    #[test]
    fn reflex_corner_keeps_inset_depth() {
        // L-shape: the reflex corner miter must land exactly one unit deep.
        let l_shape = Polygon::from_ring(vec![
            Vec2::new(0.0, 0.0),
            Vec2::new(10.0, 0.0),
            Vec2::new(10.0, 4.0),
            Vec2::new(6.0, 4.0),
            Vec2::new(6.0, 10.0),
            Vec2::new(0.0, 10.0),
        ]);
        let out = inset_polygon(&l_shape, 1.0);
        assert!(!out.is_empty());
        for poly in &out.polygons {
            for &v in &poly.exterior {
                assert!(
                    l_shape.boundary_distance(v) >= 1.0 - 1e-6,
                    "vertex {v:?} too shallow"
                );
            }
        }
    }

    #[test]
    fn holes_grow_when_polygon_shrinks() {
        let mut poly = square(10.0);
        poly.holes.push(vec![
            Vec2::new(4.0, 4.0),
            Vec2::new(4.0, 6.0),
            Vec2::new(6.0, 6.0),
            Vec2::new(6.0, 4.0),
        ]);
        let out = inset_polygon(&poly, 1.0);
        // 8x8 outer minus 4x4 grown hole.
        assert!((out.area() - 48.0).abs() < 1e-5, "area {}", out.area());
        assert!(!out.contains(Vec2::new(5.0, 3.5)));
        assert!(out.contains(Vec2::new(5.0, 2.0)));
    }
}
