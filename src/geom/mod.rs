//! Planar geometry toolkit: the polygon algebra the map pipeline is built on.

pub mod boolean;
pub mod buffer;
pub mod delaunay;
pub mod polylabel;
pub mod smooth;

use std::ops::{Add, Mul, Sub};

/// Quantization used when deduplicating vertices across cells and when
/// stitching boolean-op output. One unit is 1e-6 of an internal map unit.
pub const VERTEX_QUANTUM: f64 = 1e-6;

/// Distance below which a point counts as lying on a boundary.
pub const BOUNDARY_EPS: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vec2 {
    pub x: f64,
    pub y: f64,
}

impl Vec2 {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn dot(self, other: Self) -> f64 {
        self.x * other.x + self.y * other.y
    }

    pub fn cross(self, other: Self) -> f64 {
        self.x * other.y - self.y * other.x
    }

    pub fn length(self) -> f64 {
        self.dot(self).sqrt()
    }

    pub fn distance(self, other: Self) -> f64 {
        (self - other).length()
    }

    pub fn normalized(self) -> Self {
        let len = self.length();
        if len <= f64::EPSILON {
            Self::default()
        } else {
            Self::new(self.x / len, self.y / len)
        }
    }

    /// Left-hand normal (90° counterclockwise).
    pub fn perp(self) -> Self {
        Self::new(-self.y, self.x)
    }

    pub fn quantized(self) -> (i64, i64) {
        (
            (self.x / VERTEX_QUANTUM).round() as i64,
            (self.y / VERTEX_QUANTUM).round() as i64,
        )
    }
}

impl Add for Vec2 {
    type Output = Vec2;
    fn add(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Vec2 {
    type Output = Vec2;
    fn sub(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f64> for Vec2 {
    type Output = Vec2;
    fn mul(self, rhs: f64) -> Vec2 {
        Vec2::new(self.x * rhs, self.y * rhs)
    }
}

/// A closed ring of vertices. Implicitly closed: the last vertex connects
/// back to the first, which is never repeated.
pub type Ring = Vec<Vec2>;

/// One exterior ring (counterclockwise) plus zero or more hole rings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Polygon {
    pub exterior: Ring,
    pub holes: Vec<Ring>,
}

impl Polygon {
    pub fn from_ring(exterior: Ring) -> Self {
        Self {
            exterior,
            holes: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.exterior.len() < 3
    }

    pub fn area(&self) -> f64 {
        let mut area = signed_area(&self.exterior).abs();
        for hole in &self.holes {
            area -= signed_area(hole).abs();
        }
        area.max(0.0)
    }

    pub fn contains(&self, p: Vec2) -> bool {
        if !point_in_ring(p, &self.exterior) {
            return false;
        }
        !self.holes.iter().any(|hole| point_in_ring(p, hole))
    }

    /// Shortest distance from `p` to any ring of this polygon.
    pub fn boundary_distance(&self, p: Vec2) -> f64 {
        let mut best = ring_distance(p, &self.exterior);
        for hole in &self.holes {
            best = best.min(ring_distance(p, hole));
        }
        best
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MultiPolygon {
    pub polygons: Vec<Polygon>,
}

impl MultiPolygon {
    pub fn from_polygon(polygon: Polygon) -> Self {
        Self {
            polygons: vec![polygon],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.polygons.iter().all(Polygon::is_empty)
    }

    pub fn area(&self) -> f64 {
        self.polygons.iter().map(Polygon::area).sum()
    }

    pub fn contains(&self, p: Vec2) -> bool {
        self.polygons.iter().any(|poly| poly.contains(p))
    }

    pub fn boundary_distance(&self, p: Vec2) -> f64 {
        self.polygons
            .iter()
            .map(|poly| poly.boundary_distance(p))
            .fold(f64::INFINITY, f64::min)
    }
}

/// Positive for counterclockwise rings.
pub fn signed_area(ring: &Ring) -> f64 {
    if ring.len() < 3 {
        return 0.0;
    }
    let mut sum = 0.0;
    for i in 0..ring.len() {
        let a = ring[i];
        let b = ring[(i + 1) % ring.len()];
        sum += a.cross(b);
    }
    sum * 0.5
}

pub fn ring_centroid(ring: &Ring) -> Vec2 {
    let area = signed_area(ring);
    if area.abs() < f64::EPSILON {
        // Degenerate ring: average the vertices.
        let n = ring.len().max(1) as f64;
        let sum = ring
            .iter()
            .fold(Vec2::default(), |acc, &p| acc + p);
        return Vec2::new(sum.x / n, sum.y / n);
    }
    let mut cx = 0.0;
    let mut cy = 0.0;
    for i in 0..ring.len() {
        let a = ring[i];
        let b = ring[(i + 1) % ring.len()];
        let cross = a.cross(b);
        cx += (a.x + b.x) * cross;
        cy += (a.y + b.y) * cross;
    }
    Vec2::new(cx / (6.0 * area), cy / (6.0 * area))
}

pub fn ring_perimeter(ring: &Ring) -> f64 {
    if ring.len() < 2 {
        return 0.0;
    }
    let mut sum = 0.0;
    for i in 0..ring.len() {
        sum += ring[i].distance(ring[(i + 1) % ring.len()]);
    }
    sum
}

/// Even-odd ray cast. Points exactly on the boundary are not guaranteed
/// either way; callers that care use [`ring_distance`] first.
pub fn point_in_ring(p: Vec2, ring: &Ring) -> bool {
    if ring.len() < 3 {
        return false;
    }
    let mut inside = false;
    let mut j = ring.len() - 1;
    for i in 0..ring.len() {
        let a = ring[i];
        let b = ring[j];
        if (a.y > p.y) != (b.y > p.y) {
            let t = (p.y - a.y) / (b.y - a.y);
            if p.x < a.x + t * (b.x - a.x) {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

pub fn segment_distance(p: Vec2, a: Vec2, b: Vec2) -> f64 {
    let ab = b - a;
    let len_sq = ab.dot(ab);
    if len_sq <= f64::EPSILON {
        return p.distance(a);
    }
    let t = ((p - a).dot(ab) / len_sq).clamp(0.0, 1.0);
    p.distance(a + ab * t)
}

pub fn ring_distance(p: Vec2, ring: &Ring) -> f64 {
    if ring.is_empty() {
        return f64::INFINITY;
    }
    let mut best = f64::INFINITY;
    for i in 0..ring.len() {
        best = best.min(segment_distance(p, ring[i], ring[(i + 1) % ring.len()]));
    }
    best
}

/// Axis-aligned bounds of a set of points: `(min, max)`.
pub fn bounds_of(points: impl IntoIterator<Item = Vec2>) -> Option<(Vec2, Vec2)> {
    let mut iter = points.into_iter();
    let first = iter.next()?;
    let mut min = first;
    let mut max = first;
    for p in iter {
        min.x = min.x.min(p.x);
        min.y = min.y.min(p.y);
        max.x = max.x.max(p.x);
        max.y = max.y.max(p.y);
    }
    Some((min, max))
}

/// Remove vertices whose removal changes the ring by less than `tolerance`
/// (triangle-area test against both neighbors). Vertices flagged in `keep`
/// are never removed.
pub fn simplify_collinear(ring: &Ring, tolerance: f64, keep: impl Fn(usize) -> bool) -> Ring {
    if ring.len() <= 3 {
        return ring.clone();
    }
    let mut out: Ring = Vec::with_capacity(ring.len());
    let n = ring.len();
    for i in 0..n {
        if keep(i) {
            out.push(ring[i]);
            continue;
        }
        let prev = ring[(i + n - 1) % n];
        let cur = ring[i];
        let next = ring[(i + 1) % n];
        let doubled_area = (cur - prev).cross(next - prev).abs();
        if doubled_area > tolerance {
            out.push(cur);
        }
    }
    if out.len() >= 3 { out } else { ring.clone() }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(size: f64) -> Ring {
        vec![
            Vec2::new(0.0, 0.0),
            Vec2::new(size, 0.0),
            Vec2::new(size, size),
            Vec2::new(0.0, size),
        ]
    }

    #[test]
    fn signed_area_orientation() {
        let ccw = square(2.0);
        assert!((signed_area(&ccw) - 4.0).abs() < 1e-12);
        let cw: Ring = ccw.iter().rev().copied().collect();
        assert!((signed_area(&cw) + 4.0).abs() < 1e-12);
    }

    #[test]
    fn point_in_ring_basics() {
        let ring = square(10.0);
        assert!(point_in_ring(Vec2::new(5.0, 5.0), &ring));
        assert!(!point_in_ring(Vec2::new(15.0, 5.0), &ring));
        assert!(!point_in_ring(Vec2::new(-0.1, 5.0), &ring));
    }

    #[test]
    fn polygon_with_hole() {
        let mut poly = Polygon::from_ring(square(10.0));
        poly.holes.push(vec![
            Vec2::new(4.0, 4.0),
            Vec2::new(6.0, 4.0),
            Vec2::new(6.0, 6.0),
            Vec2::new(4.0, 6.0),
        ]);
        assert!(poly.contains(Vec2::new(1.0, 1.0)));
        assert!(!poly.contains(Vec2::new(5.0, 5.0)));
        assert!((poly.area() - 96.0).abs() < 1e-9);
    }

    #[test]
    fn collinear_simplification_respects_keep() {
        let ring = vec![
            Vec2::new(0.0, 0.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(2.0, 0.0),
            Vec2::new(2.0, 2.0),
            Vec2::new(0.0, 2.0),
        ];
        let plain = simplify_collinear(&ring, 1e-9, |_| false);
        assert_eq!(plain.len(), 4);
        let kept = simplify_collinear(&ring, 1e-9, |i| i == 1);
        assert_eq!(kept.len(), 5);
    }

    #[test]
    fn ring_distance_from_inside_and_outside() {
        let ring = square(10.0);
        assert!((ring_distance(Vec2::new(5.0, 5.0), &ring) - 5.0).abs() < 1e-12);
        assert!((ring_distance(Vec2::new(12.0, 5.0), &ring) - 2.0).abs() < 1e-12);
    }
}
