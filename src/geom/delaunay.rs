//! Delaunay triangulation (Bowyer-Watson) and its clipped Voronoi dual.
//!
//! All Voronoi vertices are deduplicated into one shared pool, so cells of
//! adjacent sites reference identical vertex indices along their common
//! edge. That pool is the planar graph the topology merge stage relies on.

use std::collections::HashMap;

use super::{Ring, Vec2};

#[derive(Debug, Clone, Copy)]
struct Triangle {
    v: [usize; 3],
    circumcenter: Vec2,
    radius_sq: f64,
}

/// Bowyer-Watson over the given points. Returns index triples into `points`.
/// Duplicate or near-duplicate points must be removed by the caller.
pub fn triangulate(points: &[Vec2]) -> Vec<[usize; 3]> {
    if points.len() < 3 {
        return Vec::new();
    }
    let Some((min, max)) = super::bounds_of(points.iter().copied()) else {
        return Vec::new();
    };
    let span = (max.x - min.x).max(max.y - min.y).max(1.0);
    let mid = Vec2::new((min.x + max.x) * 0.5, (min.y + max.y) * 0.5);

    // Super-triangle comfortably containing every point.
    let super_a = Vec2::new(mid.x - 20.0 * span, mid.y - 10.0 * span);
    let super_b = Vec2::new(mid.x + 20.0 * span, mid.y - 10.0 * span);
    let super_c = Vec2::new(mid.x, mid.y + 20.0 * span);

    let mut all: Vec<Vec2> = points.to_vec();
    let base = all.len();
    all.extend_from_slice(&[super_a, super_b, super_c]);

    let mut triangles: Vec<Triangle> = Vec::with_capacity(points.len() * 2);
    if let Some(t) = make_triangle(&all, [base, base + 1, base + 2]) {
        triangles.push(t);
    }

    for (idx, &p) in points.iter().enumerate() {
        // Triangles whose circumcircle contains the new point.
        let mut bad = Vec::new();
        for (ti, tri) in triangles.iter().enumerate() {
            let d = p - tri.circumcenter;
            if d.dot(d) <= tri.radius_sq * (1.0 + 1e-12) {
                bad.push(ti);
            }
        }
        // Boundary of the cavity: edges used by exactly one bad triangle.
        let mut edge_count: HashMap<(usize, usize), (usize, usize, u32)> = HashMap::new();
        for &ti in &bad {
            let v = triangles[ti].v;
            for (a, b) in [(v[0], v[1]), (v[1], v[2]), (v[2], v[0])] {
                let key = if a < b { (a, b) } else { (b, a) };
                edge_count
                    .entry(key)
                    .and_modify(|e| e.2 += 1)
                    .or_insert((a, b, 1));
            }
        }
        for &ti in bad.iter().rev() {
            triangles.swap_remove(ti);
        }
        for (_, (a, b, count)) in edge_count {
            if count != 1 {
                continue;
            }
            if let Some(t) = make_triangle(&all, [a, b, idx]) {
                triangles.push(t);
            }
        }
    }

    triangles
        .into_iter()
        .filter(|t| t.v.iter().all(|&v| v < base))
        .map(|t| t.v)
        .collect()
}

fn make_triangle(points: &[Vec2], v: [usize; 3]) -> Option<Triangle> {
    let (center, radius_sq) = circumcircle(points[v[0]], points[v[1]], points[v[2]])?;
    Some(Triangle {
        v,
        circumcenter: center,
        radius_sq,
    })
}

/// Circumcircle of a triangle; `None` for (near-)collinear vertices.
pub fn circumcircle(a: Vec2, b: Vec2, c: Vec2) -> Option<(Vec2, f64)> {
    let d = 2.0 * (a.x * (b.y - c.y) + b.x * (c.y - a.y) + c.x * (a.y - b.y));
    if d.abs() < 1e-12 {
        return None;
    }
    let a_sq = a.dot(a);
    let b_sq = b.dot(b);
    let c_sq = c.dot(c);
    let ux = (a_sq * (b.y - c.y) + b_sq * (c.y - a.y) + c_sq * (a.y - b.y)) / d;
    let uy = (a_sq * (c.x - b.x) + b_sq * (a.x - c.x) + c_sq * (b.x - a.x)) / d;
    let center = Vec2::new(ux, uy);
    let r = center - a;
    Some((center, r.dot(r)))
}

#[derive(Debug, Clone, Default)]
pub struct VoronoiDiagram {
    /// Shared, deduplicated vertex pool.
    pub vertices: Vec<Vec2>,
    /// Per site: counterclockwise ring of indices into `vertices`.
    /// Empty for sites whose cell degenerated.
    pub cells: Vec<Vec<usize>>,
}

impl VoronoiDiagram {
    pub fn cell_ring(&self, site: usize) -> Ring {
        self.cells[site]
            .iter()
            .map(|&v| self.vertices[v])
            .collect()
    }
}

struct VertexPool {
    vertices: Vec<Vec2>,
    index: HashMap<(i64, i64), usize>,
}

impl VertexPool {
    fn new() -> Self {
        Self {
            vertices: Vec::new(),
            index: HashMap::new(),
        }
    }

    fn intern(&mut self, p: Vec2) -> usize {
        let key = p.quantized();
        if let Some(&idx) = self.index.get(&key) {
            return idx;
        }
        let idx = self.vertices.len();
        self.vertices.push(p);
        self.index.insert(key, idx);
        idx
    }
}

/// Voronoi cells of `sites`, clipped to the axis-aligned box `[min, max]`.
pub fn voronoi_cells(sites: &[Vec2], clip_min: Vec2, clip_max: Vec2) -> VoronoiDiagram {
    let triangles = triangulate(sites);
    let mut pool = VertexPool::new();

    // Circumcenter per triangle, interned once.
    let mut incident: Vec<Vec<Vec2>> = vec![Vec::new(); sites.len()];
    for tri in &triangles {
        let Some((center, _)) = circumcircle(sites[tri[0]], sites[tri[1]], sites[tri[2]]) else {
            continue;
        };
        for &v in tri {
            incident[v].push(center);
        }
    }

    let mut cells = Vec::with_capacity(sites.len());
    for (site_idx, centers) in incident.iter().enumerate() {
        if centers.len() < 3 {
            cells.push(Vec::new());
            continue;
        }
        let site = sites[site_idx];
        let mut ordered: Vec<Vec2> = centers.clone();
        ordered.sort_by(|a, b| {
            let aa = (a.y - site.y).atan2(a.x - site.x);
            let ab = (b.y - site.y).atan2(b.x - site.x);
            aa.partial_cmp(&ab).unwrap_or(std::cmp::Ordering::Equal)
        });
        ordered.dedup_by(|a, b| a.quantized() == b.quantized());
        if ordered.len() >= 2 && ordered[0].quantized() == ordered[ordered.len() - 1].quantized() {
            ordered.pop();
        }
        let needs_clip = ordered
            .iter()
            .any(|p| p.x < clip_min.x || p.x > clip_max.x || p.y < clip_min.y || p.y > clip_max.y);
        if needs_clip {
            ordered = clip_ring_to_box(&ordered, clip_min, clip_max);
        }
        if ordered.len() < 3 {
            cells.push(Vec::new());
            continue;
        }
        let ring: Vec<usize> = ordered.into_iter().map(|p| pool.intern(p)).collect();
        let mut ring_dedup = ring;
        ring_dedup.dedup();
        while ring_dedup.len() >= 2 && ring_dedup.first() == ring_dedup.last() {
            ring_dedup.pop();
        }
        if ring_dedup.len() < 3 {
            cells.push(Vec::new());
        } else {
            cells.push(ring_dedup);
        }
    }

    VoronoiDiagram {
        vertices: pool.vertices,
        cells,
    }
}

/// Sutherland-Hodgman against the four box half-planes (the box is convex).
fn clip_ring_to_box(ring: &Ring, min: Vec2, max: Vec2) -> Ring {
    // (inside test, intersection parameter) per box side.
    let sides: [(Box<dyn Fn(Vec2) -> bool>, Box<dyn Fn(Vec2, Vec2) -> Vec2>); 4] = [
        (
            Box::new(move |p: Vec2| p.x >= min.x),
            Box::new(move |a: Vec2, b: Vec2| lerp_at_x(a, b, min.x)),
        ),
        (
            Box::new(move |p: Vec2| p.x <= max.x),
            Box::new(move |a: Vec2, b: Vec2| lerp_at_x(a, b, max.x)),
        ),
        (
            Box::new(move |p: Vec2| p.y >= min.y),
            Box::new(move |a: Vec2, b: Vec2| lerp_at_y(a, b, min.y)),
        ),
        (
            Box::new(move |p: Vec2| p.y <= max.y),
            Box::new(move |a: Vec2, b: Vec2| lerp_at_y(a, b, max.y)),
        ),
    ];

    let mut current = ring.clone();
    for (inside, intersect) in &sides {
        if current.is_empty() {
            break;
        }
        let mut next = Vec::with_capacity(current.len() + 4);
        for i in 0..current.len() {
            let a = current[i];
            let b = current[(i + 1) % current.len()];
            let a_in = inside(a);
            let b_in = inside(b);
            if a_in {
                next.push(a);
            }
            if a_in != b_in {
                next.push(intersect(a, b));
            }
        }
        current = next;
    }
    current
}

fn lerp_at_x(a: Vec2, b: Vec2, x: f64) -> Vec2 {
    let t = (x - a.x) / (b.x - a.x);
    Vec2::new(x, a.y + t * (b.y - a.y))
}

fn lerp_at_y(a: Vec2, b: Vec2, y: f64) -> Vec2 {
    let t = (y - a.y) / (b.y - a.y);
    Vec2::new(a.x + t * (b.x - a.x), y)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::{point_in_ring, signed_area};

    #[test]
    fn triangulates_a_square() {
        let points = vec![
            Vec2::new(0.0, 0.0),
            Vec2::new(10.0, 0.0),
            Vec2::new(10.0, 10.0),
            Vec2::new(0.0, 10.0),
        ];
        let tris = triangulate(&points);
        assert_eq!(tris.len(), 2);
        let area: f64 = tris
            .iter()
            .map(|t| {
                0.5 * ((points[t[1]] - points[t[0]])
                    .cross(points[t[2]] - points[t[0]]))
                .abs()
            })
            .sum();
        assert!((area - 100.0).abs() < 1e-9);
    }

    #[test]
    fn degenerate_inputs_yield_nothing() {
        assert!(triangulate(&[Vec2::new(0.0, 0.0), Vec2::new(1.0, 0.0)]).is_empty());
        // Collinear points have no triangulation.
        let collinear = vec![
            Vec2::new(0.0, 0.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(2.0, 0.0),
        ];
        assert!(triangulate(&collinear).is_empty());
    }

    #[test]
    fn voronoi_interior_site_gets_closed_cell() {
        // A 3x3 grid: the middle site is fully surrounded.
        let mut sites = Vec::new();
        for y in 0..3 {
            for x in 0..3 {
                sites.push(Vec2::new(x as f64 * 10.0, y as f64 * 10.0));
            }
        }
        let diagram = voronoi_cells(&sites, Vec2::new(-50.0, -50.0), Vec2::new(70.0, 70.0));
        let center_cell = diagram.cell_ring(4);
        assert!(center_cell.len() >= 3, "center cell must close");
        assert!(point_in_ring(Vec2::new(10.0, 10.0), &center_cell));
        // The cell of the middle of a uniform grid is the unit square
        // around it (scaled by the 10-unit spacing).
        assert!((signed_area(&center_cell).abs() - 100.0).abs() < 1e-6);
    }

    #[test]
    fn adjacent_cells_share_pool_vertices() {
        let mut sites = Vec::new();
        for y in 0..4 {
            for x in 0..4 {
                sites.push(Vec2::new(x as f64 * 10.0, y as f64 * 10.0));
            }
        }
        let diagram = voronoi_cells(&sites, Vec2::new(-50.0, -50.0), Vec2::new(100.0, 100.0));
        // Sites 5 and 6 are horizontal neighbors in the interior; their
        // cells must share exactly two pool vertex indices.
        let a: std::collections::HashSet<usize> = diagram.cells[5].iter().copied().collect();
        let b: std::collections::HashSet<usize> = diagram.cells[6].iter().copied().collect();
        assert_eq!(a.intersection(&b).count(), 2);
    }

    #[test]
    fn clipping_bounds_outer_cells() {
        let sites = vec![
            Vec2::new(0.0, 0.0),
            Vec2::new(10.0, 0.0),
            Vec2::new(5.0, 8.0),
            Vec2::new(5.0, -8.0),
        ];
        let min = Vec2::new(-20.0, -20.0);
        let max = Vec2::new(30.0, 20.0);
        let diagram = voronoi_cells(&sites, min, max);
        for cell in &diagram.cells {
            for &v in cell {
                let p = diagram.vertices[v];
                assert!(p.x >= min.x - 1e-9 && p.x <= max.x + 1e-9);
                assert!(p.y >= min.y - 1e-9 && p.y <= max.y + 1e-9);
            }
        }
    }
}
