//! Pole of inaccessibility: the interior point maximizing distance to the
//! polygon boundary, found by quadtree refinement.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use super::{Polygon, Vec2, ring_centroid};

struct Cell {
    center: Vec2,
    half: f64,
    /// Signed distance from center to the boundary (negative outside).
    dist: f64,
}

impl Cell {
    fn new(center: Vec2, half: f64, poly: &Polygon) -> Self {
        let raw = poly.boundary_distance(center);
        let dist = if poly.contains(center) { raw } else { -raw };
        Self { center, half, dist }
    }

    /// Upper bound on the distance any point inside the cell can reach.
    fn potential(&self) -> f64 {
        self.dist + self.half * std::f64::consts::SQRT_2
    }
}

impl PartialEq for Cell {
    fn eq(&self, other: &Self) -> bool {
        self.potential() == other.potential()
    }
}
impl Eq for Cell {}
impl PartialOrd for Cell {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for Cell {
    fn cmp(&self, other: &Self) -> Ordering {
        self.potential()
            .partial_cmp(&other.potential())
            .unwrap_or(Ordering::Equal)
    }
}

/// Returns the pole and its clearance radius. `precision` bounds how far the
/// result may be from the true optimum.
pub fn pole_of_inaccessibility(poly: &Polygon, precision: f64) -> (Vec2, f64) {
    if poly.is_empty() {
        return (Vec2::default(), 0.0);
    }
    let Some((min, max)) = super::bounds_of(poly.exterior.iter().copied()) else {
        return (Vec2::default(), 0.0);
    };
    let size = (max.x - min.x).min(max.y - min.y);
    if size <= 0.0 {
        return (poly.exterior[0], 0.0);
    }
    let cell_size = size;
    let half = cell_size / 2.0;

    let mut queue = BinaryHeap::new();
    // Seed with a grid over the bounding box.
    let mut x = min.x;
    while x < max.x {
        let mut y = min.y;
        while y < max.y {
            queue.push(Cell::new(Vec2::new(x + half, y + half), half, poly));
            y += cell_size;
        }
        x += cell_size;
    }

    // Centroid and bbox center make decent initial guesses.
    let mut best = Cell::new(ring_centroid(&poly.exterior), 0.0, poly);
    let bbox_center = Cell::new(
        Vec2::new((min.x + max.x) / 2.0, (min.y + max.y) / 2.0),
        0.0,
        poly,
    );
    if bbox_center.dist > best.dist {
        best = bbox_center;
    }

    while let Some(cell) = queue.pop() {
        if cell.dist > best.dist {
            best = Cell {
                center: cell.center,
                half: 0.0,
                dist: cell.dist,
            };
        }
        if cell.potential() - best.dist <= precision {
            continue;
        }
        let quarter = cell.half / 2.0;
        for (dx, dy) in [(-1.0, -1.0), (1.0, -1.0), (-1.0, 1.0), (1.0, 1.0)] {
            queue.push(Cell::new(
                Vec2::new(cell.center.x + dx * quarter, cell.center.y + dy * quarter),
                quarter,
                poly,
            ));
        }
    }

    (best.center, best.dist.max(0.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::Polygon;

    #[test]
    fn square_pole_is_the_center() {
        let poly = Polygon::from_ring(vec![
            Vec2::new(0.0, 0.0),
            Vec2::new(10.0, 0.0),
            Vec2::new(10.0, 10.0),
            Vec2::new(0.0, 10.0),
        ]);
        let (pole, radius) = pole_of_inaccessibility(&poly, 0.01);
        assert!(pole.distance(Vec2::new(5.0, 5.0)) < 0.1, "pole {pole:?}");
        assert!((radius - 5.0).abs() < 0.1);
    }

    #[test]
    fn hole_pushes_the_pole_aside() {
        let mut poly = Polygon::from_ring(vec![
            Vec2::new(0.0, 0.0),
            Vec2::new(20.0, 0.0),
            Vec2::new(20.0, 10.0),
            Vec2::new(0.0, 10.0),
        ]);
        // Hole in the left half: pole must end up in the right half.
        poly.holes.push(vec![
            Vec2::new(3.0, 3.0),
            Vec2::new(7.0, 3.0),
            Vec2::new(7.0, 7.0),
            Vec2::new(3.0, 7.0),
        ]);
        let (pole, radius) = pole_of_inaccessibility(&poly, 0.05);
        assert!(pole.x > 10.0, "pole {pole:?}");
        assert!(radius > 3.0);
        assert!(poly.contains(pole));
    }
}
