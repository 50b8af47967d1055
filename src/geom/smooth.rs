//! Chaikin corner-cutting subdivision for border smoothing.

use super::{Ring, Vec2};

fn cut(a: Vec2, b: Vec2) -> (Vec2, Vec2) {
    (a + (b - a) * 0.25, a + (b - a) * 0.75)
}

/// Closed-ring Chaikin: every corner is replaced by two points at 1/4 and
/// 3/4 of its adjacent edges. Each pass doubles the vertex count.
pub fn chaikin_ring(ring: &Ring, passes: usize) -> Ring {
    let mut current = ring.clone();
    for _ in 0..passes {
        if current.len() < 3 {
            break;
        }
        let mut next = Vec::with_capacity(current.len() * 2);
        for i in 0..current.len() {
            let a = current[i];
            let b = current[(i + 1) % current.len()];
            let (q, r) = cut(a, b);
            next.push(q);
            next.push(r);
        }
        current = next;
    }
    current
}

/// Open-path Chaikin with pinned endpoints, for sub-border segments whose
/// ends must stay attached to the outer boundary.
pub fn chaikin_path(path: &[Vec2], passes: usize) -> Vec<Vec2> {
    let mut current = path.to_vec();
    for _ in 0..passes {
        if current.len() < 3 {
            break;
        }
        let mut next = Vec::with_capacity(current.len() * 2);
        next.push(current[0]);
        for i in 0..current.len() - 1 {
            let (q, r) = cut(current[i], current[i + 1]);
            if i > 0 {
                next.push(q);
            }
            if i < current.len() - 2 {
                next.push(r);
            }
        }
        next.push(current[current.len() - 1]);
        current = next;
    }
    current
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::signed_area;

    #[test]
    fn ring_pass_doubles_vertices_and_shrinks_area() {
        let square = vec![
            Vec2::new(0.0, 0.0),
            Vec2::new(4.0, 0.0),
            Vec2::new(4.0, 4.0),
            Vec2::new(0.0, 4.0),
        ];
        let smoothed = chaikin_ring(&square, 1);
        assert_eq!(smoothed.len(), 8);
        let area = signed_area(&smoothed);
        assert!(area > 0.0 && area < 16.0);
        // Smoothed ring stays inside the convex hull of the original.
        for p in &smoothed {
            assert!(p.x >= 0.0 && p.x <= 4.0 && p.y >= 0.0 && p.y <= 4.0);
        }
    }

    #[test]
    fn path_endpoints_are_pinned() {
        let path = vec![
            Vec2::new(0.0, 0.0),
            Vec2::new(5.0, 5.0),
            Vec2::new(10.0, 0.0),
        ];
        let smoothed = chaikin_path(&path, 3);
        assert_eq!(smoothed[0], path[0]);
        assert_eq!(*smoothed.last().unwrap(), path[2]);
        assert!(smoothed.len() > path.len());
    }

    #[test]
    fn degenerate_inputs_pass_through() {
        let two = vec![Vec2::new(0.0, 0.0), Vec2::new(1.0, 0.0)];
        assert_eq!(chaikin_ring(&two, 4), two);
        assert_eq!(chaikin_path(&two, 4), two);
    }
}
