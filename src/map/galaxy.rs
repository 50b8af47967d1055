//! Galaxy silhouette: a boundary polygon hugging the actual shape of the
//! galaxy, used instead of the void lattice when circular borders are on.

use std::collections::{BTreeMap, BTreeSet};

use crate::config::MapSettings;
use crate::geom::{MultiPolygon, Polygon, Ring, Vec2, boolean, segment_distance};
use crate::map::partition::undirected_lanes;
use crate::model::GameState;

/// Systems farther than this from every lane of their cluster are outliers
/// and get their own padding circle.
const OUTLIER_DISTANCE: f64 = 30.0;
/// Radius of the padding circle around an outlier system.
const OUTLIER_CIRCLE_RADIUS: f64 = 15.0;
/// Padding added around cluster silhouettes.
const CLUSTER_PAD: f64 = 10.0;
/// Sample count for plain circles.
const CIRCLE_SAMPLES: usize = 48;
/// Angular slices of the starburst silhouette.
const STARBURST_SLICES: usize = 12;
/// Neighbor-averaging passes over the slice radii.
const STARBURST_RELAX_PASSES: usize = 40;
/// Fine sampling step of the relaxed radii, in degrees.
const STARBURST_SAMPLE_DEG: f64 = 1.0;
/// Minimum radius of an inner cutout; smaller cores stay filled.
const INNER_CORE_MIN_RADIUS: f64 = 20.0;

pub fn build_galaxy_boundary(state: &GameState, settings: &MapSettings) -> Option<MultiPolygon> {
    if !settings.circular_galaxy_borders {
        return None;
    }
    if state.systems.is_empty() {
        return None;
    }

    let clusters = hyperlane_clusters(state);
    let starburst = state
        .galaxy_shape
        .as_deref()
        .is_some_and(|shape| shape.contains("starburst"));
    let dominant = clusters
        .iter()
        .enumerate()
        .max_by_key(|(_, members)| members.len())
        .map(|(i, _)| i)
        .unwrap_or(0);

    // One shape per cluster plus one circle per outlier system.
    let mut shapes: Vec<(MultiPolygon, Option<MultiPolygon>)> = Vec::new();
    for (index, members) in clusters.iter().enumerate() {
        let (core, outliers) = split_outliers(state, members);
        for &outlier in &outliers {
            let center = system_point(state, outlier);
            shapes.push((
                MultiPolygon::from_polygon(Polygon::from_ring(circle_ring(
                    center,
                    OUTLIER_CIRCLE_RADIUS,
                ))),
                None,
            ));
        }
        if core.is_empty() {
            continue;
        }
        let points: Vec<Vec2> = core.iter().map(|&id| system_point(state, id)).collect();
        let shape = if index == dominant && starburst {
            starburst_shape(&points)
        } else {
            concentric_shape(&points)
        };
        shapes.push(shape);
    }

    // Biggest first, so a large cluster's cutout cannot erase a smaller
    // cluster nested inside it.
    shapes.sort_by(|a, b| b.0.area().total_cmp(&a.0.area()));
    let mut acc = MultiPolygon::default();
    for (outer, hole) in shapes {
        acc = boolean::union(&acc, &outer);
        if let Some(hole) = hole {
            acc = boolean::difference(&acc, &hole);
        }
    }
    if acc.is_empty() {
        log::warn!("galaxy boundary degenerated to an empty shape");
        return None;
    }
    Some(acc)
}

/// Connected components of the hyperlane graph; isolated systems form
/// singleton clusters.
fn hyperlane_clusters(state: &GameState) -> Vec<Vec<i64>> {
    let mut adjacency: BTreeMap<i64, Vec<i64>> = BTreeMap::new();
    for (a, b, _, _) in undirected_lanes(state) {
        adjacency.entry(a).or_default().push(b);
        adjacency.entry(b).or_default().push(a);
    }
    let mut seen: BTreeSet<i64> = BTreeSet::new();
    let mut clusters = Vec::new();
    for &id in state.systems.keys() {
        if !seen.insert(id) {
            continue;
        }
        let mut members = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            members.push(current);
            for &next in adjacency.get(&current).into_iter().flatten() {
                if seen.insert(next) {
                    stack.push(next);
                }
            }
        }
        members.sort_unstable();
        clusters.push(members);
    }
    clusters
}

/// Split a cluster into its core and the systems too far from every lane.
fn split_outliers(state: &GameState, members: &[i64]) -> (Vec<i64>, Vec<i64>) {
    let member_set: BTreeSet<i64> = members.iter().copied().collect();
    let lanes: Vec<(i64, i64, Vec2, Vec2)> = undirected_lanes(state)
        .into_iter()
        .filter(|(a, b, _, _)| member_set.contains(a) && member_set.contains(b))
        .collect();
    if lanes.is_empty() {
        // No lanes at all: a lone system is an outlier, a larger laneless
        // cluster cannot exist.
        return if members.len() == 1 {
            (Vec::new(), members.to_vec())
        } else {
            (members.to_vec(), Vec::new())
        };
    }

    let mut core = Vec::new();
    let mut outliers = Vec::new();
    for &id in members {
        let p = system_point(state, id);
        let nearest = lanes
            .iter()
            .filter(|&&(a, b, _, _)| a != id && b != id)
            .map(|&(_, _, pa, pb)| segment_distance(p, pa, pb))
            .fold(f64::INFINITY, f64::min);
        if nearest > OUTLIER_DISTANCE {
            outliers.push(id);
        } else {
            core.push(id);
        }
    }
    (core, outliers)
}

/// Concentric-circle silhouette: outer circle around the centroid, with an
/// inner cutout when the cluster is a ring.
fn concentric_shape(points: &[Vec2]) -> (MultiPolygon, Option<MultiPolygon>) {
    let centroid = mean_point(points);
    let mut max_r: f64 = 0.0;
    let mut min_r = f64::INFINITY;
    for p in points {
        let d = p.distance(centroid);
        max_r = max_r.max(d);
        min_r = min_r.min(d);
    }
    let outer = MultiPolygon::from_polygon(Polygon::from_ring(circle_ring(
        centroid,
        max_r + CLUSTER_PAD,
    )));
    let hole_r = min_r - CLUSTER_PAD;
    let hole = (hole_r > INNER_CORE_MIN_RADIUS).then(|| {
        MultiPolygon::from_polygon(Polygon::from_ring(circle_ring(centroid, hole_r)))
    });
    (outer, hole)
}

/// Starburst silhouette: per-slice radial extents relaxed by neighbor
/// averaging, then sampled at a fine angular step.
fn starburst_shape(points: &[Vec2]) -> (MultiPolygon, Option<MultiPolygon>) {
    let centroid = mean_point(points);
    let mut slice_max = vec![0.0f64; STARBURST_SLICES];
    let mut slice_min = vec![f64::INFINITY; STARBURST_SLICES];
    for p in points {
        let d = *p - centroid;
        let r = d.length();
        let slice = slice_of(d.y.atan2(d.x));
        slice_max[slice] = slice_max[slice].max(r);
        slice_min[slice] = slice_min[slice].min(r);
    }
    // Slices without systems keep a neutral seed; relaxation pulls them
    // toward their neighbors (outer grows from 0, inner shrinks from the
    // global maximum).
    let global_max = slice_max.iter().copied().fold(0.0f64, f64::max);
    for slice in 0..STARBURST_SLICES {
        if !slice_min[slice].is_finite() {
            slice_min[slice] = global_max;
        }
    }

    // Relax: outer radii grow to bridge valleys between arms but never sink
    // below the data, inner radii shrink symmetrically.
    let mut outer = slice_max.clone();
    let mut inner = slice_min.clone();
    for _ in 0..STARBURST_RELAX_PASSES {
        let prev_outer = outer.clone();
        let prev_inner = inner.clone();
        for i in 0..STARBURST_SLICES {
            let left = prev_outer[(i + STARBURST_SLICES - 1) % STARBURST_SLICES];
            let right = prev_outer[(i + 1) % STARBURST_SLICES];
            outer[i] = slice_max[i].max((left + right) * 0.5);
            let left = prev_inner[(i + STARBURST_SLICES - 1) % STARBURST_SLICES];
            let right = prev_inner[(i + 1) % STARBURST_SLICES];
            inner[i] = slice_min[i].min((left + right) * 0.5);
        }
    }

    let outer_ring = sample_radial(centroid, &outer, CLUSTER_PAD);
    let outer_poly = MultiPolygon::from_polygon(Polygon::from_ring(outer_ring));
    let core = inner.iter().copied().fold(f64::INFINITY, f64::min) - CLUSTER_PAD;
    let hole = (core > INNER_CORE_MIN_RADIUS).then(|| {
        MultiPolygon::from_polygon(Polygon::from_ring(sample_radial(
            centroid,
            &inner,
            -CLUSTER_PAD,
        )))
    });
    (outer_poly, hole)
}

fn slice_of(angle: f64) -> usize {
    let tau = std::f64::consts::TAU;
    let normalized = (angle.rem_euclid(tau)) / tau;
    ((normalized * STARBURST_SLICES as f64) as usize).min(STARBURST_SLICES - 1)
}

/// Sample per-slice radii at a fine step, interpolating linearly between
/// slice centers. Counterclockwise ring.
fn sample_radial(center: Vec2, radii: &[f64], pad: f64) -> Ring {
    let tau = std::f64::consts::TAU;
    let steps = (360.0 / STARBURST_SAMPLE_DEG) as usize;
    let slice_width = tau / radii.len() as f64;
    let mut ring = Vec::with_capacity(steps);
    for step in 0..steps {
        let angle = step as f64 / steps as f64 * tau;
        // Slice centers sit at (k + 0.5) * width.
        let pos = (angle / slice_width - 0.5).rem_euclid(radii.len() as f64);
        let k = pos.floor() as usize % radii.len();
        let t = pos - pos.floor();
        let r = radii[k] * (1.0 - t) + radii[(k + 1) % radii.len()] * t + pad;
        ring.push(Vec2::new(
            center.x + r.max(0.0) * angle.cos(),
            center.y + r.max(0.0) * angle.sin(),
        ));
    }
    ring
}

fn circle_ring(center: Vec2, radius: f64) -> Ring {
    let tau = std::f64::consts::TAU;
    (0..CIRCLE_SAMPLES)
        .map(|i| {
            let angle = i as f64 / CIRCLE_SAMPLES as f64 * tau;
            Vec2::new(
                center.x + radius * angle.cos(),
                center.y + radius * angle.sin(),
            )
        })
        .collect()
}

fn mean_point(points: &[Vec2]) -> Vec2 {
    let mut sum = Vec2::default();
    for p in points {
        sum = sum + *p;
    }
    sum * (1.0 / points.len().max(1) as f64)
}

fn system_point(state: &GameState, id: i64) -> Vec2 {
    state
        .systems
        .get(&id)
        .map(|s| Vec2::new(s.coordinate.x, s.coordinate.y))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Coordinate, Hyperlane, NameNode, System};

    fn system(id: i64, x: f64, y: f64, lanes: &[i64]) -> System {
        System {
            id,
            name: NameNode::default(),
            coordinate: Coordinate { x, y },
            hyperlanes: lanes.iter().map(|&to| Hyperlane { to, length: 0.0 }).collect(),
            bypass_ids: Vec::new(),
            megastructure_ids: Vec::new(),
            colony_ids: Vec::new(),
            starbase_id: None,
            flags: Vec::new(),
        }
    }

    fn ring_state(count: i64, radius: f64) -> GameState {
        let mut state = GameState::default();
        for i in 0..count {
            let angle = i as f64 / count as f64 * std::f64::consts::TAU;
            let next = (i + 1) % count;
            state.systems.insert(
                i,
                system(i, radius * angle.cos(), radius * angle.sin(), &[next]),
            );
        }
        state
    }

    #[test]
    fn disabled_setting_yields_no_boundary() {
        let state = ring_state(10, 50.0);
        assert!(build_galaxy_boundary(&state, &MapSettings::default()).is_none());
    }

    #[test]
    fn boundary_covers_all_systems() {
        let state = ring_state(10, 50.0);
        let mut settings = MapSettings::default();
        settings.circular_galaxy_borders = true;
        let boundary = build_galaxy_boundary(&state, &settings).unwrap();
        for system in state.systems.values() {
            assert!(
                boundary.contains(Vec2::new(system.coordinate.x, system.coordinate.y)),
                "system {} outside boundary",
                system.id
            );
        }
    }

    #[test]
    fn ring_cluster_gets_an_inner_cutout() {
        let state = ring_state(24, 80.0);
        let mut settings = MapSettings::default();
        settings.circular_galaxy_borders = true;
        let boundary = build_galaxy_boundary(&state, &settings).unwrap();
        assert!(!boundary.contains(Vec2::new(0.0, 0.0)), "hollow core kept");
        assert!(boundary.contains(Vec2::new(80.0, 0.0)));
    }

    #[test]
    fn separate_clusters_get_separate_shapes() {
        let mut state = ring_state(6, 30.0);
        // A distant pair connected by one lane.
        state.systems.insert(100, system(100, 400.0, 0.0, &[101]));
        state.systems.insert(101, system(101, 420.0, 0.0, &[]));
        let mut settings = MapSettings::default();
        settings.circular_galaxy_borders = true;
        let boundary = build_galaxy_boundary(&state, &settings).unwrap();
        assert!(boundary.contains(Vec2::new(410.0, 0.0)));
        assert!(
            !boundary.contains(Vec2::new(250.0, 0.0)),
            "gap between clusters stays void"
        );
    }

    #[test]
    fn outliers_get_padding_circles() {
        let mut state = ring_state(6, 30.0);
        // Connected by a lane but far off every other lane.
        state.systems.insert(50, system(50, 200.0, 0.0, &[0]));
        let mut settings = MapSettings::default();
        settings.circular_galaxy_borders = true;
        let boundary = build_galaxy_boundary(&state, &settings).unwrap();
        assert!(boundary.contains(Vec2::new(200.0, 0.0)));
        assert!(boundary.contains(Vec2::new(200.0 + OUTLIER_CIRCLE_RADIUS * 0.8, 0.0)));
    }

    #[test]
    fn starburst_shape_bridges_arm_valleys() {
        let mut state = GameState::default();
        state.galaxy_shape = Some("starburst".into());
        // Four arms of systems chained outward from a hub.
        let mut id = 0;
        state.systems.insert(id, system(0, 0.0, 0.0, &[]));
        for arm in 0..4 {
            let angle = arm as f64 * std::f64::consts::FRAC_PI_2;
            let mut prev = 0;
            for step in 1..=5 {
                id += 1;
                let r = step as f64 * 20.0;
                state
                    .systems
                    .insert(id, system(id, r * angle.cos(), r * angle.sin(), &[prev]));
                prev = id;
            }
        }
        let mut settings = MapSettings::default();
        settings.circular_galaxy_borders = true;
        let boundary = build_galaxy_boundary(&state, &settings).unwrap();
        // A point between two arms at moderate radius is still covered
        // because relaxation bridges the valley.
        let diag = std::f64::consts::FRAC_PI_4;
        assert!(boundary.contains(Vec2::new(40.0 * diag.cos(), 40.0 * diag.sin())));
    }
}
