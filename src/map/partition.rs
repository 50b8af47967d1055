//! Spatial partition: Voronoi tessellation over system coordinates plus
//! synthetic points (hyperlane samples, void lattice, frame ring).

use std::collections::{HashMap, HashSet};

use crate::config::MapSettings;
use crate::geom::delaunay::{VoronoiDiagram, voronoi_cells};
use crate::geom::{Ring, Vec2, signed_area};
use crate::model::{GameState, VOID_ID};

/// Margin added around the systems' bounding box, in lattice spacings.
const BOUNDS_MARGIN_SPACINGS: f64 = 2.0;
/// Lattice points closer than this fraction of the spacing to a real site
/// are dropped so they cannot distort ownership cells.
const LATTICE_CLEARANCE_FACTOR: f64 = 0.65;
/// Number of far-out sentinel sites bounding the hull cells.
const FRAME_SITES: usize = 16;
/// Site positions are deduplicated at this resolution.
const SITE_QUANTUM: f64 = 1e-3;

#[derive(Debug, Default)]
pub struct Partition {
    diagram: VoronoiDiagram,
    /// Per site: the system id whose cell this is, or [`VOID_ID`].
    site_owner: Vec<i64>,
    site_pos: Vec<Vec2>,
    cells_by_id: HashMap<i64, Vec<usize>>,
    pub bounds: (Vec2, Vec2),
}

impl Partition {
    /// Cell indices registered to a system id (or [`VOID_ID`]).
    pub fn cells_of(&self, id: i64) -> &[usize] {
        self.cells_by_id.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn cell_count(&self) -> usize {
        self.diagram.cells.len()
    }

    pub fn owner_of_cell(&self, cell: usize) -> i64 {
        self.site_owner[cell]
    }

    /// Vertex-index ring of a cell (counterclockwise), in the shared pool.
    pub fn cell_vertices(&self, cell: usize) -> &[usize] {
        &self.diagram.cells[cell]
    }

    pub fn vertex(&self, index: usize) -> Vec2 {
        self.diagram.vertices[index]
    }

    pub fn vertex_count(&self) -> usize {
        self.diagram.vertices.len()
    }

    pub fn cell_ring(&self, cell: usize) -> Ring {
        self.diagram.cell_ring(cell)
    }

    pub fn cell_area(&self, cell: usize) -> f64 {
        signed_area(&self.cell_ring(cell)).abs()
    }

    /// Nearest-system query, independent of ownership.
    pub fn locate(&self, x: f64, y: f64) -> Option<i64> {
        let p = Vec2::new(x, y);
        let mut best: Option<(f64, i64)> = None;
        for (site, &owner) in self.site_pos.iter().zip(&self.site_owner) {
            if owner == VOID_ID {
                continue;
            }
            let d = site.distance(p);
            if best.is_none_or(|(bd, _)| d < bd) {
                best = Some((d, owner));
            }
        }
        best.map(|(_, id)| id)
    }
}

/// Build the tessellation. `galaxy_boundary_on` suppresses the void lattice;
/// the galaxy silhouette bounds the map instead.
pub fn build_partition(
    state: &GameState,
    settings: &MapSettings,
    galaxy_boundary_on: bool,
) -> Partition {
    let mut sites: Vec<Vec2> = Vec::new();
    let mut owners: Vec<i64> = Vec::new();
    let mut seen: HashSet<(i64, i64)> = HashSet::new();

    let mut push_site = |sites: &mut Vec<Vec2>,
                         owners: &mut Vec<i64>,
                         seen: &mut HashSet<(i64, i64)>,
                         p: Vec2,
                         owner: i64|
     -> bool {
        let key = (
            (p.x / SITE_QUANTUM).round() as i64,
            (p.y / SITE_QUANTUM).round() as i64,
        );
        if !seen.insert(key) {
            return false;
        }
        sites.push(p);
        owners.push(owner);
        true
    };

    let system_points: Vec<(i64, Vec2)> = state
        .systems
        .values()
        .map(|s| (s.id, Vec2::new(s.coordinate.x, s.coordinate.y)))
        .collect();

    for &(id, p) in &system_points {
        if !push_site(&mut sites, &mut owners, &mut seen, p, id) {
            log::warn!("system {id} shares coordinates with another site, skipping");
        }
    }

    // Hyperlane-sensitive sampling: extra points along each lane, each tagged
    // to its nearer endpoint, so borders bend along lane direction.
    if settings.hyperlane_sensitive_borders && settings.hyperlane_sample_spacing > 0.0 {
        for (from, to, pa, pb) in undirected_lanes(state) {
            let length = pa.distance(pb);
            let steps = (length / settings.hyperlane_sample_spacing).floor() as usize;
            if steps < 2 {
                continue;
            }
            for k in 1..steps {
                let t = k as f64 / steps as f64;
                let p = pa + (pb - pa) * t;
                let owner = if t < 0.5 { from } else { to };
                push_site(&mut sites, &mut owners, &mut seen, p, owner);
            }
        }
    }

    let spacing = settings.cell_lattice_spacing.max(1.0);
    let margin = spacing * BOUNDS_MARGIN_SPACINGS;
    let (raw_min, raw_max) = crate::geom::bounds_of(system_points.iter().map(|&(_, p)| p))
        .unwrap_or((Vec2::new(-100.0, -100.0), Vec2::new(100.0, 100.0)));
    let min = Vec2::new(raw_min.x - margin, raw_min.y - margin);
    let max = Vec2::new(raw_max.x + margin, raw_max.y + margin);

    // Void lattice backfill, alternating-row offset to avoid grid artifacts.
    if !galaxy_boundary_on {
        let clearance = spacing * LATTICE_CLEARANCE_FACTOR;
        let mut row = 0usize;
        let mut y = min.y;
        while y <= max.y {
            let offset = if row % 2 == 0 { 0.0 } else { spacing * 0.5 };
            let mut x = min.x + offset;
            while x <= max.x {
                let p = Vec2::new(x, y);
                let near_system = system_points
                    .iter()
                    .any(|&(_, sp)| sp.distance(p) < clearance);
                if !near_system {
                    push_site(&mut sites, &mut owners, &mut seen, p, VOID_ID);
                }
                x += spacing;
            }
            y += spacing;
            row += 1;
        }
    }

    // Frame ring far outside the box, so every real site's cell is finite.
    let center = Vec2::new((min.x + max.x) * 0.5, (min.y + max.y) * 0.5);
    let frame_radius = (max.x - min.x).max(max.y - min.y) * 1.5;
    for i in 0..FRAME_SITES {
        let angle = i as f64 / FRAME_SITES as f64 * std::f64::consts::TAU;
        let p = Vec2::new(
            center.x + frame_radius * angle.cos(),
            center.y + frame_radius * angle.sin(),
        );
        push_site(&mut sites, &mut owners, &mut seen, p, VOID_ID);
    }

    let mut diagram = voronoi_cells(&sites, min, max);
    // Normalize every cell ring counterclockwise; the merge stage depends
    // on consistent orientation.
    for cell in diagram.cells.iter_mut() {
        if cell.len() >= 3 {
            let ring: Ring = cell.iter().map(|&v| diagram.vertices[v]).collect();
            if signed_area(&ring) < 0.0 {
                cell.reverse();
            }
        }
    }

    let mut cells_by_id: HashMap<i64, Vec<usize>> = HashMap::new();
    for (cell, &owner) in owners.iter().enumerate() {
        if diagram.cells[cell].len() >= 3 {
            cells_by_id.entry(owner).or_default().push(cell);
        }
    }
    if state.systems.len() >= 3
        && cells_by_id.keys().filter(|&&k| k != VOID_ID).count() == 0
    {
        log::warn!("tessellation degenerated: no system received a cell");
    }

    Partition {
        diagram,
        site_owner: owners,
        site_pos: sites,
        cells_by_id,
        bounds: (min, max),
    }
}

/// Undirected, deduplicated hyperlanes with endpoint positions.
pub fn undirected_lanes(state: &GameState) -> Vec<(i64, i64, Vec2, Vec2)> {
    let mut out = Vec::new();
    let mut seen: HashSet<(i64, i64)> = HashSet::new();
    for system in state.systems.values() {
        for lane in &system.hyperlanes {
            let key = if system.id < lane.to {
                (system.id, lane.to)
            } else {
                (lane.to, system.id)
            };
            if !seen.insert(key) {
                continue;
            }
            if !state.systems.contains_key(&lane.to) {
                log::warn!("hyperlane from {} to missing system {}", system.id, lane.to);
                continue;
            }
            out.push((
                key.0,
                key.1,
                point_of(state, key.0),
                point_of(state, key.1),
            ));
        }
    }
    out
}

fn point_of(state: &GameState, id: i64) -> Vec2 {
    state
        .systems
        .get(&id)
        .map(|s| Vec2::new(s.coordinate.x, s.coordinate.y))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Coordinate, NameNode, System};

    fn test_state(coords: &[(i64, f64, f64)], lanes: &[(i64, i64)]) -> GameState {
        let mut state = GameState::default();
        for &(id, x, y) in coords {
            state.systems.insert(
                id,
                System {
                    id,
                    name: NameNode::default(),
                    coordinate: Coordinate { x, y },
                    hyperlanes: Vec::new(),
                    bypass_ids: Vec::new(),
                    megastructure_ids: Vec::new(),
                    colony_ids: Vec::new(),
                    starbase_id: None,
                    flags: Vec::new(),
                },
            );
        }
        for &(a, b) in lanes {
            let length = {
                let pa = state.systems[&a].coordinate;
                let pb = state.systems[&b].coordinate;
                ((pa.x - pb.x).powi(2) + (pa.y - pb.y).powi(2)).sqrt()
            };
            state
                .systems
                .get_mut(&a)
                .unwrap()
                .hyperlanes
                .push(crate::model::Hyperlane { to: b, length });
            state
                .systems
                .get_mut(&b)
                .unwrap()
                .hyperlanes
                .push(crate::model::Hyperlane { to: a, length });
        }
        state
    }

    fn grid_state(n: i64, step: f64) -> GameState {
        let mut coords = Vec::new();
        for i in 0..n {
            for j in 0..n {
                coords.push((i * n + j, i as f64 * step, j as f64 * step));
            }
        }
        test_state(&coords, &[])
    }

    #[test]
    fn every_system_gets_a_cell() {
        let state = grid_state(4, 25.0);
        let partition = build_partition(&state, &MapSettings::default(), false);
        for id in state.systems.keys() {
            assert!(
                !partition.cells_of(*id).is_empty(),
                "system {id} has no cell"
            );
        }
    }

    #[test]
    fn void_lattice_exists_only_without_galaxy_boundary() {
        let state = grid_state(3, 30.0);
        let with_lattice = build_partition(&state, &MapSettings::default(), false);
        assert!(!with_lattice.cells_of(VOID_ID).is_empty());
        // With the boundary on, the lattice is suppressed; only frame
        // sentinels remain under the void id.
        let without = build_partition(&state, &MapSettings::default(), true);
        assert!(without.cells_of(VOID_ID).len() <= FRAME_SITES);
    }

    #[test]
    fn locate_returns_nearest_system() {
        let state = test_state(&[(7, 0.0, 0.0), (9, 50.0, 0.0)], &[]);
        let partition = build_partition(&state, &MapSettings::default(), false);
        assert_eq!(partition.locate(5.0, 2.0), Some(7));
        assert_eq!(partition.locate(48.0, -3.0), Some(9));
    }

    #[test]
    fn hyperlane_sampling_adds_cells_to_endpoints() {
        let state = test_state(&[(0, 0.0, 0.0), (1, 100.0, 0.0), (2, 50.0, 80.0)], &[(0, 1)]);
        let mut settings = MapSettings::default();
        settings.hyperlane_sensitive_borders = true;
        settings.hyperlane_sample_spacing = 10.0;
        let partition = build_partition(&state, &settings, false);
        assert!(partition.cells_of(0).len() > 1, "lane samples missing");
        assert!(partition.cells_of(1).len() > 1);
        assert_eq!(partition.cells_of(2).len(), 1);
    }

    #[test]
    fn dangling_hyperlanes_are_dropped() {
        let mut state = test_state(&[(0, 0.0, 0.0), (1, 30.0, 0.0)], &[(0, 1)]);
        state
            .systems
            .get_mut(&0)
            .unwrap()
            .hyperlanes
            .push(crate::model::Hyperlane { to: 99, length: 10.0 });
        let lanes = undirected_lanes(&state);
        assert_eq!(lanes.len(), 1);
        assert_eq!((lanes[0].0, lanes[0].1), (0, 1));
    }

    #[test]
    fn coincident_systems_do_not_panic() {
        let state = test_state(&[(0, 1.0, 1.0), (1, 1.0, 1.0), (2, 40.0, 0.0)], &[]);
        let partition = build_partition(&state, &MapSettings::default(), false);
        assert!(!partition.cells_of(0).is_empty());
        assert!(partition.cells_of(1).is_empty());
    }
}
