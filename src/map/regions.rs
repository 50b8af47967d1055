//! Region merging over the shared tessellation graph, plus void claiming.
//!
//! Cells are merged at the vertex-index level so that two regions meeting
//! along an arc reproduce the exact same polyline. Simplification protects
//! junction vertices where three or more region classes meet.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::config::{MapSettings, VoidMaxSize};
use crate::geom::{MultiPolygon, Polygon, Ring, Vec2, point_in_ring, signed_area, simplify_collinear};
use crate::map::ownership::{Ownership, frontier_sector_id};
use crate::map::partition::Partition;

/// Doubled-area threshold for dropping collinear boundary vertices.
const COLLINEAR_TOLERANCE: f64 = 1e-6;
/// Vertices this close to the clip bounds are never simplified away.
const BOUNDS_EPS: f64 = 1e-6;

/// Per-cell region keys at the three granularities borders are drawn at.
/// `None` marks void (unowned space).
#[derive(Debug, Clone, Default)]
pub struct CellKeys {
    pub leader: Vec<Option<i64>>,
    pub sector: Vec<Option<i64>>,
    pub country: Vec<Option<i64>>,
}

pub fn assign_cell_keys(partition: &Partition, ownership: &Ownership) -> CellKeys {
    let count = partition.cell_count();
    let mut keys = CellKeys {
        leader: vec![None; count],
        sector: vec![None; count],
        country: vec![None; count],
    };
    for cell in 0..count {
        let system = partition.owner_of_cell(cell);
        if system < 0 {
            continue;
        }
        keys.leader[cell] = ownership.merge_key_of(system);
        keys.sector[cell] = ownership.sector_of(system);
        keys.country[cell] = ownership.country_of(system);
    }
    keys
}

/// Undirected edge key in the shared vertex pool.
pub fn edge_key(a: usize, b: usize) -> (usize, usize) {
    if a < b { (a, b) } else { (b, a) }
}

/// Map every tessellation edge to the cells using it (one or two).
pub fn edge_cells(partition: &Partition) -> HashMap<(usize, usize), Vec<usize>> {
    let mut map: HashMap<(usize, usize), Vec<usize>> = HashMap::new();
    for cell in 0..partition.cell_count() {
        let ring = partition.cell_vertices(cell);
        for i in 0..ring.len() {
            let a = ring[i];
            let b = ring[(i + 1) % ring.len()];
            map.entry(edge_key(a, b)).or_default().push(cell);
        }
    }
    map
}

/// Stitch the boundary of a cell group into vertex-index rings. Boundary
/// edges are those used by exactly one cell of the group; since cells are
/// counterclockwise, the group interior lies on the left of each edge.
pub fn boundary_rings(partition: &Partition, cells: &[usize]) -> Vec<Vec<usize>> {
    let group: BTreeSet<usize> = cells.iter().copied().collect();
    let mut usage: HashMap<(usize, usize), u32> = HashMap::new();
    for &cell in &group {
        let ring = partition.cell_vertices(cell);
        for i in 0..ring.len() {
            *usage
                .entry(edge_key(ring[i], ring[(i + 1) % ring.len()]))
                .or_default() += 1;
        }
    }

    // Directed boundary edges, grouped by start vertex.
    let mut outgoing: HashMap<usize, Vec<usize>> = HashMap::new();
    let mut remaining: BTreeSet<(usize, usize)> = BTreeSet::new();
    for &cell in &group {
        let ring = partition.cell_vertices(cell);
        for i in 0..ring.len() {
            let a = ring[i];
            let b = ring[(i + 1) % ring.len()];
            if usage[&edge_key(a, b)] == 1 {
                outgoing.entry(a).or_default().push(b);
                remaining.insert((a, b));
            }
        }
    }

    let mut rings = Vec::new();
    while let Some(&(start, mut next)) = remaining.iter().next() {
        remaining.remove(&(start, next));
        let mut ring = vec![start];
        let mut prev = start;
        while next != start {
            ring.push(next);
            let incoming = partition.vertex(next) - partition.vertex(prev);
            let candidates = outgoing.get(&next).cloned().unwrap_or_default();
            let mut best: Option<(f64, usize)> = None;
            for w in candidates {
                if !remaining.contains(&(next, w)) {
                    continue;
                }
                let out = partition.vertex(w) - partition.vertex(next);
                // Sharpest left turn keeps pinch-touching rings separate.
                let score = incoming.cross(out).atan2(incoming.dot(out));
                if best.is_none_or(|(s, _)| score > s) {
                    best = Some((score, w));
                }
            }
            let Some((_, w)) = best else {
                log::warn!("open boundary walk at vertex {next}, dropping ring");
                ring.clear();
                break;
            };
            remaining.remove(&(next, w));
            prev = next;
            next = w;
        }
        if ring.len() >= 3 {
            rings.push(ring);
        }
    }
    rings
}

/// Merge cells sharing a key into polygons. Adjacent regions built from the
/// same assignment are guaranteed to trace identical arcs where they touch.
pub fn merge_by_key(partition: &Partition, keys: &[Option<i64>]) -> BTreeMap<i64, MultiPolygon> {
    // Vertex to incident key classes (void counts as a class of its own), so
    // simplification spares every junction of three or more classes.
    let mut classes: HashMap<usize, BTreeSet<Option<i64>>> = HashMap::new();
    for cell in 0..partition.cell_count() {
        for &v in partition.cell_vertices(cell) {
            classes.entry(v).or_default().insert(keys[cell]);
        }
    }
    let (min, max) = partition.bounds;
    let on_bounds = |p: Vec2| {
        (p.x - min.x).abs() < BOUNDS_EPS
            || (p.x - max.x).abs() < BOUNDS_EPS
            || (p.y - min.y).abs() < BOUNDS_EPS
            || (p.y - max.y).abs() < BOUNDS_EPS
    };

    let mut groups: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
    for (cell, key) in keys.iter().enumerate() {
        if let Some(key) = key {
            groups.entry(*key).or_default().push(cell);
        }
    }

    let mut out = BTreeMap::new();
    for (key, cells) in groups {
        let mut rings: Vec<Ring> = Vec::new();
        for index_ring in boundary_rings(partition, &cells) {
            let ring: Ring = index_ring.iter().map(|&v| partition.vertex(v)).collect();
            let keep = |i: usize| {
                let v = index_ring[i];
                classes.get(&v).map(BTreeSet::len).unwrap_or(0) >= 3
                    || on_bounds(partition.vertex(v))
            };
            rings.push(simplify_collinear(&ring, COLLINEAR_TOLERANCE, keep));
        }
        out.insert(key, assemble_rings(rings));
    }
    out
}

/// Counterclockwise rings become exteriors, clockwise rings become holes of
/// the smallest exterior containing them.
fn assemble_rings(rings: Vec<Ring>) -> MultiPolygon {
    let mut exteriors: Vec<(f64, Polygon)> = Vec::new();
    let mut holes: Vec<Ring> = Vec::new();
    for ring in rings {
        let area = signed_area(&ring);
        if area > 0.0 {
            exteriors.push((area, Polygon::from_ring(ring)));
        } else {
            holes.push(ring);
        }
    }
    exteriors.sort_by(|a, b| a.0.total_cmp(&b.0));
    for hole in holes {
        let p = hole[0];
        let slot = exteriors
            .iter_mut()
            .find(|(_, poly)| point_in_ring(p, &poly.exterior));
        match slot {
            Some((_, poly)) => poly.holes.push(hole),
            None => log::warn!("merged hole ring without containing exterior, discarding"),
        }
    }
    MultiPolygon {
        polygons: exteriors.into_iter().map(|(_, p)| p).collect(),
    }
}

/// Reassign claimable void components to the neighboring leader holding the
/// largest share of their boundary. Mutates all three key layers.
pub fn claim_voids(
    partition: &Partition,
    keys: &mut CellKeys,
    ownership: &Ownership,
    settings: &MapSettings,
) {
    if !settings.void_claim.enabled {
        return;
    }
    let edges = edge_cells(partition);

    // Connected components of void cells (shared-edge adjacency).
    let mut component: Vec<Option<usize>> = vec![None; partition.cell_count()];
    let mut components: Vec<Vec<usize>> = Vec::new();
    for seed in 0..partition.cell_count() {
        if component[seed].is_some() || keys.leader[seed].is_some() {
            continue;
        }
        let id = components.len();
        let mut stack = vec![seed];
        let mut members = Vec::new();
        component[seed] = Some(id);
        while let Some(cell) = stack.pop() {
            members.push(cell);
            let ring = partition.cell_vertices(cell);
            for i in 0..ring.len() {
                let key = edge_key(ring[i], ring[(i + 1) % ring.len()]);
                for &other in &edges[&key] {
                    if other != cell
                        && keys.leader[other].is_none()
                        && component[other].is_none()
                    {
                        component[other] = Some(id);
                        stack.push(other);
                    }
                }
            }
        }
        components.push(members);
    }

    for members in components {
        let area: f64 = members.iter().map(|&c| partition.cell_area(c)).sum();
        let in_component: BTreeSet<usize> = members.iter().copied().collect();

        // Boundary length per neighboring leader / sector / country.
        let mut leader_len: BTreeMap<Option<i64>, f64> = BTreeMap::new();
        let mut sector_len: BTreeMap<i64, f64> = BTreeMap::new();
        let mut country_len: BTreeMap<i64, f64> = BTreeMap::new();
        let mut total = 0.0;
        for &cell in &members {
            let ring = partition.cell_vertices(cell);
            for i in 0..ring.len() {
                let a = ring[i];
                let b = ring[(i + 1) % ring.len()];
                let neighbors = &edges[&edge_key(a, b)];
                let other = neighbors.iter().find(|&&c| !in_component.contains(&c));
                if neighbors.len() > 1 && other.is_none() {
                    continue; // interior edge
                }
                let len = partition.vertex(a).distance(partition.vertex(b));
                total += len;
                let neighbor_leader = other.and_then(|&c| keys.leader[c]);
                *leader_len.entry(neighbor_leader).or_default() += len;
                if let Some(&c) = other {
                    if let Some(sector) = keys.sector[c] {
                        *sector_len.entry(sector).or_default() += len;
                    }
                    if let Some(country) = keys.country[c] {
                        *country_len.entry(country).or_default() += len;
                    }
                }
            }
        }
        if total <= 0.0 {
            continue;
        }

        // Lowest id wins ties; BTreeMap order plus strict greater-than.
        let mut winner: Option<(i64, f64)> = None;
        for (&leader, &len) in &leader_len {
            let Some(leader) = leader else { continue };
            if winner.is_none_or(|(_, best)| len > best) {
                winner = Some((leader, len));
            }
        }
        let Some((leader, len)) = winner else { continue };

        let eligible = match settings.void_claim.max_size {
            VoidMaxSize::Full => leader_len.len() == 1 && leader_len.contains_key(&Some(leader)),
            VoidMaxSize::Area(limit) => {
                area <= limit && len / total >= settings.void_claim.min_border_share
            }
        };
        if !eligible {
            continue;
        }

        let sector = best_in(&sector_len, |s| {
            let owner = ownership.sectors.get(&s).map(|sec| sec.owner)?;
            (ownership.merge_key.get(&owner).copied().unwrap_or(owner) == leader).then_some(())
        })
        .unwrap_or_else(|| frontier_sector_id(leader));
        let country = best_in(&country_len, |c| {
            (ownership.merge_key.get(&c).copied().unwrap_or(c) == leader).then_some(())
        })
        .unwrap_or(leader);

        for &cell in &members {
            keys.leader[cell] = Some(leader);
            keys.sector[cell] = Some(sector);
            keys.country[cell] = Some(country);
        }
    }
}

fn best_in(lengths: &BTreeMap<i64, f64>, filter: impl Fn(i64) -> Option<()>) -> Option<i64> {
    let mut winner: Option<(i64, f64)> = None;
    for (&id, &len) in lengths {
        if filter(id).is_none() {
            continue;
        }
        if winner.is_none_or(|(_, best)| len > best) {
            winner = Some((id, len));
        }
    }
    winner.map(|(id, _)| id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::VoidClaimSettings;
    use crate::map::ownership::assign_ownership;
    use crate::map::partition::build_partition;
    use crate::model::{Coordinate, Country, Fleet, GameState, NameNode, Ship, Starbase, System};

    fn state_with_owners(coords: &[(i64, f64, f64)], owners: &[(i64, Vec<i64>)]) -> GameState {
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
                    starbase_id: Some(id),
                    flags: Vec::new(),
                },
            );
            state.starbases.insert(id, Starbase { id, station: Some(id) });
            state.ships.insert(id, Ship { id, fleet: Some(id) });
            state.fleets.insert(id, Fleet { id, station: true });
        }
        for (country_id, fleets) in owners {
            state.countries.insert(
                *country_id,
                Country {
                    id: *country_id,
                    owned_fleets: fleets.clone(),
                    ..Country::default()
                },
            );
        }
        state
    }

    fn shared_coords(a: &MultiPolygon, b: &MultiPolygon) -> usize {
        let collect = |m: &MultiPolygon| -> BTreeSet<(i64, i64)> {
            m.polygons
                .iter()
                .flat_map(|p| p.exterior.iter())
                .map(|v| ((v.x * 1e6).round() as i64, (v.y * 1e6).round() as i64))
                .collect()
        };
        collect(a).intersection(&collect(b)).count()
    }

    #[test]
    fn row_of_systems_merges_to_single_polygon() {
        let state = state_with_owners(
            &[(0, 0.0, 0.0), (1, 20.0, 0.0), (2, 40.0, 0.0)],
            &[(0, vec![0, 1, 2])],
        );
        let settings = MapSettings::default();
        let partition = build_partition(&state, &settings, false);
        let ownership = assign_ownership(&state, &settings);
        let keys = assign_cell_keys(&partition, &ownership);
        let regions = merge_by_key(&partition, &keys.leader);
        let region = &regions[&0];
        assert_eq!(region.polygons.len(), 1);
        assert!(region.polygons[0].holes.is_empty());
        assert!(region.contains(Vec2::new(20.0, 0.0)));
        assert!(region.contains(Vec2::new(10.0, 0.0)), "seam must be interior");
    }

    #[test]
    fn adjacent_countries_share_their_boundary_arc() {
        let state = state_with_owners(
            &[(0, 0.0, 0.0), (1, 30.0, 0.0)],
            &[(0, vec![0]), (1, vec![1])],
        );
        let settings = MapSettings::default();
        let partition = build_partition(&state, &settings, false);
        let ownership = assign_ownership(&state, &settings);
        let keys = assign_cell_keys(&partition, &ownership);
        let regions = merge_by_key(&partition, &keys.leader);
        assert!(
            shared_coords(&regions[&0], &regions[&1]) >= 2,
            "regions must reuse the exact tessellation vertices along the border"
        );
    }

    // Twelve systems on a tight ring: the chord gaps stay inside the
    // lattice clearance, so the central pocket is sealed off from the
    // outer void.
    fn ring_coords() -> Vec<(i64, f64, f64)> {
        (0..12)
            .map(|i| {
                let angle = i as f64 / 12.0 * std::f64::consts::TAU;
                (i, 16.0 * angle.cos(), 16.0 * angle.sin())
            })
            .collect()
    }

    #[test]
    fn enclosed_void_is_claimed_when_enabled() {
        let state = state_with_owners(&ring_coords(), &[(0, (0..12).collect())]);

        let mut settings = MapSettings::default();
        settings.cell_lattice_spacing = 14.0;
        let partition = build_partition(&state, &settings, false);
        let ownership = assign_ownership(&state, &settings);

        let mut keys = assign_cell_keys(&partition, &ownership);
        claim_voids(&partition, &mut keys, &ownership, &settings);
        let unclaimed = merge_by_key(&partition, &keys.leader);
        assert!(
            !unclaimed[&0].contains(Vec2::new(0.0, 0.0)),
            "claiming is off by default"
        );

        settings.void_claim = VoidClaimSettings {
            enabled: true,
            max_size: VoidMaxSize::Area(5000.0),
            min_border_share: 0.3,
        };
        let mut keys = assign_cell_keys(&partition, &ownership);
        claim_voids(&partition, &mut keys, &ownership, &settings);
        let claimed = merge_by_key(&partition, &keys.leader);
        assert!(claimed[&0].contains(Vec2::new(0.0, 0.0)));
        assert!(claimed[&0].area() > unclaimed[&0].area());

        // A zero size limit disqualifies every void.
        settings.void_claim.max_size = VoidMaxSize::Area(0.0);
        let mut keys = assign_cell_keys(&partition, &ownership);
        claim_voids(&partition, &mut keys, &ownership, &settings);
        let zero = merge_by_key(&partition, &keys.leader);
        assert!(!zero[&0].contains(Vec2::new(0.0, 0.0)));
    }

    #[test]
    fn full_mode_requires_single_enclosing_leader() {
        // Country 1 owns one system of the ring, so the pocket is not
        // fully enclosed by a single leader.
        let state = state_with_owners(&ring_coords(), &[(0, (0..11).collect()), (1, vec![11])]);
        let mut settings = MapSettings::default();
        settings.cell_lattice_spacing = 14.0;
        settings.void_claim = VoidClaimSettings {
            enabled: true,
            max_size: VoidMaxSize::Full,
            min_border_share: 0.3,
        };
        let partition = build_partition(&state, &settings, false);
        let ownership = assign_ownership(&state, &settings);
        let mut keys = assign_cell_keys(&partition, &ownership);
        claim_voids(&partition, &mut keys, &ownership, &settings);
        let regions = merge_by_key(&partition, &keys.leader);
        assert!(!regions[&0].contains(Vec2::new(0.0, 0.0)));
        assert!(!regions[&1].contains(Vec2::new(0.0, 0.0)));
    }
}
