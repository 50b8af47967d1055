//! Border assembly per union-leader entity: outer polygon, stroke-width
//! inner polygon, the band between them, and internal sub-borders along
//! sector seams.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use crate::config::MapSettings;
use crate::geom::smooth::{chaikin_path, chaikin_ring};
use crate::geom::{MultiPolygon, Vec2, boolean, buffer};
use crate::map::ownership::{Ownership, is_frontier_sector};
use crate::map::partition::Partition;
use crate::map::regions::{self, CellKeys, edge_key};
use crate::model::GameState;

/// Chaikin passes applied when border smoothing is on.
pub const SMOOTHING_PASSES: usize = 2;
/// A fragment edge midpoint closer than this to another entity's boundary
/// counts as shared border.
const FRAGMENT_TOUCH_EPS: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubBorderKind {
    /// Seam between two ordinary sectors of the same country.
    Standard,
    /// Seam between two member countries of a joined union.
    Union,
    /// Seam around a country's core sector.
    Core,
    /// Seam around undeclared frontier space.
    Frontier,
}

#[derive(Debug, Clone)]
pub struct SubBorder {
    pub kind: SubBorderKind,
    pub points: Vec<Vec2>,
    pub closed: bool,
}

#[derive(Debug, Clone, Default)]
pub struct EntityBorders {
    /// Union-leader merge key this record belongs to.
    pub key: i64,
    pub outer: MultiPolygon,
    pub inner: MultiPolygon,
    pub band: MultiPolygon,
    pub sub_borders: Vec<SubBorder>,
}

pub fn build_borders(
    state: &GameState,
    partition: &Partition,
    ownership: &Ownership,
    keys: &CellKeys,
    boundary: Option<&MultiPolygon>,
    settings: &MapSettings,
) -> BTreeMap<i64, EntityBorders> {
    let mut regions = regions::merge_by_key(partition, &keys.leader);

    // Sub-borders walk the raw tessellation graph, before clipping and
    // smoothing, so both sides of a seam agree exactly.
    let mut sub_borders = trace_sub_borders(state, partition, ownership, keys, settings);

    if let Some(boundary) = boundary {
        clip_regions(&mut regions, boundary, state, ownership);
        for runs in sub_borders.values_mut() {
            clip_sub_borders(runs, boundary);
        }
    }

    let mut out = BTreeMap::new();
    for (key, mut outer) in regions {
        if outer.is_empty() {
            log::warn!("entity {key} has no territory polygon after clipping");
            out.insert(key, EntityBorders { key, ..Default::default() });
            continue;
        }
        if settings.smooth_borders {
            for poly in outer.polygons.iter_mut() {
                poly.exterior = chaikin_ring(&poly.exterior, SMOOTHING_PASSES);
                for hole in poly.holes.iter_mut() {
                    *hole = chaikin_ring(hole, SMOOTHING_PASSES);
                }
            }
        }
        let inner = buffer::inset_multi(&outer, settings.border_stroke_width);
        let band = if inner.is_empty() {
            // Too thin to carry a band; the whole polygon is border.
            outer.clone()
        } else {
            boolean::difference(&outer, &inner)
        };

        let mut subs = sub_borders.remove(&key).unwrap_or_default();
        if settings.smooth_borders {
            for sub in subs.iter_mut() {
                sub.points = if sub.closed {
                    chaikin_ring(&sub.points, SMOOTHING_PASSES)
                } else {
                    chaikin_path(&sub.points, SMOOTHING_PASSES)
                };
            }
        }

        out.insert(
            key,
            EntityBorders {
                key,
                outer,
                inner,
                band,
                sub_borders: subs,
            },
        );
    }
    out
}

/// Clip every region to the galaxy silhouette, then hand fragments that
/// lost all their systems to whichever neighbor shares the longest border.
fn clip_regions(
    regions: &mut BTreeMap<i64, MultiPolygon>,
    boundary: &MultiPolygon,
    state: &GameState,
    ownership: &Ownership,
) {
    let mut entity_systems: BTreeMap<i64, Vec<Vec2>> = BTreeMap::new();
    for (&system, _) in &ownership.system_country {
        if let (Some(key), Some(sys)) = (ownership.merge_key_of(system), state.systems.get(&system))
        {
            entity_systems
                .entry(key)
                .or_default()
                .push(Vec2::new(sys.coordinate.x, sys.coordinate.y));
        }
    }

    let mut kept: BTreeMap<i64, MultiPolygon> = BTreeMap::new();
    let mut orphans: Vec<(i64, crate::geom::Polygon)> = Vec::new();
    for (&key, region) in regions.iter() {
        let clipped = boolean::intersection(region, boundary);
        let systems = entity_systems.get(&key).map(Vec::as_slice).unwrap_or(&[]);
        let mut keep = MultiPolygon::default();
        for poly in clipped.polygons {
            if systems.iter().any(|&p| poly.contains(p)) {
                keep.polygons.push(poly);
            } else {
                orphans.push((key, poly));
            }
        }
        kept.insert(key, keep);
    }

    for (origin, fragment) in orphans {
        let mut best: Option<(i64, f64)> = None;
        for (&key, region) in kept.iter() {
            if key == origin || region.is_empty() {
                continue;
            }
            let mut shared = 0.0;
            for i in 0..fragment.exterior.len() {
                let a = fragment.exterior[i];
                let b = fragment.exterior[(i + 1) % fragment.exterior.len()];
                let mid = (a + b) * 0.5;
                if region.boundary_distance(mid) < FRAGMENT_TOUCH_EPS {
                    shared += a.distance(b);
                }
            }
            if shared > 0.0 && best.is_none_or(|(_, s)| shared > s) {
                best = Some((key, shared));
            }
        }
        let target = match best {
            Some((key, _)) => key,
            None => {
                log::warn!("clipped fragment of entity {origin} touches no neighbor, keeping");
                origin
            }
        };
        if let Some(region) = kept.get_mut(&target) {
            region.polygons.push(fragment);
        }
    }

    *regions = kept;
}

/// Split every sub-border run into the stretches inside the silhouette.
fn clip_sub_borders(runs: &mut Vec<SubBorder>, boundary: &MultiPolygon) {
    let mut clipped = Vec::new();
    for run in runs.drain(..) {
        let mut current: Vec<Vec2> = Vec::new();
        let mut pieces: Vec<Vec<Vec2>> = Vec::new();
        let fully_inside = run.points.iter().all(|&p| boundary.contains(p));
        if fully_inside {
            clipped.push(run);
            continue;
        }
        for &p in &run.points {
            if boundary.contains(p) {
                current.push(p);
            } else if current.len() >= 2 {
                pieces.push(std::mem::take(&mut current));
            } else {
                current.clear();
            }
        }
        if current.len() >= 2 {
            pieces.push(current);
        }
        for points in pieces {
            clipped.push(SubBorder {
                kind: run.kind,
                points,
                closed: false,
            });
        }
    }
    *runs = clipped;
}

/// Maximal seam runs between sectors inside each entity, tagged by the
/// relation between the two owning sectors. Runs terminate on the entity's
/// outer boundary, at junction vertices, and where the tag changes.
fn trace_sub_borders(
    state: &GameState,
    partition: &Partition,
    ownership: &Ownership,
    keys: &CellKeys,
    settings: &MapSettings,
) -> BTreeMap<i64, Vec<SubBorder>> {
    let edges = regions::edge_cells(partition);

    // Entity -> sector -> cells, restricted to that entity's cells.
    let mut entity_sector_cells: BTreeMap<i64, BTreeMap<i64, Vec<usize>>> = BTreeMap::new();
    for cell in 0..partition.cell_count() {
        if let (Some(key), Some(sector)) = (keys.leader[cell], keys.sector[cell]) {
            entity_sector_cells
                .entry(key)
                .or_default()
                .entry(sector)
                .or_default()
                .push(cell);
        }
    }

    let mut out: BTreeMap<i64, Vec<SubBorder>> = BTreeMap::new();
    for (&key, sector_cells) in &entity_sector_cells {
        if sector_cells.len() < 2 {
            continue; // single sector, nothing to split
        }
        let entity_cells: Vec<usize> = sector_cells.values().flatten().copied().collect();
        let outer_edges: HashSet<(usize, usize)> = outer_edge_set(partition, &entity_cells);

        // Junctions: vertices where three or more sectors of this entity
        // meet, or that touch the outer boundary.
        let mut vertex_sectors: HashMap<usize, BTreeSet<i64>> = HashMap::new();
        for (&sector, cells) in sector_cells {
            for &cell in cells {
                for &v in partition.cell_vertices(cell) {
                    vertex_sectors.entry(v).or_default().insert(sector);
                }
            }
        }
        let mut outer_vertices: HashSet<usize> = HashSet::new();
        for &(a, b) in &outer_edges {
            outer_vertices.insert(a);
            outer_vertices.insert(b);
        }
        let is_junction = |v: usize| {
            outer_vertices.contains(&v)
                || vertex_sectors.get(&v).map(BTreeSet::len).unwrap_or(0) >= 3
        };

        let mut claimed: HashSet<(usize, usize)> = HashSet::new();
        let mut subs: Vec<SubBorder> = Vec::new();
        for (&sector, cells) in sector_cells {
            for ring in regions::boundary_rings(partition, cells) {
                let n = ring.len();
                // Tag per ring edge; None marks ineligible edges.
                let tags: Vec<Option<SubBorderKind>> = (0..n)
                    .map(|i| {
                        let ek = edge_key(ring[i], ring[(i + 1) % n]);
                        if outer_edges.contains(&ek) || claimed.contains(&ek) {
                            return None;
                        }
                        let neighbor = edges[&ek]
                            .iter()
                            .copied()
                            .find(|&c| keys.sector[c] != Some(sector))?;
                        let other = keys.sector[neighbor]?;
                        Some(seam_kind(state, ownership, settings, sector, other))
                    })
                    .collect();

                let eligible = |i: usize| tags[i].is_some();
                let breaks_at = |i: usize| is_junction(ring[i]);

                if tags.iter().all(|t| *t == tags[0])
                    && tags[0].is_some()
                    && !(0..n).any(breaks_at)
                {
                    // A whole sector ring inside the entity, e.g. an enclave.
                    let mut points: Vec<Vec2> =
                        ring.iter().map(|&v| partition.vertex(v)).collect();
                    points.push(points[0]);
                    for i in 0..n {
                        claimed.insert(edge_key(ring[i], ring[(i + 1) % n]));
                    }
                    subs.push(SubBorder {
                        kind: tags[0].unwrap_or(SubBorderKind::Standard),
                        points,
                        closed: true,
                    });
                    continue;
                }

                // Open runs: walk the ring, starting after a break so no
                // run straddles the seam between two walks.
                let start = (0..n)
                    .find(|&i| !eligible(i) || breaks_at(i))
                    .unwrap_or(0);
                let mut run: Vec<usize> = Vec::new();
                let mut run_kind = SubBorderKind::Standard;
                let mut flush =
                    |run: &mut Vec<usize>, kind: SubBorderKind, subs: &mut Vec<SubBorder>| {
                        if run.len() >= 2 {
                            subs.push(SubBorder {
                                kind,
                                points: run.iter().map(|&v| partition.vertex(v)).collect(),
                                closed: false,
                            });
                        }
                        run.clear();
                    };
                for step in 0..n {
                    let i = (start + step) % n;
                    let Some(kind) = tags[i] else {
                        flush(&mut run, run_kind, &mut subs);
                        continue;
                    };
                    if run.is_empty() {
                        run_kind = kind;
                        run.push(ring[i]);
                    } else if kind != run_kind || breaks_at(i) {
                        flush(&mut run, run_kind, &mut subs);
                        run_kind = kind;
                        run.push(ring[i]);
                    }
                    run.push(ring[(i + 1) % n]);
                    claimed.insert(edge_key(ring[i], ring[(i + 1) % n]));
                }
                flush(&mut run, run_kind, &mut subs);
            }
        }
        if !subs.is_empty() {
            out.insert(key, subs);
        }
    }
    out
}

fn outer_edge_set(partition: &Partition, cells: &[usize]) -> HashSet<(usize, usize)> {
    let mut usage: HashMap<(usize, usize), u32> = HashMap::new();
    for &cell in cells {
        let ring = partition.cell_vertices(cell);
        for i in 0..ring.len() {
            *usage
                .entry(edge_key(ring[i], ring[(i + 1) % ring.len()]))
                .or_default() += 1;
        }
    }
    usage
        .into_iter()
        .filter_map(|(edge, count)| (count == 1).then_some(edge))
        .collect()
}

/// Relation between the two sectors a seam separates.
fn seam_kind(
    state: &GameState,
    ownership: &Ownership,
    settings: &MapSettings,
    a: i64,
    b: i64,
) -> SubBorderKind {
    let owner = |sector: i64| ownership.sectors.get(&sector).map(|s| s.owner);
    let (oa, ob) = (owner(a), owner(b));
    if oa.is_some() && ob.is_some() && oa != ob {
        return SubBorderKind::Union;
    }
    if settings.core_frontier_split {
        let is_core = |sector: i64| {
            ownership
                .sectors
                .get(&sector)
                .and_then(|s| {
                    let capital = state.countries.get(&s.owner)?.capital?;
                    Some(s.local_capital == Some(capital))
                })
                .unwrap_or(false)
        };
        if is_core(a) || is_core(b) {
            return SubBorderKind::Core;
        }
    }
    if is_frontier_sector(a) || is_frontier_sector(b) {
        return SubBorderKind::Frontier;
    }
    SubBorderKind::Standard
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::ownership::assign_ownership;
    use crate::map::partition::build_partition;
    use crate::map::regions::{assign_cell_keys, claim_voids};
    use crate::model::{Coordinate, Country, Fleet, NameNode, Sector, Ship, Starbase, System};

    fn base_state(coords: &[(i64, f64, f64)]) -> GameState {
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
        state
    }

    fn pipeline(
        state: &GameState,
        settings: &MapSettings,
    ) -> BTreeMap<i64, EntityBorders> {
        let partition = build_partition(state, settings, false);
        let ownership = assign_ownership(state, settings);
        let mut keys = assign_cell_keys(&partition, &ownership);
        claim_voids(&partition, &mut keys, &ownership, settings);
        build_borders(state, &partition, &ownership, &keys, None, settings)
    }

    #[test]
    fn three_in_line_single_country_has_no_sub_borders() {
        let mut state = base_state(&[(0, 0.0, 0.0), (1, 20.0, 0.0), (2, 40.0, 0.0)]);
        state.countries.insert(
            0,
            Country {
                id: 0,
                owned_fleets: vec![0, 1, 2],
                ..Country::default()
            },
        );
        let borders = pipeline(&state, &MapSettings::default());
        let entity = &borders[&0];
        assert_eq!(entity.outer.polygons.len(), 1);
        assert!(entity.sub_borders.is_empty(), "one frontier sector only");
        assert!(!entity.band.is_empty());
    }

    #[test]
    fn declared_sector_seam_is_tagged_frontier() {
        let mut state = base_state(&[(0, 0.0, 0.0), (1, 20.0, 0.0), (2, 40.0, 0.0)]);
        state.countries.insert(
            0,
            Country {
                id: 0,
                owned_fleets: vec![0, 1, 2],
                ..Country::default()
            },
        );
        // Systems 0 and 1 declared; system 2 stays frontier.
        state.sectors.insert(
            7,
            Sector {
                id: 7,
                owner: 0,
                local_capital: None,
                systems: vec![0, 1],
            },
        );
        let mut settings = MapSettings::default();
        settings.smooth_borders = false;
        let borders = pipeline(&state, &settings);
        let subs = &borders[&0].sub_borders;
        assert!(!subs.is_empty(), "seam between sector and frontier expected");
        assert!(subs.iter().all(|s| s.kind == SubBorderKind::Frontier));
        for sub in subs {
            assert!(sub.points.len() >= 2);
            // The seam runs between systems 1 and 2.
            for p in &sub.points {
                assert!((p.x - 30.0).abs() < 1.0, "seam at x=30, got {}", p.x);
            }
        }
    }

    #[test]
    fn joined_vassal_seam_is_tagged_union() {
        let mut state = base_state(&[(0, 0.0, 0.0), (1, 20.0, 0.0)]);
        state.countries.insert(
            0,
            Country {
                id: 0,
                owned_fleets: vec![0],
                ..Country::default()
            },
        );
        state.countries.insert(
            1,
            Country {
                id: 1,
                owned_fleets: vec![1],
                overlord: Some(0),
                ..Country::default()
            },
        );
        let mut settings = MapSettings::default();
        settings.smooth_borders = false;
        settings.union.subjects = crate::config::UnionMode::Join;
        let borders = pipeline(&state, &settings);
        assert_eq!(borders.len(), 1, "joined union draws one entity");
        let subs = &borders[&0].sub_borders;
        assert!(subs.iter().any(|s| s.kind == SubBorderKind::Union));
    }

    #[test]
    fn band_shrinks_with_wider_stroke() {
        let mut state = base_state(&[(0, 0.0, 0.0), (1, 20.0, 0.0), (2, 40.0, 0.0)]);
        state.countries.insert(
            0,
            Country {
                id: 0,
                owned_fleets: vec![0, 1, 2],
                ..Country::default()
            },
        );
        let mut narrow = MapSettings::default();
        narrow.smooth_borders = false;
        narrow.border_stroke_width = 1.0;
        let mut wide = narrow.clone();
        wide.border_stroke_width = 3.0;
        let thin = pipeline(&state, &narrow);
        let thick = pipeline(&state, &wide);
        assert!(thick[&0].inner.area() < thin[&0].inner.area());
        assert!(thick[&0].band.area() > thin[&0].band.area());
        assert!(
            (thin[&0].outer.area() - thick[&0].outer.area()).abs() < 1e-9,
            "outer polygon is independent of stroke width"
        );
    }

    #[test]
    fn galaxy_clipping_reattaches_ownerless_fragments() {
        // Two countries side by side; the silhouette cuts off a slice of
        // country 0's territory that contains no system.
        let mut state = base_state(&[(0, 0.0, 0.0), (1, 30.0, 0.0)]);
        state.countries.insert(
            0,
            Country { id: 0, owned_fleets: vec![0], ..Country::default() },
        );
        state.countries.insert(
            1,
            Country { id: 1, owned_fleets: vec![1], ..Country::default() },
        );
        let mut settings = MapSettings::default();
        settings.smooth_borders = false;
        let partition = build_partition(&state, &settings, false);
        let ownership = assign_ownership(&state, &settings);
        let keys = assign_cell_keys(&partition, &ownership);

        // A boundary covering system 1's half plus a sliver of system 0's
        // territory, but not system 0 itself.
        let boundary = MultiPolygon::from_polygon(crate::geom::Polygon::from_ring(vec![
            Vec2::new(5.0, -60.0),
            Vec2::new(90.0, -60.0),
            Vec2::new(90.0, 60.0),
            Vec2::new(5.0, 60.0),
        ]));
        let borders = build_borders(
            &state,
            &partition,
            &ownership,
            &keys,
            Some(&boundary),
            &settings,
        );
        assert!(
            borders[&0].outer.is_empty(),
            "country 0 lost its only system to the clip"
        );
        // The sliver between x=5 and x=15 belonged to country 0 but holds
        // no system, so it must now belong to country 1.
        assert!(borders[&1].outer.contains(Vec2::new(10.0, 0.0)));
    }
}
