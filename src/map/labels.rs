//! Label placement: a pole-of-inaccessibility anchor per entity plus the
//! largest text and emblem rectangles that fit the territory.

use std::collections::BTreeMap;

use crate::assets::{Localizer, localize_name};
use crate::config::{LabelHolePolicy, MapSettings};
use crate::geom::polylabel::pole_of_inaccessibility;
use crate::geom::{Polygon, Vec2, point_in_ring};
use crate::map::borders::EntityBorders;
use crate::map::ownership::Ownership;
use crate::model::GameState;
use crate::text_metrics::text_aspect_ratio;

/// Binary-search steps of the rectangle fitting.
pub const RECT_SEARCH_ITERATIONS: usize = 12;
/// Pole-of-inaccessibility precision, in internal units.
const POLE_PRECISION: f64 = 0.5;

#[derive(Debug, Clone)]
pub struct LabelPlacement {
    /// Union-leader merge key.
    pub key: i64,
    pub name: String,
    pub anchor: Vec2,
    /// Fitted text rectangle (width, height), if large enough to read.
    pub text_size: Option<(f64, f64)>,
    pub emblem_anchor: Vec2,
    /// Fitted emblem square side, if large enough to see.
    pub emblem_size: Option<f64>,
}

pub fn place_labels(
    state: &GameState,
    ownership: &Ownership,
    borders: &BTreeMap<i64, EntityBorders>,
    localizer: &dyn Localizer,
    settings: &MapSettings,
) -> Vec<LabelPlacement> {
    let mut placements = Vec::new();
    for (&key, entity) in borders {
        let Some(polygon) = largest_polygon(entity) else {
            continue;
        };
        let leader = ownership.display_leader_of(key);
        let name = state
            .countries
            .get(&leader)
            .map(|c| localize_name(&c.name, localizer))
            .unwrap_or_default();
        if name.is_empty() && !settings.label_emblem {
            continue;
        }

        let search = search_polygon(state, ownership, polygon, settings);
        let aspect = text_aspect_ratio(&name, &settings.font_family);

        // The pole is found on an aspect-corrected copy, so wide names
        // prefer wide stretches of territory.
        let squeezed = Polygon {
            exterior: search.exterior.iter().map(|p| Vec2::new(p.x / aspect, p.y)).collect(),
            holes: search
                .holes
                .iter()
                .map(|h| h.iter().map(|p| Vec2::new(p.x / aspect, p.y)).collect())
                .collect(),
        };
        let (pole, _) = pole_of_inaccessibility(&squeezed, POLE_PRECISION / aspect.max(1.0));
        let anchor = Vec2::new(pole.x * aspect, pole.y);

        let mut text_size = None;
        let mut text_height = 0.0;
        if settings.label_text && !name.is_empty() {
            let height = fit_rect(&search, |h| centered_rect(anchor, h * aspect, h));
            if height >= settings.label_min_height {
                let height = height.min(settings.label_max_height);
                text_size = Some((height * aspect, height));
                text_height = height;
            }
        }

        // The emblem stacks above the text box, or sits on the anchor when
        // there is no text.
        let mut emblem_anchor = anchor;
        let mut emblem_size = None;
        if settings.label_emblem {
            let base_y = anchor.y + text_height * 0.5;
            let place = |s: f64| centered_rect(Vec2::new(anchor.x, base_y + s * 0.5), s, s);
            let side = fit_rect(&search, place);
            if side >= settings.emblem_min_size {
                let side = side.min(settings.emblem_max_size);
                emblem_anchor = Vec2::new(anchor.x, base_y + side * 0.5);
                emblem_size = Some(side);
            }
        }

        placements.push(LabelPlacement {
            key,
            name,
            anchor,
            text_size,
            emblem_anchor,
            emblem_size,
        });
    }
    placements
}

/// Largest polygon of the entity's territory carries the label.
fn largest_polygon(entity: &EntityBorders) -> Option<&Polygon> {
    entity
        .outer
        .polygons
        .iter()
        .filter(|p| !p.is_empty())
        .max_by(|a, b| a.area().total_cmp(&b.area()))
}

/// Apply the hole policy: which holes stay carved out of the label area.
fn search_polygon(
    state: &GameState,
    ownership: &Ownership,
    polygon: &Polygon,
    settings: &MapSettings,
) -> Polygon {
    let holes = match settings.label_hole_policy {
        LabelHolePolicy::AvoidNone => Vec::new(),
        LabelHolePolicy::AvoidAll => polygon.holes.clone(),
        LabelHolePolicy::AvoidOwned => polygon
            .holes
            .iter()
            .filter(|hole| {
                // Keep holes that hold somebody's systems (enclaves); labels
                // may run across plain void pockets.
                ownership.system_country.keys().any(|&system| {
                    state
                        .systems
                        .get(&system)
                        .map(|s| point_in_ring(Vec2::new(s.coordinate.x, s.coordinate.y), hole))
                        .unwrap_or(false)
                })
            })
            .cloned()
            .collect(),
    };
    Polygon {
        exterior: polygon.exterior.clone(),
        holes,
    }
}

/// Largest `size` such that `rect(size)` fits inside the polygon; the fit
/// test is four-corner containment plus no polygon vertex inside the
/// rectangle.
fn fit_rect(polygon: &Polygon, rect: impl Fn(f64) -> [Vec2; 4]) -> f64 {
    let Some((min, max)) = crate::geom::bounds_of(polygon.exterior.iter().copied()) else {
        return 0.0;
    };
    let mut lo = 0.0;
    let mut hi = (max.x - min.x).max(max.y - min.y);
    for _ in 0..RECT_SEARCH_ITERATIONS {
        let mid = (lo + hi) * 0.5;
        if rect_fits(polygon, &rect(mid)) {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    lo
}

fn centered_rect(center: Vec2, width: f64, height: f64) -> [Vec2; 4] {
    let hw = width * 0.5;
    let hh = height * 0.5;
    [
        Vec2::new(center.x - hw, center.y - hh),
        Vec2::new(center.x + hw, center.y - hh),
        Vec2::new(center.x + hw, center.y + hh),
        Vec2::new(center.x - hw, center.y + hh),
    ]
}

fn rect_fits(polygon: &Polygon, corners: &[Vec2; 4]) -> bool {
    if !corners.iter().all(|&c| polygon.contains(c)) {
        return false;
    }
    let (min, max) = (corners[0], corners[2]);
    let inside = |p: &Vec2| p.x > min.x && p.x < max.x && p.y > min.y && p.y < max.y;
    if polygon.exterior.iter().any(inside) {
        return false;
    }
    !polygon.holes.iter().flatten().any(inside)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::KeyLocalizer;
    use crate::geom::MultiPolygon;
    use crate::model::{Country, NameNode};

    fn square_polygon(size: f64) -> Polygon {
        Polygon::from_ring(vec![
            Vec2::new(0.0, 0.0),
            Vec2::new(size, 0.0),
            Vec2::new(size, size),
            Vec2::new(0.0, size),
        ])
    }

    fn entity(key: i64, polygon: Polygon) -> EntityBorders {
        EntityBorders {
            key,
            outer: MultiPolygon::from_polygon(polygon),
            ..Default::default()
        }
    }

    fn state_with_country(name: &str) -> (GameState, Ownership) {
        let mut state = GameState::default();
        state.countries.insert(
            0,
            Country {
                id: 0,
                name: NameNode {
                    key: name.to_string(),
                    literal: true,
                    variables: Vec::new(),
                },
                ..Country::default()
            },
        );
        (state, Ownership::default())
    }

    fn settings() -> MapSettings {
        let mut s = MapSettings::default();
        s.label_emblem = false;
        s
    }

    #[test]
    fn label_sits_at_the_center_of_a_square() {
        let (state, ownership) = state_with_country("Blorg Commonality");
        let mut borders = BTreeMap::new();
        borders.insert(0, entity(0, square_polygon(100.0)));
        let placements = place_labels(&state, &ownership, &borders, &KeyLocalizer, &settings());
        assert_eq!(placements.len(), 1);
        let label = &placements[0];
        assert_eq!(label.name, "Blorg Commonality");
        assert!((label.anchor.x - 50.0).abs() < 2.0);
        assert!((label.anchor.y - 50.0).abs() < 2.0);
        let (w, h) = label.text_size.unwrap();
        assert!(h >= 4.0 && w > h, "wide name, wide box");
        // The fitted rectangle stays inside the square.
        assert!(label.anchor.x - w * 0.5 >= -1e-9);
        assert!(label.anchor.x + w * 0.5 <= 100.0 + 1e-9);
    }

    #[test]
    fn tiny_territory_gets_no_text_box() {
        let (state, ownership) = state_with_country("Grand Imperium of the Endless Reach");
        let mut borders = BTreeMap::new();
        borders.insert(0, entity(0, square_polygon(6.0)));
        let mut s = settings();
        s.label_min_height = 4.0;
        let placements = place_labels(&state, &ownership, &borders, &KeyLocalizer, &s);
        assert_eq!(placements.len(), 1);
        assert!(placements[0].text_size.is_none(), "too small to label");
    }

    #[test]
    fn hole_policy_changes_the_anchor() {
        let (state, ownership) = state_with_country("Ring");
        let mut polygon = square_polygon(100.0);
        // Central hole, clockwise.
        polygon.holes.push(vec![
            Vec2::new(40.0, 40.0),
            Vec2::new(40.0, 60.0),
            Vec2::new(60.0, 60.0),
            Vec2::new(60.0, 40.0),
        ]);
        let mut borders = BTreeMap::new();
        borders.insert(0, entity(0, polygon));

        let mut s = settings();
        s.label_hole_policy = LabelHolePolicy::AvoidNone;
        let over = place_labels(&state, &ownership, &borders, &KeyLocalizer, &s);
        assert!((over[0].anchor.x - 50.0).abs() < 2.0, "ignores the hole");

        s.label_hole_policy = LabelHolePolicy::AvoidAll;
        let around = place_labels(&state, &ownership, &borders, &KeyLocalizer, &s);
        let a = around[0].anchor;
        assert!(
            !(a.x > 40.0 && a.x < 60.0 && a.y > 40.0 && a.y < 60.0),
            "anchor must leave the hole: {a:?}"
        );
    }

    #[test]
    fn emblem_stacks_above_text() {
        let (state, ownership) = state_with_country("Empire");
        let mut borders = BTreeMap::new();
        borders.insert(0, entity(0, square_polygon(200.0)));
        let mut s = settings();
        s.label_emblem = true;
        let placements = place_labels(&state, &ownership, &borders, &KeyLocalizer, &s);
        let label = &placements[0];
        let side = label.emblem_size.unwrap();
        assert!(side >= s.emblem_min_size && side <= s.emblem_max_size);
        assert!(
            label.emblem_anchor.y > label.anchor.y,
            "emblem sits above the text line"
        );
    }

    #[test]
    fn height_clamps_to_maximum() {
        let (state, ownership) = state_with_country("Hive");
        let mut borders = BTreeMap::new();
        borders.insert(0, entity(0, square_polygon(2000.0)));
        let placements = place_labels(&state, &ownership, &borders, &KeyLocalizer, &settings());
        let (_, h) = placements[0].text_size.unwrap();
        assert!(h <= MapSettings::default().label_max_height + 1e-9);
    }
}
