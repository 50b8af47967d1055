//! The map pipeline: tessellation, ownership, regions, borders, galaxy
//! silhouette, labels, and connection paths, orchestrated into one model.

pub mod borders;
pub mod galaxy;
pub mod labels;
pub mod lanes;
pub mod ownership;
pub mod partition;
pub mod regions;

use std::collections::BTreeMap;

use crate::assets::{EmblemCache, EmblemSource, Localizer, emblem_data_uri};
use crate::config::MapSettings;
use crate::geom::{MultiPolygon, Vec2, boolean};
use crate::model::{GameState, VOID_ID};
use crate::palette::{Rgb, country_color};

pub use borders::{EntityBorders, SubBorder, SubBorderKind, build_borders};
pub use labels::{LabelPlacement, place_labels};
pub use lanes::{BypassLink, LinkPath, LinkPaths, build_link_paths};
pub use ownership::{Ownership, assign_ownership};
pub use partition::{Partition, build_partition};

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CapitalKind {
    None,
    Sector,
    Country,
}

/// Per-system render flags.
#[derive(Debug, Clone)]
pub struct SystemMarker {
    pub id: i64,
    pub position: Vec2,
    pub owner: Option<i64>,
    pub color: Rgb,
    pub colonized: bool,
    pub capital: CapitalKind,
    pub has_bypass: bool,
    pub known: bool,
}

/// Geometry-level result of the pipeline, before path-string conversion.
#[derive(Debug, Default)]
pub struct MapModel {
    pub borders: BTreeMap<i64, EntityBorders>,
    /// Display color per union-leader merge key.
    pub colors: BTreeMap<i64, Rgb>,
    pub labels: Vec<LabelPlacement>,
    /// Fetched emblem images as data URIs, keyed like `borders`.
    pub emblems: BTreeMap<i64, String>,
    pub links: LinkPaths,
    pub systems: Vec<SystemMarker>,
    pub galaxy_boundary: Option<MultiPolygon>,
    /// Merged polygon over everything the perspective country has not seen.
    pub terra_incognita: Option<MultiPolygon>,
}

pub fn compute_map(
    state: &GameState,
    settings: &MapSettings,
    localizer: &dyn Localizer,
    emblem_source: &dyn EmblemSource,
) -> MapModel {
    let galaxy_boundary = galaxy::build_galaxy_boundary(state, settings);
    let partition = build_partition(state, settings, galaxy_boundary.is_some());
    let ownership = assign_ownership(state, settings);

    let mut keys = regions::assign_cell_keys(&partition, &ownership);
    regions::claim_voids(&partition, &mut keys, &ownership, settings);

    let borders = build_borders(
        state,
        &partition,
        &ownership,
        &keys,
        galaxy_boundary.as_ref(),
        settings,
    );

    let mut colors = BTreeMap::new();
    for &key in borders.keys() {
        let leader = ownership.display_leader_of(key);
        let color = state
            .countries
            .get(&leader)
            .map(|c| country_color(&c.flag_colors))
            .unwrap_or(crate::palette::FALLBACK_COLOR);
        colors.insert(key, color);
    }

    let labels = place_labels(state, &ownership, &borders, localizer, settings);
    let emblems = fetch_emblems(state, &ownership, &labels, emblem_source);
    let links = build_link_paths(state, settings);
    let systems = system_markers(state, &ownership, &colors, settings);
    let terra_incognita =
        terra_incognita_mask(state, &partition, galaxy_boundary.as_ref(), settings);

    MapModel {
        borders,
        colors,
        labels,
        emblems,
        links,
        systems,
        galaxy_boundary,
        terra_incognita,
    }
}

/// One fetched emblem image per labeled entity whose emblem square fit,
/// keyed by merge key. The cache deduplicates entities sharing a flag file;
/// failed fetches are logged there and the entity goes without an emblem.
fn fetch_emblems(
    state: &GameState,
    ownership: &Ownership,
    labels: &[LabelPlacement],
    source: &dyn EmblemSource,
) -> BTreeMap<i64, String> {
    let mut cache = EmblemCache::new();
    let mut images = BTreeMap::new();
    for label in labels {
        if label.emblem_size.is_none() {
            continue;
        }
        let leader = ownership.display_leader_of(label.key);
        let Some((category, file)) = state
            .countries
            .get(&leader)
            .and_then(|country| country.emblem.as_ref())
        else {
            continue;
        };
        if let Some(bytes) = cache.get_or_fetch(source, category, file) {
            images.insert(label.key, emblem_data_uri(file, bytes));
        }
    }
    images
}

fn system_markers(
    state: &GameState,
    ownership: &Ownership,
    colors: &BTreeMap<i64, Rgb>,
    settings: &MapSettings,
) -> Vec<SystemMarker> {
    let known_set = settings
        .perspective_country
        .and_then(|id| state.countries.get(&id))
        .map(|c| &c.known_systems);

    state
        .systems
        .values()
        .map(|system| {
            let owner = ownership.country_of(system.id);
            let color = ownership
                .merge_key_of(system.id)
                .and_then(|key| colors.get(&key).copied())
                .unwrap_or(crate::palette::FALLBACK_COLOR);
            let capital = owner
                .and_then(|country| state.countries.get(&country))
                .and_then(|country| {
                    let planet = country.capital?;
                    system.colony_ids.contains(&planet).then_some(CapitalKind::Country)
                })
                .or_else(|| {
                    let sector = ownership.sector_of(system.id)?;
                    let planet = ownership.sectors.get(&sector)?.local_capital?;
                    system.colony_ids.contains(&planet).then_some(CapitalKind::Sector)
                })
                .unwrap_or(CapitalKind::None);
            SystemMarker {
                id: system.id,
                position: Vec2::new(system.coordinate.x, system.coordinate.y),
                owner,
                color,
                colonized: !system.colony_ids.is_empty(),
                capital,
                has_bypass: !system.bypass_ids.is_empty(),
                known: known_set.map(|set| set.contains(&system.id)).unwrap_or(true),
            }
        })
        .collect()
}

/// Everything outside the perspective country's intel: unknown systems'
/// cells plus all unowned space, clipped to the silhouette when present.
fn terra_incognita_mask(
    state: &GameState,
    partition: &Partition,
    boundary: Option<&MultiPolygon>,
    settings: &MapSettings,
) -> Option<MultiPolygon> {
    let perspective = settings.perspective_country?;
    let Some(viewer) = state.countries.get(&perspective) else {
        log::warn!("perspective country {perspective} not in save");
        return None;
    };

    let keys: Vec<Option<i64>> = (0..partition.cell_count())
        .map(|cell| {
            let owner = partition.owner_of_cell(cell);
            let known = owner != VOID_ID && viewer.known_systems.contains(&owner);
            (!known).then_some(0)
        })
        .collect();
    let mut mask = regions::merge_by_key(partition, &keys)
        .remove(&0)
        .unwrap_or_default();
    if let Some(boundary) = boundary {
        mask = boolean::intersection(&mask, boundary);
    }
    Some(mask)
}
