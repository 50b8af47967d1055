//! User-configurable map settings, their defaults, file loading, and the
//! declarative "does this change require recomputing geometry" table the
//! host consults before re-invoking the pipeline.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// How one consolidation axis (subjects / hegemony subjects / federations)
/// folds countries into a union leader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnionMode {
    /// Countries stay fully independent on this axis.
    Off,
    /// Separate border polygons drawn in the leader's color.
    Separate,
    /// Members merge into one border region owned by the leader.
    Join,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UnionSettings {
    pub subjects: UnionMode,
    pub hegemonies: UnionMode,
    pub federations: UnionMode,
}

impl Default for UnionSettings {
    fn default() -> Self {
        Self {
            subjects: UnionMode::Off,
            hegemonies: UnionMode::Off,
            federations: UnionMode::Off,
        }
    }
}

/// Upper size bound for void polygons eligible for claiming.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoidMaxSize {
    /// Only voids fully enclosed by a single leader are claimed.
    Full,
    /// Voids with area at or below this many internal square units.
    #[serde(untagged)]
    Area(f64),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VoidClaimSettings {
    pub enabled: bool,
    pub max_size: VoidMaxSize,
    /// A leader must control at least this border-length fraction of the
    /// void to claim it.
    pub min_border_share: f64,
}

impl Default for VoidClaimSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            max_size: VoidMaxSize::Area(500.0),
            min_border_share: 0.3,
        }
    }
}

/// Which holes of a region stay carved out of the label search area.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelHolePolicy {
    /// Labels may sit across any hole.
    AvoidNone,
    /// Labels avoid every hole.
    AvoidAll,
    /// Labels avoid only holes containing owned systems (enclaves); plain
    /// void pockets may be overlapped.
    AvoidOwned,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapSettings {
    // Borders
    pub border_stroke_width: f64,
    pub smooth_borders: bool,
    pub core_frontier_split: bool,

    // Union consolidation axes
    pub union: UnionSettings,

    // Tessellation
    pub hyperlane_sensitive_borders: bool,
    pub hyperlane_sample_spacing: f64,
    pub cell_lattice_spacing: f64,

    // Galaxy silhouette
    pub circular_galaxy_borders: bool,

    // Void claiming
    pub void_claim: VoidClaimSettings,

    // Labels
    pub label_text: bool,
    pub label_emblem: bool,
    pub label_min_height: f64,
    pub label_max_height: f64,
    pub emblem_min_size: f64,
    pub emblem_max_size: f64,
    pub label_hole_policy: LabelHolePolicy,
    pub font_family: String,

    // Links
    pub metro_style_hyperlanes: bool,

    // Terra incognita
    pub perspective_country: Option<i64>,

    // Debug SVG only
    pub background_color: String,
}

impl Default for MapSettings {
    fn default() -> Self {
        Self {
            border_stroke_width: 2.0,
            smooth_borders: true,
            core_frontier_split: false,
            union: UnionSettings::default(),
            hyperlane_sensitive_borders: false,
            hyperlane_sample_spacing: 10.0,
            cell_lattice_spacing: 20.0,
            circular_galaxy_borders: false,
            void_claim: VoidClaimSettings::default(),
            label_text: true,
            label_emblem: true,
            label_min_height: 4.0,
            label_max_height: 60.0,
            emblem_min_size: 4.0,
            emblem_max_size: 40.0,
            label_hole_policy: LabelHolePolicy::AvoidAll,
            font_family: "sans-serif".to_string(),
            metro_style_hyperlanes: false,
            perspective_country: None,
            background_color: "#0a0a1a".to_string(),
        }
    }
}

/// Load settings from a JSON5 file, overlaying the defaults. `None` yields
/// the defaults unchanged.
pub fn load_settings(path: Option<&Path>) -> anyhow::Result<MapSettings> {
    let Some(path) = path else {
        return Ok(MapSettings::default());
    };
    let contents = std::fs::read_to_string(path)?;
    let settings: MapSettings = json5::from_str(&contents)?;
    Ok(settings)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecomputeRule {
    /// Changing this field invalidates derived geometry.
    Geometry,
    /// Changing this field only affects presentation of existing geometry.
    CosmeticOnly,
}

/// Declarative setting-key → recompute rule table. Consulted by the host,
/// never by the pipeline itself.
pub static RECOMPUTE_RULES: &[(&str, RecomputeRule)] = &[
    ("border_stroke_width", RecomputeRule::Geometry),
    ("smooth_borders", RecomputeRule::Geometry),
    ("core_frontier_split", RecomputeRule::Geometry),
    ("union", RecomputeRule::Geometry),
    ("hyperlane_sensitive_borders", RecomputeRule::Geometry),
    ("hyperlane_sample_spacing", RecomputeRule::Geometry),
    ("cell_lattice_spacing", RecomputeRule::Geometry),
    ("circular_galaxy_borders", RecomputeRule::Geometry),
    ("void_claim", RecomputeRule::Geometry),
    ("label_text", RecomputeRule::Geometry),
    ("label_emblem", RecomputeRule::Geometry),
    ("label_min_height", RecomputeRule::Geometry),
    ("label_max_height", RecomputeRule::Geometry),
    ("emblem_min_size", RecomputeRule::Geometry),
    ("emblem_max_size", RecomputeRule::Geometry),
    ("label_hole_policy", RecomputeRule::Geometry),
    ("font_family", RecomputeRule::Geometry),
    ("metro_style_hyperlanes", RecomputeRule::Geometry),
    ("perspective_country", RecomputeRule::Geometry),
    ("background_color", RecomputeRule::CosmeticOnly),
];

/// Top-level setting keys whose values differ between `old` and `new` and
/// whose rule says geometry must be recomputed.
pub fn geometry_affecting_changes(old: &MapSettings, new: &MapSettings) -> Vec<&'static str> {
    let old_value = serde_json::to_value(old).unwrap_or_default();
    let new_value = serde_json::to_value(new).unwrap_or_default();
    let mut changed = Vec::new();
    for &(key, rule) in RECOMPUTE_RULES {
        if rule != RecomputeRule::Geometry {
            continue;
        }
        if old_value.get(key) != new_value.get(key) {
            changed.push(key);
        }
    }
    changed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let settings = MapSettings::default();
        assert!(settings.border_stroke_width > 0.0);
        assert!(settings.label_min_height < settings.label_max_height);
        assert_eq!(settings.union.subjects, UnionMode::Off);
    }

    #[test]
    fn partial_json5_overlays_defaults() {
        let settings: MapSettings = json5::from_str(
            r#"{
                // comments are allowed in settings files
                border_stroke_width: 3.5,
                union: { subjects: "join" },
                void_claim: { enabled: true, max_size: "full" },
            }"#,
        )
        .unwrap();
        assert_eq!(settings.border_stroke_width, 3.5);
        assert_eq!(settings.union.subjects, UnionMode::Join);
        assert_eq!(settings.union.federations, UnionMode::Off);
        assert_eq!(settings.void_claim.max_size, VoidMaxSize::Full);
        // Untouched fields keep their defaults.
        assert_eq!(settings.cell_lattice_spacing, 20.0);
    }

    #[test]
    fn numeric_void_max_size_deserializes() {
        let settings: MapSettings =
            json5::from_str(r#"{ void_claim: { max_size: 120.0 } }"#).unwrap();
        assert_eq!(settings.void_claim.max_size, VoidMaxSize::Area(120.0));
    }

    #[test]
    fn cosmetic_changes_do_not_require_recompute() {
        let old = MapSettings::default();
        let mut new = old.clone();
        new.background_color = "#000000".to_string();
        assert!(geometry_affecting_changes(&old, &new).is_empty());
        new.border_stroke_width += 1.0;
        assert_eq!(
            geometry_affecting_changes(&old, &new),
            vec!["border_stroke_width"]
        );
    }
}
