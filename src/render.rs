//! Path-string output: the geometry model flattened into SVG path data,
//! plus a debug SVG preview.

use serde::Serialize;

use crate::config::MapSettings;
use crate::geom::{MultiPolygon, Vec2};
use crate::map::{CapitalKind, LinkPath, MapModel, SubBorderKind};

/// Radius of system dots in the debug SVG.
const SYSTEM_DOT_RADIUS: f64 = 1.2;

/// Output coordinates negate x; the game renders the galaxy mirrored and
/// every consumer expects that orientation.
fn out(p: Vec2) -> (f64, f64) {
    // Plain negation turns 0.0 into -0.0, which formats as "-0.00".
    let x = if p.x == 0.0 { 0.0 } else { -p.x };
    (x, p.y)
}

#[derive(Debug, Serialize)]
pub struct MapOutput {
    pub borders: Vec<BorderOutput>,
    pub systems: Vec<SystemOutput>,
    /// Plain hyperlanes, one concatenated path string.
    pub hyperlanes: String,
    /// Hyper-relay lanes, same encoding.
    pub relays: String,
    pub bypasses: Vec<BypassOutput>,
    pub labels: Vec<LabelOutput>,
    pub galaxy_border: Option<String>,
    pub terra_incognita: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct BorderOutput {
    pub key: i64,
    pub color: String,
    pub outer: String,
    pub inner: String,
    pub band: String,
    pub sub_borders: Vec<SubBorderOutput>,
}

#[derive(Debug, Serialize)]
pub struct SubBorderOutput {
    pub kind: SubBorderKind,
    pub path: String,
}

#[derive(Debug, Serialize)]
pub struct SystemOutput {
    pub id: i64,
    pub x: f64,
    pub y: f64,
    pub color: String,
    pub owned: bool,
    pub colonized: bool,
    pub capital: CapitalKind,
    pub has_bypass: bool,
    pub known: bool,
}

#[derive(Debug, Serialize)]
pub struct BypassOutput {
    pub kind: String,
    pub path: String,
    pub known: bool,
}

#[derive(Debug, Serialize)]
pub struct LabelOutput {
    pub key: i64,
    pub name: String,
    pub x: f64,
    pub y: f64,
    pub text_width: Option<f64>,
    pub text_height: Option<f64>,
    pub emblem_x: f64,
    pub emblem_y: f64,
    pub emblem_size: Option<f64>,
    /// Fetched emblem image as a data URI.
    pub emblem: Option<String>,
}

impl MapOutput {
    pub fn from_model(model: &MapModel) -> Self {
        let borders = model
            .borders
            .values()
            .map(|entity| BorderOutput {
                key: entity.key,
                color: model
                    .colors
                    .get(&entity.key)
                    .copied()
                    .unwrap_or(crate::palette::FALLBACK_COLOR)
                    .to_hex(),
                outer: multipolygon_path(&entity.outer),
                inner: multipolygon_path(&entity.inner),
                band: multipolygon_path(&entity.band),
                sub_borders: entity
                    .sub_borders
                    .iter()
                    .map(|sub| SubBorderOutput {
                        kind: sub.kind,
                        path: polyline_path(&sub.points, sub.closed),
                    })
                    .collect(),
            })
            .collect();

        let systems = model
            .systems
            .iter()
            .map(|marker| {
                let (x, y) = out(marker.position);
                SystemOutput {
                    id: marker.id,
                    x,
                    y,
                    color: marker.color.to_hex(),
                    owned: marker.owner.is_some(),
                    colonized: marker.colonized,
                    capital: marker.capital,
                    has_bypass: marker.has_bypass,
                    known: marker.known,
                }
            })
            .collect();

        let mut hyperlanes = String::new();
        for lane in &model.links.hyperlanes {
            hyperlanes.push_str(&link_path(lane));
        }
        let mut relays = String::new();
        for lane in &model.links.relays {
            relays.push_str(&link_path(lane));
        }
        let bypasses = model
            .links
            .bypasses
            .iter()
            .map(|link| {
                let (x1, y1) = out(link.from_pos);
                let (x2, y2) = out(link.to_pos);
                BypassOutput {
                    kind: format!("{:?}", link.kind).to_lowercase(),
                    path: format!("M {x1:.2} {y1:.2} L {x2:.2} {y2:.2}"),
                    known: link.known,
                }
            })
            .collect();

        let labels = model
            .labels
            .iter()
            .map(|label| {
                let (x, y) = out(label.anchor);
                let (ex, ey) = out(label.emblem_anchor);
                LabelOutput {
                    key: label.key,
                    name: label.name.clone(),
                    x,
                    y,
                    text_width: label.text_size.map(|(w, _)| w),
                    text_height: label.text_size.map(|(_, h)| h),
                    emblem_x: ex,
                    emblem_y: ey,
                    emblem_size: label.emblem_size,
                    emblem: model.emblems.get(&label.key).cloned(),
                }
            })
            .collect();

        MapOutput {
            borders,
            systems,
            hyperlanes,
            relays,
            bypasses,
            labels,
            galaxy_border: model.galaxy_boundary.as_ref().map(multipolygon_path),
            terra_incognita: model.terra_incognita.as_ref().map(multipolygon_path),
        }
    }
}

/// Rings as closed subpaths (M/L/Z); holes rely on even-odd filling.
pub fn multipolygon_path(shape: &MultiPolygon) -> String {
    let mut d = String::new();
    for poly in &shape.polygons {
        if poly.is_empty() {
            continue;
        }
        ring_path(&mut d, &poly.exterior);
        for hole in &poly.holes {
            ring_path(&mut d, hole);
        }
    }
    d
}

fn ring_path(d: &mut String, ring: &[Vec2]) {
    for (i, &p) in ring.iter().enumerate() {
        let (x, y) = out(p);
        if i == 0 {
            d.push_str(&format!("M {x:.2} {y:.2}"));
        } else {
            d.push_str(&format!(" L {x:.2} {y:.2}"));
        }
    }
    d.push_str(" Z");
}

fn polyline_path(points: &[Vec2], closed: bool) -> String {
    let mut d = String::new();
    for (i, &p) in points.iter().enumerate() {
        let (x, y) = out(p);
        if i == 0 {
            d.push_str(&format!("M {x:.2} {y:.2}"));
        } else {
            d.push_str(&format!(" L {x:.2} {y:.2}"));
        }
    }
    if closed {
        d.push_str(" Z");
    }
    d
}

/// A lane as one subpath; metro elbows replace the corner waypoint with a
/// circular arc of the configured radius.
fn link_path(lane: &LinkPath) -> String {
    match lane.points.as_slice() {
        [a, b] => {
            let (x1, y1) = out(*a);
            let (x2, y2) = out(*b);
            format!("M {x1:.2} {y1:.2} L {x2:.2} {y2:.2}")
        }
        [a, elbow, b] if lane.corner_radius > 0.0 => {
            let r = lane.corner_radius;
            let d1 = (*elbow - *a).normalized();
            let d2 = (*b - *elbow).normalized();
            let arc_from = *elbow - d1 * r;
            let arc_to = *elbow + d2 * r;
            let (x1, y1) = out(*a);
            let (fx, fy) = out(arc_from);
            let (tx, ty) = out(arc_to);
            let (x2, y2) = out(*b);
            // Turn direction in output coordinates picks the sweep flag.
            let cross = (-d1.x) * d2.y - d1.y * (-d2.x);
            let sweep = if cross > 0.0 { 1 } else { 0 };
            format!(
                "M {x1:.2} {y1:.2} L {fx:.2} {fy:.2} A {r:.2} {r:.2} 0 0 {sweep} {tx:.2} {ty:.2} L {x2:.2} {y2:.2}"
            )
        }
        points => {
            let mut d = String::new();
            for (i, &p) in points.iter().enumerate() {
                let (x, y) = out(p);
                if i == 0 {
                    d.push_str(&format!("M {x:.2} {y:.2}"));
                } else {
                    d.push_str(&format!(" L {x:.2} {y:.2}"));
                }
            }
            d
        }
    }
}

/// Debug preview. The real consumer styles the path data itself; this is a
/// quick way to eyeball a save.
pub fn render_svg(output: &MapOutput, settings: &MapSettings) -> String {
    let mut min_x = f64::INFINITY;
    let mut min_y = f64::INFINITY;
    let mut max_x = f64::NEG_INFINITY;
    let mut max_y = f64::NEG_INFINITY;
    for system in &output.systems {
        min_x = min_x.min(system.x);
        min_y = min_y.min(system.y);
        max_x = max_x.max(system.x);
        max_y = max_y.max(system.y);
    }
    if !min_x.is_finite() {
        (min_x, min_y, max_x, max_y) = (-100.0, -100.0, 100.0, 100.0);
    }
    let pad = 40.0;
    let (x0, y0) = (min_x - pad, min_y - pad);
    let width = max_x - min_x + 2.0 * pad;
    let height = max_y - min_y + 2.0 * pad;

    let mut svg = String::new();
    svg.push_str(&format!(
        "<svg xmlns=\"http://www.w3.org/2000/svg\" viewBox=\"{x0:.2} {y0:.2} {width:.2} {height:.2}\">",
    ));
    svg.push_str(&format!(
        "<rect x=\"{x0:.2}\" y=\"{y0:.2}\" width=\"100%\" height=\"100%\" fill=\"{}\"/>",
        settings.background_color
    ));

    if let Some(border) = &output.galaxy_border {
        svg.push_str(&format!(
            "<path d=\"{border}\" fill=\"none\" stroke=\"#444466\" stroke-width=\"1\"/>"
        ));
    }
    for entity in &output.borders {
        svg.push_str(&format!(
            "<path d=\"{}\" fill=\"{}\" fill-opacity=\"0.25\" fill-rule=\"evenodd\"/>",
            entity.inner, entity.color
        ));
        svg.push_str(&format!(
            "<path d=\"{}\" fill=\"{}\" fill-rule=\"evenodd\"/>",
            entity.band, entity.color
        ));
        for sub in &entity.sub_borders {
            let dash = match sub.kind {
                SubBorderKind::Frontier => " stroke-dasharray=\"2 2\"",
                _ => "",
            };
            svg.push_str(&format!(
                "<path d=\"{}\" fill=\"none\" stroke=\"{}\" stroke-width=\"0.5\"{dash}/>",
                sub.path, entity.color
            ));
        }
    }
    if !output.hyperlanes.is_empty() {
        svg.push_str(&format!(
            "<path d=\"{}\" fill=\"none\" stroke=\"#8888aa\" stroke-width=\"0.4\"/>",
            output.hyperlanes
        ));
    }
    if !output.relays.is_empty() {
        svg.push_str(&format!(
            "<path d=\"{}\" fill=\"none\" stroke=\"#aaaacc\" stroke-width=\"0.7\"/>",
            output.relays
        ));
    }
    for bypass in &output.bypasses {
        svg.push_str(&format!(
            "<path d=\"{}\" fill=\"none\" stroke=\"#66cccc\" stroke-width=\"0.5\" stroke-dasharray=\"1 1\"/>",
            bypass.path
        ));
    }
    for system in &output.systems {
        let r = if system.capital == CapitalKind::Country {
            SYSTEM_DOT_RADIUS * 2.0
        } else {
            SYSTEM_DOT_RADIUS
        };
        svg.push_str(&format!(
            "<circle cx=\"{:.2}\" cy=\"{:.2}\" r=\"{r:.2}\" fill=\"{}\"/>",
            system.x, system.y, system.color
        ));
    }
    if let Some(mask) = &output.terra_incognita {
        svg.push_str(&format!(
            "<path d=\"{mask}\" fill=\"#000000\" fill-opacity=\"0.55\" fill-rule=\"evenodd\"/>"
        ));
    }
    for label in &output.labels {
        if let (Some(size), Some(uri)) = (label.emblem_size, &label.emblem) {
            svg.push_str(&format!(
                "<image x=\"{:.2}\" y=\"{:.2}\" width=\"{size:.2}\" height=\"{size:.2}\" href=\"{uri}\"/>",
                label.emblem_x - size * 0.5,
                label.emblem_y - size * 0.5,
            ));
        }
        let Some(height) = label.text_height else {
            continue;
        };
        svg.push_str(&format!(
            "<text x=\"{:.2}\" y=\"{:.2}\" font-family=\"{}\" font-size=\"{height:.2}\" text-anchor=\"middle\" dominant-baseline=\"middle\" fill=\"#ffffff\">{}</text>",
            label.x,
            label.y,
            settings.font_family,
            escape_xml(&label.name)
        ));
    }
    svg.push_str("</svg>");
    svg
}

fn escape_xml(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::Polygon;
    use crate::map::LinkPath;

    #[test]
    fn paths_negate_x() {
        let shape = MultiPolygon::from_polygon(Polygon::from_ring(vec![
            Vec2::new(10.0, 0.0),
            Vec2::new(20.0, 0.0),
            Vec2::new(20.0, 5.0),
        ]));
        let d = multipolygon_path(&shape);
        assert_eq!(d, "M -10.00 0.00 L -20.00 0.00 L -20.00 5.00 Z");
    }

    #[test]
    fn metro_path_emits_an_arc() {
        let lane = LinkPath {
            from: 0,
            to: 1,
            points: vec![
                Vec2::new(0.0, 0.0),
                Vec2::new(30.0, 0.0),
                Vec2::new(30.0, 2.0),
            ],
            corner_radius: 1.75,
            known: true,
        };
        let d = link_path(&lane);
        assert!(d.contains(" A 1.75 1.75 0 0 "), "arc command expected: {d}");
        assert!(d.starts_with("M 0.00 0.00 L -28.25 0.00 A"));
    }

    #[test]
    fn svg_preview_is_well_formed_enough() {
        let output = MapOutput {
            borders: Vec::new(),
            systems: Vec::new(),
            hyperlanes: String::new(),
            relays: String::new(),
            bypasses: Vec::new(),
            labels: Vec::new(),
            galaxy_border: None,
            terra_incognita: None,
        };
        let svg = render_svg(&output, &MapSettings::default());
        assert!(svg.starts_with("<svg"));
        assert!(svg.ends_with("</svg>"));
    }
}
