//! Hyperlane and bypass connection paths, optionally routed metro-style
//! (axis-aligned with a rounded corner).

use std::collections::{BTreeMap, HashMap};

use crate::config::MapSettings;
use crate::geom::Vec2;
use crate::map::partition::undirected_lanes;
use crate::model::{BypassKind, GameState};

/// Lanes within this many degrees of horizontal or vertical render straight.
const NEAR_AXIS_ANGLE_DEG: f64 = 2.5;
/// Lanes within this many degrees of the diagonal render straight.
const NEAR_DIAGONAL_ANGLE_DEG: f64 = 2.5;
/// Rounded corner radius of metro-style elbows; lanes shorter than this on
/// either axis render straight instead.
const METRO_CORNER_RADIUS: f64 = 1.75;

/// System flag marking the L-cluster nexus all L-gates route to.
const LGATE_NEXUS_FLAG: &str = "lcluster1";
/// System flag marking the shroud tunnel hub.
const SHROUD_NEXUS_FLAG: &str = "shroud_tunnel_nexus";

#[derive(Debug, Clone)]
pub struct LinkPath {
    pub from: i64,
    pub to: i64,
    /// Two waypoints for a straight lane, three for a metro elbow.
    pub points: Vec<Vec2>,
    /// Nonzero when the middle waypoint is a rounded corner.
    pub corner_radius: f64,
    /// Both endpoints visible from the perspective country.
    pub known: bool,
}

#[derive(Debug, Clone)]
pub struct BypassLink {
    pub kind: BypassKind,
    pub from: i64,
    pub to: i64,
    pub from_pos: Vec2,
    pub to_pos: Vec2,
    pub known: bool,
}

#[derive(Debug, Clone, Default)]
pub struct LinkPaths {
    pub hyperlanes: Vec<LinkPath>,
    /// Lanes whose both endpoints host a hyper relay.
    pub relays: Vec<LinkPath>,
    pub bypasses: Vec<BypassLink>,
}

pub fn build_link_paths(state: &GameState, settings: &MapSettings) -> LinkPaths {
    let known = visibility(state, settings);
    let mut out = LinkPaths::default();

    // Systems hosting an operational hyper relay.
    let relay_hosts: BTreeMap<i64, bool> = state
        .systems
        .values()
        .map(|s| {
            let hosts = s.megastructure_ids.iter().any(|id| {
                state
                    .megastructures
                    .get(id)
                    .map(|m| m.is_hyper_relay())
                    .unwrap_or(false)
            });
            (s.id, hosts)
        })
        .collect();

    for (a, b, pa, pb) in undirected_lanes(state) {
        let points = route(pa, pb, settings);
        let corner_radius = if points.len() == 3 { METRO_CORNER_RADIUS } else { 0.0 };
        let path = LinkPath {
            from: a,
            to: b,
            points,
            corner_radius,
            known: known(a) && known(b),
        };
        if relay_hosts.get(&a).copied().unwrap_or(false)
            && relay_hosts.get(&b).copied().unwrap_or(false)
        {
            out.relays.push(path);
        } else {
            out.hyperlanes.push(path);
        }
    }

    out.bypasses = bypass_links(state, &known);
    out
}

/// Waypoints from `a` to `b`. Metro style snaps to an axis-aligned elbow
/// unless the lane is already near an axis or the diagonal, or too short
/// for the corner arc.
fn route(a: Vec2, b: Vec2, settings: &MapSettings) -> Vec<Vec2> {
    if !settings.metro_style_hyperlanes {
        return vec![a, b];
    }
    let dx = (b.x - a.x).abs();
    let dy = (b.y - a.y).abs();
    let angle = dy.atan2(dx).to_degrees();
    if angle < NEAR_AXIS_ANGLE_DEG || angle > 90.0 - NEAR_AXIS_ANGLE_DEG {
        return vec![a, b];
    }
    if (angle - 45.0).abs() < NEAR_DIAGONAL_ANGLE_DEG {
        return vec![a, b];
    }
    if dx.min(dy) <= METRO_CORNER_RADIUS {
        return vec![a, b];
    }
    // Long axis first; the elbow carries the rounded corner.
    let elbow = if dx > dy {
        Vec2::new(b.x, a.y)
    } else {
        Vec2::new(a.x, b.y)
    };
    vec![a, elbow, b]
}

fn bypass_links(state: &GameState, known: &impl Fn(i64) -> bool) -> Vec<BypassLink> {
    let mut host: HashMap<i64, i64> = HashMap::new();
    for system in state.systems.values() {
        for &bypass in &system.bypass_ids {
            host.insert(bypass, system.id);
        }
    }
    let position = |system: i64| {
        state
            .systems
            .get(&system)
            .map(|s| Vec2::new(s.coordinate.x, s.coordinate.y))
    };

    let mut links = Vec::new();
    let mut link = |kind: BypassKind, from: i64, to: i64, links: &mut Vec<BypassLink>| {
        let (Some(from_pos), Some(to_pos)) = (position(from), position(to)) else {
            return;
        };
        links.push(BypassLink {
            kind,
            from,
            to,
            from_pos,
            to_pos,
            known: known(from) && known(to),
        });
    };

    // Paired bypasses: wormholes always, gateways when the save links them.
    for bypass in state.bypasses.values() {
        if !bypass.active || !matches!(bypass.kind, BypassKind::Wormhole | BypassKind::Gateway) {
            continue;
        }
        let Some(other) = bypass.linked_to else {
            continue;
        };
        if bypass.id >= other {
            continue; // each pair once
        }
        let (Some(&from), Some(&to)) = (host.get(&bypass.id), host.get(&other)) else {
            log::warn!("bypass pair {} <-> {other} has an unhosted end", bypass.id);
            continue;
        };
        link(bypass.kind, from, to, &mut links);
    }

    // Hub-and-spoke bypasses route every host to a flagged nexus system.
    for (kind, flag) in [
        (BypassKind::LGate, LGATE_NEXUS_FLAG),
        (BypassKind::ShroudTunnel, SHROUD_NEXUS_FLAG),
    ] {
        let hosts: Vec<i64> = state
            .bypasses
            .values()
            .filter(|b| b.active && b.kind == kind)
            .filter_map(|b| host.get(&b.id).copied())
            .collect();
        if hosts.is_empty() {
            continue;
        }
        let nexus = state
            .systems
            .values()
            .find(|s| s.flags.iter().any(|f| f == flag))
            .map(|s| s.id);
        let Some(nexus) = nexus else {
            log::warn!("{kind:?} bypasses present but no system carries the {flag} flag");
            continue;
        };
        for from in hosts {
            if from != nexus {
                link(kind, from, nexus, &mut links);
            }
        }
    }
    links
}

/// System visibility from the perspective country; everything is known
/// when no perspective is set.
fn visibility<'a>(state: &'a GameState, settings: &MapSettings) -> impl Fn(i64) -> bool + 'a {
    let known = settings
        .perspective_country
        .and_then(|id| state.countries.get(&id))
        .map(|c| c.known_systems.clone());
    move |system: i64| known.as_ref().map(|set| set.contains(&system)).unwrap_or(true)
}
