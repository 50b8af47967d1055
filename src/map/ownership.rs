//! Ownership resolution: which country controls each system, which sector
//! it sits in, and how countries fold into union leaders for display.

use std::collections::BTreeMap;

use crate::config::{MapSettings, UnionMode};
use crate::model::{GameState, Sector};

/// Synthetic sector id for a country's undeclared ("frontier") systems.
/// Negative so it can never collide with a declared sector.
pub const fn frontier_sector_id(country: i64) -> i64 {
    -country - 1
}

pub fn is_frontier_sector(sector: i64) -> bool {
    sector < 0
}

#[derive(Debug, Default)]
pub struct Ownership {
    /// System id to controlling country.
    pub system_country: BTreeMap<i64, i64>,
    /// System id to sector id (declared or frontier pseudo-sector).
    pub system_sector: BTreeMap<i64, i64>,
    /// Declared sectors plus synthesized frontier pseudo-sectors.
    pub sectors: BTreeMap<i64, Sector>,
    /// Country id to the key its territory merges under.
    pub merge_key: BTreeMap<i64, i64>,
    /// Country id to the country whose color and name it displays.
    pub display_leader: BTreeMap<i64, i64>,
}

impl Ownership {
    pub fn country_of(&self, system: i64) -> Option<i64> {
        self.system_country.get(&system).copied()
    }

    pub fn sector_of(&self, system: i64) -> Option<i64> {
        self.system_sector.get(&system).copied()
    }

    /// Region grouping key for a system, if it is owned.
    pub fn merge_key_of(&self, system: i64) -> Option<i64> {
        let country = self.country_of(system)?;
        Some(self.merge_key.get(&country).copied().unwrap_or(country))
    }

    pub fn display_leader_of(&self, country: i64) -> i64 {
        self.display_leader.get(&country).copied().unwrap_or(country)
    }
}

pub fn assign_ownership(state: &GameState, settings: &MapSettings) -> Ownership {
    let mut ownership = Ownership::default();

    // Fleet to owning country, inverted from each country's fleet roster.
    let mut fleet_owner: BTreeMap<i64, i64> = BTreeMap::new();
    for country in state.countries.values() {
        for &fleet in &country.owned_fleets {
            fleet_owner.insert(fleet, country.id);
        }
    }

    // Controller chain: starbase -> station ship -> fleet -> country.
    for system in state.systems.values() {
        let Some(starbase_id) = system.starbase_id else {
            continue;
        };
        let Some(starbase) = state.starbases.get(&starbase_id) else {
            log::warn!("system {} references missing starbase {starbase_id}", system.id);
            continue;
        };
        let Some(ship_id) = starbase.station else {
            continue;
        };
        let Some(ship) = state.ships.get(&ship_id) else {
            log::warn!("starbase {starbase_id} references missing ship {ship_id}");
            continue;
        };
        let Some(fleet_id) = ship.fleet else {
            continue;
        };
        if let Some(&country) = fleet_owner.get(&fleet_id) {
            ownership.system_country.insert(system.id, country);
        }
    }

    // Declared sectors claim their member systems, but only when the save is
    // consistent about who owns the system.
    for sector in state.sectors.values() {
        let mut claimed = sector.clone();
        claimed.systems.clear();
        for &system in &sector.systems {
            match ownership.system_country.get(&system) {
                Some(&country) if country == sector.owner => {
                    ownership.system_sector.insert(system, sector.id);
                    claimed.systems.push(system);
                }
                Some(&country) => log::warn!(
                    "sector {} owned by {} lists system {system} controlled by {country}",
                    sector.id,
                    sector.owner
                ),
                None => log::warn!(
                    "sector {} lists uncontrolled system {system}",
                    sector.id
                ),
            }
        }
        ownership.sectors.insert(sector.id, claimed);
    }

    // Every remaining owned system lands in its country's frontier sector.
    for (&system, &country) in &ownership.system_country {
        if ownership.system_sector.contains_key(&system) {
            continue;
        }
        let id = frontier_sector_id(country);
        ownership.system_sector.insert(system, id);
        ownership
            .sectors
            .entry(id)
            .or_insert_with(|| Sector {
                id,
                owner: country,
                local_capital: None,
                systems: Vec::new(),
            })
            .systems
            .push(system);
    }

    for &country in state.countries.keys() {
        ownership
            .merge_key
            .insert(country, fold_leader(state, settings, country, true));
        ownership
            .display_leader
            .insert(country, fold_leader(state, settings, country, false));
    }

    ownership
}

/// Follow union relations up from `start`. With `join_only` set, only axes
/// in `Join` mode fold (region merging); otherwise `Separate` folds too
/// (color and label attribution).
fn fold_leader(state: &GameState, settings: &MapSettings, start: i64, join_only: bool) -> i64 {
    let folds = |mode: UnionMode| match mode {
        UnionMode::Join => true,
        UnionMode::Separate => !join_only,
        UnionMode::Off => false,
    };

    let mut current = start;
    let mut visited = std::collections::BTreeSet::new();
    loop {
        if !visited.insert(current) {
            log::warn!("union relation cycle at country {current}");
            return current;
        }
        let Some(country) = state.countries.get(&current) else {
            return current;
        };
        if let Some(overlord) = country.overlord {
            if folds(settings.union.subjects) && state.countries.contains_key(&overlord) {
                current = overlord;
                continue;
            }
        }
        if let Some(fed_id) = country.federation {
            if let Some(federation) = state.federations.get(&fed_id) {
                let mode = if federation.is_hegemony() {
                    settings.union.hegemonies
                } else {
                    settings.union.federations
                };
                if folds(mode)
                    && federation.leader != current
                    && state.countries.contains_key(&federation.leader)
                {
                    current = federation.leader;
                    continue;
                }
            }
        }
        return current;
    }
}
