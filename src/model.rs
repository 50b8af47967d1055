//! Typed game-state entities mapped from the parsed clause table.
//!
//! The schema layer coerces id-keyed records into id-tagged entity maps,
//! defaults missing optional fields, and fails fast on type mismatches with
//! the offending key path in the error.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::SchemaError;
use crate::parser::{self, ClauseValue, Clauses};

/// Sentinel scalar used by the save format for "no reference".
const NONE_SENTINEL: &str = "none";

/// Sentinel owner id for unclaimed void cells.
pub const VOID_ID: i64 = -1;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinate {
    pub x: f64,
    pub y: f64,
}

/// A structured localizable name: a key plus nested variable substitutions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NameNode {
    pub key: String,
    pub literal: bool,
    pub variables: Vec<(String, NameNode)>,
}

#[derive(Debug, Clone)]
pub struct Hyperlane {
    pub to: i64,
    pub length: f64,
}

#[derive(Debug, Clone)]
pub struct System {
    pub id: i64,
    pub name: NameNode,
    pub coordinate: Coordinate,
    pub hyperlanes: Vec<Hyperlane>,
    pub bypass_ids: Vec<i64>,
    pub megastructure_ids: Vec<i64>,
    pub colony_ids: Vec<i64>,
    pub starbase_id: Option<i64>,
    pub flags: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct Country {
    pub id: i64,
    pub name: NameNode,
    pub flag_colors: Vec<String>,
    pub emblem: Option<(String, String)>,
    pub capital: Option<i64>,
    pub overlord: Option<i64>,
    pub federation: Option<i64>,
    pub subjects: Vec<i64>,
    pub owned_fleets: Vec<i64>,
    /// Systems this country has intel on (terra incognita perspective).
    pub known_systems: BTreeSet<i64>,
    pub known_countries: BTreeSet<i64>,
}

#[derive(Debug, Clone)]
pub struct Sector {
    pub id: i64,
    pub owner: i64,
    pub local_capital: Option<i64>,
    pub systems: Vec<i64>,
}

#[derive(Debug, Clone)]
pub struct Federation {
    pub id: i64,
    pub leader: i64,
    pub members: Vec<i64>,
    /// Federation type token ("default_federation", "hegemony_federation", ...).
    pub kind: String,
}

impl Federation {
    pub fn is_hegemony(&self) -> bool {
        self.kind.contains("hegemony")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BypassKind {
    Wormhole,
    Gateway,
    LGate,
    ShroudTunnel,
    Relay,
    Other,
}

impl BypassKind {
    fn from_token(token: &str) -> Self {
        match token {
            "wormhole" => Self::Wormhole,
            "gateway" => Self::Gateway,
            "lgate" => Self::LGate,
            "shroud_tunnel" => Self::ShroudTunnel,
            "relay_bypass" => Self::Relay,
            _ => Self::Other,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Bypass {
    pub id: i64,
    pub kind: BypassKind,
    pub linked_to: Option<i64>,
    pub owner: Option<i64>,
    pub active: bool,
}

#[derive(Debug, Clone)]
pub struct Megastructure {
    pub id: i64,
    pub kind: String,
    pub coordinate: Option<Coordinate>,
}

impl Megastructure {
    pub fn is_hyper_relay(&self) -> bool {
        self.kind.starts_with("hyper_relay")
    }
}

#[derive(Debug, Clone)]
pub struct Starbase {
    pub id: i64,
    pub station: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct Ship {
    pub id: i64,
    pub fleet: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct Fleet {
    pub id: i64,
    pub station: bool,
}

#[derive(Debug, Clone)]
pub struct Planet {
    pub id: i64,
    pub name: NameNode,
    pub controller: Option<i64>,
}

#[derive(Debug, Clone, Default)]
pub struct GameState {
    pub systems: BTreeMap<i64, System>,
    pub countries: BTreeMap<i64, Country>,
    pub sectors: BTreeMap<i64, Sector>,
    pub federations: BTreeMap<i64, Federation>,
    pub bypasses: BTreeMap<i64, Bypass>,
    pub megastructures: BTreeMap<i64, Megastructure>,
    pub starbases: BTreeMap<i64, Starbase>,
    pub ships: BTreeMap<i64, Ship>,
    pub fleets: BTreeMap<i64, Fleet>,
    pub planets: BTreeMap<i64, Planet>,
    /// Galaxy shape token from the setup block ("elliptical", "starburst", ...).
    pub galaxy_shape: Option<String>,
}

impl GameState {
    /// Parse raw save text and map it onto the typed model.
    pub fn from_text(raw: &str) -> anyhow::Result<Self> {
        let table = parser::parse(raw)?;
        Ok(Self::from_clauses(&table)?)
    }

    pub fn from_clauses(table: &Clauses) -> Result<Self, SchemaError> {
        let mut state = GameState::default();

        if let Some(value) = table.get("galactic_object") {
            for (id, obj, path) in id_entries(value, "galactic_object")? {
                state.systems.insert(id, map_system(id, obj, &path)?);
            }
        }
        if let Some(value) = table.get("country") {
            for (id, obj, path) in id_entries(value, "country")? {
                state.countries.insert(id, map_country(id, obj, &path)?);
            }
        }
        if let Some(value) = table.get("sectors") {
            for (id, obj, path) in id_entries(value, "sectors")? {
                state.sectors.insert(
                    id,
                    Sector {
                        id,
                        owner: req_i64(obj, "owner", &path)?,
                        local_capital: opt_ref(obj, "local_capital", &path)?,
                        systems: id_list(obj, "systems", &path)?,
                    },
                );
            }
        }
        if let Some(value) = table.get("federation") {
            for (id, obj, path) in id_entries(value, "federation")? {
                state.federations.insert(
                    id,
                    Federation {
                        id,
                        leader: req_i64(obj, "leader", &path)?,
                        members: id_list(obj, "members", &path)?,
                        kind: match obj.get("federation_progress") {
                            Some(ClauseValue::Object(progress)) => {
                                opt_str(progress, "federation_type", &path)?.unwrap_or_default()
                            }
                            _ => String::new(),
                        },
                    },
                );
            }
        }
        if let Some(value) = table.get("bypasses") {
            for (id, obj, path) in id_entries(value, "bypasses")? {
                let kind = opt_str(obj, "type", &path)?.unwrap_or_default();
                state.bypasses.insert(
                    id,
                    Bypass {
                        id,
                        kind: BypassKind::from_token(&kind),
                        linked_to: opt_ref(obj, "linked_to", &path)?,
                        owner: opt_ref(obj, "owner", &path)?,
                        active: opt_bool(obj, "active", &path)?.unwrap_or(true),
                    },
                );
            }
        }
        if let Some(value) = table.get("megastructures") {
            for (id, obj, path) in id_entries(value, "megastructures")? {
                state.megastructures.insert(
                    id,
                    Megastructure {
                        id,
                        kind: opt_str(obj, "type", &path)?.unwrap_or_default(),
                        coordinate: match obj.get("coordinate") {
                            Some(c) => Some(map_coordinate(c, &join(&path, "coordinate"))?),
                            None => None,
                        },
                    },
                );
            }
        }
        if let Some(ClauseValue::Object(mgr)) = table.get("starbase_mgr") {
            if let Some(value) = mgr.get("starbases") {
                for (id, obj, path) in id_entries(value, "starbase_mgr.starbases")? {
                    state.starbases.insert(
                        id,
                        Starbase {
                            id,
                            station: opt_ref(obj, "station", &path)?,
                        },
                    );
                }
            }
        }
        if let Some(value) = table.get("ships") {
            for (id, obj, path) in id_entries(value, "ships")? {
                state.ships.insert(
                    id,
                    Ship {
                        id,
                        fleet: opt_ref(obj, "fleet", &path)?,
                    },
                );
            }
        }
        if let Some(value) = table.get("fleet") {
            for (id, obj, path) in id_entries(value, "fleet")? {
                state.fleets.insert(
                    id,
                    Fleet {
                        id,
                        station: opt_bool(obj, "station", &path)?.unwrap_or(false),
                    },
                );
            }
        }
        if let Some(ClauseValue::Object(galaxy)) = table.get("galaxy") {
            state.galaxy_shape = opt_str(galaxy, "shape", "galaxy")?;
        }
        if let Some(ClauseValue::Object(planets)) = table.get("planets") {
            if let Some(value) = planets.get("planet") {
                for (id, obj, path) in id_entries(value, "planets.planet")? {
                    state.planets.insert(
                        id,
                        Planet {
                            id,
                            name: map_name(obj.get("name"), &join(&path, "name"))?,
                            controller: opt_ref(obj, "controller", &path)?,
                        },
                    );
                }
            }
        }

        Ok(state)
    }
}

fn map_system(id: i64, obj: &Clauses, path: &str) -> Result<System, SchemaError> {
    let coordinate = match obj.get("coordinate") {
        Some(c) => map_coordinate(c, &join(path, "coordinate"))?,
        // Missing coordinate is a geometry degeneracy, not a schema failure:
        // substitute the origin and keep going.
        None => {
            log::warn!("system {id} has no coordinate, substituting origin");
            Coordinate { x: 0.0, y: 0.0 }
        }
    };
    let mut hyperlanes = Vec::new();
    if let Some(value) = obj.get("hyperlane") {
        let lane_path = join(path, "hyperlane");
        for (i, lane) in as_list(value).iter().enumerate() {
            let lane_path = format!("{lane_path}[{i}]");
            let lane = as_object(lane, &lane_path)?;
            hyperlanes.push(Hyperlane {
                to: req_i64(lane, "to", &lane_path)?,
                length: opt_f64(lane, "length", &lane_path)?.unwrap_or(0.0),
            });
        }
    }
    Ok(System {
        id,
        name: map_name(obj.get("name"), &join(path, "name"))?,
        coordinate,
        hyperlanes,
        bypass_ids: id_list(obj, "bypasses", path)?,
        megastructure_ids: id_list(obj, "megastructures", path)?,
        colony_ids: id_list(obj, "colonies", path)?,
        starbase_id: opt_ref(obj, "starbase", path)?,
        flags: flag_list(obj.get("flags")),
    })
}

fn map_country(id: i64, obj: &Clauses, path: &str) -> Result<Country, SchemaError> {
    let mut country = Country {
        id,
        name: map_name(obj.get("name"), &join(path, "name"))?,
        capital: opt_ref(obj, "capital", path)?,
        overlord: opt_ref(obj, "overlord", path)?,
        federation: opt_ref(obj, "federation", path)?,
        subjects: id_list(obj, "subjects", path)?,
        ..Country::default()
    };

    if let Some(ClauseValue::Object(flag)) = obj.get("flag") {
        if let Some(colors) = flag.get("colors") {
            for item in as_list(colors) {
                if let ClauseValue::Scalar(s) = item {
                    country.flag_colors.push(s.as_str().to_string());
                }
            }
        }
        if let Some(ClauseValue::Object(icon)) = flag.get("icon") {
            let icon_path = join(path, "flag.icon");
            let category = opt_str(icon, "category", &icon_path)?;
            let file = opt_str(icon, "file", &icon_path)?;
            if let (Some(category), Some(file)) = (category, file) {
                country.emblem = Some((category, file));
            }
        }
    }
    if let Some(ClauseValue::Object(mgr)) = obj.get("fleets_manager") {
        if let Some(owned) = mgr.get("owned_fleets") {
            let owned_path = join(path, "fleets_manager.owned_fleets");
            for (i, entry) in as_list(owned).iter().enumerate() {
                let entry_path = format!("{owned_path}[{i}]");
                let entry = as_object(entry, &entry_path)?;
                if let Some(fleet) = opt_ref(entry, "fleet", &entry_path)? {
                    country.owned_fleets.push(fleet);
                }
            }
        }
    }
    if let Some(ClauseValue::Object(intel)) = obj.get("terra_incognita") {
        let intel_path = join(path, "terra_incognita");
        country.known_systems = id_list(intel, "systems", &intel_path)?.into_iter().collect();
        country.known_countries = id_list(intel, "countries", &intel_path)?
            .into_iter()
            .collect();
    }
    Ok(country)
}

fn map_coordinate(value: &ClauseValue, path: &str) -> Result<Coordinate, SchemaError> {
    let obj = as_object(value, path)?;
    Ok(Coordinate {
        x: req_f64(obj, "x", path)?,
        y: req_f64(obj, "y", path)?,
    })
}

fn map_name(value: Option<&ClauseValue>, path: &str) -> Result<NameNode, SchemaError> {
    let Some(value) = value else {
        return Ok(NameNode::default());
    };
    // Plain quoted names occur in older saves.
    if let ClauseValue::Scalar(s) = value {
        return Ok(NameNode {
            key: s.as_str().to_string(),
            literal: s.is_quoted(),
            variables: Vec::new(),
        });
    }
    let obj = as_object(value, path)?;
    let mut node = NameNode {
        key: opt_str(obj, "key", path)?.unwrap_or_default(),
        literal: opt_bool(obj, "literal", path)?.unwrap_or(false),
        variables: Vec::new(),
    };
    if let Some(vars) = obj.get("variables") {
        let vars_path = join(path, "variables");
        for (i, entry) in as_list(vars).iter().enumerate() {
            let entry_path = format!("{vars_path}[{i}]");
            let entry = as_object(entry, &entry_path)?;
            let key = opt_str(entry, "key", &entry_path)?.unwrap_or_default();
            let value = map_name(entry.get("value"), &join(&entry_path, "value"))?;
            node.variables.push((key, value));
        }
    }
    Ok(node)
}

fn flag_list(value: Option<&ClauseValue>) -> Vec<String> {
    match value {
        // Flags are a table of `flag_name=days_set`; only the names matter.
        Some(ClauseValue::Object(obj)) => obj.iter().map(|(k, _)| k.to_string()).collect(),
        Some(ClauseValue::List(items)) => items
            .iter()
            .filter_map(|item| match item {
                ClauseValue::Scalar(s) => Some(s.as_str().to_string()),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

/// Iterate an id-keyed record table: `{ 0={...} 1={...} 5=none }`.
/// Sentinel `none` entries are skipped.
fn id_entries<'a>(
    value: &'a ClauseValue,
    path: &str,
) -> Result<Vec<(i64, &'a Clauses, String)>, SchemaError> {
    let obj = as_object(value, path)?;
    let mut out = Vec::with_capacity(obj.len());
    for (key, entry) in obj.iter() {
        let id: i64 = key.parse().map_err(|_| SchemaError::BadEntityId {
            path: path.to_string(),
            raw: key.to_string(),
        })?;
        let entry_path = format!("{path}.{key}");
        match entry {
            ClauseValue::Object(entry) => out.push((id, entry, entry_path)),
            ClauseValue::Scalar(s) if s.as_str() == NONE_SENTINEL => {}
            _ => {
                return Err(SchemaError::TypeMismatch {
                    path: entry_path,
                    expected: "object",
                });
            }
        }
    }
    Ok(out)
}

fn as_object<'a>(value: &'a ClauseValue, path: &str) -> Result<&'a Clauses, SchemaError> {
    match value {
        ClauseValue::Object(obj) => Ok(obj),
        _ => Err(SchemaError::TypeMismatch {
            path: path.to_string(),
            expected: "object",
        }),
    }
}

fn as_list(value: &ClauseValue) -> Vec<&ClauseValue> {
    match value {
        ClauseValue::List(items) => items.iter().collect(),
        other => vec![other],
    }
}

fn opt_scalar<'a>(
    obj: &'a Clauses,
    key: &str,
    path: &str,
) -> Result<Option<&'a crate::parser::Scalar>, SchemaError> {
    match obj.get(key) {
        None => Ok(None),
        Some(ClauseValue::Scalar(s)) => Ok(Some(s)),
        Some(_) => Err(SchemaError::TypeMismatch {
            path: join(path, key),
            expected: "scalar",
        }),
    }
}

fn opt_str(obj: &Clauses, key: &str, path: &str) -> Result<Option<String>, SchemaError> {
    Ok(opt_scalar(obj, key, path)?.map(|s| s.as_str().to_string()))
}

fn opt_bool(obj: &Clauses, key: &str, path: &str) -> Result<Option<bool>, SchemaError> {
    match opt_scalar(obj, key, path)? {
        None => Ok(None),
        Some(s) => s.as_bool().map(Some).ok_or(SchemaError::TypeMismatch {
            path: join(path, key),
            expected: "yes/no",
        }),
    }
}

fn opt_f64(obj: &Clauses, key: &str, path: &str) -> Result<Option<f64>, SchemaError> {
    match opt_scalar(obj, key, path)? {
        None => Ok(None),
        Some(s) => s.as_f64().map(Some).ok_or(SchemaError::TypeMismatch {
            path: join(path, key),
            expected: "number",
        }),
    }
}

fn req_f64(obj: &Clauses, key: &str, path: &str) -> Result<f64, SchemaError> {
    opt_f64(obj, key, path)?.ok_or(SchemaError::MissingField {
        path: join(path, key),
    })
}

fn req_i64(obj: &Clauses, key: &str, path: &str) -> Result<i64, SchemaError> {
    opt_ref(obj, key, path)?.ok_or(SchemaError::MissingField {
        path: join(path, key),
    })
}

/// An optional entity reference: absent or `none` maps to `None`.
fn opt_ref(obj: &Clauses, key: &str, path: &str) -> Result<Option<i64>, SchemaError> {
    match opt_scalar(obj, key, path)? {
        None => Ok(None),
        Some(s) if s.as_str() == NONE_SENTINEL => Ok(None),
        Some(s) => s.as_i64().map(Some).ok_or(SchemaError::TypeMismatch {
            path: join(path, key),
            expected: "integer id",
        }),
    }
}

fn id_list(obj: &Clauses, key: &str, path: &str) -> Result<Vec<i64>, SchemaError> {
    let Some(value) = obj.get(key) else {
        return Ok(Vec::new());
    };
    let list_path = join(path, key);
    let mut out = Vec::new();
    for item in as_list(value) {
        match item {
            ClauseValue::Scalar(s) => match s.as_i64() {
                Some(id) => out.push(id),
                None if s.as_str() == NONE_SENTINEL => {}
                None => {
                    return Err(SchemaError::TypeMismatch {
                        path: list_path,
                        expected: "integer id",
                    });
                }
            },
            _ => {
                return Err(SchemaError::TypeMismatch {
                    path: list_path,
                    expected: "integer id",
                });
            }
        }
    }
    Ok(out)
}

fn join(path: &str, key: &str) -> String {
    format!("{path}.{key}")
}
