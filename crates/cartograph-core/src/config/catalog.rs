use crate::geom::{WorldPoint, world_point};
use crate::{Error, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};

/// Axis-aligned world rectangle, inclusive on both ends.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorldBounds {
    pub min: WorldPoint,
    pub max: WorldPoint,
}

impl WorldBounds {
    pub fn new(min: WorldPoint, max: WorldPoint) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, p: WorldPoint) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.y >= self.min.y && p.y <= self.max.y
    }
}

/// One entry of the base map list (`basemaps.json`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BaseMap {
    #[serde(deserialize_with = "de_map_id")]
    pub map_id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub center: Option<[f64; 2]>,
    #[serde(default)]
    pub default_plane: Option<i64>,
    /// `[[min_x, min_y], [max_x, max_y]]`.
    #[serde(default)]
    pub bounds: Option<[[f64; 2]; 2]>,
}

impl BaseMap {
    pub fn world_bounds(&self) -> Option<WorldBounds> {
        self.bounds.map(|[lo, hi]| {
            WorldBounds::new(world_point(lo[0], lo[1]), world_point(hi[0], hi[1]))
        })
    }
}

fn de_map_id<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Int(i64),
        Str(String),
    }
    Ok(match Repr::deserialize(deserializer)? {
        Repr::Int(n) => n.to_string(),
        Repr::Str(s) => s,
    })
}

/// Base maps keyed by map id, in catalogue order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MapCatalog {
    maps: IndexMap<String, BaseMap>,
}

impl MapCatalog {
    pub const DEFAULT_MAP_ID: &'static str = "-1";

    pub fn new(maps: impl IntoIterator<Item = BaseMap>) -> Self {
        Self {
            maps: maps.into_iter().map(|m| (m.map_id.clone(), m)).collect(),
        }
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        let maps: Vec<BaseMap> = serde_json::from_str(text).map_err(|e| Error::InvalidCatalog {
            message: e.to_string(),
        })?;
        Ok(Self::new(maps))
    }

    pub fn is_empty(&self) -> bool {
        self.maps.is_empty()
    }

    pub fn get(&self, map_id: &str) -> Option<&BaseMap> {
        self.maps.get(map_id)
    }

    pub fn contains(&self, map_id: &str) -> bool {
        self.maps.contains_key(map_id)
    }

    pub fn name(&self, map_id: &str) -> &str {
        self.get(map_id)
            .and_then(|m| m.name.as_deref())
            .unwrap_or("unknown")
    }

    pub fn default_plane(&self, map_id: &str) -> i64 {
        self.get(map_id).and_then(|m| m.default_plane).unwrap_or(0)
    }

    pub fn center(&self, map_id: &str) -> Option<WorldPoint> {
        self.get(map_id)
            .and_then(|m| m.center)
            .map(|[x, y]| world_point(x, y))
    }

    /// Checks `p` against the selected map's bounds (when the catalogue knows maps at all) and
    /// then against the absolute world bounds.
    pub fn coordinates_are_valid(
        &self,
        p: WorldPoint,
        map_id: Option<&str>,
        world: &WorldBounds,
    ) -> bool {
        if !p.x.is_finite() || !p.y.is_finite() {
            return false;
        }
        if let Some(id) = map_id.filter(|_| !self.is_empty()) {
            let Some(map) = self.get(id) else {
                return false;
            };
            if let Some(bounds) = map.world_bounds() {
                if !bounds.contains(p) {
                    return false;
                }
            }
        }
        world.contains(p)
    }
}
