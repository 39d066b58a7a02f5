//! `mapid/zoom/plane/lon/lat` location paths, as used by full-page map links.

use crate::geom::{PixelSize, world_point};
use crate::tiles::{PositionDescriptor, TileGridConfig};
use crate::{Error, Result};
use regex::Regex;
use std::fmt;
use std::sync::OnceLock;

fn path_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(-?\d+)/(-?\d+)/(-?\d+)/(-?\d+(?:\.\d+)?)/(-?\d+(?:\.\d+)?)$")
            .expect("valid regex")
    })
}

#[derive(Debug, Clone, PartialEq)]
pub struct MapLocation {
    pub map_id: i64,
    pub zoom: i32,
    pub plane: i64,
    pub lon: f64,
    pub lat: f64,
}

impl Default for MapLocation {
    fn default() -> Self {
        Self {
            map_id: -1,
            zoom: 1,
            plane: -1,
            lon: 3200.0,
            lat: 3200.0,
        }
    }
}

impl MapLocation {
    /// Parses a path and checks it against the world bounds and zoom range of `config`.
    pub fn parse(path: &str, config: &TileGridConfig) -> Result<Self> {
        let invalid = || Error::InvalidLocation {
            path: path.to_string(),
        };
        let caps = path_regex().captures(path.trim()).ok_or_else(invalid)?;
        let field = |i: usize| caps.get(i).map(|m| m.as_str()).unwrap_or_default();

        let location = Self {
            map_id: field(1).parse().map_err(|_| invalid())?,
            zoom: field(2).parse().map_err(|_| invalid())?,
            plane: field(3).parse().map_err(|_| invalid())?,
            lon: field(4).parse().map_err(|_| invalid())?,
            lat: field(5).parse().map_err(|_| invalid())?,
        };

        if !config.world_bounds.contains(world_point(location.lon, location.lat))
            || !config.zoom_in_range(location.zoom)
        {
            return Err(invalid());
        }
        Ok(location)
    }

    pub fn to_path(&self) -> String {
        self.to_string()
    }

    /// Position for a static preview of this location.
    pub fn position(&self, viewport: PixelSize) -> PositionDescriptor {
        PositionDescriptor {
            map_id: Some(self.map_id.to_string()),
            plane: Some(self.plane),
            zoom: Some(self.zoom),
            center: Some(world_point(self.lon, self.lat)),
            viewport,
        }
    }
}

impl fmt::Display for MapLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}/{}",
            self.map_id, self.zoom, self.plane, self.lon, self.lat
        )
    }
}
