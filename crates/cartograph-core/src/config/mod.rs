mod catalog;

pub use catalog::{BaseMap, MapCatalog, WorldBounds};

use crate::{Error, Result};
use serde_json::{Map, Value};

/// Site-wide settings, stored as a JSON object and read through dotted paths.
///
/// Overrides are deep-merged onto [`SiteConfig::defaults`], so callers only specify what differs.
#[derive(Debug, Clone, PartialEq)]
pub struct SiteConfig(Value);

impl Default for SiteConfig {
    fn default() -> Self {
        Self::defaults()
    }
}

impl SiteConfig {
    pub fn defaults() -> Self {
        Self(serde_json::json!({
            "mapVersion": "latest",
            "baseTileURL": "https://maps.example.org/versions/",
            "tileURLFormat": "{mapVersion}/tiles/rendered/{mapID}/{z}/{p}_{x}_{y}.png",
            "tileYAxis": "same",
            "groupsEnabled": true,
            "enableMapFrame": true,
        }))
    }

    pub fn empty_object() -> Self {
        Self(Value::Object(Map::new()))
    }

    pub fn from_value(value: Value) -> Self {
        Self(value)
    }

    /// Parses JSON overrides and applies them onto the defaults.
    pub fn from_json_str(text: &str) -> Result<Self> {
        let overrides: Value =
            serde_json::from_str(text).map_err(|e| Error::InvalidConfigJson {
                message: e.to_string(),
            })?;
        let mut config = Self::defaults();
        config.apply_overrides(&overrides)?;
        Ok(config)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    fn lookup(&self, dotted_path: &str) -> Option<&Value> {
        let mut cur = &self.0;
        for segment in dotted_path.split('.') {
            cur = cur.as_object()?.get(segment)?;
        }
        Some(cur)
    }

    pub fn get_str(&self, dotted_path: &str) -> Option<&str> {
        self.lookup(dotted_path)?.as_str()
    }

    pub fn get_bool(&self, dotted_path: &str) -> Option<bool> {
        self.lookup(dotted_path)?.as_bool()
    }

    pub fn get_i64(&self, dotted_path: &str) -> Option<i64> {
        self.lookup(dotted_path)?.as_i64()
    }

    /// Applies a JSON object of overrides key by key.
    ///
    /// A `null` value removes the setting so its getter falls back to the built-in default. Object
    /// values merge into existing objects; anything else replaces the current value.
    pub fn apply_overrides(&mut self, overrides: &Value) -> Result<()> {
        let Value::Object(overrides) = overrides else {
            return Err(Error::InvalidConfigJson {
                message: "expected a JSON object".to_string(),
            });
        };
        if !self.0.is_object() {
            self.0 = Value::Object(Map::new());
        }
        if let Value::Object(settings) = &mut self.0 {
            apply_settings(settings, overrides);
        }
        Ok(())
    }

    pub fn map_version(&self) -> &str {
        self.get_str("mapVersion").unwrap_or("latest")
    }

    /// `baseTileURL + tileURLFormat` with `{mapVersion}` already substituted.
    pub fn tile_url_template(&self) -> String {
        let base = self.get_str("baseTileURL").unwrap_or_default();
        let format = self.get_str("tileURLFormat").unwrap_or_default();
        format!("{base}{format}").replace("{mapVersion}", self.map_version())
    }

    pub fn y_axis(&self) -> crate::tiles::YAxis {
        match self.get_str("tileYAxis") {
            Some("flipped") => crate::tiles::YAxis::Flipped,
            _ => crate::tiles::YAxis::Same,
        }
    }

    /// When disabled, `group` and `show` attributes are ignored and every tag keeps a private group.
    pub fn groups_enabled(&self) -> bool {
        self.get_bool("groupsEnabled").unwrap_or(false)
    }

    pub fn mapframe_enabled(&self) -> bool {
        self.get_bool("enableMapFrame").unwrap_or(true)
    }
}

fn apply_settings(settings: &mut Map<String, Value>, overrides: &Map<String, Value>) {
    for (key, value) in overrides {
        if value.is_null() {
            settings.remove(key);
            continue;
        }
        if let (Some(Value::Object(current)), Value::Object(nested)) = (settings.get_mut(key), value) {
            apply_settings(current, nested);
            continue;
        }
        settings.insert(key.clone(), value.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn overrides_merge_onto_defaults() {
        let cfg = SiteConfig::from_json_str(r#"{ "mapVersion": "2024-01-10", "groupsEnabled": false }"#)
            .unwrap();
        assert_eq!(cfg.map_version(), "2024-01-10");
        assert!(!cfg.groups_enabled());
        assert!(cfg.mapframe_enabled());
        assert_eq!(
            cfg.tile_url_template(),
            "https://maps.example.org/versions/2024-01-10/tiles/rendered/{mapID}/{z}/{p}_{x}_{y}.png"
        );
    }

    #[test]
    fn non_object_overrides_are_rejected() {
        assert!(matches!(
            SiteConfig::from_json_str("[1, 2]"),
            Err(Error::InvalidConfigJson { .. })
        ));
        assert!(SiteConfig::from_json_str("{ nope").is_err());
    }

    #[test]
    fn null_overrides_restore_getter_defaults() {
        let cfg = SiteConfig::from_json_str(
            r#"{ "mapVersion": null, "enableMapFrame": null, "tiles": { "size": 512 } }"#,
        )
        .unwrap();
        assert!(cfg.get_str("mapVersion").is_none());
        assert_eq!(cfg.map_version(), "latest");
        assert!(cfg.mapframe_enabled());
        assert_eq!(cfg.get_i64("tiles.size"), Some(512));
    }

    #[test]
    fn nested_objects_merge_and_scalars_replace() {
        let mut cfg = SiteConfig::from_value(json!("not an object"));
        cfg.apply_overrides(&json!({ "tiles": { "size": 256, "format": "png" } })).unwrap();
        cfg.apply_overrides(&json!({ "tiles": { "size": 512 } })).unwrap();
        assert_eq!(cfg.as_value(), &json!({ "tiles": { "size": 512, "format": "png" } }));

        cfg.apply_overrides(&json!({ "tiles": 3 })).unwrap();
        assert_eq!(cfg.get_i64("tiles"), Some(3));
        assert!(cfg.apply_overrides(&json!("x")).is_err());
    }

    #[test]
    fn y_axis_policy_reads_config() {
        let mut cfg = SiteConfig::defaults();
        assert_eq!(cfg.y_axis(), crate::tiles::YAxis::Same);
        cfg.apply_overrides(&json!({ "tileYAxis": "flipped" })).unwrap();
        assert_eq!(cfg.y_axis(), crate::tiles::YAxis::Flipped);
    }
}
