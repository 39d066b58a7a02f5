//! Static map backgrounds: the grid of tiles covering a viewport, with per-tile pixel offsets.

use crate::config::{MapCatalog, SiteConfig, WorldBounds};
use crate::geom::{PixelSize, PixelVector, WorldPoint, pixel_size, pixel_vector, world_point};
use crate::projection;
use serde::Serialize;

/// How `{-y}` is derived from the tile row index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum YAxis {
    /// `{-y}` equals `{y}`.
    #[default]
    Same,
    /// `{-y}` is `-y - 1`, for tile servers that count rows the other way.
    Flipped,
}

impl YAxis {
    fn apply(self, y: i64) -> i64 {
        match self {
            YAxis::Same => y,
            YAxis::Flipped => -y - 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TileGridConfig {
    pub tile_size: u32,
    pub min_zoom: i32,
    pub max_zoom: i32,
    /// Used when the requested zoom is missing or outside `min_zoom..=max_zoom`.
    pub default_zoom: i32,
    pub world_bounds: WorldBounds,
    pub default_center: WorldPoint,
    /// Viewport sides are clamped to this many pixels, which bounds the number of tiles.
    pub max_viewport_px: f64,
}

impl Default for TileGridConfig {
    fn default() -> Self {
        Self {
            tile_size: 256,
            min_zoom: -3,
            max_zoom: 5,
            default_zoom: 2,
            world_bounds: WorldBounds::new(world_point(0.0, 0.0), world_point(12800.0, 12800.0)),
            default_center: world_point(3200.0, 3200.0),
            max_viewport_px: 4096.0,
        }
    }
}

impl TileGridConfig {
    pub fn zoom_in_range(&self, zoom: i32) -> bool {
        (self.min_zoom..=self.max_zoom).contains(&zoom)
    }
}

/// Tile URL template with `{mapID} {z} {p} {x} {y} {-y}` placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileUrlTemplate {
    template: String,
    y_axis: YAxis,
}

impl TileUrlTemplate {
    pub fn new(template: impl Into<String>, y_axis: YAxis) -> Self {
        Self {
            template: template.into(),
            y_axis,
        }
    }

    pub fn from_config(config: &SiteConfig) -> Self {
        Self::new(config.tile_url_template(), config.y_axis())
    }

    pub fn url(&self, map_id: &str, zoom: i32, plane: i64, x: i64, y: i64) -> String {
        self.template
            .replace("{mapID}", map_id)
            .replace("{z}", &zoom.to_string())
            .replace("{p}", &plane.to_string())
            .replace("{x}", &x.to_string())
            .replace("{-y}", &self.y_axis.apply(y).to_string())
            .replace("{y}", &y.to_string())
    }
}

/// Requested map position. Every positional field may be absent; see [`TileGridCompositor::resolve`].
#[derive(Debug, Clone, PartialEq)]
pub struct PositionDescriptor {
    pub map_id: Option<String>,
    pub plane: Option<i64>,
    pub zoom: Option<i32>,
    pub center: Option<WorldPoint>,
    /// Viewport size in pixels.
    pub viewport: PixelSize,
}

impl PositionDescriptor {
    pub fn new(viewport: PixelSize) -> Self {
        Self {
            map_id: None,
            plane: None,
            zoom: None,
            center: None,
            viewport,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedPosition {
    pub map_id: String,
    pub plane: i64,
    pub zoom: i32,
    pub center: [f64; 2],
    pub viewport: [f64; 2],
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TileDescriptor {
    pub url: String,
    /// Tile column index.
    pub x: i64,
    /// Tile row index.
    pub y: i64,
    /// Offset of the tile's top-left corner from the viewport's top-left corner, in pixels.
    pub offset_x: f64,
    pub offset_y: f64,
}

impl TileDescriptor {
    pub fn offset(&self) -> PixelVector {
        pixel_vector(self.offset_x, self.offset_y)
    }
}

/// Tiles in row-major order, starting with the top-most, left-most tile.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TileGrid {
    pub position: ResolvedPosition,
    pub tile_size: u32,
    pub tiles: Vec<TileDescriptor>,
}

impl TileGrid {
    /// CSS background properties that draw the grid behind an element.
    pub fn css_properties(&self) -> Vec<(&'static str, String)> {
        let images = self
            .tiles
            .iter()
            .map(|t| format!("url({})", t.url))
            .collect::<Vec<_>>()
            .join(", ");
        let positions = self
            .tiles
            .iter()
            .map(|t| format!("{}px {}px", t.offset_x, t.offset_y))
            .collect::<Vec<_>>()
            .join(", ");
        vec![
            ("background-image", images),
            ("background-position", positions),
            ("background-repeat", "no-repeat".to_string()),
        ]
    }

    /// `css_properties` as an inline style string; empty properties are skipped.
    pub fn css_style(&self) -> String {
        self.css_properties()
            .into_iter()
            .filter(|(_, v)| !v.is_empty())
            .map(|(k, v)| format!("{k}: {v};"))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[derive(Debug, Clone)]
pub struct TileGridCompositor<'a> {
    catalog: &'a MapCatalog,
    template: TileUrlTemplate,
    config: TileGridConfig,
}

impl<'a> TileGridCompositor<'a> {
    pub fn new(catalog: &'a MapCatalog, template: TileUrlTemplate) -> Self {
        Self {
            catalog,
            template,
            config: TileGridConfig::default(),
        }
    }

    pub fn with_config(mut self, config: TileGridConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &TileGridConfig {
        &self.config
    }

    /// Applies the fallback rules:
    /// - unknown map ids use the default map (`-1`);
    /// - a missing, non-finite or out-of-bounds center uses the map's center, else the default center;
    /// - a missing or negative plane uses the map's default plane;
    /// - a missing or out-of-range zoom uses `default_zoom` (not the nearest bound).
    pub fn resolve(&self, position: &PositionDescriptor) -> ResolvedPosition {
        let map_id = position
            .map_id
            .as_deref()
            .filter(|id| self.catalog.contains(id))
            .unwrap_or(MapCatalog::DEFAULT_MAP_ID)
            .to_string();

        let center = position
            .center
            .filter(|c| {
                self.catalog
                    .coordinates_are_valid(*c, Some(&map_id), &self.config.world_bounds)
            })
            .or_else(|| self.catalog.center(&map_id))
            .unwrap_or(self.config.default_center);

        let plane = match position.plane {
            Some(p) if p >= 0 => p,
            _ => self.catalog.default_plane(&map_id),
        };

        let zoom = position
            .zoom
            .filter(|z| self.config.zoom_in_range(*z))
            .unwrap_or(self.config.default_zoom);

        let viewport = position.viewport;
        let max = self.config.max_viewport_px;
        let clamp = |v: f64| if v.is_finite() { v.clamp(0.0, max) } else { 0.0 };

        ResolvedPosition {
            map_id,
            plane,
            zoom,
            center: [center.x, center.y],
            viewport: [clamp(viewport.width), clamp(viewport.height)],
        }
    }

    pub fn compose(&self, position: &PositionDescriptor) -> TileGrid {
        let resolved = self.resolve(position);
        let zoom = resolved.zoom;
        let tile_px = f64::from(self.config.tile_size);

        let view = projection::pixel_size_to_world(
            pixel_size(resolved.viewport[0], resolved.viewport[1]),
            zoom,
        );
        let [cx, cy] = resolved.center;
        let low = world_point(cx - view.width / 2.0, cy - view.height / 2.0);
        let high = world_point(cx + view.width / 2.0, cy + view.height / 2.0);

        let tile = projection::pixel_size_to_world(pixel_size(tile_px, tile_px), zoom);
        let tile_low = ((low.x / tile.width).floor(), (low.y / tile.height).floor());
        let tile_high = ((high.x / tile.width).floor(), (high.y / tile.height).floor());

        // Columns start at the low corner. Rows start at the top, i.e. the high world y, and the
        // top row begins one tile above the remainder.
        let remainder = world_point(
            low.x - tile_low.0 * tile.width,
            high.y - tile_high.1 * tile.height,
        );
        let remainder_px = projection::world_to_pixel(remainder, zoom);
        let initial = pixel_vector(-remainder_px.x, remainder_px.y - tile_px);

        let (x_low, x_high) = (tile_low.0 as i64, tile_high.0 as i64);
        let (y_low, y_high) = (tile_low.1 as i64, tile_high.1 as i64);

        let mut tiles = Vec::new();
        for (row, y) in (y_low..=y_high).rev().enumerate() {
            let offset_y = initial.y + row as f64 * tile_px;
            for (col, x) in (x_low..=x_high).enumerate() {
                let offset_x = initial.x + col as f64 * tile_px;
                tiles.push(TileDescriptor {
                    url: self
                        .template
                        .url(&resolved.map_id, zoom, resolved.plane, x, y),
                    x,
                    y,
                    offset_x,
                    offset_y,
                });
            }
        }

        tracing::debug!(
            map_id = %resolved.map_id,
            zoom,
            plane = resolved.plane,
            tiles = tiles.len(),
            "composed static tile grid"
        );

        TileGrid {
            position: resolved,
            tile_size: self.config.tile_size,
            tiles,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEMPLATE: &str = "https://t.example/{mapID}/{z}/{p}_{x}_{y}.png";

    fn catalog() -> MapCatalog {
        MapCatalog::from_json_str(
            r#"[
                { "mapId": -1, "center": [3200, 3200], "defaultPlane": 0,
                  "bounds": [[0, 0], [12800, 12800]] },
                { "mapId": 28, "center": [3232, 3232], "defaultPlane": 2,
                  "bounds": [[1024, 1216], [4224, 4416]] }
            ]"#,
        )
        .unwrap()
    }

    fn position(center: (f64, f64), zoom: i32, viewport: (f64, f64)) -> PositionDescriptor {
        PositionDescriptor {
            map_id: Some("-1".to_string()),
            plane: Some(0),
            zoom: Some(zoom),
            center: Some(world_point(center.0, center.1)),
            viewport: pixel_size(viewport.0, viewport.1),
        }
    }

    #[test]
    fn grid_tiles_the_viewport_without_gaps_or_overlaps() {
        let catalog = catalog();
        let compositor = TileGridCompositor::new(&catalog, TileUrlTemplate::new(TEMPLATE, YAxis::Same));
        let grid = compositor.compose(&position((6400.0, 6400.0), 2, (256.0, 256.0)));

        let coords: Vec<_> = grid
            .tiles
            .iter()
            .map(|t| (t.x, t.y, t.offset_x, t.offset_y))
            .collect();
        assert_eq!(
            coords,
            vec![
                (99, 100, -128.0, -128.0),
                (100, 100, 128.0, -128.0),
                (99, 99, -128.0, 128.0),
                (100, 99, 128.0, 128.0),
            ]
        );

        // Tile world size at zoom 2 is 64; the indices are floor(corner / 64).
        assert_eq!((6400.0f64 - 32.0) / 64.0, 99.5);
        assert_eq!(grid.tiles[0].url, "https://t.example/-1/2/0_99_100.png");

        // Every viewport pixel is covered by exactly one tile.
        for px in [0.0, 127.0, 128.0, 255.0] {
            for py in [0.0, 127.0, 128.0, 255.0] {
                let covering = grid
                    .tiles
                    .iter()
                    .filter(|t| {
                        px >= t.offset_x
                            && px < t.offset_x + 256.0
                            && py >= t.offset_y
                            && py < t.offset_y + 256.0
                    })
                    .count();
                assert_eq!(covering, 1, "pixel ({px}, {py})");
            }
        }
    }

    #[test]
    fn vertical_offset_starts_one_tile_above_the_remainder() {
        let catalog = catalog();
        let compositor = TileGridCompositor::new(&catalog, TileUrlTemplate::new(TEMPLATE, YAxis::Same));
        // Corners: low = (3168, 3184), high = (3232, 3216); tile size 64.
        let grid = compositor.compose(&position((3200.0, 3200.0), 2, (256.0, 128.0)));
        let first = &grid.tiles[0];
        assert_eq!((first.x, first.y), (49, 50));
        // x remainder 3168 - 49*64 = 32 world = 128px; y remainder 3216 - 50*64 = 16 world = 64px.
        assert_eq!((first.offset_x, first.offset_y), (-128.0, 64.0 - 256.0));
        let rows: Vec<i64> = grid.tiles.iter().map(|t| t.y).collect();
        assert_eq!(rows, vec![50, 50, 49, 49]);
    }

    #[test]
    fn out_of_range_zoom_uses_the_default_not_the_nearest_bound() {
        let catalog = catalog();
        let compositor = TileGridCompositor::new(&catalog, TileUrlTemplate::new(TEMPLATE, YAxis::Same));
        assert_eq!(compositor.resolve(&position((3200.0, 3200.0), 99, (256.0, 256.0))).zoom, 2);
        assert_eq!(compositor.resolve(&position((3200.0, 3200.0), -4, (256.0, 256.0))).zoom, 2);
        assert_eq!(compositor.resolve(&position((3200.0, 3200.0), 5, (256.0, 256.0))).zoom, 5);
        let mut p = position((3200.0, 3200.0), 0, (256.0, 256.0));
        p.zoom = None;
        assert_eq!(compositor.resolve(&p).zoom, 2);
    }

    #[test]
    fn invalid_center_and_plane_fall_back_to_map_defaults() {
        let catalog = catalog();
        let compositor = TileGridCompositor::new(&catalog, TileUrlTemplate::new(TEMPLATE, YAxis::Same));

        let mut p = position((f64::NAN, 1.0), 1, (256.0, 256.0));
        p.map_id = Some("28".to_string());
        p.plane = Some(-1);
        let r = compositor.resolve(&p);
        assert_eq!(r.center, [3232.0, 3232.0]);
        assert_eq!(r.plane, 2);

        // Outside map 28's bounds but inside the world.
        p.center = Some(world_point(500.0, 500.0));
        p.plane = None;
        let r = compositor.resolve(&p);
        assert_eq!(r.center, [3232.0, 3232.0]);
        assert_eq!(r.plane, 2);

        p.map_id = Some("404".to_string());
        p.center = None;
        let r = compositor.resolve(&p);
        assert_eq!(r.map_id, "-1");
        assert_eq!(r.center, [3200.0, 3200.0]);
        assert_eq!(r.plane, 0);
    }

    #[test]
    fn empty_catalog_uses_configured_default_center() {
        let catalog = MapCatalog::default();
        let compositor = TileGridCompositor::new(&catalog, TileUrlTemplate::new(TEMPLATE, YAxis::Same));
        let mut p = PositionDescriptor::new(pixel_size(256.0, 256.0));
        p.center = Some(world_point(-5.0, 10.0));
        let r = compositor.resolve(&p);
        assert_eq!(r.center, [3200.0, 3200.0]);
        assert_eq!(r.map_id, "-1");
        assert_eq!(r.zoom, 2);
    }

    #[test]
    fn url_template_substitutes_every_placeholder() {
        let t = TileUrlTemplate::new("{mapID}/{z}/{p}/{x}/{y}/{-y}", YAxis::Same);
        assert_eq!(t.url("28", -2, 1, 5, 7), "28/-2/1/5/7/7");
        let t = TileUrlTemplate::new("{mapID}/{z}/{p}/{x}/{y}/{-y}", YAxis::Flipped);
        assert_eq!(t.url("28", -2, 1, 5, 7), "28/-2/1/5/7/-8");
    }

    #[test]
    fn css_style_lists_images_and_positions_in_tile_order() {
        let catalog = catalog();
        let compositor = TileGridCompositor::new(&catalog, TileUrlTemplate::new("{x}_{y}", YAxis::Same));
        let grid = compositor.compose(&position((6400.0, 6400.0), 2, (256.0, 256.0)));
        assert_eq!(
            grid.css_style(),
            "background-image: url(99_100), url(100_100), url(99_99), url(100_99); \
             background-position: -128px -128px, 128px -128px, -128px 128px, 128px 128px; \
             background-repeat: no-repeat;"
        );
    }

    #[test]
    fn zero_viewport_still_yields_the_center_tile() {
        let catalog = catalog();
        let compositor = TileGridCompositor::new(&catalog, TileUrlTemplate::new(TEMPLATE, YAxis::Same));
        let grid = compositor.compose(&position((3200.0, 3200.0), 0, (0.0, 0.0)));
        assert_eq!(grid.tiles.len(), 1);
        assert_eq!((grid.tiles[0].x, grid.tiles[0].y), (12, 12));
    }

    #[test]
    fn huge_viewports_are_clamped() {
        let catalog = catalog();
        let compositor = TileGridCompositor::new(&catalog, TileUrlTemplate::new(TEMPLATE, YAxis::Same));

        let resolved = compositor.resolve(&position((3200.0, 3200.0), 2, (800.0, 2e6)));
        assert_eq!(resolved.viewport, [800.0, 4096.0]);

        let grid = compositor.compose(&position((3200.0, 3200.0), 2, (f64::MAX, 1e12)));
        assert_eq!(grid.position.viewport, [4096.0, 4096.0]);
        assert!(grid.tiles.len() <= 17 * 17, "{} tiles", grid.tiles.len());

        let grid = compositor.compose(&position((3200.0, 3200.0), 2, (f64::INFINITY, -5.0)));
        assert_eq!(grid.position.viewport, [0.0, 0.0]);
        assert_eq!(grid.tiles.len(), 1);
    }
}
