//! Simple CRS projection: world coordinates map to pixels by a uniform power-of-two scale.
//!
//! There is no rotation, skew or translation; world `(0, 0)` is pixel `(0, 0)` at every zoom.

use crate::geom::{PixelPoint, PixelSize, WorldPoint, WorldSize, WorldToPixel};

/// `2^zoom`. Zoom may be negative, the scale is always positive.
pub fn scale(zoom: i32) -> f64 {
    2f64.powi(zoom)
}

pub fn transform(zoom: i32) -> WorldToPixel {
    WorldToPixel::new(scale(zoom))
}

pub fn world_to_pixel(point: WorldPoint, zoom: i32) -> PixelPoint {
    point * transform(zoom)
}

pub fn pixel_to_world(point: PixelPoint, zoom: i32) -> WorldPoint {
    point / transform(zoom)
}

pub fn world_size_to_pixels(size: WorldSize, zoom: i32) -> PixelSize {
    size * transform(zoom)
}

pub fn pixel_size_to_world(size: PixelSize, zoom: i32) -> WorldSize {
    size / transform(zoom)
}

/// Size of the whole world in pixels at `zoom`, per axis.
pub fn tile_grid_size(zoom: i32) -> (f64, f64) {
    let size = scale(zoom);
    (size, size)
}
