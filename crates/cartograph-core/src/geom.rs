/// Map-world units (game squares for the base maps).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct World;

/// Screen pixels at a given zoom.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pixel;

pub type WorldPoint = euclid::Point2D<f64, World>;
pub type WorldSize = euclid::Size2D<f64, World>;
pub type PixelPoint = euclid::Point2D<f64, Pixel>;
pub type PixelSize = euclid::Size2D<f64, Pixel>;
pub type PixelVector = euclid::Vector2D<f64, Pixel>;

/// Uniform world -> pixel transform for one zoom level.
pub type WorldToPixel = euclid::Scale<f64, World, Pixel>;

pub fn world_point(x: f64, y: f64) -> WorldPoint {
    euclid::point2(x, y)
}

pub fn pixel_size(width: f64, height: f64) -> PixelSize {
    euclid::size2(width, height)
}

pub fn pixel_vector(x: f64, y: f64) -> PixelVector {
    euclid::vec2(x, y)
}
