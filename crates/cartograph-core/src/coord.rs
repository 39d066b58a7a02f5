//! Human-readable coordinates, used as fallback link text.

/// Two fractional digits per axis, for flat (non-geographic) worlds.
pub fn format_decimal(lat: f64, lon: f64) -> String {
    format!("{lat:.2} {lon:.2}")
}
