//! GeoJSON trees as authored in tags: validation, sanitization and marker numbering.

pub mod markers;
pub mod sanitize;
pub mod schema;

pub use markers::{FirstMarker, MarkerCounters, PlaceholderKind};
pub use sanitize::TreeSanitizer;
pub use schema::{ValidationError, validate};
