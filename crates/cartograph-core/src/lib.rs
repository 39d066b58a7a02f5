#![forbid(unsafe_code)]

//! Map annotations for authored documents (headless).
//!
//! Tag bodies hold GeoJSON with simplestyle properties. They are parsed, validated, sanitized,
//! auto-numbered and merged into named groups per document; groups are read back by name with
//! pagination. Separately, static map previews are composed from a grid of tiles.
//!
//! The usual entry point is [`DocumentContext`]: feed it every tag of a document in order, then
//! call [`DocumentContext::finish`].

pub mod config;
pub mod coord;
pub mod document;
pub mod error;
pub mod geojson;
pub mod geom;
pub mod groups;
pub mod location;
pub mod persist;
pub mod pipeline;
pub mod projection;
pub mod retrieval;
pub mod tag;
pub mod text;
pub mod tiles;

pub use config::{MapCatalog, SiteConfig};
pub use document::{DocumentContext, DocumentOutput};
pub use error::{Checked, Diagnostic, Diagnostics, Error, Result, UnsupportedFeatureKind};
pub use groups::{GroupAggregator, GroupId};
pub use persist::PersistedGroups;
pub use pipeline::{GeodataPipeline, PipelineOptions};
pub use tag::{TagArgs, TagKind};
pub use text::{HtmlInlineRenderer, InlineRenderer, PlainTextRenderer};
pub use tiles::{PositionDescriptor, TileGrid, TileGridCompositor, TileUrlTemplate};
