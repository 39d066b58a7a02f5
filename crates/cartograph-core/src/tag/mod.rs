//! `<maplink>` and `<mapframe>` tag handlers.
//!
//! Both tags share attribute parsing ([`CommonArgs`]) and the geodata pipeline; they differ only in
//! their own attributes and in the HTML they render.

mod attrs;
mod html;
mod mapframe;
mod maplink;

pub use attrs::{AttrReader, Fallback, TagArgs};
pub use html::{error_html, html_escaped_source, internal_error_html};
pub use mapframe::{Align, FrameWidth, MapFrameTag};
pub use maplink::MapLinkTag;

use crate::geojson::FirstMarker;
use crate::text::{InlineRenderer, strip_outer_paragraph};
use crate::tiles::TileGridCompositor;
use regex::Regex;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

/// Center used when a tag gives no coordinates.
pub const DEFAULT_CENTER: (f64, f64) = (3200.0, 3200.0);

fn group_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[a-zA-Z0-9]+$").expect("valid regex"))
}

/// Whether `name` may be used as a `group` attribute.
pub fn is_valid_group_name(name: &str) -> bool {
    group_regex().is_match(name)
}

fn show_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[a-zA-Z0-9]+(\s*,\s*[a-zA-Z0-9]+)*$").expect("valid regex"))
}

fn map_id_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^-?[0-9]+$").expect("valid regex"))
}

fn map_version_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[\w.-]+$").expect("valid regex"))
}

fn plain_tiles_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(true|false)$").expect("valid regex"))
}

fn lang_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[a-zA-Z]{2,3}(-[a-zA-Z0-9]+)*$").expect("valid regex"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TagKind {
    MapLink,
    MapFrame,
}

impl TagKind {
    pub fn name(self) -> &'static str {
        match self {
            TagKind::MapLink => "maplink",
            TagKind::MapFrame => "mapframe",
        }
    }
}

impl fmt::Display for TagKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TagKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "maplink" => Ok(TagKind::MapLink),
            "mapframe" => Ok(TagKind::MapFrame),
            other => Err(format!("unknown tag: {other}")),
        }
    }
}

/// Attributes understood by every tag.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommonArgs {
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub zoom: Option<i32>,
    pub map_id: Option<String>,
    pub plane: Option<i64>,
    pub map_version: Option<String>,
    pub plain_tiles: Option<String>,
    pub lang: Option<String>,
    /// Named group this tag's data joins; `None` keeps the data in a private group.
    pub group: Option<String>,
    /// Groups shown by this tag, without duplicates.
    pub show_groups: Vec<String>,
}

impl CommonArgs {
    /// `group`/`show` are only read when `groups_enabled`.
    pub fn parse(reader: &mut AttrReader<'_>, groups_enabled: bool) -> Self {
        let mut args = Self::default();
        if groups_enabled {
            args.parse_groups(reader);
        }
        args.lat = reader.float("latitude", false);
        args.lon = reader.float("longitude", false);
        args.zoom = reader.int("zoom", false).and_then(|z| match i32::try_from(z) {
            Ok(z) => Some(z),
            Err(_) => {
                reader.invalid("zoom");
                None
            }
        });
        args.map_id = reader.text("mapid", Fallback::Absent, Some(map_id_regex()));
        args.plane = reader.int("plane", false);
        args.map_version = reader.text("mapversion", Fallback::Absent, Some(map_version_regex()));
        args.plain_tiles = reader.text("plaintiles", Fallback::Absent, Some(plain_tiles_regex()));
        args.lang = reader.text("lang", Fallback::Absent, Some(lang_regex()));
        args
    }

    fn parse_groups(&mut self, reader: &mut AttrReader<'_>) {
        self.group = reader.text("group", Fallback::Absent, Some(group_regex()));
        if let Some(show) = reader.text("show", Fallback::Absent, Some(show_regex())) {
            self.show_groups = show.split(',').map(|g| g.trim().to_string()).collect();
        }
        // The own group is always shown; a private group is added once its id is known.
        if let Some(group) = &self.group {
            self.show_groups.push(group.clone());
        }
        let mut seen = rustc_hash::FxHashSet::default();
        self.show_groups.retain(|g| seen.insert(g.clone()));
    }

    pub fn center_or_default(&self) -> (f64, f64) {
        match (self.lat, self.lon) {
            (Some(lat), Some(lon)) => (lat, lon),
            _ => DEFAULT_CENTER,
        }
    }

    /// `data-*` attributes shared by both tags, in output order.
    fn data_attrs(&self, attrs: &mut Vec<(&'static str, String)>) {
        if let Some(lang) = &self.lang {
            attrs.push(("data-lang", lang.clone()));
        }
        if let Some(map_id) = &self.map_id {
            attrs.push(("data-mapid", map_id.clone()));
        }
        if let Some(plane) = self.plane {
            attrs.push(("data-plane", plane.to_string()));
        }
        if let Some(version) = &self.map_version {
            attrs.push(("data-mapversion", version.clone()));
        }
        if let Some(plain) = &self.plain_tiles {
            attrs.push(("data-plaintiles", plain.clone()));
        }
    }

    fn overlays_attr(&self) -> Option<(&'static str, String)> {
        if self.show_groups.is_empty() {
            return None;
        }
        serde_json::to_string(&self.show_groups)
            .ok()
            .map(|json| ("data-overlays", json))
    }
}

/// What a handler needs to render.
pub struct RenderContext<'a> {
    pub renderer: &'a dyn InlineRenderer,
    pub compositor: &'a TileGridCompositor<'a>,
    /// Right-to-left page language.
    pub rtl: bool,
}

impl RenderContext<'_> {
    /// Author text as inline HTML.
    pub fn render_text(&self, text: &str) -> String {
        let rendered = self.renderer.render_inline(text);
        strip_outer_paragraph(&rendered).trim().to_string()
    }
}

pub trait TagHandler {
    /// Reads the tag's own attributes; problems go to the reader's diagnostics.
    fn parse_attributes(&mut self, reader: &mut AttrReader<'_>);

    fn render(&self, common: &CommonArgs, marker: Option<&FirstMarker>, ctx: &RenderContext<'_>) -> String;

    /// Whether the shown groups must be available live after the page loads.
    fn requests_live_groups(&self) -> bool {
        false
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Tag {
    MapLink(MapLinkTag),
    MapFrame(MapFrameTag),
}

impl Tag {
    pub fn new(kind: TagKind) -> Self {
        match kind {
            TagKind::MapLink => Tag::MapLink(MapLinkTag::default()),
            TagKind::MapFrame => Tag::MapFrame(MapFrameTag::default()),
        }
    }

    pub fn kind(&self) -> TagKind {
        match self {
            Tag::MapLink(_) => TagKind::MapLink,
            Tag::MapFrame(_) => TagKind::MapFrame,
        }
    }

    pub fn handler(&self) -> &dyn TagHandler {
        match self {
            Tag::MapLink(tag) => tag,
            Tag::MapFrame(tag) => tag,
        }
    }

    pub fn handler_mut(&mut self) -> &mut dyn TagHandler {
        match self {
            Tag::MapLink(tag) => tag,
            Tag::MapFrame(tag) => tag,
        }
    }
}
