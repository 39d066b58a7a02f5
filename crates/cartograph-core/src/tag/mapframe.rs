use super::html::element;
use super::{AttrReader, CommonArgs, Fallback, RenderContext, TagHandler};
use crate::geojson::FirstMarker;
use crate::geom::{pixel_size, world_point};
use crate::tiles::PositionDescriptor;
use regex::Regex;
use std::sync::OnceLock;

fn width_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\d+|([1-9]\d?|100)%|full)$").expect("valid regex"))
}

fn align_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(left|center|right)$").expect("valid regex"))
}

/// Static preview width of full-width frames.
const FULL_WIDTH_PX: u32 = 800;
/// Width used for percentages other than 100%.
const LEGACY_PERCENT_WIDTH_PX: u32 = 300;
/// Static preview zoom when the tag sets none.
const DEFAULT_FRAME_ZOOM: i32 = 1;
/// Largest pixel width or height a frame may ask for.
const MAX_FRAME_PX: i64 = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameWidth {
    Pixels(u32),
    Percent(u32),
    Full,
}

impl FrameWidth {
    fn parse(value: &str) -> Option<Self> {
        if value == "full" {
            return Some(Self::Full);
        }
        match value.strip_suffix('%') {
            Some(percent) => percent.parse().ok().map(Self::Percent),
            None => value.parse().ok().map(Self::Pixels),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    Left,
    Center,
    Right,
    /// Full-width frames.
    None,
}

impl Align {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "left" => Some(Self::Left),
            "center" => Some(Self::Center),
            "right" => Some(Self::Right),
            _ => None,
        }
    }

    fn class(self) -> &'static str {
        match self {
            Self::Left => "floatleft",
            Self::Center => "center",
            Self::Right => "floatright",
            Self::None => "",
        }
    }

    fn thumb_class(self) -> &'static str {
        match self {
            Self::Left => "tleft",
            Self::Center => "tnone center",
            Self::Right => "tright",
            Self::None => "tnone",
        }
    }
}

/// Embedded map with a static tile background.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MapFrameTag {
    width: Option<FrameWidth>,
    height: Option<i64>,
    /// `None` means the page-direction default.
    align: Option<Align>,
    caption: String,
    frameless: bool,
}

/// Resolved layout of one frame.
struct Layout {
    css_width: String,
    data_width: String,
    static_width: u32,
    full_width: bool,
    align: Align,
}

impl MapFrameTag {
    fn layout(&self, rtl: bool) -> Layout {
        let default_align = if rtl { Align::Left } else { Align::Right };
        let align = self.align.unwrap_or(default_align);
        match self.width.unwrap_or(FrameWidth::Pixels(LEGACY_PERCENT_WIDTH_PX)) {
            FrameWidth::Pixels(px) => Layout {
                css_width: format!("{px}px"),
                data_width: px.to_string(),
                static_width: px,
                full_width: false,
                align,
            },
            FrameWidth::Percent(100) => Layout {
                css_width: "100%".to_string(),
                data_width: "100%".to_string(),
                static_width: FULL_WIDTH_PX,
                full_width: true,
                align: Align::None,
            },
            FrameWidth::Percent(_) => Layout {
                css_width: format!("{LEGACY_PERCENT_WIDTH_PX}px"),
                data_width: LEGACY_PERCENT_WIDTH_PX.to_string(),
                static_width: LEGACY_PERCENT_WIDTH_PX,
                full_width: false,
                align,
            },
            FrameWidth::Full => Layout {
                css_width: "100%".to_string(),
                data_width: "full".to_string(),
                static_width: FULL_WIDTH_PX,
                full_width: true,
                align: Align::None,
            },
        }
    }
}

impl TagHandler for MapFrameTag {
    fn parse_attributes(&mut self, reader: &mut AttrReader<'_>) {
        self.width = reader
            .text("width", Fallback::Required, Some(width_regex()))
            .and_then(|w| match FrameWidth::parse(&w) {
                Some(FrameWidth::Pixels(px)) if i64::from(px) > MAX_FRAME_PX => {
                    reader.invalid("width");
                    None
                }
                Some(width) => Some(width),
                None => {
                    reader.invalid("width");
                    None
                }
            });
        self.height = reader.int("height", true).and_then(|h| {
            if (0..=MAX_FRAME_PX).contains(&h) {
                Some(h)
            } else {
                reader.invalid("height");
                None
            }
        });
        self.align = reader
            .text("align", Fallback::Absent, Some(align_regex()))
            .and_then(|a| Align::parse(&a));
        self.caption = reader.text("text", Fallback::Value(""), None).unwrap_or_default();
        self.frameless = reader.is_present("frameless");
    }

    fn render(&self, common: &CommonArgs, _marker: Option<&FirstMarker>, ctx: &RenderContext<'_>) -> String {
        let layout = self.layout(ctx.rtl);
        let height = self.height.unwrap_or_default();
        let zoom = common.zoom.unwrap_or(DEFAULT_FRAME_ZOOM);
        let (lat, lon) = common.center_or_default();

        let background = ctx.compositor.compose(&PositionDescriptor {
            map_id: Some(common.map_id.clone().unwrap_or_else(|| "-1".to_string())),
            plane: Some(common.plane.unwrap_or(0)),
            zoom: Some(zoom),
            center: Some(world_point(lon, lat)),
            viewport: pixel_size(f64::from(layout.static_width), height as f64),
        });

        let mut style = format!("width: {}; height: {height}px;", layout.css_width);
        let background_css = background.css_style();
        if !background_css.is_empty() {
            style.push(' ');
            style.push_str(&background_css);
        }

        let mut container_class = "mw-kartographer-container".to_string();
        if layout.full_width {
            container_class.push_str(" mw-kartographer-full");
        }
        let framed = !self.caption.is_empty() || !self.frameless;
        let mut class = "mw-kartographer-map".to_string();
        if !framed {
            class = format!("{class} {container_class} {}", layout.align.class())
                .trim_end()
                .to_string();
        }

        let mut attrs = vec![
            ("class", class),
            ("style", style),
            ("data-mw", "interface".to_string()),
            ("data-width", layout.data_width.clone()),
            ("data-height", height.to_string()),
            ("data-zoom", zoom.to_string()),
            ("data-lat", lat.to_string()),
            ("data-lon", lon.to_string()),
        ];
        common.data_attrs(&mut attrs);
        attrs.extend(common.overlays_attr());

        let map = element("a", &attrs, "");
        if !framed {
            return map;
        }

        let mut inner = map;
        if !self.caption.is_empty() {
            inner.push_str(&element(
                "div",
                &[("class", "thumbcaption".to_string())],
                &ctx.render_text(&self.caption),
            ));
        }
        let thumb_inner = element(
            "div",
            &[
                ("class", "thumbinner".to_string()),
                ("style", format!("width: {};", layout.css_width)),
            ],
            &inner,
        );
        element(
            "div",
            &[(
                "class",
                format!("{container_class} thumb {}", layout.align.thumb_class()),
            )],
            &thumb_inner,
        )
    }

    fn requests_live_groups(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MapCatalog;
    use crate::error::{Diagnostic, Diagnostics};
    use crate::tag::TagArgs;
    use crate::text::HtmlInlineRenderer;
    use crate::tiles::{TileGridCompositor, TileUrlTemplate, YAxis};

    fn parse(args: &TagArgs) -> (CommonArgs, MapFrameTag, Diagnostics) {
        let mut diagnostics = Diagnostics::new();
        let mut reader = AttrReader::new(args, &mut diagnostics);
        let common = CommonArgs::parse(&mut reader, true);
        let mut tag = MapFrameTag::default();
        tag.parse_attributes(&mut reader);
        (common, tag, diagnostics)
    }

    fn render(args: &TagArgs, rtl: bool) -> String {
        let (common, tag, diagnostics) = parse(args);
        assert!(diagnostics.is_empty(), "{diagnostics:?}");
        let catalog = MapCatalog::default();
        let compositor =
            TileGridCompositor::new(&catalog, TileUrlTemplate::new("t/{z}/{x}_{y}.png", YAxis::Same));
        let ctx = RenderContext {
            renderer: &HtmlInlineRenderer,
            compositor: &compositor,
            rtl,
        };
        tag.render(&common, None, &ctx)
    }

    #[test]
    fn width_and_height_are_required() {
        let (_, _, diagnostics) = parse(&TagArgs::new().with("width", "50em"));
        assert_eq!(
            diagnostics.into_iter().collect::<Vec<_>>(),
            vec![
                Diagnostic::InvalidAttributeFormat { name: "width".into() },
                Diagnostic::MissingRequiredAttribute { name: "height".into() },
            ]
        );
    }

    #[test]
    fn oversized_frames_are_invalid() {
        let (_, tag, diagnostics) = parse(&TagArgs::new().with("width", "4096").with("height", "4096"));
        assert!(diagnostics.is_empty(), "{diagnostics:?}");
        assert_eq!(tag.height, Some(4096));

        for (width, height, name) in [
            ("4097", "10", "width"),
            ("99999999999", "10", "width"),
            ("10", "2000000", "height"),
            ("10", "-1", "height"),
        ] {
            let (_, _, diagnostics) = parse(&TagArgs::new().with("width", width).with("height", height));
            assert_eq!(
                diagnostics.into_iter().collect::<Vec<_>>(),
                vec![Diagnostic::InvalidAttributeFormat { name: name.into() }],
                "{width}x{height}"
            );
        }
    }

    #[test]
    fn framed_map_uses_thumb_layout_and_default_position() {
        let html = render(&TagArgs::new().with("width", "256").with("height", "256").with("text", "Lumbridge"), false);
        assert!(html.starts_with(
            "<div class=\"mw-kartographer-container thumb tright\">\
             <div class=\"thumbinner\" style=\"width: 256px;\">\
             <a class=\"mw-kartographer-map\" style=\"width: 256px; height: 256px; background-image: url(t/1/"
        ), "{html}");
        assert!(html.contains("data-width=\"256\" data-height=\"256\" data-zoom=\"1\" data-lat=\"3200\" data-lon=\"3200\""));
        assert!(html.ends_with("<div class=\"thumbcaption\">Lumbridge</div></div></div>"));
    }

    #[test]
    fn frameless_full_width_map() {
        let html = render(
            &TagArgs::new().with("width", "full").with("height", "300").with("frameless", ""),
            false,
        );
        assert!(html.starts_with(
            "<a class=\"mw-kartographer-map mw-kartographer-container mw-kartographer-full\" style=\"width: 100%; height: 300px;"
        ), "{html}");
        assert!(html.contains("data-width=\"full\""));
    }

    #[test]
    fn legacy_percentages_become_fixed_width() {
        let (_, tag, _) = parse(&TagArgs::new().with("width", "50%").with("height", "1"));
        let layout = tag.layout(false);
        assert_eq!(layout.css_width, "300px");
        assert_eq!(layout.static_width, 300);
        assert_eq!(layout.align, Align::Right);
        assert_eq!(tag.layout(true).align, Align::Left);
    }

    #[test]
    fn caption_forces_frame_even_when_frameless() {
        let html = render(
            &TagArgs::new()
                .with("width", "100")
                .with("height", "100")
                .with("frameless", "")
                .with("align", "center")
                .with("text", "x"),
            false,
        );
        assert!(html.starts_with("<div class=\"mw-kartographer-container thumb tnone center\">"));
    }
}
