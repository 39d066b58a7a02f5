use super::html::element;
use super::{AttrReader, CommonArgs, Fallback, RenderContext, TagHandler};
use crate::coord;
use crate::geojson::FirstMarker;
use regex::Regex;
use std::sync::OnceLock;

fn class_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(|[a-zA-Z][-_a-zA-Z0-9]*)$").expect("valid regex"))
}

fn non_blank_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\S+").expect("valid regex"))
}

fn marker_color_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^#?((?:[0-9a-fA-F]{3}){1,2})$").expect("valid regex"))
}

/// Inline link that opens the full map.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MapLinkTag {
    css_class: String,
    text: Option<String>,
}

impl TagHandler for MapLinkTag {
    fn parse_attributes(&mut self, reader: &mut AttrReader<'_>) {
        self.css_class = reader
            .text("class", Fallback::Value(""), Some(class_regex()))
            .unwrap_or_default();
        self.text = reader.text("text", Fallback::Absent, Some(non_blank_regex()));
    }

    fn render(&self, common: &CommonArgs, marker: Option<&FirstMarker>, ctx: &RenderContext<'_>) -> String {
        let (lat, lon) = common.center_or_default();
        let label = match (&self.text, marker) {
            (Some(text), _) => text.clone(),
            (None, Some(marker)) => marker.symbol.clone(),
            (None, None) => coord::format_decimal(lat, lon),
        };

        let mut class = "mw-kartographer-maplink".to_string();
        if !self.css_class.is_empty() {
            class.push(' ');
            class.push_str(&self.css_class);
        }
        let mut style = None;
        if let Some(marker) = marker {
            class.push_str(" mw-kartographer-autostyled");
            style = marker.properties["marker-color"]
                .as_str()
                .and_then(|c| marker_color_regex().captures(c))
                .and_then(|caps| caps.get(1))
                .map(|hex| format!("background: #{};", hex.as_str()));
        }

        let mut attrs = vec![("class", class), ("data-mw", "interface".to_string())];
        if let Some(style) = style {
            attrs.push(("style", style));
        }
        if let Some(zoom) = common.zoom {
            attrs.push(("data-zoom", zoom.to_string()));
        }
        attrs.push(("data-lat", lat.to_string()));
        attrs.push(("data-lon", lon.to_string()));
        common.data_attrs(&mut attrs);
        attrs.extend(common.overlays_attr());

        element("a", &attrs, &ctx.render_text(&label))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MapCatalog;
    use crate::error::Diagnostics;
    use crate::tag::TagArgs;
    use crate::text::HtmlInlineRenderer;
    use crate::tiles::{TileGridCompositor, TileUrlTemplate, YAxis};
    use serde_json::json;

    fn render(args: &TagArgs, marker: Option<&FirstMarker>) -> String {
        let mut diagnostics = Diagnostics::new();
        let mut reader = AttrReader::new(args, &mut diagnostics);
        let common = CommonArgs::parse(&mut reader, true);
        let mut tag = MapLinkTag::default();
        tag.parse_attributes(&mut reader);
        assert!(diagnostics.is_empty(), "{diagnostics:?}");

        let catalog = MapCatalog::default();
        let compositor = TileGridCompositor::new(&catalog, TileUrlTemplate::new("{x}", YAxis::Same));
        let ctx = RenderContext {
            renderer: &HtmlInlineRenderer,
            compositor: &compositor,
            rtl: false,
        };
        tag.render(&common, marker, &ctx)
    }

    #[test]
    fn coordinates_are_the_fallback_text() {
        assert_eq!(
            render(&TagArgs::new(), None),
            r#"<a class="mw-kartographer-maplink" data-mw="interface" data-lat="3200" data-lon="3200">3200.00 3200.00</a>"#
        );
    }

    #[test]
    fn explicit_text_and_attributes() {
        let args = TagArgs::new()
            .with("text", "<b>Bank</b>")
            .with("class", "no-icon")
            .with("latitude", "3222.5")
            .with("longitude", "3218")
            .with("zoom", "3")
            .with("mapid", "28")
            .with("plane", "1")
            .with("show", "shops");
        assert_eq!(
            render(&args, None),
            "<a class=\"mw-kartographer-maplink no-icon\" data-mw=\"interface\" data-zoom=\"3\" \
             data-lat=\"3222.5\" data-lon=\"3218\" data-mapid=\"28\" data-plane=\"1\" \
             data-overlays=\"[&quot;shops&quot;]\"><b>Bank</b></a>"
        );
    }

    #[test]
    fn first_marker_labels_and_styles_the_link() {
        let marker = FirstMarker {
            symbol: "C".to_string(),
            properties: json!({ "marker-symbol": "c", "marker-color": "ff8800" }),
        };
        let html = render(&TagArgs::new(), Some(&marker));
        assert!(html.starts_with(
            r#"<a class="mw-kartographer-maplink mw-kartographer-autostyled" data-mw="interface" style="background: #ff8800;""#
        ));
        assert!(html.ends_with(">C</a>"));
    }
}
