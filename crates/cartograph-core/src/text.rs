//! Rendering of author-supplied display text (`title`, `label`, `description`).

use lol_html::{RewriteStrSettings, doc_comments, element, rewrite_str};
use regex::Regex;
use rustc_hash::FxHashSet;
use serde_json::{Map, Value};
use std::borrow::Cow;
use std::sync::OnceLock;

/// Feature properties whose values are shown to readers and therefore rendered.
pub const DISPLAY_PROPERTIES: [&str; 3] = ["title", "label", "description"];

/// Host-supplied inline markup renderer.
///
/// The output is treated as trusted HTML. Implementations must not emit scripts or event
/// handlers.
pub trait InlineRenderer {
    fn render_inline(&self, text: &str) -> String;
}

impl<F> InlineRenderer for F
where
    F: Fn(&str) -> String,
{
    fn render_inline(&self, text: &str) -> String {
        self(text)
    }
}

/// Escapes everything; no markup survives.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTextRenderer;

impl InlineRenderer for PlainTextRenderer {
    fn render_inline(&self, text: &str) -> String {
        htmlize::escape_text(text).into_owned()
    }
}

/// Keeps a small set of inline formatting tags and drops everything else.
///
/// Disallowed elements are unwrapped (their text stays), `script`-like elements are removed
/// together with their content, and `href` is only kept for http(s), mailto and relative links.
/// Running it on its own output is a no-op.
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlInlineRenderer;

impl InlineRenderer for HtmlInlineRenderer {
    fn render_inline(&self, text: &str) -> String {
        sanitize_inline_html(text)
    }
}

fn allowed_tags() -> &'static FxHashSet<&'static str> {
    static SET: OnceLock<FxHashSet<&'static str>> = OnceLock::new();
    SET.get_or_init(|| {
        [
            "a", "abbr", "b", "bdi", "bdo", "big", "br", "cite", "code", "data", "del", "dfn", "em",
            "i", "ins", "kbd", "mark", "p", "q", "rp", "rt", "ruby", "s", "samp", "small", "span",
            "strike", "strong", "sub", "sup", "time", "tt", "u", "var", "wbr",
        ]
        .into_iter()
        .collect()
    })
}

fn allowed_attrs() -> &'static FxHashSet<&'static str> {
    static SET: OnceLock<FxHashSet<&'static str>> = OnceLock::new();
    SET.get_or_init(|| ["title", "lang", "dir", "href"].into_iter().collect())
}

fn attr_whitespace_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"[\u{0000}-\u{0020}\u{00A0}\u{1680}\u{180E}\u{2000}-\u{2029}\u{205F}\u{3000}]")
            .expect("valid regex")
    })
}

fn is_safe_href(raw: &str) -> bool {
    let decoded = htmlize::unescape_attribute(raw);
    let compact = attr_whitespace_regex().replace_all(&decoded, "");
    match url::Url::parse(&compact) {
        Ok(url) => matches!(url.scheme(), "http" | "https" | "mailto"),
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            // `foo:bar` style strings that the url crate refuses are not links we can vouch for.
            !compact.split(['/', '?', '#']).next().unwrap_or_default().contains(':')
        }
        Err(_) => false,
    }
}

/// `lol_html` rejects fragments with a `<` that cannot start a tag; browsers treat it as text.
fn escape_stray_lt(input: &str) -> Cow<'_, str> {
    let starts_tag = |next: Option<&u8>| {
        next.is_some_and(|b| b.is_ascii_alphabetic() || matches!(b, b'/' | b'!' | b'?'))
    };
    let bytes = input.as_bytes();
    if !(0..bytes.len()).any(|i| bytes[i] == b'<' && !starts_tag(bytes.get(i + 1))) {
        return Cow::Borrowed(input);
    }

    let mut out = String::with_capacity(input.len() + 8);
    let mut last = 0;
    for i in 0..bytes.len() {
        if bytes[i] == b'<' && !starts_tag(bytes.get(i + 1)) {
            out.push_str(&input[last..i]);
            out.push_str("&lt;");
            last = i + 1;
        }
    }
    out.push_str(&input[last..]);
    Cow::Owned(out)
}

/// Removed together with their content. The raw-text and RCDATA elements belong here: their body
/// is tokenized as text, so unwrapping them would turn it into live markup.
const DROPPED_WITH_CONTENT: [&str; 15] = [
    "script", "style", "iframe", "object", "embed", "template", "noscript", "textarea", "title",
    "xmp", "noembed", "noframes", "plaintext", "svg", "math",
];

fn sanitize_inline_html(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }
    let text = escape_stray_lt(text);

    let mut handlers = Vec::new();
    for dropped in DROPPED_WITH_CONTENT {
        handlers.push(element!(dropped, |el| {
            el.remove();
            Ok(())
        }));
    }
    handlers.push(element!("*", |el| {
        if el.removed() {
            return Ok(());
        }
        let tag = el.tag_name().to_ascii_lowercase();
        if !allowed_tags().contains(tag.as_str()) {
            el.remove_and_keep_content();
            return Ok(());
        }

        let attrs: Vec<(String, String)> = el
            .attributes()
            .iter()
            .map(|a| (a.name().to_string(), a.value().to_string()))
            .collect();
        for (name, value) in attrs {
            let lc_name = name.to_ascii_lowercase();
            let keep = allowed_attrs().contains(lc_name.as_str())
                && (lc_name != "href" || (tag == "a" && is_safe_href(&value)));
            if !keep {
                el.remove_attribute(&name);
            }
        }
        Ok(())
    }));

    rewrite_str(
        text.as_ref(),
        RewriteStrSettings {
            element_content_handlers: handlers,
            document_content_handlers: vec![doc_comments!(|c| {
                c.remove();
                Ok(())
            })],
            ..RewriteStrSettings::new()
        },
    )
    .unwrap_or_else(|err| {
        tracing::warn!(%err, "inline markup could not be parsed; escaping it");
        htmlize::escape_text(text.as_ref()).into_owned()
    })
}

/// Removes a single `<p>...</p>` wrapper around the whole fragment.
pub fn strip_outer_paragraph(html: &str) -> &str {
    let trimmed = html.trim();
    let Some(inner) = trimmed
        .strip_prefix("<p>")
        .and_then(|rest| rest.strip_suffix("</p>"))
    else {
        return html;
    };
    if inner.contains("<p>") || inner.contains("<p ") || inner.contains("</p>") {
        return html;
    }
    inner
}

/// Renders the display properties of one `properties` object in place.
#[derive(Clone, Copy)]
pub struct TextSanitizer<'r> {
    renderer: &'r dyn InlineRenderer,
    save_unparsed: bool,
}

impl std::fmt::Debug for TextSanitizer<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextSanitizer")
            .field("save_unparsed", &self.save_unparsed)
            .finish_non_exhaustive()
    }
}

impl<'r> TextSanitizer<'r> {
    pub fn new(renderer: &'r dyn InlineRenderer, save_unparsed: bool) -> Self {
        Self {
            renderer,
            save_unparsed,
        }
    }

    pub fn renderer(&self) -> &'r dyn InlineRenderer {
        self.renderer
    }

    pub fn render(&self, text: &str) -> String {
        let rendered = self.renderer.render_inline(text);
        strip_outer_paragraph(&rendered).trim().to_string()
    }

    /// Strings are rendered. Language maps keep only the string entries that render to something
    /// non-empty and are dropped entirely when nothing survives. Any other value type is dropped.
    ///
    /// With `save_unparsed`, the pre-render value is kept under `_orig<name>`.
    pub fn sanitize_properties(&self, props: &mut Map<String, Value>) {
        for name in DISPLAY_PROPERTIES {
            let Some(original) = props.get(name) else {
                continue;
            };
            let rendered = match original {
                Value::String(text) => Some(Value::String(self.render(text))),
                Value::Object(variants) => {
                    let kept: Map<String, Value> = variants
                        .iter()
                        .filter_map(|(lang, value)| {
                            let rendered = self.render(value.as_str()?);
                            (!rendered.is_empty()).then(|| (lang.clone(), Value::String(rendered)))
                        })
                        .collect();
                    (!kept.is_empty()).then_some(Value::Object(kept))
                }
                _ => None,
            };

            let backup = format!("_orig{name}");
            match rendered {
                Some(value) => {
                    let original = props.insert(name.to_string(), value);
                    if self.save_unparsed {
                        if let Some(original) = original {
                            props.insert(backup, original);
                        }
                    }
                }
                None => {
                    props.shift_remove(name);
                    props.shift_remove(&backup);
                }
            }
        }
    }
}
