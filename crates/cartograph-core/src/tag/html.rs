//! Minimal HTML building for tag output.

use super::TagKind;
use crate::error::{Diagnostics, UnsupportedFeatureKind};

pub(crate) fn escape(text: &str) -> String {
    htmlize::escape_text(text).into_owned()
}

/// `<tag attrs>inner</tag>`; attribute values are escaped, `inner` is trusted HTML.
pub(crate) fn element(tag: &str, attrs: &[(&str, String)], inner: &str) -> String {
    let mut out = format!("<{tag}");
    for (name, value) in attrs {
        out.push(' ');
        out.push_str(name);
        out.push_str("=\"");
        out.push_str(&htmlize::escape_attribute(value.as_str()));
        out.push('"');
    }
    out.push('>');
    out.push_str(inner);
    out.push_str("</");
    out.push_str(tag);
    out.push('>');
    out
}

/// Inline error box listing every diagnostic of a failed tag.
pub fn error_html(tag: &str, diagnostics: &Diagnostics) -> String {
    let body = match diagnostics.len() {
        0 | 1 => escape(&diagnostics.composite_message(tag)),
        _ => {
            let items: String = diagnostics
                .iter()
                .map(|d| format!("<li>{}</li>", escape(&d.to_string())))
                .collect();
            format!("{}<ul>{items}</ul>", escape(&format!("<{tag}> problems:")))
        }
    };
    element(
        "div",
        &[("class", "mw-kartographer mw-kartographer-error".to_string())],
        &body,
    )
}

/// Distinct error box for the remote-data policy violation.
pub fn internal_error_html(tag: &str, err: &UnsupportedFeatureKind) -> String {
    element(
        "div",
        &[(
            "class",
            "mw-kartographer mw-kartographer-error mw-kartographer-internal-error".to_string(),
        )],
        &escape(&format!("<{tag}>: internal error: {err}")),
    )
}

/// A disabled tag shows up as its escaped source.
pub fn html_escaped_source(kind: TagKind, input: &str) -> String {
    escape(&format!("<{kind}>{input}</{kind}>"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Diagnostic;

    #[test]
    fn attribute_values_are_escaped() {
        assert_eq!(
            element("a", &[("title", r#"a "b" <c>"#.to_string())], "<b>x</b>"),
            r#"<a title="a &quot;b&quot; &lt;c&gt;"><b>x</b></a>"#
        );
    }

    #[test]
    fn several_diagnostics_become_a_list() {
        let mut d = Diagnostics::new();
        d.push(Diagnostic::MissingRequiredAttribute { name: "width".into() });
        d.push(Diagnostic::InvalidAttributeFormat { name: "zoom".into() });
        assert_eq!(
            error_html("mapframe", &d),
            "<div class=\"mw-kartographer mw-kartographer-error\">&lt;mapframe&gt; problems:\
             <ul><li>Attribute \"width\" is missing</li><li>Attribute \"zoom\" has an invalid value</li></ul></div>"
        );
    }

    #[test]
    fn multi_line_messages_stay_in_one_item() {
        let mut d = Diagnostics::new();
        d.push(Diagnostic::MalformedInput { message: "line 1\n* line 2".into() });
        d.push(Diagnostic::MissingRequiredAttribute { name: "height".into() });
        let html = error_html("mapframe", &d);
        assert_eq!(html.matches("<li>").count(), 2, "{html}");
        assert!(html.contains("<li>Couldn't parse JSON: line 1\n* line 2</li>"), "{html}");

        let single = error_html("maplink", &Diagnostic::MalformedInput { message: "a\nb".into() }.into());
        assert!(!single.contains("<ul>"), "{single}");
        assert!(single.contains("&lt;maplink&gt;: Couldn't parse JSON: a\nb"), "{single}");
    }
}
