use crate::error::{Diagnostic, Diagnostics};
use indexmap::IndexMap;
use regex::Regex;
use std::sync::OnceLock;

fn int_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^-?[0-9]+$").expect("valid regex"))
}

fn float_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^-?[0-9]*\.?[0-9]+$").expect("valid regex"))
}

/// Raw tag attributes in source order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagArgs(IndexMap<String, String>);

impl TagArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for TagArgs {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// What an absent attribute means.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fallback<'a> {
    /// Absence is a [`Diagnostic::MissingRequiredAttribute`].
    Required,
    Absent,
    Value(&'a str),
}

/// Typed access to [`TagArgs`]. Problems are pushed to the shared diagnostics so every bad
/// attribute of a tag is reported at once.
#[derive(Debug)]
pub struct AttrReader<'a> {
    args: &'a TagArgs,
    diagnostics: &'a mut Diagnostics,
}

impl<'a> AttrReader<'a> {
    pub fn new(args: &'a TagArgs, diagnostics: &'a mut Diagnostics) -> Self {
        Self { args, diagnostics }
    }

    pub fn is_present(&self, name: &str) -> bool {
        self.args.contains(name)
    }

    pub fn invalid(&mut self, name: &str) {
        self.diagnostics.push(Diagnostic::InvalidAttributeFormat {
            name: name.to_string(),
        });
    }

    /// Trimmed attribute value, checked against `pattern` when given.
    pub fn text(&mut self, name: &str, fallback: Fallback<'_>, pattern: Option<&Regex>) -> Option<String> {
        let args = self.args;
        let Some(raw) = args.get(name) else {
            return match fallback {
                Fallback::Required => {
                    self.diagnostics.push(Diagnostic::MissingRequiredAttribute {
                        name: name.to_string(),
                    });
                    None
                }
                Fallback::Absent => None,
                Fallback::Value(v) => Some(v.to_string()),
            };
        };
        let value = raw.trim();
        if pattern.is_some_and(|re| !re.is_match(value)) {
            self.invalid(name);
            return None;
        }
        Some(value.to_string())
    }

    pub fn int(&mut self, name: &str, required: bool) -> Option<i64> {
        let fallback = if required { Fallback::Required } else { Fallback::Absent };
        let text = self.text(name, fallback, Some(int_regex()))?;
        match text.parse() {
            Ok(n) => Some(n),
            Err(_) => {
                self.invalid(name);
                None
            }
        }
    }

    pub fn float(&mut self, name: &str, required: bool) -> Option<f64> {
        let fallback = if required { Fallback::Required } else { Fallback::Absent };
        let text = self.text(name, fallback, Some(float_regex()))?;
        match text.parse() {
            Ok(n) => Some(n),
            Err(_) => {
                self.invalid(name);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_follow_strict_patterns() {
        let args: TagArgs = [
            ("zoom", " 3 "),
            ("plane", "1.5"),
            ("latitude", ".5"),
            ("longitude", "-3200."),
            ("huge", "99999999999999999999"),
        ]
        .into_iter()
        .collect();
        let mut diagnostics = Diagnostics::new();
        let mut reader = AttrReader::new(&args, &mut diagnostics);
        assert_eq!(reader.int("zoom", false), Some(3));
        assert_eq!(reader.int("plane", false), None);
        assert_eq!(reader.float("latitude", false), Some(0.5));
        assert_eq!(reader.float("longitude", false), None);
        assert_eq!(reader.int("huge", false), None);
        assert_eq!(reader.int("missing", false), None);
        assert_eq!(
            diagnostics.into_iter().collect::<Vec<_>>(),
            vec![
                Diagnostic::InvalidAttributeFormat { name: "plane".into() },
                Diagnostic::InvalidAttributeFormat { name: "longitude".into() },
                Diagnostic::InvalidAttributeFormat { name: "huge".into() },
            ]
        );
    }

    #[test]
    fn required_attributes_report_absence() {
        let args = TagArgs::new().with("width", "300");
        let mut diagnostics = Diagnostics::new();
        let mut reader = AttrReader::new(&args, &mut diagnostics);
        assert_eq!(reader.text("width", Fallback::Required, None).as_deref(), Some("300"));
        assert_eq!(reader.int("height", true), None);
        assert_eq!(reader.text("align", Fallback::Value("right"), None).as_deref(), Some("right"));
        assert_eq!(
            diagnostics.into_iter().collect::<Vec<_>>(),
            vec![Diagnostic::MissingRequiredAttribute { name: "height".into() }]
        );
    }
}
