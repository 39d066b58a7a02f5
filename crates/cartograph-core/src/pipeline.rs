//! Raw tag body to sanitized feature list.

use crate::error::{Checked, Diagnostic, UnsupportedFeatureKind};
use crate::geojson::{TreeSanitizer, schema};
use crate::text::InlineRenderer;
use serde_json::Value;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineOptions {
    /// Keep pre-render display text under `_orig<name>` (for editors, never for storage).
    pub save_unparsed: bool,
}

#[derive(Clone, Copy)]
pub struct GeodataPipeline<'r> {
    renderer: &'r dyn InlineRenderer,
    options: PipelineOptions,
}

impl std::fmt::Debug for GeodataPipeline<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeodataPipeline")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl<'r> GeodataPipeline<'r> {
    pub fn new(renderer: &'r dyn InlineRenderer) -> Self {
        Self::with_options(renderer, PipelineOptions::default())
    }

    pub fn with_options(renderer: &'r dyn InlineRenderer, options: PipelineOptions) -> Self {
        Self { renderer, options }
    }

    pub fn options(&self) -> PipelineOptions {
        self.options
    }

    /// Parses, validates and sanitizes one tag body.
    ///
    /// The outer error is the remote-data policy violation; authoring problems are reported in the
    /// inner [`Checked`]. Blank input is valid and yields no features.
    pub fn process(&self, raw: &str) -> Result<Checked<Vec<Value>>, UnsupportedFeatureKind> {
        let input = raw.trim();
        if input.is_empty() {
            return Ok(Ok(Vec::new()));
        }
        if nesting_exceeds(input, MAX_NESTING) {
            tracing::debug!(limit = MAX_NESTING, "tag body nested too deeply");
            return Ok(Err(too_deep().into()));
        }
        match parse_lenient(input) {
            Ok(value) => self.process_value(value),
            Err(message) => {
                tracing::debug!(%message, "tag body is not JSON");
                Ok(Err(Diagnostic::MalformedInput { message }.into()))
            }
        }
    }

    /// Same as [`GeodataPipeline::process`] for an already parsed value.
    pub fn process_value(&self, value: Value) -> Result<Checked<Vec<Value>>, UnsupportedFeatureKind> {
        if value_depth_exceeds(&value, MAX_NESTING) {
            return Ok(Err(too_deep().into()));
        }
        let wrapped = !value.is_array();
        let tree = if wrapped { Value::Array(vec![value]) } else { value };

        if let Err(mut err) = TreeSanitizer::check_policy(&tree) {
            err.pointer = relative_pointer(&err.pointer, wrapped);
            tracing::error!(pointer = %err.pointer, service = %err.service, "remote data inclusion refused");
            return Err(err);
        }

        if let Err(err) = schema::validate(&tree) {
            let pointer = relative_pointer(&err.pointer, wrapped);
            tracing::debug!(%pointer, message = %err.message, "schema validation failed");
            return Ok(Err(Diagnostic::SchemaViolation {
                pointer,
                message: err.message,
            }
            .into()));
        }

        let sanitizer = TreeSanitizer::new(self.renderer, self.options.save_unparsed);
        let features = match sanitizer.sanitize(tree)? {
            Value::Array(features) => features,
            other => vec![other],
        };
        tracing::debug!(features = features.len(), "geodata accepted");
        Ok(Ok(features))
    }
}

/// Deepest array/object nesting accepted, the same as `serde_json`'s own recursion limit. Every
/// later stage walks the tree recursively.
pub const MAX_NESTING: usize = 128;

fn too_deep() -> Diagnostic {
    Diagnostic::MalformedInput {
        message: format!("nesting deeper than {MAX_NESTING} levels"),
    }
}

/// Bracket depth of the raw text, ignoring brackets inside strings and comments (JSON5 allows
/// both quote styles and `//`, `/* */` comments).
fn nesting_exceeds(input: &str, limit: usize) -> bool {
    let bytes = input.as_bytes();
    let mut depth = 0usize;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            quote @ (b'"' | b'\'') => {
                i += 1;
                while i < bytes.len() && bytes[i] != quote {
                    i += if bytes[i] == b'\\' { 2 } else { 1 };
                }
            }
            b'/' if bytes.get(i + 1) == Some(&b'/') => {
                while i < bytes.len() && bytes[i] != b'\n' {
                    i += 1;
                }
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                i += 2;
                while i + 1 < bytes.len() && !(bytes[i] == b'*' && bytes[i + 1] == b'/') {
                    i += 1;
                }
                i += 1;
            }
            b'[' | b'{' => {
                depth += 1;
                if depth > limit {
                    return true;
                }
            }
            b']' | b'}' => depth = depth.saturating_sub(1),
            _ => {}
        }
        i += 1;
    }
    false
}

/// Same bound for trees that did not come from text. Iterative, so it is safe on any input.
fn value_depth_exceeds(value: &Value, limit: usize) -> bool {
    let mut stack = vec![(value, 0usize)];
    while let Some((value, depth)) = stack.pop() {
        let children: Box<dyn Iterator<Item = &Value>> = match value {
            Value::Array(items) => Box::new(items.iter()),
            Value::Object(obj) => Box::new(obj.values()),
            _ => continue,
        };
        if depth + 1 > limit {
            return true;
        }
        stack.extend(children.map(|child| (child, depth + 1)));
    }
    false
}

/// Strict JSON first; JSON5 tolerates trailing commas, comments and single quotes.
fn parse_lenient(input: &str) -> Result<Value, String> {
    match serde_json::from_str::<Value>(input) {
        Ok(value) => Ok(value),
        Err(strict) => json5::from_str::<Value>(input).map_err(|_| strict.to_string()),
    }
}

/// Pointers into a wrapped bare object are reported relative to that object.
fn relative_pointer(pointer: &str, wrapped: bool) -> String {
    if !wrapped {
        return pointer.to_string();
    }
    match pointer.strip_prefix("/0") {
        Some(rest) if rest.is_empty() || rest.starts_with('/') => rest.to_string(),
        _ => pointer.to_string(),
    }
}
