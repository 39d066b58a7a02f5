pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid site config JSON: {message}")]
    InvalidConfigJson { message: String },

    #[error("Invalid base map catalogue: {message}")]
    InvalidCatalog { message: String },

    #[error("Invalid map location: {path}")]
    InvalidLocation { path: String },

    #[error("Persisted map data I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Persisted map data JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A per-tag authoring problem. A tag may collect several of these before it is reported.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Diagnostic {
    #[error("Couldn't parse JSON: {message}")]
    MalformedInput { message: String },

    #[error(
        "The JSON content is not valid GeoJSON+simplestyle. The first validation error is on element \"{pointer}\": {message}"
    )]
    SchemaViolation { pointer: String, message: String },

    #[error("Attribute \"{name}\" is missing")]
    MissingRequiredAttribute { name: String },

    #[error("Attribute \"{name}\" has an invalid value")]
    InvalidAttributeFormat { name: String },
}

/// Remote data inclusion (`"type": "ExternalData"`) reached the sanitizer.
///
/// Not a [`Diagnostic`]: a tag never recovers from it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unexpected service name '{service}' (remote data inclusion at \"{pointer}\")")]
pub struct UnsupportedFeatureKind {
    pub pointer: String,
    pub service: String,
}

/// Ordered diagnostics collected while handling one tag.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diagnostics(Vec<Diagnostic>);

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.0.push(diagnostic);
    }

    pub fn extend(&mut self, other: Diagnostics) {
        self.0.extend(other.0);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Diagnostic> {
        self.0.iter()
    }

    /// Builds the single message shown for a failing tag.
    ///
    /// One diagnostic is reported inline; several are joined into a bulleted list.
    pub fn composite_message(&self, tag: &str) -> String {
        match self.0.as_slice() {
            [] => format!("<{tag}>: unknown error"),
            [only] => format!("<{tag}>: {only}"),
            many => {
                let items = many
                    .iter()
                    .map(|d| format!("* {d}"))
                    .collect::<Vec<_>>()
                    .join("\n");
                format!("<{tag}> problems:\n{items}")
            }
        }
    }
}

impl From<Diagnostic> for Diagnostics {
    fn from(value: Diagnostic) -> Self {
        Self(vec![value])
    }
}

impl IntoIterator for Diagnostics {
    type Item = Diagnostic;
    type IntoIter = std::vec::IntoIter<Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Diagnostics {
    type Item = &'a Diagnostic;
    type IntoIter = std::slice::Iter<'a, Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Result of an operation that can fail with authoring diagnostics.
pub type Checked<T> = std::result::Result<T, Diagnostics>;
