//! Auto-numbered and auto-lettered marker symbols.
//!
//! A `marker-symbol` starting with `-number` or `-letter` is a placeholder. Each distinct
//! placeholder string has its own counter, shared by every tag of a document, and is replaced by
//! the next value of that counter.

use rustc_hash::FxHashMap;
use serde_json::Value;

pub const NUMBER_PREFIX: &str = "-number";
pub const LETTER_PREFIX: &str = "-letter";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceholderKind {
    Number,
    Letter,
}

impl PlaceholderKind {
    pub fn of(symbol: &str) -> Option<Self> {
        if symbol.starts_with(NUMBER_PREFIX) {
            Some(Self::Number)
        } else if symbol.starts_with(LETTER_PREFIX) {
            Some(Self::Letter)
        } else {
            None
        }
    }

    /// Highest value a counter of this kind can reach.
    pub fn cap(self) -> u32 {
        match self {
            Self::Number => 99,
            Self::Letter => 26,
        }
    }

    /// `n` is 1-based.
    pub fn symbol(self, n: u32) -> String {
        match self {
            Self::Number => n.to_string(),
            Self::Letter => char::from_u32(u32::from(b'a') + n - 1)
                .map(String::from)
                .unwrap_or_default(),
        }
    }
}

/// Per-document placeholder counters, keyed by the full placeholder string.
#[derive(Debug, Clone, Default)]
pub struct MarkerCounters(FxHashMap<String, u32>);

impl MarkerCounters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last value handed out for `placeholder`, 0 if none.
    pub fn current(&self, placeholder: &str) -> u32 {
        self.0.get(placeholder).copied().unwrap_or(0)
    }

    /// Advances the counter and returns the symbol, or `None` once the cap is reached.
    pub fn next_symbol(&mut self, placeholder: &str) -> Option<String> {
        let kind = PlaceholderKind::of(placeholder)?;
        let counter = self.0.entry(placeholder.to_string()).or_insert(0);
        if *counter >= kind.cap() {
            tracing::debug!(placeholder, cap = kind.cap(), "marker counter exhausted");
            return None;
        }
        *counter += 1;
        Some(kind.symbol(*counter))
    }
}

/// The first placeholder marker replaced in a batch.
#[derive(Debug, Clone, PartialEq)]
pub struct FirstMarker {
    /// Upper-cased symbol, e.g. `"7"` or `"C"`.
    pub symbol: String,
    /// Properties of the feature that carried it, after replacement.
    pub properties: Value,
}

/// Replaces placeholder symbols in document order, descending into feature collections and
/// geometry collections. Placeholders over the cap are left as written.
pub fn assign(values: &mut [Value], counters: &mut MarkerCounters) -> Option<FirstMarker> {
    let mut first = None;
    assign_into(values, counters, &mut first);
    first
}

fn assign_into(values: &mut [Value], counters: &mut MarkerCounters, first: &mut Option<FirstMarker>) {
    for value in values {
        let Value::Object(obj) = value else {
            continue;
        };

        if let Some(Value::Object(props)) = obj.get_mut("properties") {
            let symbol = props
                .get("marker-symbol")
                .and_then(Value::as_str)
                .and_then(|placeholder| counters.next_symbol(placeholder));
            if let Some(symbol) = symbol {
                props.insert("marker-symbol".to_string(), Value::String(symbol.clone()));
                if first.is_none() {
                    *first = Some(FirstMarker {
                        symbol: symbol.to_uppercase(),
                        properties: Value::Object(props.clone()),
                    });
                }
            }
        }

        let nested = match obj.get("type").and_then(Value::as_str) {
            Some("FeatureCollection") => "features",
            Some("GeometryCollection") => "geometries",
            _ => continue,
        };
        if let Some(Value::Array(children)) = obj.get_mut(nested) {
            assign_into(children, counters, first);
        }
    }
}
