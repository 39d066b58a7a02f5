use crate::error::UnsupportedFeatureKind;
use crate::text::{InlineRenderer, TextSanitizer};
use serde_json::Value;

/// Cleans a validated tree: refuses remote data, strips `_`-prefixed members and renders display
/// properties.
#[derive(Debug, Clone, Copy)]
pub struct TreeSanitizer<'r> {
    text: TextSanitizer<'r>,
}

impl<'r> TreeSanitizer<'r> {
    pub fn new(renderer: &'r dyn InlineRenderer, save_unparsed: bool) -> Self {
        Self {
            text: TextSanitizer::new(renderer, save_unparsed),
        }
    }

    /// Finds the first `ExternalData` object anywhere in the tree.
    pub fn check_policy(tree: &Value) -> Result<(), UnsupportedFeatureKind> {
        find_external_data(tree, &mut String::new())
    }

    /// The tree is checked in full before anything is modified, so a rejected tree is never
    /// partially sanitized.
    pub fn sanitize(&self, mut tree: Value) -> Result<Value, UnsupportedFeatureKind> {
        Self::check_policy(&tree)?;
        self.sanitize_in_place(&mut tree);
        Ok(tree)
    }

    fn sanitize_in_place(&self, value: &mut Value) {
        match value {
            Value::Array(items) => {
                for item in items {
                    self.sanitize_in_place(item);
                }
            }
            Value::Object(obj) => {
                obj.retain(|key, _| !key.starts_with('_'));
                for child in obj.values_mut() {
                    self.sanitize_in_place(child);
                }
                if let Some(Value::Object(props)) = obj.get_mut("properties") {
                    self.text.sanitize_properties(props);
                }
            }
            _ => {}
        }
    }
}

fn find_external_data(value: &Value, pointer: &mut String) -> Result<(), UnsupportedFeatureKind> {
    match value {
        Value::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                let len = pointer.len();
                pointer.push_str(&format!("/{i}"));
                find_external_data(item, pointer)?;
                pointer.truncate(len);
            }
        }
        Value::Object(obj) => {
            if obj.get("type").and_then(Value::as_str) == Some("ExternalData") {
                return Err(UnsupportedFeatureKind {
                    pointer: pointer.clone(),
                    service: obj
                        .get("service")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                });
            }
            for (key, child) in obj {
                let len = pointer.len();
                pointer.push('/');
                pointer.push_str(&key.replace('~', "~0").replace('/', "~1"));
                find_external_data(child, pointer)?;
                pointer.truncate(len);
            }
        }
        _ => {}
    }
    Ok(())
}
