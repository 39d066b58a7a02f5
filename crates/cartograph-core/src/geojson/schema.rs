//! Structural validation of GeoJSON with simplestyle properties.
//!
//! Validation stops at the first problem and reports it with a JSON pointer. Foreign members
//! whose names start with `_` are accepted anywhere; the sanitizer strips them afterwards.

use regex::Regex;
use serde_json::{Map, Value};
use std::sync::OnceLock;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{pointer}: {message}")]
pub struct ValidationError {
    /// RFC 6901 pointer into the validated value.
    pub pointer: String,
    pub message: String,
}

type Validated = Result<(), ValidationError>;

const GEOMETRY_TYPES: [&str; 7] = [
    "Point",
    "MultiPoint",
    "LineString",
    "MultiLineString",
    "Polygon",
    "MultiPolygon",
    "GeometryCollection",
];

fn color_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^#?([0-9a-fA-F]{3}){1,2}$").expect("valid regex"))
}

fn marker_symbol_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[a-z0-9-]*$").expect("valid regex"))
}

fn fail(pointer: &str, message: impl Into<String>) -> Validated {
    Err(ValidationError {
        pointer: pointer.to_string(),
        message: message.into(),
    })
}

fn child(pointer: &str, key: &str) -> String {
    format!("{pointer}/{}", key.replace('~', "~0").replace('/', "~1"))
}

fn index(pointer: &str, i: usize) -> String {
    format!("{pointer}/{i}")
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn expect_object<'v>(value: &'v Value, pointer: &str) -> Result<&'v Map<String, Value>, ValidationError> {
    value.as_object().ok_or_else(|| ValidationError {
        pointer: pointer.to_string(),
        message: format!("{} value found, but an object is required", type_name(value)),
    })
}

fn expect_array<'v>(value: &'v Value, pointer: &str) -> Result<&'v [Value], ValidationError> {
    value.as_array().map(Vec::as_slice).ok_or_else(|| ValidationError {
        pointer: pointer.to_string(),
        message: format!("{} value found, but an array is required", type_name(value)),
    })
}

fn check_members(obj: &Map<String, Value>, allowed: &[&str], pointer: &str) -> Validated {
    for key in obj.keys() {
        if key.starts_with('_') || allowed.contains(&key.as_str()) {
            continue;
        }
        return fail(
            &child(pointer, key),
            format!("The property {key} is not defined and the definition does not allow additional properties"),
        );
    }
    Ok(())
}

fn required<'v>(obj: &'v Map<String, Value>, key: &str, pointer: &str) -> Result<&'v Value, ValidationError> {
    obj.get(key).ok_or_else(|| ValidationError {
        pointer: pointer.to_string(),
        message: format!("The property {key} is required"),
    })
}

/// Validates the normalized input: an array of GeoJSON objects.
pub fn validate(root: &Value) -> Validated {
    let items = expect_array(root, "")?;
    for (i, item) in items.iter().enumerate() {
        validate_object(item, &index("", i))?;
    }
    Ok(())
}

/// Any top-level object: a feature, a feature collection, a bare geometry or remote data.
fn validate_object(value: &Value, pointer: &str) -> Validated {
    let obj = expect_object(value, pointer)?;
    let kind = object_type(obj, pointer)?;
    match kind {
        "Feature" => validate_feature(obj, pointer),
        "FeatureCollection" => validate_feature_collection(obj, pointer),
        "ExternalData" => validate_external_data(obj, pointer),
        _ if GEOMETRY_TYPES.contains(&kind) => validate_geometry(obj, kind, pointer),
        other => fail(&child(pointer, "type"), format!("Unknown GeoJSON type \"{other}\"")),
    }
}

fn object_type<'v>(obj: &'v Map<String, Value>, pointer: &str) -> Result<&'v str, ValidationError> {
    let kind = required(obj, "type", pointer)?;
    kind.as_str().ok_or_else(|| ValidationError {
        pointer: child(pointer, "type"),
        message: format!("{} value found, but a string is required", type_name(kind)),
    })
}

fn validate_bbox(obj: &Map<String, Value>, pointer: &str) -> Validated {
    let Some(bbox) = obj.get("bbox") else {
        return Ok(());
    };
    let pointer = child(pointer, "bbox");
    let items = expect_array(bbox, &pointer)?;
    if items.len() < 4 || items.len() % 2 != 0 {
        return fail(&pointer, "A bounding box needs 2*n numbers with n >= 2");
    }
    for (i, item) in items.iter().enumerate() {
        if !item.is_number() {
            return fail(&index(&pointer, i), format!("{} value found, but a number is required", type_name(item)));
        }
    }
    Ok(())
}

fn validate_feature(obj: &Map<String, Value>, pointer: &str) -> Validated {
    check_members(obj, &["type", "id", "geometry", "properties", "bbox"], pointer)?;
    validate_bbox(obj, pointer)?;
    if let Some(id) = obj.get("id") {
        if !(id.is_string() || id.is_number()) {
            return fail(&child(pointer, "id"), "An id must be a string or a number");
        }
    }
    match required(obj, "geometry", pointer)? {
        Value::Null => {}
        geometry => {
            let ptr = child(pointer, "geometry");
            let geometry = expect_object(geometry, &ptr)?;
            validate_any_geometry(geometry, &ptr)?;
        }
    }
    validate_properties_member(obj, pointer)
}

fn validate_feature_collection(obj: &Map<String, Value>, pointer: &str) -> Validated {
    check_members(obj, &["type", "features", "bbox", "properties"], pointer)?;
    validate_bbox(obj, pointer)?;
    let features_ptr = child(pointer, "features");
    let features = expect_array(required(obj, "features", pointer)?, &features_ptr)?;
    for (i, feature) in features.iter().enumerate() {
        let ptr = index(&features_ptr, i);
        let feature_obj = expect_object(feature, &ptr)?;
        match object_type(feature_obj, &ptr)? {
            "Feature" => validate_feature(feature_obj, &ptr)?,
            "ExternalData" => validate_external_data(feature_obj, &ptr)?,
            other => {
                return fail(
                    &child(&ptr, "type"),
                    format!("Expected a Feature inside a FeatureCollection, found \"{other}\""),
                );
            }
        }
    }
    validate_properties_member(obj, pointer)
}

fn validate_external_data(obj: &Map<String, Value>, pointer: &str) -> Validated {
    check_members(obj, &["type", "service", "url", "ids", "query", "properties"], pointer)?;
    let service = required(obj, "service", pointer)?;
    if !service.is_string() {
        return fail(&child(pointer, "service"), format!("{} value found, but a string is required", type_name(service)));
    }
    validate_properties_member(obj, pointer)
}

fn validate_any_geometry(obj: &Map<String, Value>, pointer: &str) -> Validated {
    let kind = object_type(obj, pointer)?;
    if !GEOMETRY_TYPES.contains(&kind) {
        return fail(&child(pointer, "type"), format!("Expected a geometry type, found \"{kind}\""));
    }
    validate_geometry(obj, kind, pointer)
}

fn validate_geometry(obj: &Map<String, Value>, kind: &str, pointer: &str) -> Validated {
    validate_bbox(obj, pointer)?;
    if kind == "GeometryCollection" {
        check_members(obj, &["type", "geometries", "bbox", "properties"], pointer)?;
        let geometries_ptr = child(pointer, "geometries");
        let geometries = expect_array(required(obj, "geometries", pointer)?, &geometries_ptr)?;
        for (i, geometry) in geometries.iter().enumerate() {
            let ptr = index(&geometries_ptr, i);
            validate_any_geometry(expect_object(geometry, &ptr)?, &ptr)?;
        }
        return validate_properties_member(obj, pointer);
    }

    check_members(obj, &["type", "coordinates", "bbox", "properties"], pointer)?;
    let coords_ptr = child(pointer, "coordinates");
    let coords = required(obj, "coordinates", pointer)?;
    match kind {
        "Point" => validate_position(coords, &coords_ptr)?,
        "MultiPoint" => validate_list(coords, &coords_ptr, 0, validate_position)?,
        "LineString" => validate_line_string(coords, &coords_ptr)?,
        "MultiLineString" => validate_list(coords, &coords_ptr, 0, validate_line_string)?,
        "Polygon" => validate_polygon(coords, &coords_ptr)?,
        _ => validate_list(coords, &coords_ptr, 0, validate_polygon)?,
    }
    validate_properties_member(obj, pointer)
}

fn validate_list(
    value: &Value,
    pointer: &str,
    min_items: usize,
    item: fn(&Value, &str) -> Validated,
) -> Validated {
    let items = expect_array(value, pointer)?;
    if items.len() < min_items {
        return fail(pointer, format!("There must be a minimum of {min_items} items in the array"));
    }
    for (i, value) in items.iter().enumerate() {
        item(value, &index(pointer, i))?;
    }
    Ok(())
}

fn validate_position(value: &Value, pointer: &str) -> Validated {
    let items = expect_array(value, pointer)?;
    if !(2..=3).contains(&items.len()) {
        return fail(pointer, "A position must have 2 or 3 numbers");
    }
    for (i, item) in items.iter().enumerate() {
        if !item.is_number() {
            return fail(&index(pointer, i), format!("{} value found, but a number is required", type_name(item)));
        }
    }
    Ok(())
}

fn validate_line_string(value: &Value, pointer: &str) -> Validated {
    validate_list(value, pointer, 2, validate_position)
}

fn validate_ring(value: &Value, pointer: &str) -> Validated {
    validate_list(value, pointer, 4, validate_position)
}

fn validate_polygon(value: &Value, pointer: &str) -> Validated {
    validate_list(value, pointer, 0, validate_ring)
}

fn validate_properties_member(obj: &Map<String, Value>, pointer: &str) -> Validated {
    match obj.get("properties") {
        None | Some(Value::Null) => Ok(()),
        Some(props) => {
            let ptr = child(pointer, "properties");
            validate_properties(expect_object(props, &ptr)?, &ptr)
        }
    }
}

fn validate_properties(props: &Map<String, Value>, pointer: &str) -> Validated {
    for (key, value) in props {
        let ptr = child(pointer, key);
        match key.as_str() {
            "title" | "description" | "label" => {
                if !(value.is_string() || value.is_object()) {
                    return fail(&ptr, format!("{} value found, but a string or an object is required", type_name(value)));
                }
            }
            "marker-size" => {
                if !matches!(value.as_str(), Some("small" | "medium" | "large")) {
                    return fail(&ptr, "Does not have a value in the enumeration [\"small\",\"medium\",\"large\"]");
                }
            }
            "marker-symbol" => match value.as_str() {
                Some(s) if marker_symbol_regex().is_match(s) => {}
                _ => return fail(&ptr, "Expected a marker symbol name"),
            },
            "marker-color" | "stroke" | "fill" => match value.as_str() {
                Some(s) if color_regex().is_match(s) => {}
                _ => return fail(&ptr, "Expected a color like \"#7e7e7e\""),
            },
            "stroke-opacity" | "fill-opacity" => match value.as_f64() {
                Some(n) if (0.0..=1.0).contains(&n) => {}
                _ => return fail(&ptr, "Expected a number between 0 and 1"),
            },
            "stroke-width" => match value.as_f64() {
                Some(n) if n >= 0.0 => {}
                _ => return fail(&ptr, "Expected a non-negative number"),
            },
            _ => {}
        }
    }
    Ok(())
}
