//! Page-scoped aggregation of tag data into named groups.

use crate::geojson::markers::{self, FirstMarker, MarkerCounters};
use crate::persist::PersistedGroups;
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::fmt;

/// Group identifier. Anonymous ids start with `_` and never collide with author names, which
/// are alphanumeric.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupId(String);

impl GroupId {
    pub fn named(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Content-derived id: `_` + SHA-256 of the canonical serialization.
    pub fn anonymous(features: &[Value]) -> Self {
        Self(format!("_{}", stable_hash(features)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_anonymous(&self) -> bool {
        self.0.starts_with('_')
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for GroupId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Copy of `value` with object keys sorted at every depth.
pub fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        Value::Object(obj) => {
            let mut entries: Vec<(&String, &Value)> = obj.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            Value::Object(
                entries
                    .into_iter()
                    .map(|(k, v)| (k.clone(), canonicalize(v)))
                    .collect::<Map<String, Value>>(),
            )
        }
        other => other.clone(),
    }
}

/// Lowercase hex SHA-256 of the canonical JSON of `features`.
pub fn stable_hash(features: &[Value]) -> String {
    let canonical = canonicalize(&Value::Array(features.to_vec()));
    let digest = Sha256::digest(canonical.to_string().as_bytes());
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct Contribution {
    pub group: GroupId,
    pub first_marker: Option<FirstMarker>,
}

#[derive(Debug, Default)]
pub struct GroupAggregator {
    groups: IndexMap<GroupId, Vec<Value>>,
    counters: MarkerCounters,
    live: IndexSet<GroupId>,
    valid: bool,
    broken: bool,
}

impl GroupAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Numbers markers with the page counters, then appends `features` to the group.
    ///
    /// Anonymous ids are computed after numbering. An empty list contributes nothing.
    pub fn contribute(&mut self, name: Option<&str>, mut features: Vec<Value>) -> Option<Contribution> {
        if features.is_empty() {
            return None;
        }
        let first_marker = markers::assign(&mut features, &mut self.counters);
        let group = match name {
            Some(name) => GroupId::named(name),
            None => GroupId::anonymous(&features),
        };

        let entry = self.groups.entry(group.clone()).or_default();
        let merged = !entry.is_empty();
        entry.extend(features);
        tracing::debug!(group = %group, merged, total = entry.len(), "group contribution");

        Some(Contribution {
            group,
            first_marker,
        })
    }

    pub fn request_live<I, G>(&mut self, groups: I)
    where
        I: IntoIterator<Item = G>,
        G: Into<GroupId>,
    {
        self.live.extend(groups.into_iter().map(Into::into));
    }

    pub fn group(&self, id: &str) -> Option<&[Value]> {
        self.groups.get(id).map(Vec::as_slice)
    }

    pub fn group_ids(&self) -> impl Iterator<Item = &GroupId> {
        self.groups.keys()
    }

    pub fn counters(&self) -> &MarkerCounters {
        &self.counters
    }

    pub fn mark_valid(&mut self) {
        self.valid = true;
    }

    pub fn mark_broken(&mut self) {
        self.broken = true;
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn is_broken(&self) -> bool {
        self.broken
    }

    /// Full group map plus the live subset (requested groups that actually exist), both in
    /// group insertion order.
    pub fn finalize(self) -> PersistedGroups {
        let mut data = Map::new();
        let mut live = Map::new();
        for (id, features) in self.groups {
            let value = Value::Array(features);
            if self.live.contains(&id) {
                live.insert(id.0.clone(), value.clone());
            }
            data.insert(id.0, value);
        }
        PersistedGroups {
            data,
            live,
            valid: self.valid,
            broken: self.broken,
        }
    }
}

impl From<String> for GroupId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for GroupId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<&String> for GroupId {
    fn from(value: &String) -> Self {
        Self(value.clone())
    }
}

impl std::borrow::Borrow<str> for GroupId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn marker(symbol: &str) -> Value {
        json!({
            "type": "Feature",
            "geometry": { "type": "Point", "coordinates": [0, 0] },
            "properties": { "marker-symbol": symbol }
        })
    }

    #[test]
    fn same_name_appends() {
        let mut agg = GroupAggregator::new();
        agg.contribute(Some("g"), vec![json!({ "n": "A" })]);
        agg.contribute(Some("g"), vec![json!({ "n": "B" })]);
        assert_eq!(agg.group("g").unwrap(), &[json!({ "n": "A" }), json!({ "n": "B" })]);
    }

    #[test]
    fn anonymous_ids_ignore_key_order() {
        let a = GroupId::anonymous(&[json!({ "type": "Point", "coordinates": [1, 2] })]);
        let b = GroupId::anonymous(&[json!({ "coordinates": [1, 2], "type": "Point" })]);
        assert_eq!(a, b);
        assert!(a.is_anonymous());
        assert_eq!(a.as_str().len(), 1 + 64);
        assert_ne!(a, GroupId::anonymous(&[json!({ "type": "Point", "coordinates": [2, 1] })]));
    }

    #[test]
    fn anonymous_ids_are_hashed_after_numbering() {
        let mut agg = GroupAggregator::new();
        let first = agg.contribute(None, vec![marker("-number")]).unwrap();
        let second = agg.contribute(None, vec![marker("-number")]).unwrap();
        assert_ne!(first.group, second.group);
        assert_eq!(first.group, GroupId::anonymous(&[marker("1")]));
        assert_eq!(second.first_marker.unwrap().symbol, "2");
    }

    #[test]
    fn empty_contribution_is_ignored() {
        let mut agg = GroupAggregator::new();
        assert_eq!(agg.contribute(Some("g"), vec![]), None);
        assert_eq!(agg.group_ids().count(), 0);
    }

    #[test]
    fn finalize_intersects_live_requests_with_data() {
        let mut agg = GroupAggregator::new();
        agg.contribute(Some("b"), vec![json!(1)]);
        agg.contribute(Some("a"), vec![json!(2)]);
        agg.request_live(["a", "missing"]);
        agg.mark_valid();
        agg.mark_broken();
        let out = agg.finalize();
        assert_eq!(out.data.keys().collect::<Vec<_>>(), ["b", "a"]);
        assert_eq!(Value::Object(out.live), json!({ "a": [2] }));
        assert!(out.valid && out.broken);
    }
}
